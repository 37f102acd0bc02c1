use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{timeline::step_timing, Result, SequencerError};

/// Top-level stage file: every animated entity plus the shared resources they
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Start playing as soon as the stage is built.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub viewport: ViewportConfig,
    /// Sound sources keyed by cue name. Cues without an entry use their name
    /// as the source URI.
    #[serde(default)]
    pub sounds: HashMap<String, SoundSource>,
    /// Clip manifests for the model assets, as produced by the asset loader.
    #[serde(default)]
    pub models: Vec<ModelManifest>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

fn default_autoplay() -> bool {
    true
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            background_image: None,
            viewport: ViewportConfig::default(),
            sounds: HashMap::new(),
            models: Vec::new(),
            entities: Vec::new(),
        }
    }
}

impl StageConfig {
    /// Reads and validates a stage file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses and validates a stage description.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the source URI for a sound cue.
    pub fn sound_source<'a>(&'a self, cue: &'a str) -> &'a str {
        self.sounds
            .get(cue)
            .map(|source| source.uri.as_str())
            .unwrap_or(cue)
    }

    /// Returns the manifest registered for `uri`, if any.
    pub fn model(&self, uri: &str) -> Option<&ModelManifest> {
        self.models.iter().find(|model| model.uri == uri)
    }

    /// Checks timing values and, where a manifest is declared, clip indices.
    ///
    /// Hook names are checked later against the [`crate::HookRegistry`] the
    /// host builds the sequencer with.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(SequencerError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }

        for entity in &self.entities {
            for (index, step) in entity.sequence.iter().enumerate() {
                step.validate(index)?;
            }

            if let Some(model) = self.model(&entity.asset) {
                let clip_count = model.clips.len();
                for (index, step) in entity.sequence.iter().enumerate() {
                    if step.action >= clip_count {
                        return Err(SequencerError::ClipOutOfRange {
                            step: index,
                            clip: step.action,
                            clip_count,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Initial size of the drawing surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundSource {
    pub uri: String,
    /// Playback length in seconds, when known ahead of decoding.
    #[serde(default)]
    pub length: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub uri: String,
    #[serde(default)]
    pub clips: Vec<ClipManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipManifest {
    pub name: String,
    pub duration: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Config {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl From<Vec3Config> for [f32; 3] {
    fn from(value: Vec3Config) -> Self {
        [value.x, value.y, value.z]
    }
}

/// One animated subject and its cyclic step list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    #[serde(alias = "mesh")]
    pub asset: String,
    #[serde(default)]
    pub mesh_name: Option<String>,
    #[serde(default)]
    pub position: Option<Vec3Config>,
    /// Euler angles in radians, applied X then Y then Z.
    #[serde(default)]
    pub rotation: Option<Vec3Config>,
    /// Uniform scale factor.
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub sequence: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    /// Index of the clip in the model's clip list.
    pub action: usize,
    /// Seconds the step lasts before the next one starts.
    pub duration: f32,
    /// Seconds spent cross-fading into this step.
    #[serde(default)]
    pub transition: f32,
    #[serde(default)]
    pub on_action_begin: Option<String>,
    #[serde(default)]
    pub on_action_end: Option<String>,
    #[serde(default)]
    pub start_sound: Option<String>,
    #[serde(default)]
    pub stop_sound: Option<String>,
}

impl StepConfig {
    pub(crate) fn validate(&self, index: usize) -> Result<()> {
        step_timing(index, self.duration, self.transition).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGE: &str = r#"{
        "backgroundImage": "background2019.png",
        "sounds": { "gong": { "uri": "audio/gong.ogg", "length": 2.5 } },
        "models": [
            { "uri": "oni.glb", "clips": [
                { "name": "run", "duration": 1.0 },
                { "name": "walk", "duration": 2.0 }
            ] }
        ],
        "entities": [
            {
                "mesh": "oni.glb",
                "meshName": "oni",
                "scale": 2.0,
                "sequence": [
                    { "action": 0, "duration": 2, "transition": 0.5, "startSound": "gong" },
                    { "action": 1, "duration": 5, "transition": 0.2, "stopSound": "gong",
                      "onActionBegin": "log" }
                ]
            },
            { "asset": "other.glb" }
        ]
    }"#;

    #[test]
    fn parses_stage_file_with_defaults() {
        let config = StageConfig::from_json(STAGE).unwrap();

        assert!(config.autoplay);
        assert_eq!(config.viewport, ViewportConfig::default());
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.entities[0].asset, "oni.glb");
        assert_eq!(config.entities[0].sequence[1].on_action_begin.as_deref(), Some("log"));
        assert!(config.entities[1].sequence.is_empty());
        assert_eq!(config.sound_source("gong"), "audio/gong.ogg");
        assert_eq!(config.sound_source("click.ogg"), "click.ogg");
    }

    #[test]
    fn rejects_non_positive_duration() {
        let raw = r#"{ "entities": [ { "asset": "a.glb", "sequence": [
            { "action": 0, "duration": 0, "transition": 0 }
        ] } ] }"#;

        let err = StageConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, SequencerError::InvalidStep { step: 0, .. }));
    }

    #[test]
    fn rejects_negative_transition() {
        let raw = r#"{ "entities": [ { "asset": "a.glb", "sequence": [
            { "action": 0, "duration": 1, "transition": 0.5 },
            { "action": 0, "duration": 1, "transition": -1 }
        ] } ] }"#;

        let err = StageConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, SequencerError::InvalidStep { step: 1, .. }));
    }

    #[test]
    fn rejects_duration_too_short_to_schedule() {
        let raw = r#"{ "entities": [ { "asset": "a.glb", "sequence": [
            { "action": 0, "duration": 1e-12, "transition": 0 }
        ] } ] }"#;

        let err = StageConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, SequencerError::InvalidStep { step: 0, .. }));
    }

    #[test]
    fn rejects_clip_outside_declared_manifest() {
        let raw = r#"{
            "models": [ { "uri": "a.glb", "clips": [ { "name": "idle", "duration": 1 } ] } ],
            "entities": [ { "asset": "a.glb", "sequence": [
                { "action": 3, "duration": 1, "transition": 0 }
            ] } ]
        }"#;

        let err = StageConfig::from_json(raw).unwrap_err();
        assert!(matches!(
            err,
            SequencerError::ClipOutOfRange {
                step: 0,
                clip: 3,
                clip_count: 1
            }
        ));
    }

    #[test]
    fn rejects_empty_viewport() {
        let raw = r#"{ "viewport": { "width": 0, "height": 100 } }"#;
        assert!(StageConfig::from_json(raw).is_err());
    }
}
