use std::collections::HashMap;

use crate::{Result, SequencerError};

/// Named audio playback used by the sequencer at step boundaries.
pub trait SoundController {
    /// Registers `cue` and starts loading it from `source`. Calls for a name
    /// that is already registered do nothing.
    fn ensure_loaded(&mut self, cue: &str, source: &str);

    /// Starts playback. Returns `false` when the cue cannot play.
    fn play(&mut self, cue: &str) -> bool;

    /// Stops playback. Returns `false` when the cue was not playing.
    fn stop(&mut self, cue: &str) -> bool;

    fn is_playing(&self, cue: &str) -> bool;

    fn is_registered(&self, cue: &str) -> bool;

    /// Whether loading the cue failed for good.
    fn is_failed(&self, cue: &str) -> bool;

    fn stop_all(&mut self);

    /// Moves playback forward by one frame. Backends that track position on
    /// their own can ignore this.
    fn advance(&mut self, _delta: f32) {}
}

/// Lifecycle of a [`SoundCue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueState {
    Loading,
    Ready,
    Playing,
    Stopped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueSettings {
    pub volume: f32,
    pub looped: bool,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            looped: false,
        }
    }
}

/// One named audio resource shared by every entity on the stage.
#[derive(Debug, Clone)]
pub struct SoundCue {
    pub name: String,
    pub source: String,
    pub state: CueState,
    pub settings: CueSettings,
    /// Playback length in seconds, once known.
    pub length: Option<f32>,
    pub position: f32,
}

/// In-memory [`SoundController`] that tracks cue state and playback
/// position. Decoding is left to whoever calls
/// [`SoundBank::finish_loading`].
#[derive(Debug, Default)]
pub struct SoundBank {
    settings: CueSettings,
    cues: HashMap<String, SoundCue>,
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bank whose cues use `settings` once loaded.
    pub fn with_settings(settings: CueSettings) -> Self {
        Self {
            settings,
            cues: HashMap::new(),
        }
    }

    pub fn cue(&self, name: &str) -> Option<&SoundCue> {
        self.cues.get(name)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// `(name, source)` of every cue still waiting for its data, sorted by
    /// name.
    pub fn loading(&self) -> Vec<(String, String)> {
        let mut pending: Vec<_> = self
            .cues
            .values()
            .filter(|cue| cue.state == CueState::Loading)
            .map(|cue| (cue.name.clone(), cue.source.clone()))
            .collect();
        pending.sort();
        pending
    }

    /// Marks a cue as decoded and ready to play.
    pub fn finish_loading(&mut self, name: &str, length: Option<f32>) -> Result<()> {
        let cue = self
            .cues
            .get_mut(name)
            .ok_or_else(|| SequencerError::UnknownCue(name.to_string()))?;
        cue.state = CueState::Ready;
        cue.length = length.filter(|length| length.is_finite() && *length > 0.0);
        cue.position = 0.0;
        tracing::debug!(cue = name, source = %cue.source, "sound cue loaded");
        Ok(())
    }

    /// Records a failed load. The cue stays registered so it is not loaded
    /// again, but it can never play.
    pub fn fail_loading(&mut self, name: &str, reason: impl Into<String>) -> Result<()> {
        let cue = self
            .cues
            .get_mut(name)
            .ok_or_else(|| SequencerError::UnknownCue(name.to_string()))?;
        let reason = reason.into();
        tracing::error!(cue = name, source = %cue.source, %reason, "failed to load sound cue");
        cue.state = CueState::Failed(reason);
        Ok(())
    }
}

impl SoundController for SoundBank {
    fn ensure_loaded(&mut self, cue: &str, source: &str) {
        if self.cues.contains_key(cue) {
            return;
        }
        tracing::info!(cue, source, "loading sound cue");
        self.cues.insert(
            cue.to_string(),
            SoundCue {
                name: cue.to_string(),
                source: source.to_string(),
                state: CueState::Loading,
                settings: self.settings,
                length: None,
                position: 0.0,
            },
        );
    }

    fn play(&mut self, cue: &str) -> bool {
        let Some(sound) = self.cues.get_mut(cue) else {
            return false;
        };
        match sound.state {
            CueState::Ready | CueState::Stopped | CueState::Playing => {
                sound.state = CueState::Playing;
                sound.position = 0.0;
                true
            }
            CueState::Loading | CueState::Failed(_) => {
                tracing::warn!(cue, state = ?sound.state, "sound cue has no data to play");
                false
            }
        }
    }

    fn stop(&mut self, cue: &str) -> bool {
        match self.cues.get_mut(cue) {
            Some(sound) if sound.state == CueState::Playing => {
                sound.state = CueState::Stopped;
                sound.position = 0.0;
                true
            }
            _ => false,
        }
    }

    fn is_playing(&self, cue: &str) -> bool {
        self.cues
            .get(cue)
            .is_some_and(|sound| sound.state == CueState::Playing)
    }

    fn is_registered(&self, cue: &str) -> bool {
        self.cues.contains_key(cue)
    }

    fn is_failed(&self, cue: &str) -> bool {
        self.cues
            .get(cue)
            .is_some_and(|sound| matches!(sound.state, CueState::Failed(_)))
    }

    fn stop_all(&mut self) {
        for sound in self.cues.values_mut() {
            if sound.state == CueState::Playing {
                sound.state = CueState::Stopped;
                sound.position = 0.0;
            }
        }
    }

    fn advance(&mut self, delta: f32) {
        for sound in self.cues.values_mut() {
            if sound.state != CueState::Playing {
                continue;
            }
            let Some(length) = sound.length else {
                continue;
            };
            sound.position += delta;
            if sound.position >= length {
                if sound.settings.looped {
                    sound.position %= length;
                } else {
                    sound.state = CueState::Stopped;
                    sound.position = 0.0;
                }
            }
        }
    }
}
