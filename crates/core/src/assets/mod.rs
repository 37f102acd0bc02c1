use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{EntityConfig, ModelManifest},
    SequencerError, Result,
};

/// Name and length of one animation clip in a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
}

impl ClipInfo {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// Clips of a model as reported by the asset loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAsset {
    pub uri: String,
    pub clips: Vec<ClipInfo>,
}

impl From<&ModelManifest> for ModelAsset {
    fn from(manifest: &ModelManifest) -> Self {
        Self {
            uri: manifest.uri.clone(),
            clips: manifest
                .clips
                .iter()
                .map(|clip| ClipInfo::new(clip.name.clone(), clip.duration))
                .collect(),
        }
    }
}

/// Registry for all model assets referenced by entities.
#[derive(Debug, Default)]
pub struct AssetStore {
    models: HashMap<String, ModelAsset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Builds a store from the manifests declared in a stage file.
    pub fn from_manifests<'a>(manifests: impl IntoIterator<Item = &'a ModelManifest>) -> Self {
        let mut store = Self::new();
        for manifest in manifests {
            store.register_model(ModelAsset::from(manifest));
        }
        store
    }

    pub fn register_model(&mut self, asset: ModelAsset) {
        self.models.insert(asset.uri.clone(), asset);
    }

    /// Looks up the model an entity is built from.
    pub fn resolve_entity_asset(&self, entity: &EntityConfig) -> Result<&ModelAsset> {
        self.models
            .get(&entity.asset)
            .ok_or_else(|| SequencerError::AssetLoad {
                uri: entity.asset.clone(),
                reason: "no model registered for this asset".to_string(),
            })
    }

    pub fn model(&self, uri: &str) -> Option<&ModelAsset> {
        self.models.get(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(asset: &str) -> EntityConfig {
        EntityConfig {
            asset: asset.to_string(),
            mesh_name: None,
            position: None,
            rotation: None,
            scale: None,
            sequence: Vec::new(),
        }
    }

    fn model(uri: &str) -> ModelAsset {
        ModelAsset {
            uri: uri.to_string(),
            clips: vec![ClipInfo::new("idle", 1.0)],
        }
    }

    #[test]
    fn resolves_registered_assets() {
        let mut store = AssetStore::new();
        store.register_model(model("oni.glb"));

        let resolved = store.resolve_entity_asset(&entity("oni.glb")).unwrap();
        assert_eq!(resolved.clips.len(), 1);
    }

    #[test]
    fn errors_on_missing_assets() {
        let store = AssetStore::new();

        let err = store.resolve_entity_asset(&entity("missing.glb")).unwrap_err();
        assert!(format!("{err}").contains("missing.glb"));
    }

    #[test]
    fn builds_from_manifests() {
        let manifest = ModelManifest {
            uri: "oni.glb".to_string(),
            clips: vec![crate::config::ClipManifest {
                name: "run".to_string(),
                duration: 1.5,
            }],
        };

        let store = AssetStore::from_manifests([&manifest]);
        let model = store.model("oni.glb").unwrap();
        assert_eq!(model.clips, vec![ClipInfo::new("run", 1.5)]);
    }
}
