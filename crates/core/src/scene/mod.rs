use serde::{Deserialize, Serialize};

use crate::{
    config::{EntityConfig, StageConfig},
    Result, SequencerError,
};

/// Perspective camera framing the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 75.0,
            aspect: 1.0,
            near: 0.1,
            far: 1_000_000.0,
            position: [0.0, 30.0, 60.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// Placed instance of a loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: Option<String>,
    pub asset: String,
    pub transform: Transform,
}

impl SceneNode {
    pub fn from_entity(entity: &EntityConfig) -> Self {
        let mut transform = Transform::default();
        if let Some(position) = entity.position {
            transform.position = position.into();
        }
        if let Some(rotation) = entity.rotation {
            transform.rotation = rotation.into();
        }
        if let Some(scale) = entity.scale {
            transform.scale = [scale; 3];
        }
        Self {
            name: entity.mesh_name.clone(),
            asset: entity.asset.clone(),
            transform,
        }
    }
}

/// Everything the renderer needs to draw a frame.
#[derive(Debug, Clone)]
pub struct SceneInstance {
    pub camera: Camera,
    pub viewport: Viewport,
    pub background: Option<String>,
    pub clear_color: [f32; 4],
    pub nodes: Vec<SceneNode>,
}

impl SceneInstance {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let mut scene = Self {
            camera: Camera::default(),
            viewport: Viewport { width, height },
            background: None,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            nodes: Vec::new(),
        };
        scene.resize(width, height)?;
        Ok(scene)
    }

    pub fn from_config(config: &StageConfig) -> Result<Self> {
        let mut scene = Self::new(config.viewport.width, config.viewport.height)?;
        scene.background = config.background_image.clone();
        Ok(scene)
    }

    /// Adds a node once its model has loaded and returns its index.
    pub fn add_entity(&mut self, entity: &EntityConfig) -> usize {
        self.nodes.push(SceneNode::from_entity(entity));
        self.nodes.len() - 1
    }

    /// Recomputes the viewport and the camera aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(SequencerError::InvalidViewport { width, height });
        }
        self.viewport = Viewport { width, height };
        self.camera.aspect = self.viewport.aspect();
        Ok(())
    }
}
