//! Core library for the Clip Sequencer player.
//!
//! The crate drives pre-authored animation clips of one or more characters
//! through cyclic step lists. Each module owns a distinct concern: stage
//! configuration, the step timeline and its scheduler, clip blending, sound
//! cues, asset manifests, the scene description and the frame loop. The
//! [`Sequencer`] ties them together.

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod mixer;
pub mod render;
pub mod scene;
pub mod sequencer;
pub mod timeline;

pub use assets::{AssetStore, ClipInfo, ModelAsset};
pub use audio::{CueSettings, CueState, SoundBank, SoundController, SoundCue};
pub use config::{EntityConfig, StageConfig, StepConfig, ViewportConfig};
pub use error::{Result, SequencerError};
pub use mixer::{AnimationMixer, BlendEngine, ClipAction, ClipIndex};
pub use render::{FrameInfo, RenderLoop, Renderer};
pub use scene::{Camera, SceneInstance, SceneNode, Transform, Viewport};
pub use sequencer::{
    Entity, EntityId, EntityStatus, HookFlow, HookRegistry, RunState, Sequencer, StepEvent,
    StepHook, StepPhase, StepTransition,
};
pub use timeline::{
    previous_index, FrameClock, Scheduler, Sequence, Step, TaskId, TRANSITION_FALLBACK,
};
