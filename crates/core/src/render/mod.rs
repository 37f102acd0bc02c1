//! Frame loop glue between the sequencer and a rendering backend.

use std::{fmt, time::Duration};

use crate::{
    scene::SceneInstance, BlendEngine, Result, Sequencer, SoundController, StepTransition,
};

/// Rendering backend abstraction. Drawing itself happens outside this crate.
pub trait Renderer {
    fn set_size(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: &SceneInstance);
}

/// Summary of one completed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub index: u64,
    pub delta: Duration,
    pub elapsed: Duration,
    /// Steps that started during this frame.
    pub transitions: Vec<StepTransition>,
}

/// Callback run after every frame has been drawn.
pub type FrameHook = Box<dyn FnMut(&FrameInfo)>;

pub struct RenderLoop<R> {
    renderer: R,
    scene: SceneInstance,
    frames: u64,
    elapsed: Duration,
    frame_hook: Option<FrameHook>,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(mut renderer: R, scene: SceneInstance) -> Self {
        renderer.set_size(scene.viewport.width, scene.viewport.height);
        Self {
            renderer,
            scene,
            frames: 0,
            elapsed: Duration::ZERO,
            frame_hook: None,
        }
    }

    pub fn scene(&self) -> &SceneInstance {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneInstance {
        &mut self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn set_frame_hook(&mut self, hook: impl FnMut(&FrameInfo) + 'static) {
        self.frame_hook = Some(Box::new(hook));
    }

    /// Host entry point for viewport changes.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.scene.resize(width, height)?;
        self.renderer.set_size(width, height);
        tracing::debug!(width, height, aspect = self.scene.camera.aspect, "viewport resized");
        Ok(())
    }

    /// Runs one frame: due step timers, blend and sound updates, then drawing.
    pub fn frame<M, S>(&mut self, delta: Duration, sequencer: &mut Sequencer<M, S>) -> FrameInfo
    where
        M: BlendEngine,
        S: SoundController,
    {
        let transitions = sequencer.advance_timers(delta);
        sequencer.advance_blends(delta);
        self.renderer.render(&self.scene);

        self.frames += 1;
        self.elapsed += delta;
        let info = FrameInfo {
            index: self.frames,
            delta,
            elapsed: self.elapsed,
            transitions,
        };
        if let Some(hook) = self.frame_hook.as_mut() {
            hook(&info);
        }
        tracing::trace!(frame = info.index, ?delta, "frame rendered");
        info
    }
}

impl<R: fmt::Debug> fmt::Debug for RenderLoop<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoop")
            .field("renderer", &self.renderer)
            .field("scene", &self.scene)
            .field("frames", &self.frames)
            .field("elapsed", &self.elapsed)
            .field("frame_hook", &self.frame_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{AnimationMixer, ClipInfo, Sequence, SoundBank, Step};

    #[derive(Debug, Default)]
    struct CountingRenderer {
        sizes: Vec<(u32, u32)>,
        draws: usize,
    }

    impl Renderer for CountingRenderer {
        fn set_size(&mut self, width: u32, height: u32) {
            self.sizes.push((width, height));
        }

        fn render(&mut self, _scene: &SceneInstance) {
            self.draws += 1;
        }
    }

    fn stage() -> Sequencer<AnimationMixer, SoundBank> {
        let mut sequencer = Sequencer::new(SoundBank::new());
        let id = sequencer.add_entity(
            "oni.glb",
            Sequence::new(vec![
                Step::new(0, 0.5, 0.1).unwrap(),
                Step::new(1, 0.5, 0.1).unwrap(),
            ]),
        );
        let mixer = AnimationMixer::new(vec![ClipInfo::new("run", 1.0), ClipInfo::new("walk", 1.0)]);
        sequencer.attach_entity(id, mixer).unwrap();
        sequencer
    }

    #[test]
    fn sizes_renderer_on_creation_and_resize() {
        let scene = SceneInstance::new(200, 100).unwrap();
        let mut frame_loop = RenderLoop::new(CountingRenderer::default(), scene);

        frame_loop.resize(800, 600).unwrap();
        assert!(frame_loop.resize(0, 600).is_err());

        assert_eq!(frame_loop.renderer().sizes, vec![(200, 100), (800, 600)]);
        assert!((frame_loop.scene().camera.aspect - 4.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn frames_drive_step_timers() {
        let scene = SceneInstance::new(200, 200).unwrap();
        let mut frame_loop = RenderLoop::new(CountingRenderer::default(), scene);
        let mut sequencer = stage();
        sequencer.play();

        let seen = Rc::new(Cell::new(0_usize));
        let counter = Rc::clone(&seen);
        frame_loop.set_frame_hook(move |info| counter.set(counter.get() + info.transitions.len()));

        let frame = Duration::from_millis(250);
        let mut started = Vec::new();
        for _ in 0..4 {
            let info = frame_loop.frame(frame, &mut sequencer);
            started.extend(info.transitions.into_iter().map(|t| t.step));
        }

        assert_eq!(started, vec![1, 0]);
        assert_eq!(seen.get(), 2);
        assert_eq!(frame_loop.frames(), 4);
        assert_eq!(frame_loop.elapsed(), Duration::from_secs(1));
        assert_eq!(frame_loop.renderer().draws, 4);
    }
}
