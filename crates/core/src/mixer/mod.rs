//! Clip weight blending.
//!
//! [`BlendEngine`] is the seam the sequencer talks to. [`AnimationMixer`] is
//! a self-contained implementation that tracks per-clip time, weight and
//! linear fade ramps without touching any scene data.

use crate::ClipInfo;

/// Index of a clip within one entity's clip list.
pub type ClipIndex = usize;

/// Weight system that owns the clips of one entity.
pub trait BlendEngine {
    fn clip_count(&self) -> usize;

    /// Enables `clip`, resets its time scale to 1 and sets its weight.
    fn set_weight(&mut self, clip: ClipIndex, weight: f32);

    /// Ramps `from` down to 0 and `to` up to 1 over `duration` seconds and
    /// disables `from` when the ramp completes. When `warp` is set the time
    /// scales are adjusted so both clips meet at a common pace.
    fn cross_fade(&mut self, from: ClipIndex, to: ClipIndex, duration: f32, warp: bool);

    /// Unpauses every clip.
    fn resume_all(&mut self);

    /// Called once per rendered frame.
    fn advance_time(&mut self, delta: f32);
}

/// Linear interpolation from `start` to `end` over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    start: f32,
    end: f32,
    elapsed: f32,
    duration: f32,
}

impl Ramp {
    fn new(start: f32, end: f32, duration: f32) -> Self {
        Self {
            start,
            end,
            elapsed: 0.0,
            duration: duration.max(0.0),
        }
    }

    fn value(&self) -> f32 {
        if self.is_finished() {
            return self.end;
        }
        let t = self.elapsed / self.duration;
        self.start + (self.end - self.start) * t
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn step(&mut self, delta: f32) {
        self.elapsed += delta;
    }
}

/// Playback state of one clip inside an [`AnimationMixer`].
#[derive(Debug, Clone)]
pub struct ClipAction {
    clip: ClipInfo,
    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub enabled: bool,
    pub paused: bool,
    fade: Option<Ramp>,
    warp: Option<Ramp>,
}

impl ClipAction {
    pub fn new(clip: ClipInfo) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            enabled: true,
            paused: false,
            fade: None,
            warp: None,
        }
    }

    pub fn clip(&self) -> &ClipInfo {
        &self.clip
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Weight this clip currently contributes to the pose.
    pub fn effective_weight(&self) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        let factor = self.fade.map_or(1.0, |fade| fade.value());
        self.weight * factor
    }

    fn fade_factor(&self) -> f32 {
        self.fade.map_or(1.0, |fade| fade.value())
    }

    fn set_weight(&mut self, weight: f32) {
        self.enabled = true;
        self.time_scale = 1.0;
        self.weight = weight;
        self.fade = None;
        self.warp = None;
    }

    fn update(&mut self, dt: f32) {
        if let Some(mut warp) = self.warp.take() {
            warp.step(dt);
            self.time_scale = warp.value();
            if !warp.is_finished() {
                self.warp = Some(warp);
            }
        }

        if let Some(mut fade) = self.fade.take() {
            fade.step(dt);
            if !fade.is_finished() {
                self.fade = Some(fade);
            } else if fade.end <= 0.0 {
                self.weight = 0.0;
                self.enabled = false;
            }
        }

        if self.paused || !self.enabled {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }
        self.time += dt * self.time_scale;
        if self.time >= duration {
            self.time %= duration;
        } else if self.time < 0.0 {
            self.time = duration + (self.time % duration);
        }
    }
}

/// Reference [`BlendEngine`] over a fixed clip list.
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
}

impl AnimationMixer {
    pub fn new(clips: impl IntoIterator<Item = ClipInfo>) -> Self {
        Self {
            actions: clips.into_iter().map(ClipAction::new).collect(),
        }
    }

    pub fn action(&self, clip: ClipIndex) -> Option<&ClipAction> {
        self.actions.get(clip)
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    /// Effective weight of `clip`, or 0 for an unknown index.
    pub fn effective_weight(&self, clip: ClipIndex) -> f32 {
        self.actions
            .get(clip)
            .map_or(0.0, ClipAction::effective_weight)
    }

    /// Sum of every clip's effective weight.
    pub fn total_weight(&self) -> f32 {
        self.actions.iter().map(ClipAction::effective_weight).sum()
    }
}

impl BlendEngine for AnimationMixer {
    fn clip_count(&self) -> usize {
        self.actions.len()
    }

    fn set_weight(&mut self, clip: ClipIndex, weight: f32) {
        match self.actions.get_mut(clip) {
            Some(action) => action.set_weight(weight),
            None => tracing::debug!(clip, "ignoring weight for unknown clip"),
        }
    }

    fn cross_fade(&mut self, from: ClipIndex, to: ClipIndex, duration: f32, warp: bool) {
        if from == to || from >= self.actions.len() || to >= self.actions.len() {
            return;
        }

        let from_length = self.actions[from].clip.duration;
        let to_length = self.actions[to].clip.duration;

        let outgoing = &mut self.actions[from];
        outgoing.fade = Some(Ramp::new(outgoing.fade_factor(), 0.0, duration));
        if warp && from_length > 0.0 && to_length > 0.0 {
            outgoing.warp = Some(Ramp::new(1.0, from_length / to_length, duration));
        }
        // A zero-length fade completes on the spot.
        if duration <= 0.0 {
            outgoing.update(0.0);
        }

        let incoming = &mut self.actions[to];
        incoming.time = 0.0;
        incoming.fade = Some(Ramp::new(0.0, 1.0, duration));
        if warp && from_length > 0.0 && to_length > 0.0 {
            incoming.warp = Some(Ramp::new(to_length / from_length, 1.0, duration));
            incoming.time_scale = to_length / from_length;
        }
        if duration <= 0.0 {
            incoming.update(0.0);
        }
    }

    fn resume_all(&mut self) {
        for action in &mut self.actions {
            action.paused = false;
        }
    }

    fn advance_time(&mut self, delta: f32) {
        for action in &mut self.actions {
            action.update(delta);
        }
    }
}
