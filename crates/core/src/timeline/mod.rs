//! Step timelines and the virtual-time scheduler that drives them.

use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::{
    config::StepConfig, ClipIndex, HookRegistry, Result, SequencerError, StepHook,
};

/// Transition used when an authored transition would outlast its step.
pub const TRANSITION_FALLBACK: f32 = 0.1;

/// Cyclic predecessor of `index` in a sequence of `len` steps.
///
/// `len` must be non-zero.
pub fn previous_index(index: usize, len: usize) -> usize {
    (index + len - 1) % len
}

/// Checks the authored timing of the step at `index` and returns the
/// scheduled duration with the transition used when blending into it.
///
/// The clamp compares the authored seconds, so a transition equal to its
/// duration always falls back to [`TRANSITION_FALLBACK`].
pub(crate) fn step_timing(index: usize, duration: f32, transition: f32) -> Result<(Duration, f32)> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SequencerError::invalid_step(
            index,
            format!("duration must be a positive number of seconds, got {duration}"),
        ));
    }
    if !transition.is_finite() || transition < 0.0 {
        return Err(SequencerError::invalid_step(
            index,
            format!("transition must be zero or more seconds, got {transition}"),
        ));
    }
    let scheduled = Duration::try_from_secs_f32(duration)
        .map_err(|err| SequencerError::invalid_step(index, err.to_string()))?;
    if scheduled.is_zero() {
        return Err(SequencerError::invalid_step(
            index,
            "duration is too short to schedule",
        ));
    }

    let effective = if transition >= duration {
        TRANSITION_FALLBACK
    } else {
        transition
    };
    Ok((scheduled, effective))
}

/// One timeline entry: which clip plays, for how long, and how it blends in.
#[derive(Clone)]
pub struct Step {
    clip: ClipIndex,
    duration: Duration,
    transition: f32,
    effective_transition: f32,
    on_begin: Option<StepHook>,
    on_end: Option<StepHook>,
    start_sound: Option<String>,
    stop_sound: Option<String>,
}

impl Step {
    /// Creates a step without hooks or sound cues.
    ///
    /// `duration` must be a positive number of seconds and `transition` must
    /// be zero or more seconds.
    pub fn new(clip: ClipIndex, duration: f32, transition: f32) -> Result<Self> {
        Self::build(0, clip, duration, transition)
    }

    fn build(index: usize, clip: ClipIndex, duration: f32, transition: f32) -> Result<Self> {
        let (duration, effective_transition) = step_timing(index, duration, transition)?;
        Ok(Self {
            clip,
            duration,
            transition,
            effective_transition,
            on_begin: None,
            on_end: None,
            start_sound: None,
            stop_sound: None,
        })
    }

    /// Builds the step authored at position `index` of a stage file.
    pub fn from_config(index: usize, config: &StepConfig, hooks: &HookRegistry) -> Result<Self> {
        let mut step = Self::build(index, config.action, config.duration, config.transition)?;
        if let Some(name) = &config.on_action_begin {
            step.on_begin = Some(hooks.resolve(name)?);
        }
        if let Some(name) = &config.on_action_end {
            step.on_end = Some(hooks.resolve(name)?);
        }
        step.start_sound = config.start_sound.clone();
        step.stop_sound = config.stop_sound.clone();
        Ok(step)
    }

    pub fn with_on_begin(mut self, hook: StepHook) -> Self {
        self.on_begin = Some(hook);
        self
    }

    pub fn with_on_end(mut self, hook: StepHook) -> Self {
        self.on_end = Some(hook);
        self
    }

    pub fn with_start_sound(mut self, cue: impl Into<String>) -> Self {
        self.start_sound = Some(cue.into());
        self
    }

    pub fn with_stop_sound(mut self, cue: impl Into<String>) -> Self {
        self.stop_sound = Some(cue.into());
        self
    }

    pub fn clip(&self) -> ClipIndex {
        self.clip
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Authored transition length in seconds, before clamping.
    pub fn transition(&self) -> f32 {
        self.transition
    }

    /// Transition actually used when blending into this step.
    pub fn effective_transition(&self) -> f32 {
        self.effective_transition
    }

    pub fn on_begin(&self) -> Option<&StepHook> {
        self.on_begin.as_ref()
    }

    pub fn on_end(&self) -> Option<&StepHook> {
        self.on_end.as_ref()
    }

    pub fn start_sound(&self) -> Option<&str> {
        self.start_sound.as_deref()
    }

    pub fn stop_sound(&self) -> Option<&str> {
        self.stop_sound.as_deref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("clip", &self.clip)
            .field("duration", &self.duration)
            .field("transition", &self.transition)
            .field("effective_transition", &self.effective_transition)
            .field("on_begin", &self.on_begin.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("start_sound", &self.start_sound)
            .field("stop_sound", &self.stop_sound)
            .finish()
    }
}

/// Ordered, cyclic list of steps for one entity.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn from_config(steps: &[StepConfig], hooks: &HookRegistry) -> Result<Self> {
        let steps = steps
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_config(index, step, hooks))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Fails with [`SequencerError::ClipOutOfRange`] on the first step whose
    /// clip index is not below `clip_count`.
    pub fn validate_clips(&self, clip_count: usize) -> Result<()> {
        match self
            .steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.clip >= clip_count)
        {
            Some((step, found)) => Err(SequencerError::ClipOutOfRange {
                step,
                clip: found.clip,
                clip_count,
            }),
            None => Ok(()),
        }
    }

    /// Names of every cue a step starts, in authoring order, without repeats.
    pub fn start_cues(&self) -> Vec<&str> {
        let mut cues: Vec<&str> = Vec::new();
        for cue in self.steps.iter().filter_map(Step::start_sound) {
            if !cues.contains(&cue) {
                cues.push(cue);
            }
        }
        cues
    }
}

/// Handle to a task queued on a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask<T> {
    pub id: TaskId,
    pub due: Duration,
    pub payload: T,
}

/// Cancellable delayed tasks in virtual time.
///
/// Nothing runs on its own: the host moves time forward and pops due tasks.
/// Tasks due at the same instant come out in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    queue: Vec<ScheduledTask<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: Vec::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.queue.iter().any(|task| task.id == id)
    }

    pub fn schedule_after(&mut self, delay: Duration, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.push(ScheduledTask {
            id,
            due: self.now + delay,
            payload,
        });
        id
    }

    /// Removes a queued task. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.queue.iter().position(|task| task.id == id) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Pops the earliest task due at or before `until`, moving the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<ScheduledTask<T>> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= until)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;

        let task = self.queue.remove(index);
        self.now = self.now.max(task.due);
        Some(task)
    }

    /// Moves the clock forward without running anything. Time never goes
    /// backwards.
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

/// Measures wall-clock time between rendered frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    started: Instant,
    last: Option<Instant>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::start()
    }
}

impl FrameClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            last: None,
        }
    }

    /// Time since the previous call, or since the clock started on the first
    /// call.
    pub fn delta(&mut self) -> Duration {
        let now = Instant::now();
        let previous = self.last.replace(now).unwrap_or(self.started);
        now.saturating_duration_since(previous)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
