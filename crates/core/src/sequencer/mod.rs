//! The step sequencer.
//!
//! A [`Sequencer`] owns every animated entity on a stage, one cyclic
//! [`Sequence`] per entity, the shared sound controller and the scheduler
//! that re-enters [`Sequencer::advance`] once a step's duration has elapsed.
//! `play`, `stop` and `toggle` act on the whole stage.

pub mod hooks;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::StageConfig,
    timeline::{previous_index, Scheduler, Sequence, TaskId},
    BlendEngine, ClipIndex, Result, SequencerError, SoundController,
};

pub use hooks::{HookFlow, HookRegistry, StepEvent, StepHook, StepPhase};

/// Position of an entity in its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// Loading status of an entity's model.
#[derive(Debug)]
pub enum EntityStatus<M> {
    Loading,
    Loaded(M),
    Failed(String),
}

/// One animated subject: its timeline, cursor and blend engine.
#[derive(Debug)]
pub struct Entity<M> {
    id: EntityId,
    asset: String,
    sequence: Sequence,
    cursor: Option<usize>,
    status: EntityStatus<M>,
    pending: Option<TaskId>,
}

impl<M> Entity<M> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Index of the step the next advance will play. `None` before the first
    /// advance and after a stop.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn status(&self) -> &EntityStatus<M> {
        &self.status
    }

    pub fn mixer(&self) -> Option<&M> {
        match &self.status {
            EntityStatus::Loaded(mixer) => Some(mixer),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, EntityStatus::Loaded(_))
    }

    /// Scheduled re-entry of the sequencer for this entity, if any.
    pub fn pending(&self) -> Option<TaskId> {
        self.pending
    }
}

/// What one advance did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTransition {
    pub entity: EntityId,
    pub step: usize,
    pub clip: ClipIndex,
    pub previous_clip: ClipIndex,
    /// Cross-fade length after clamping, in seconds.
    pub transition: f32,
    pub cross_faded: bool,
    /// Step the following advance will play.
    pub cursor: usize,
    pub first: bool,
}

/// Drives every entity of a stage through its cyclic step list.
#[derive(Debug)]
pub struct Sequencer<M, S> {
    state: RunState,
    entities: Vec<Entity<M>>,
    sounds: S,
    scheduler: Scheduler<EntityId>,
}

impl<M: BlendEngine, S: SoundController> Sequencer<M, S> {
    pub fn new(sounds: S) -> Self {
        Self {
            state: RunState::Stopped,
            entities: Vec::new(),
            sounds,
            scheduler: Scheduler::new(),
        }
    }

    /// Builds one entity per stage entry, resolving hooks by name and
    /// preloading every cue a step starts. Entities begin in
    /// [`EntityStatus::Loading`].
    pub fn from_config(config: &StageConfig, hooks: &HookRegistry, sounds: S) -> Result<Self> {
        let mut sequencer = Self::new(sounds);
        for entity in &config.entities {
            let sequence = Sequence::from_config(&entity.sequence, hooks)?;
            for cue in sequence.start_cues() {
                sequencer.sounds.ensure_loaded(cue, config.sound_source(cue));
            }
            sequencer.add_entity(entity.asset.clone(), sequence);
        }
        Ok(sequencer)
    }

    /// Registers an entity whose model is still loading. Cues started by its
    /// steps are preloaded using their names as sources unless already known.
    pub fn add_entity(&mut self, asset: impl Into<String>, sequence: Sequence) -> EntityId {
        for cue in sequence.start_cues() {
            self.sounds.ensure_loaded(cue, cue);
        }
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            asset: asset.into(),
            sequence,
            cursor: None,
            status: EntityStatus::Loading,
            pending: None,
        });
        id
    }

    /// Hands the entity its blend engine once the model has loaded.
    ///
    /// Every clip starts at weight 0. If the stage is already running the
    /// entity's timeline starts immediately.
    pub fn attach_entity(&mut self, id: EntityId, mut mixer: M) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id.0)
            .ok_or(SequencerError::UnknownEntity(id))?;

        if let Err(err) = entity.sequence.validate_clips(mixer.clip_count()) {
            tracing::error!(entity = %id, asset = %entity.asset, error = %err, "rejecting entity");
            entity.status = EntityStatus::Failed(err.to_string());
            return Err(err);
        }
        if let Some(cue) = failed_cue(&self.sounds, &entity.sequence) {
            let err = SequencerError::AssetLoad {
                uri: cue.to_string(),
                reason: "sound cue failed to load".to_string(),
            };
            tracing::error!(entity = %id, asset = %entity.asset, error = %err, "rejecting entity");
            entity.status = EntityStatus::Failed(err.to_string());
            return Err(err);
        }

        for clip in 0..mixer.clip_count() {
            mixer.set_weight(clip, 0.0);
        }
        mixer.resume_all();

        tracing::info!(
            entity = %id,
            asset = %entity.asset,
            clips = mixer.clip_count(),
            steps = entity.sequence.len(),
            "entity loaded"
        );
        entity.status = EntityStatus::Loaded(mixer);
        entity.cursor = None;
        if let Some(stale) = entity.pending.take() {
            self.scheduler.cancel(stale);
        }

        if self.is_running() {
            self.step_entity(id.0);
        }
        Ok(())
    }

    /// Records that the entity's model could not be loaded. The entity never
    /// starts.
    pub fn fail_entity(&mut self, id: EntityId, reason: impl fmt::Display) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id.0)
            .ok_or(SequencerError::UnknownEntity(id))?;
        tracing::error!(entity = %id, asset = %entity.asset, %reason, "failed to load entity");
        entity.status = EntityStatus::Failed(reason.to_string());
        if let Some(stale) = entity.pending.take() {
            self.scheduler.cancel(stale);
        }
        Ok(())
    }

    pub fn play(&mut self) {
        if self.is_running() {
            return;
        }
        tracing::info!(entities = self.entities.len(), "play");
        self.state = RunState::Running;

        for entity in &mut self.entities {
            entity.cursor = None;
            if !entity.is_loaded() {
                continue;
            }
            if let Some(cue) = failed_cue(&self.sounds, &entity.sequence) {
                let reason = format!("sound cue {cue} failed to load");
                tracing::error!(entity = %entity.id, asset = %entity.asset, %reason, "rejecting entity");
                entity.status = EntityStatus::Failed(reason);
            } else if let EntityStatus::Loaded(mixer) = &mut entity.status {
                mixer.resume_all();
            }
        }
        for index in 0..self.entities.len() {
            self.step_entity(index);
        }
    }

    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        for entity in &mut self.entities {
            if let EntityStatus::Loaded(mixer) = &mut entity.status {
                for clip in 0..mixer.clip_count() {
                    mixer.set_weight(clip, 0.0);
                }
            }
            entity.cursor = None;
            if let Some(task) = entity.pending.take() {
                self.scheduler.cancel(task);
            }
        }
        self.sounds.stop_all();
        self.state = RunState::Stopped;
        tracing::info!("stop");
    }

    pub fn toggle(&mut self) {
        if self.is_running() {
            self.stop();
        } else {
            self.play();
        }
    }

    /// Plays the entity's next step and schedules the one after it.
    ///
    /// Returns `Ok(None)` without touching anything when the stage is
    /// stopped, the entity has not loaded, or its sequence is empty.
    pub fn advance(&mut self, id: EntityId) -> Result<Option<StepTransition>> {
        if id.0 >= self.entities.len() {
            return Err(SequencerError::UnknownEntity(id));
        }
        Ok(self.step_entity(id.0))
    }

    fn step_entity(&mut self, index: usize) -> Option<StepTransition> {
        if !self.is_running() {
            return None;
        }
        let entity = self.entities.get_mut(index)?;
        let id = entity.id;
        let EntityStatus::Loaded(mixer) = &mut entity.status else {
            return None;
        };
        let len = entity.sequence.len();
        if len == 0 {
            return None;
        }

        let first = entity.cursor.is_none();
        let step = entity.cursor.unwrap_or(0);
        let previous = previous_index(step, len);
        let current = entity.sequence.step(step)?.clone();
        let prev = entity.sequence.step(previous)?.clone();
        let transition = current.effective_transition();

        // Hooks observe the cursor of the step that plays next.
        let cursor = (step + 1) % len;
        entity.cursor = Some(cursor);

        let mut flow = HookFlow::Continue;
        if !first {
            if let Some(hook) = prev.on_end() {
                flow = flow.then(hook(&StepEvent {
                    entity: id,
                    phase: StepPhase::End,
                    step: previous,
                    clip: prev.clip(),
                    cursor,
                }));
            }
        }
        if let Some(hook) = current.on_begin() {
            flow = flow.then(hook(&StepEvent {
                entity: id,
                phase: StepPhase::Begin,
                step,
                clip: current.clip(),
                cursor,
            }));
        }

        if let Some(cue) = current.stop_sound() {
            if self.sounds.is_playing(cue) {
                self.sounds.stop(cue);
            }
        }

        mixer.set_weight(current.clip(), 1.0);
        let cross_faded = prev.clip() != current.clip();
        if cross_faded {
            mixer.cross_fade(prev.clip(), current.clip(), transition, true);
        }

        if let Some(cue) = current.start_sound() {
            if self.sounds.is_registered(cue) {
                self.sounds.play(cue);
            }
        }

        if let Some(stale) = entity.pending.take() {
            self.scheduler.cancel(stale);
        }
        entity.pending = Some(self.scheduler.schedule_after(current.duration(), id));

        tracing::debug!(
            entity = %id,
            step,
            clip = current.clip(),
            from = prev.clip(),
            transition,
            next = cursor,
            "advanced step"
        );

        let outcome = StepTransition {
            entity: id,
            step,
            clip: current.clip(),
            previous_clip: prev.clip(),
            transition,
            cross_faded,
            cursor,
            first,
        };

        if flow == HookFlow::Stop {
            tracing::info!(entity = %id, step, "step hook requested stop");
            self.stop();
        }
        Some(outcome)
    }

    /// Moves the timer clock forward, running every advance that falls due,
    /// in due order, including ones scheduled inside the same window.
    pub fn advance_timers(&mut self, elapsed: Duration) -> Vec<StepTransition> {
        let until = self.scheduler.now() + elapsed;
        let mut fired = Vec::new();

        while let Some(task) = self.scheduler.pop_due(until) {
            let index = task.payload.0;
            if let Some(entity) = self.entities.get_mut(index) {
                if entity.pending == Some(task.id) {
                    entity.pending = None;
                }
            }
            fired.extend(self.step_entity(index));
        }

        self.scheduler.advance_to(until);
        fired
    }

    /// Per-frame update of every loaded blend engine and of sound playback.
    pub fn advance_blends(&mut self, delta: Duration) {
        let seconds = delta.as_secs_f32();
        for entity in &mut self.entities {
            if let EntityStatus::Loaded(mixer) = &mut entity.status {
                mixer.advance_time(seconds);
            }
        }
        self.sounds.advance(seconds);
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity<M>> {
        self.entities.get(id.0)
    }

    pub fn entities(&self) -> &[Entity<M>] {
        &self.entities
    }

    pub fn sounds(&self) -> &S {
        &self.sounds
    }

    pub fn sounds_mut(&mut self) -> &mut S {
        &mut self.sounds
    }

    pub fn scheduler(&self) -> &Scheduler<EntityId> {
        &self.scheduler
    }
}

/// First cue started by `sequence` whose load failed.
fn failed_cue<'a, S: SoundController>(sounds: &S, sequence: &'a Sequence) -> Option<&'a str> {
    sequence
        .start_cues()
        .into_iter()
        .find(|cue| sounds.is_failed(cue))
}
