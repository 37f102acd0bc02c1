use std::{collections::HashMap, fmt, sync::Arc};

use crate::{ClipIndex, EntityId, Result, SequencerError};

/// Lifecycle callback attached to a step.
pub type StepHook = Arc<dyn Fn(&StepEvent) -> HookFlow + Send + Sync>;

/// Which side of a step boundary a hook fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Begin,
    End,
}

/// Snapshot handed to a step hook.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEvent {
    pub entity: EntityId,
    pub phase: StepPhase,
    /// Index of the step that owns the hook.
    pub step: usize,
    pub clip: ClipIndex,
    /// Cursor after the advance, i.e. the step that plays next.
    pub cursor: usize,
}

/// What the sequencer should do once the current advance has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookFlow {
    #[default]
    Continue,
    /// Stop the whole stage.
    Stop,
}

impl HookFlow {
    pub(crate) fn then(self, other: HookFlow) -> HookFlow {
        if self == HookFlow::Stop || other == HookFlow::Stop {
            HookFlow::Stop
        } else {
            HookFlow::Continue
        }
    }
}

/// Named hooks that stage files can reference from `onActionBegin` and
/// `onActionEnd`.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, StepHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `log` and `stop`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("log", |event: &StepEvent| {
            tracing::info!(
                entity = %event.entity,
                phase = ?event.phase,
                step = event.step,
                clip = event.clip,
                "step hook"
            );
            HookFlow::Continue
        });
        registry.register("stop", |_: &StepEvent| HookFlow::Stop);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&StepEvent) -> HookFlow + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn get(&self, name: &str) -> Option<&StepHook> {
        self.hooks.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<StepHook> {
        self.get(name)
            .cloned()
            .ok_or_else(|| SequencerError::UnknownHook(name.to_string()))
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> StepEvent {
        StepEvent {
            entity: EntityId(0),
            phase: StepPhase::Begin,
            step: 0,
            clip: 0,
            cursor: 1,
        }
    }

    #[test]
    fn builtins_resolve() {
        let registry = HookRegistry::with_builtins();

        assert_eq!(registry.resolve("log").unwrap()(&event()), HookFlow::Continue);
        assert_eq!(registry.resolve("stop").unwrap()(&event()), HookFlow::Stop);
    }

    #[test]
    fn unknown_hooks_are_errors() {
        let registry = HookRegistry::new();
        let err = registry.resolve("wave").err().unwrap();

        assert!(format!("{err}").contains("wave"));
    }

    #[test]
    fn stop_wins_when_combining_flows() {
        assert_eq!(HookFlow::Continue.then(HookFlow::Continue), HookFlow::Continue);
        assert_eq!(HookFlow::Continue.then(HookFlow::Stop), HookFlow::Stop);
        assert_eq!(HookFlow::Stop.then(HookFlow::Continue), HookFlow::Stop);
    }
}
