/*
[INPUT]:  Reducer return values
[OUTPUT]: Effect descriptions executed by the store
[POS]:    Effect layer - follow-up actions and background jobs
[UPDATE]: When adding new effect kinds or job completion modes
*/

use std::time::Duration;
use thiserror::Error;

/// Which cancellation token a job is bound to when it is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnScope {
    /// Bound to the active destination; cancelled when it is replaced or dismissed
    Scoped,
    /// Bound to the process-wide token; survives destination changes
    Detached,
}

/// What a job does after its delay elapses without cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<A> {
    /// Only report the outcome
    Report,
    /// Report the outcome and feed an action back into the store
    Dispatch(A),
}

/// A delayed unit of background work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<A> {
    pub name: &'static str,
    pub delay: Duration,
    pub scope: SpawnScope,
    pub completion: Completion<A>,
}

impl<A> Job<A> {
    pub fn scoped(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            scope: SpawnScope::Scoped,
            completion: Completion::Report,
        }
    }

    pub fn detached(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            scope: SpawnScope::Detached,
            completion: Completion::Report,
        }
    }

    pub fn then_dispatch(mut self, action: A) -> Self {
        self.completion = Completion::Dispatch(action);
        self
    }

    pub fn map<B>(self, f: impl Fn(A) -> B) -> Job<B> {
        Job {
            name: self.name,
            delay: self.delay,
            scope: self.scope,
            completion: match self.completion {
                Completion::Report => Completion::Report,
                Completion::Dispatch(action) => Completion::Dispatch(f(action)),
            },
        }
    }
}

/// Work requested by a reducer, executed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<A> {
    None,
    /// Dispatch an action synchronously, before `send` returns
    Send(A),
    /// Spawn background jobs, all started together
    Run(Vec<Job<A>>),
    Batch(Vec<Effect<A>>),
}

impl<A> Effect<A> {
    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// Lift an effect into a parent action space.
    pub fn map<B>(self, f: impl Fn(A) -> B) -> Effect<B> {
        self.map_with(&f)
    }

    fn map_with<B>(self, f: &dyn Fn(A) -> B) -> Effect<B> {
        match self {
            Effect::None => Effect::None,
            Effect::Send(action) => Effect::Send(f(action)),
            Effect::Run(jobs) => Effect::Run(jobs.into_iter().map(|job| job.map(f)).collect()),
            Effect::Batch(effects) => {
                Effect::Batch(effects.into_iter().map(|effect| effect.map_with(f)).collect())
            }
        }
    }

    /// Combine two effects, keeping their order.
    pub fn merge(self, other: Effect<A>) -> Effect<A> {
        match (self, other) {
            (Effect::None, other) => other,
            (this, Effect::None) => this,
            (Effect::Batch(mut effects), other) => {
                effects.push(other);
                Effect::Batch(effects)
            }
            (this, other) => Effect::Batch(vec![this, other]),
        }
    }
}

/// The only failure a job can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("cancelled: owning scope was torn down")]
    Cancelled,
}

pub type JobOutcome = Result<(), JobError>;
