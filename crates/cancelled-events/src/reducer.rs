/*
[INPUT]:  Root actions (destination changes, child outputs), job timings
[OUTPUT]: RootState transitions and the effects that follow them
[POS]:    Domain logic - root reducer owning the active destination
[UPDATE]: When root actions or the background job set change
*/

use crate::destination::{
    DestinationAction, DestinationKind, DestinationState, PresentationAction, Presented,
    destination1, destination2,
};
use crate::effect::{Effect, Job, SpawnScope};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUEST_CHANGE_JOB: &str = "request-change";
pub const LONG_RUNNING_JOB: &str = "long-running";
pub const OPTED_OUT_JOB: &str = "opted-out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ChangeDestination,
    DoSomething,
    Destination(PresentationAction),
}

impl Action {
    /// Activation signal of Destination1, as sent by its view.
    pub fn destination1_task() -> Self {
        Action::Destination(PresentationAction::Presented(DestinationAction::Destination1(
            destination1::Action::Task,
        )))
    }
}

/// Root state: at most one destination is presented at a time.
#[derive(Debug)]
pub struct RootState {
    destination: Option<Presented>,
    root: CancellationToken,
}

impl RootState {
    /// Initial state, presenting Destination1 under `root`.
    pub fn new(root: CancellationToken) -> Self {
        let destination = Presented::new(
            DestinationState::Destination1(destination1::State::default()),
            &root,
        );
        Self {
            destination: Some(destination),
            root,
        }
    }

    pub fn destination(&self) -> Option<&Presented> {
        self.destination.as_ref()
    }

    pub fn active_kind(&self) -> Option<DestinationKind> {
        self.destination.as_ref().map(Presented::kind)
    }

    pub fn destination_id(&self) -> Option<Uuid> {
        self.destination.as_ref().map(Presented::id)
    }

    /// Replace the active destination wholesale; the old scope is cancelled.
    pub fn present(&mut self, state: DestinationState) {
        self.destination = Some(Presented::new(state, &self.root));
    }

    pub fn dismiss(&mut self) {
        self.destination = None;
    }

    /// Token a job spawned under `scope` right now should observe.
    ///
    /// A scoped job with no destination presented has nothing to live in and
    /// gets an already cancelled token.
    pub fn scope_token(&self, scope: SpawnScope) -> CancellationToken {
        match scope {
            SpawnScope::Detached => self.root.clone(),
            SpawnScope::Scoped => match &self.destination {
                Some(presented) => presented.scope_token(),
                None => {
                    let token = CancellationToken::new();
                    token.cancel();
                    token
                }
            },
        }
    }
}

/// Delays for the jobs started by `DoSomething`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimings {
    pub change_destination_after: Duration,
    pub long_running: Duration,
    pub opted_out: Duration,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            change_destination_after: Duration::from_secs(5),
            long_running: Duration::from_secs(10),
            opted_out: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StableReducer {
    timings: JobTimings,
}

impl StableReducer {
    pub fn new(timings: JobTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> JobTimings {
        self.timings
    }

    pub fn reduce(&self, state: &mut RootState, action: Action) -> Effect<Action> {
        match action {
            Action::ChangeDestination => {
                info!(from = ?state.active_kind(), "will change destination");
                state.present(DestinationState::Destination2(destination2::State::default()));
                info!(to = ?state.active_kind(), "did change destination");
                Effect::None
            }
            Action::DoSomething => {
                info!("start running something");
                Effect::Run(self.background_jobs())
            }
            Action::Destination(PresentationAction::Dismiss) => {
                info!(from = ?state.active_kind(), "dismiss destination");
                state.dismiss();
                Effect::None
            }
            Action::Destination(PresentationAction::Presented(child)) => {
                let Some(presented) = state.destination.as_mut() else {
                    warn!(action = ?child, "destination action received while no destination is presented");
                    return Effect::None;
                };
                let Some(child_effect) = presented.reduce(child.clone()) else {
                    warn!(
                        action = ?child,
                        active = %presented.kind(),
                        "destination action does not match presented destination"
                    );
                    return Effect::None;
                };
                let child_effect = child_effect
                    .map(|action| Action::Destination(PresentationAction::Presented(action)));
                child_effect.merge(self.reduce_destination(child))
            }
        }
    }

    fn reduce_destination(&self, action: DestinationAction) -> Effect<Action> {
        match action {
            DestinationAction::Destination1(destination1::Action::Output) => {
                Effect::Send(Action::DoSomething)
            }
            DestinationAction::Destination1(destination1::Action::Task) => Effect::None,
            DestinationAction::Destination2(action) => match action {},
        }
    }

    fn background_jobs(&self) -> Vec<Job<Action>> {
        vec![
            Job::detached(REQUEST_CHANGE_JOB, self.timings.change_destination_after)
                .then_dispatch(Action::ChangeDestination),
            Job::scoped(LONG_RUNNING_JOB, self.timings.long_running),
            // Detached so the destination change does not cancel it.
            Job::detached(OPTED_OUT_JOB, self.timings.opted_out),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Completion;
    use rstest::rstest;

    fn setup() -> (StableReducer, RootState) {
        (
            StableReducer::default(),
            RootState::new(CancellationToken::new()),
        )
    }

    fn output() -> Action {
        Action::Destination(PresentationAction::Presented(DestinationAction::Destination1(
            destination1::Action::Output,
        )))
    }

    #[test]
    fn initial_state_presents_destination1() {
        let (_, state) = setup();
        assert_eq!(state.active_kind(), Some(DestinationKind::Destination1));
    }

    #[test]
    fn activation_yields_exactly_one_output() {
        let (reducer, mut state) = setup();
        let id = state.destination_id();

        let effect = reducer.reduce(&mut state, Action::destination1_task());

        assert_eq!(effect, Effect::Send(output()));
        assert_eq!(state.destination_id(), id);
    }

    #[test]
    fn output_dispatches_do_something() {
        let (reducer, mut state) = setup();
        assert_eq!(
            reducer.reduce(&mut state, output()),
            Effect::Send(Action::DoSomething)
        );
    }

    #[test]
    fn do_something_does_not_touch_destination() {
        let (reducer, mut state) = setup();
        let id = state.destination_id();

        let effect = reducer.reduce(&mut state, Action::DoSomething);

        assert_eq!(state.destination_id(), id);
        let Effect::Run(jobs) = effect else {
            panic!("expected run effect");
        };
        let names: Vec<_> = jobs.iter().map(|job| job.name).collect();
        assert_eq!(names, [REQUEST_CHANGE_JOB, LONG_RUNNING_JOB, OPTED_OUT_JOB]);
        assert_eq!(jobs[0].completion, Completion::Dispatch(Action::ChangeDestination));
        assert_eq!(jobs[0].scope, SpawnScope::Detached);
        assert_eq!(jobs[1].scope, SpawnScope::Scoped);
        assert_eq!(jobs[2].scope, SpawnScope::Detached);
        assert_eq!(jobs[1].delay, Duration::from_secs(10));
    }

    #[test]
    fn change_destination_cancels_old_scope() {
        let (reducer, mut state) = setup();
        let scoped = state.scope_token(SpawnScope::Scoped);
        let detached = state.scope_token(SpawnScope::Detached);

        assert!(reducer.reduce(&mut state, Action::ChangeDestination).is_none());

        assert_eq!(state.active_kind(), Some(DestinationKind::Destination2));
        assert!(scoped.is_cancelled());
        assert!(!detached.is_cancelled());
        assert!(!state.scope_token(SpawnScope::Scoped).is_cancelled());
    }

    #[test]
    fn second_change_builds_fresh_destination2() {
        let (reducer, mut state) = setup();
        reducer.reduce(&mut state, Action::ChangeDestination);
        let first_id = state.destination_id();
        let first_scope = state.scope_token(SpawnScope::Scoped);

        reducer.reduce(&mut state, Action::ChangeDestination);

        assert_eq!(state.active_kind(), Some(DestinationKind::Destination2));
        assert_ne!(state.destination_id(), first_id);
        assert!(first_scope.is_cancelled());
    }

    #[test]
    fn dismiss_leaves_no_destination() {
        let (reducer, mut state) = setup();
        let scoped = state.scope_token(SpawnScope::Scoped);

        reducer.reduce(&mut state, Action::Destination(PresentationAction::Dismiss));

        assert_eq!(state.active_kind(), None);
        assert!(scoped.is_cancelled());
        assert!(state.scope_token(SpawnScope::Scoped).is_cancelled());
        assert!(!state.scope_token(SpawnScope::Detached).is_cancelled());
    }

    #[test]
    fn child_actions_are_ignored_without_matching_destination() {
        let (reducer, mut state) = setup();
        reducer.reduce(&mut state, Action::ChangeDestination);
        assert!(reducer.reduce(&mut state, Action::destination1_task()).is_none());

        reducer.reduce(&mut state, Action::Destination(PresentationAction::Dismiss));
        assert!(reducer.reduce(&mut state, output()).is_none());
        assert_eq!(state.active_kind(), None);
    }

    fn dismiss() -> Action {
        Action::Destination(PresentationAction::Dismiss)
    }

    #[rstest]
    #[case(vec![], Some(DestinationKind::Destination1))]
    #[case(vec![Action::ChangeDestination, Action::ChangeDestination], Some(DestinationKind::Destination2))]
    #[case(vec![dismiss(), Action::destination1_task(), Action::DoSomething], None)]
    #[case(vec![Action::ChangeDestination, dismiss(), Action::ChangeDestination], Some(DestinationKind::Destination2))]
    #[case(vec![Action::destination1_task(), output(), Action::ChangeDestination, Action::destination1_task()], Some(DestinationKind::Destination2))]
    #[case(vec![dismiss(), dismiss(), output()], None)]
    fn action_sequences_leave_one_valid_destination(
        #[case] actions: Vec<Action>,
        #[case] expected: Option<DestinationKind>,
    ) {
        let (reducer, mut state) = setup();
        for action in actions {
            reducer.reduce(&mut state, action);
            let live_scope = !state.scope_token(SpawnScope::Scoped).is_cancelled();
            assert_eq!(live_scope, state.destination().is_some());
            assert_eq!(state.destination_id().is_some(), state.active_kind().is_some());
        }
        assert_eq!(state.active_kind(), expected);
    }
}
