/*
[INPUT]:  Root actions (from views, jobs, tests), DemoConfig, root CancellationToken
[OUTPUT]: RootState transitions, spawned background jobs, render + lifecycle events
[POS]:    Runtime layer - drives the root reducer and supervises its jobs
[UPDATE]: When changing dispatch ordering, job supervision or shutdown guarantees
*/

use crate::config::DemoConfig;
use crate::destination::DestinationKind;
use crate::effect::{Completion, Effect, Job, JobError, JobOutcome, SpawnScope};
use crate::reducer::{Action, RootState, StableReducer};
use anyhow::{Result, anyhow};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
// ~30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Something observable that happened inside the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Time since the store was created
    pub at: Duration,
    pub kind: LifecycleEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEventKind {
    ActionDispatched(Action),
    DestinationChanged {
        from: Option<DestinationKind>,
        to: Option<DestinationKind>,
    },
    JobStarted {
        job: &'static str,
        scope: SpawnScope,
    },
    JobFinished {
        job: &'static str,
        outcome: JobOutcome,
    },
}

#[derive(Debug, Clone)]
struct EventSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
    started: Instant,
}

impl EventSink {
    fn emit(&self, kind: LifecycleEventKind) {
        let event = LifecycleEvent {
            at: self.started.elapsed(),
            kind,
        };
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRuntimeStatus {
    Running,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub name: &'static str,
    pub status: JobRuntimeStatus,
}

#[derive(Debug)]
struct ManagedJob {
    id: Uuid,
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Cloneable handle used by views, signal handlers and tests.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    action_tx: mpsc::UnboundedSender<Action>,
    render_rx: watch::Receiver<Option<DestinationKind>>,
    shutdown: CancellationToken,
}

impl StoreHandle {
    pub fn send(&self, action: Action) -> Result<()> {
        self.action_tx
            .send(action)
            .map_err(|err| anyhow!("store is no longer running: {err}"))
    }

    pub fn subscribe_render(&self) -> watch::Receiver<Option<DestinationKind>> {
        self.render_rx.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Owns the root state and executes the effects its reducer returns.
#[derive(Debug)]
pub struct Store {
    reducer: StableReducer,
    state: RootState,
    shutdown: CancellationToken,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    render_tx: watch::Sender<Option<DestinationKind>>,
    render_rx: watch::Receiver<Option<DestinationKind>>,
    events: EventSink,
    jobs: Vec<ManagedJob>,
    shutdown_timeout: Duration,
}

impl Store {
    /// Build a store from configuration. The receiver yields every lifecycle event.
    pub fn new(config: &DemoConfig) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        Self::with_reducer_and_timeout(
            StableReducer::new(config.job_timings()),
            config.shutdown_timeout(),
        )
    }

    pub fn with_reducer(reducer: StableReducer) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        Self::with_reducer_and_timeout(reducer, DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn with_reducer_and_timeout(
        reducer: StableReducer,
        shutdown_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let shutdown = CancellationToken::new();
        let state = RootState::new(shutdown.clone());
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (render_tx, render_rx) = watch::channel(state.active_kind());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let store = Self {
            reducer,
            state,
            shutdown,
            action_tx,
            action_rx,
            render_tx,
            render_rx,
            events: EventSink {
                tx: events_tx,
                started: Instant::now(),
            },
            jobs: Vec::new(),
            shutdown_timeout,
        };
        (store, events_rx)
    }

    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            action_tx: self.action_tx.clone(),
            render_rx: self.render_rx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn state(&self) -> &RootState {
        &self.state
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Dispatch an action and every action it synchronously leads to.
    ///
    /// `Send` effects are processed in FIFO order before this returns; jobs are
    /// spawned and left running.
    pub fn send(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);

        while let Some(action) = queue.pop_front() {
            debug!(?action, "dispatch action");
            self.events
                .emit(LifecycleEventKind::ActionDispatched(action.clone()));

            let before = (self.state.destination_id(), self.state.active_kind());
            let effect = self.reducer.reduce(&mut self.state, action);
            let after = (self.state.destination_id(), self.state.active_kind());

            if before.0 != after.0 {
                self.events.emit(LifecycleEventKind::DestinationChanged {
                    from: before.1,
                    to: after.1,
                });
                self.render_tx.send_if_modified(|current| {
                    if *current == after.1 {
                        return false;
                    }
                    *current = after.1;
                    true
                });
            }

            self.apply(effect, &mut queue);
        }
    }

    fn apply(&mut self, effect: Effect<Action>, queue: &mut VecDeque<Action>) {
        match effect {
            Effect::None => {}
            Effect::Send(action) => queue.push_back(action),
            Effect::Run(jobs) => {
                for job in jobs {
                    self.spawn_job(job);
                }
            }
            Effect::Batch(effects) => {
                for effect in effects {
                    self.apply(effect, queue);
                }
            }
        }
    }

    fn spawn_job(&mut self, job: Job<Action>) {
        let id = Uuid::new_v4();
        let name = job.name;
        let token = self.state.scope_token(job.scope);
        let events = self.events.clone();
        let action_tx = self.action_tx.clone();

        info!(job = name, job_id = %id, scope = ?job.scope, delay = ?job.delay, "job started");
        events.emit(LifecycleEventKind::JobStarted {
            job: name,
            scope: job.scope,
        });

        let handle = tokio::spawn(async move {
            let outcome = run_job(job.delay, &token).await;
            match &outcome {
                Ok(()) => info!(job = name, job_id = %id, "✅ finished successfully"),
                Err(err) => warn!(job = name, job_id = %id, error = %err, "❌ finished with error"),
            }
            events.emit(LifecycleEventKind::JobFinished { job: name, outcome });

            if let (Ok(()), Completion::Dispatch(action)) = (outcome, job.completion) {
                info!(job = name, ?action, "job requesting follow-up action");
                if action_tx.send(action).is_err() {
                    debug!(job = name, "store stopped; follow-up action dropped");
                }
            }
        });

        self.jobs.retain(|job| !job.handle.is_finished());
        self.jobs.push(ManagedJob { id, name, handle });
    }

    pub fn runtime_status_snapshot(&self) -> Vec<JobSnapshot> {
        self.jobs
            .iter()
            .map(|job| JobSnapshot {
                id: job.id,
                name: job.name,
                status: if job.handle.is_finished() {
                    JobRuntimeStatus::Finished
                } else {
                    JobRuntimeStatus::Running
                },
            })
            .collect()
    }

    /// Process actions until the shutdown token fires, then wait for jobs.
    pub async fn run(mut self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        info!(active = ?self.state.active_kind(), "store running");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(action) = self.action_rx.recv() => {
                    self.send(action);
                }
            }
        }

        info!("store shutting down");
        self.shutdown_and_wait().await
    }

    /// Cancel every scope and wait for all jobs to exit.
    ///
    /// Bounded by the configured shutdown timeout; jobs still running after it
    /// are aborted.
    pub async fn shutdown_and_wait(&mut self) -> Result<()> {
        self.shutdown.cancel();
        self.join_all_with_deadline(self.shutdown_timeout).await
    }

    async fn join_all_with_deadline(&mut self, timeout: Duration) -> Result<()> {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        let mut jobs = std::mem::take(&mut self.jobs);

        while let Some(job) = jobs.pop() {
            let mut handle = job.handle;
            let sleep = sleep_until_deadline(deadline);

            tokio::select! {
                res = &mut handle => {
                    if let Err(join_err) = res {
                        abort_all(jobs);
                        if join_err.is_panic() {
                            return Err(anyhow!("job panicked job={} job_id={}: {join_err}", job.name, job.id));
                        }
                        return Err(anyhow!("job join error job={} job_id={}: {join_err}", job.name, job.id));
                    }
                }
                _ = sleep => {
                    handle.abort();
                    abort_all(jobs);
                    return Err(anyhow!("shutdown timed out after {timeout:?}"));
                }
            }
        }

        Ok(())
    }
}

async fn run_job(delay: Duration, token: &CancellationToken) -> JobOutcome {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn sleep_until_deadline(deadline: Instant) -> Sleep {
    tokio::time::sleep_until(deadline)
}

fn abort_all(jobs: Vec<ManagedJob>) {
    for job in jobs {
        job.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{JobTimings, LONG_RUNNING_JOB};
    use tokio_test::assert_ok;

    fn drain(rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }

    #[tokio::test(start_paused = true)]
    async fn activation_chain_runs_synchronously() {
        let (mut store, mut events) = Store::with_reducer(StableReducer::default());

        store.send(Action::destination1_task());

        let dispatched: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|kind| match kind {
                LifecycleEventKind::ActionDispatched(action) => Some(action),
                _ => None,
            })
            .collect();
        assert_eq!(dispatched.len(), 3);
        assert_eq!(dispatched[0], Action::destination1_task());
        assert_eq!(dispatched[2], Action::DoSomething);
        assert_eq!(store.runtime_status_snapshot().len(), 3);
        assert_eq!(store.state().active_kind(), Some(DestinationKind::Destination1));

        assert_ok!(store.shutdown_and_wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn change_destination_updates_render_channel() {
        let (mut store, _events) = Store::with_reducer(StableReducer::default());
        let mut render = store.handle().subscribe_render();
        assert_eq!(*render.borrow_and_update(), Some(DestinationKind::Destination1));

        store.send(Action::ChangeDestination);

        assert!(render.has_changed().unwrap());
        assert_eq!(*render.borrow_and_update(), Some(DestinationKind::Destination2));

        // Same kind again: fresh state, no render change.
        store.send(Action::ChangeDestination);
        assert!(!render.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn scoped_job_without_destination_is_cancelled_immediately() {
        let (mut store, mut events) = Store::with_reducer(StableReducer::new(JobTimings {
            change_destination_after: Duration::from_secs(50),
            long_running: Duration::from_secs(10),
            opted_out: Duration::from_secs(10),
        }));
        store.send(Action::Destination(crate::destination::PresentationAction::Dismiss));
        store.send(Action::DoSomething);

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let finished = drain(&mut events).into_iter().find_map(|kind| match kind {
            LifecycleEventKind::JobFinished { job, outcome } if job == LONG_RUNNING_JOB => {
                Some(outcome)
            }
            _ => None,
        });
        assert_eq!(finished, Some(Err(JobError::Cancelled)));

        assert_ok!(store.shutdown_and_wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_detached_jobs() {
        let (mut store, mut events) = Store::with_reducer(StableReducer::default());
        store.send(Action::DoSomething);

        assert_ok!(store.shutdown_and_wait().await);

        let outcomes: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|kind| match kind {
                LifecycleEventKind::JobFinished { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|outcome| *outcome == Err(JobError::Cancelled)));
        assert!(store.runtime_status_snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_jobs_are_not_tracked_forever() {
        let (mut store, _events) = Store::with_reducer(StableReducer::default());
        store.send(Action::ChangeDestination);

        for _ in 0..100 {
            store.send(Action::DoSomething);
            tokio::time::sleep(Duration::from_secs(20)).await;
        }

        let snapshot = store.runtime_status_snapshot();
        assert!(snapshot.len() <= 3, "tracked {} jobs", snapshot.len());

        assert_ok!(store.shutdown_and_wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_shutdown_timeout_does_not_overflow_deadline() {
        let (mut store, _events) =
            Store::with_reducer_and_timeout(StableReducer::default(), Duration::MAX);
        store.send(Action::DoSomething);

        assert_ok!(store.shutdown_and_wait().await);
    }
}
