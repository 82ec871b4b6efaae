pub mod game;
pub mod roster;
mod sse;
pub mod state_machine;
pub mod timer;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::question_store::QuestionStore,
    error::ServiceError,
    state::{
        game::GameSession,
        roster::{ConnectionId, Roster},
        state_machine::{GameEvent, GamePhase, GameStateMachine},
        timer::{QuestionCountdown, ScheduledEvent},
    },
};

pub use self::sse::{SseHub, SseState};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Upper bound on how long a transition's side effects may run before the
/// pending plan is aborted.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle used to push messages to a connected participant socket.
#[derive(Clone)]
pub struct ParticipantConnection {
    /// Transient identifier of the socket.
    pub id: ConnectionId,
    /// Writer-task channel for outbound frames.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: roster, session data, state machine, timers and
/// broadcast plumbing. All round/timer/scoring mutations funnel through the
/// transition gate so the engine behaves as a single logical writer.
pub struct AppState {
    config: Arc<AppConfig>,
    question_store: RwLock<Option<Arc<dyn QuestionStore>>>,
    sse: SseState,
    connections: DashMap<ConnectionId, ParticipantConnection>,
    game: RwLock<GameStateMachine>,
    session: RwLock<GameSession>,
    roster: RwLock<Roster>,
    countdown: Mutex<Option<QuestionCountdown>>,
    pacing: Mutex<Vec<JoinHandle<()>>>,
    time_remaining: watch::Sender<u32>,
    events_tx: mpsc::UnboundedSender<ScheduledEvent>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct the shared state plus the receiving end of the scheduled
    /// event channel, which the caller hands to the engine loop.
    pub fn new(config: AppConfig) -> (SharedState, mpsc::UnboundedReceiver<ScheduledEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (time_remaining, _) = watch::channel(0);

        let state = Arc::new(Self {
            config: Arc::new(config),
            question_store: RwLock::new(None),
            sse: SseState::new(16, 16),
            connections: DashMap::new(),
            game: RwLock::new(GameStateMachine::new()),
            session: RwLock::new(GameSession::default()),
            roster: RwLock::new(Roster::new()),
            countdown: Mutex::new(None),
            pacing: Mutex::new(Vec::new()),
            time_remaining,
            events_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        });

        (state, events_rx)
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the installed question store, if any.
    pub async fn question_store(&self) -> Option<Arc<dyn QuestionStore>> {
        let guard = self.question_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install the question store implementation.
    pub async fn install_question_store(&self, store: Arc<dyn QuestionStore>) {
        let mut guard = self.question_store.write().await;
        *guard = Some(store);
    }

    /// Question store handle or a degraded-mode error.
    pub async fn require_question_store(&self) -> Result<Arc<dyn QuestionStore>, ServiceError> {
        self.question_store().await.ok_or(ServiceError::Degraded)
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin_token()
    }

    /// Registry of live participant sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<ConnectionId, ParticipantConnection> {
        &self.connections
    }

    /// Snapshot the current phase of the shared game state machine.
    pub async fn phase(&self) -> GamePhase {
        self.game.read().await.phase()
    }

    /// Snapshot of the state machine including any pending transition.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.game.read().await;
        sm.snapshot()
    }

    /// Mutable quiz-session data (questions, indices, epoch, snapshots).
    pub fn session(&self) -> &RwLock<GameSession> {
        &self.session
    }

    /// Player roster with its live-connection index.
    pub fn roster(&self) -> &RwLock<Roster> {
        &self.roster
    }

    /// Seconds currently left on the countdown.
    pub fn time_remaining(&self) -> u32 {
        *self.time_remaining.subscribe().borrow()
    }

    /// Sender used by timers to push scheduled events into the engine loop.
    pub fn scheduled_events(&self) -> mpsc::UnboundedSender<ScheduledEvent> {
        self.events_tx.clone()
    }

    /// Replace the live countdown, cancelling any previous one first so two
    /// timers can never race to grade the same question.
    pub async fn start_countdown(&self, duration_secs: u32, epoch: u64) {
        let countdown = QuestionCountdown::spawn(
            duration_secs,
            epoch,
            self.time_remaining.clone(),
            self.events_tx.clone(),
        );

        let mut slot = self.countdown.lock().await;
        if let Some(previous) = slot.replace(countdown) {
            warn!(epoch = previous.epoch(), "replacing a live countdown");
            previous.cancel();
        }
    }

    /// Cancel the live countdown, if any. Idempotent.
    pub async fn cancel_countdown(&self) {
        let mut slot = self.countdown.lock().await;
        if let Some(countdown) = slot.take() {
            countdown.cancel();
        }
    }

    /// Track a post-grading pacing task so `force_stop` can abort it.
    pub async fn track_pacing(&self, handle: JoinHandle<()>) {
        let mut pacing = self.pacing.lock().await;
        pacing.retain(|task| !task.is_finished());
        pacing.push(handle);
    }

    /// Abort every pending pacing task. Idempotent.
    pub async fn cancel_pacing(&self) {
        let mut pacing = self.pacing.lock().await;
        for task in pacing.drain(..) {
            task.abort();
        }
    }

    /// Serialize a non-transition critical section (grading, submission
    /// bookkeeping) against phase transitions.
    pub async fn engine_gate(&self) -> MutexGuard<'_, ()> {
        self.transition_gate.lock().await
    }

    /// Plan a transition on the shared game state machine.
    async fn plan_transition(&self, event: GameEvent) -> Result<Plan, PlanError> {
        let mut sm = self.game.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let mut sm = self.game.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the shared game state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.game.write().await;
        sm.abort(plan_id)
    }

    /// Run `work` inside a planned state-machine transition.
    ///
    /// The transition gate is held across plan, work, and apply, so every
    /// phase change (and every critical section taken through
    /// [`AppState::engine_gate`]) is strictly serialized. On failure or
    /// timeout the plan is aborted and the phase left untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: GameEvent,
        work: F,
    ) -> Result<(T, GamePhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
