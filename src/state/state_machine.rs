use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases a quiz session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No round is running; players gather and the roster can be managed.
    Lobby,
    /// A round is active and questions are being asked.
    Playing {
        /// Number of the round currently in play.
        round: u32,
    },
    /// The round finished; qualification results are displayed.
    RoundFinished {
        /// Number of the round that just completed.
        round: u32,
    },
    /// The final round completed; the frozen leaderboard is on display.
    GameFinished,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// An admin starts the given round from the lobby or between rounds.
    StartRound(u32),
    /// The last question of a non-final round was graded.
    CompleteRound,
    /// The last question of the final round was graded.
    FinishGame,
    /// An admin aborts whatever is happening and returns to the lobby.
    ForceStop,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when the plan was created.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: GamePhase,
    /// Pending transition target, if a transition is planned but not yet applied.
    pub pending: Option<GamePhase>,
}

/// State machine implementing the lobby/playing/round-finished/game-finished flow.
///
/// Round sequencing (round `n` only after round `n-1` completed) is enforced by
/// the round controller, which owns the completed-rounds set; the machine only
/// guards which phases an event is legal from.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    pending: Option<Plan>,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Lobby,
            pending: None,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the
    /// current phase. Returns a [`Plan`] that can later be applied or aborted.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        self.phase = plan.to;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute the target phase for an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            // Force stop is legal from every phase, including the lobby itself,
            // so repeated stops are harmless.
            (_, GameEvent::ForceStop) => GamePhase::Lobby,
            (
                GamePhase::Lobby | GamePhase::RoundFinished { .. } | GamePhase::GameFinished,
                GameEvent::StartRound(round),
            ) => GamePhase::Playing { round },
            (GamePhase::Playing { round }, GameEvent::CompleteRound) => {
                GamePhase::RoundFinished { round }
            }
            (GamePhase::Playing { .. }, GameEvent::FinishGame) => GamePhase::GameFinished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GamePhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = GameStateMachine::new();
        assert_eq!(sm.phase(), GamePhase::Lobby);
    }

    #[test]
    fn full_happy_path_through_three_rounds() {
        let mut sm = GameStateMachine::new();

        assert_eq!(
            apply(&mut sm, GameEvent::StartRound(1)),
            GamePhase::Playing { round: 1 }
        );
        assert_eq!(
            apply(&mut sm, GameEvent::CompleteRound),
            GamePhase::RoundFinished { round: 1 }
        );
        assert_eq!(
            apply(&mut sm, GameEvent::StartRound(2)),
            GamePhase::Playing { round: 2 }
        );
        assert_eq!(
            apply(&mut sm, GameEvent::CompleteRound),
            GamePhase::RoundFinished { round: 2 }
        );
        assert_eq!(
            apply(&mut sm, GameEvent::StartRound(3)),
            GamePhase::Playing { round: 3 }
        );
        assert_eq!(apply(&mut sm, GameEvent::FinishGame), GamePhase::GameFinished);
    }

    #[test]
    fn replay_is_possible_after_game_finished() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::StartRound(1));
        apply(&mut sm, GameEvent::FinishGame);
        assert_eq!(
            apply(&mut sm, GameEvent::StartRound(1)),
            GamePhase::Playing { round: 1 }
        );
    }

    #[test]
    fn force_stop_returns_to_lobby_from_any_phase() {
        let mut sm = GameStateMachine::new();
        assert_eq!(apply(&mut sm, GameEvent::ForceStop), GamePhase::Lobby);

        apply(&mut sm, GameEvent::StartRound(1));
        assert_eq!(apply(&mut sm, GameEvent::ForceStop), GamePhase::Lobby);

        apply(&mut sm, GameEvent::StartRound(1));
        apply(&mut sm, GameEvent::CompleteRound);
        assert_eq!(apply(&mut sm, GameEvent::ForceStop), GamePhase::Lobby);
    }

    #[test]
    fn completing_a_round_requires_playing() {
        let mut sm = GameStateMachine::new();
        let err = sm.plan(GameEvent::CompleteRound).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, GamePhase::Lobby);
                assert_eq!(invalid.event, GameEvent::CompleteRound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn starting_a_round_mid_round_is_invalid() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::StartRound(1));
        let err = sm.plan(GameEvent::StartRound(2)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
    }

    #[test]
    fn pending_plan_blocks_further_planning() {
        let mut sm = GameStateMachine::new();
        let _plan = sm.plan(GameEvent::StartRound(1)).unwrap();
        let err = sm.plan(GameEvent::ForceStop).unwrap_err();
        assert_eq!(err, PlanError::AlreadyPending);
    }

    #[test]
    fn apply_with_wrong_plan_id_keeps_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::StartRound(1)).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.snapshot().pending, Some(GamePhase::Playing { round: 1 }));
        sm.apply(plan.id).unwrap();
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::StartRound(1)).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), GamePhase::Lobby);
    }
}
