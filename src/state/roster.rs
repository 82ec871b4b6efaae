use indexmap::IndexMap;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::state::game::{Player, PlayerStatus};

/// Transient handle for one live WebSocket connection.
pub type ConnectionId = Uuid;

/// Errors raised while binding a connection to a durable identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The roll number is already bound to another live connection.
    #[error("roll number `{0}` is already in use by a connected player")]
    IdentityInUse(String),
}

/// What happened when a connection was bound to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A brand-new identity record was created.
    Created,
    /// An existing record was re-attached to a fresh connection.
    Rebound,
}

/// Player roster: durable identity records plus the live-connection index.
///
/// Two associative containers as the reconnection semantics demand: identity
/// to record (insertion-ordered, survives disconnects for the lifetime of the
/// game) and live connection to identity (entries come and go with sockets).
/// Rebinding a returning player is an explicit operation on both.
#[derive(Debug, Default)]
pub struct Roster {
    players: IndexMap<String, Player>,
    connections: HashMap<ConnectionId, String>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `connection` to the identity `roll_number`, creating the record on
    /// first join or transferring the existing record on reconnect.
    ///
    /// `status_for_new` decides the status of a brand-new identity (late
    /// joiners enter as spectators); a rebound identity keeps its own status,
    /// score and answer history untouched.
    pub fn bind(
        &mut self,
        connection: ConnectionId,
        name: String,
        roll_number: String,
        status_for_new: PlayerStatus,
    ) -> Result<JoinOutcome, JoinError> {
        if let Some(existing) = self.connection_for(&roll_number) {
            if existing != connection {
                return Err(JoinError::IdentityInUse(roll_number));
            }
        }

        let outcome = if let Some(record) = self.players.get_mut(&roll_number) {
            // Returning player: keep the record, refresh the display name.
            record.name = name;
            JoinOutcome::Rebound
        } else {
            self.players.insert(
                roll_number.clone(),
                Player::new(name, roll_number.clone(), status_for_new),
            );
            JoinOutcome::Created
        };

        self.connections.insert(connection, roll_number);
        Ok(outcome)
    }

    /// Drop the live binding for `connection`, preserving the identity record.
    /// Returns the roll number that was bound, if any.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<String> {
        self.connections.remove(&connection)
    }

    /// Identity bound to a live connection.
    pub fn identity(&self, connection: ConnectionId) -> Option<&str> {
        self.connections.get(&connection).map(String::as_str)
    }

    /// Live connection currently bound to `roll_number`, if any.
    pub fn connection_for(&self, roll_number: &str) -> Option<ConnectionId> {
        self.connections
            .iter()
            .find(|(_, roll)| roll.as_str() == roll_number)
            .map(|(connection, _)| *connection)
    }

    /// Record for a durable identity.
    pub fn record(&self, roll_number: &str) -> Option<&Player> {
        self.players.get(roll_number)
    }

    /// Mutable record for a durable identity.
    pub fn record_mut(&mut self, roll_number: &str) -> Option<&mut Player> {
        self.players.get_mut(roll_number)
    }

    /// Record bound to a live connection.
    pub fn record_for_connection(&self, connection: ConnectionId) -> Option<&Player> {
        let roll = self.connections.get(&connection)?;
        self.players.get(roll)
    }

    /// All identity records in join order.
    pub fn players(&self) -> &IndexMap<String, Player> {
        &self.players
    }

    /// Mutable access to all identity records, for the grading pass.
    pub fn players_mut(&mut self) -> &mut IndexMap<String, Player> {
        &mut self.players
    }

    /// Number of live, identified connections.
    pub fn live_count(&self) -> usize {
        self.connections.len()
    }

    /// Reset every record for a fresh game: zero scores, clear answers and
    /// per-round tallies, everyone active again.
    pub fn reset_for_new_game(&mut self) {
        for record in self.players.values_mut() {
            record.score = 0;
            record.round_scores.clear();
            record.answers.clear();
            record.status = PlayerStatus::Active;
        }
    }

    /// Open a round tally for every record.
    pub fn begin_round(&mut self, round: u32) {
        for record in self.players.values_mut() {
            record.round_scores.insert(round, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{AnswerPayload, AnswerRecord, QuestionKey};
    use std::time::SystemTime;

    fn join(roster: &mut Roster, conn: ConnectionId, roll: &str) -> JoinOutcome {
        roster
            .bind(conn, format!("Player {roll}"), roll.into(), PlayerStatus::Active)
            .unwrap()
    }

    #[test]
    fn first_join_creates_a_record() {
        let mut roster = Roster::new();
        let conn = Uuid::new_v4();
        assert_eq!(join(&mut roster, conn, "21CS001"), JoinOutcome::Created);
        assert_eq!(roster.identity(conn), Some("21CS001"));
        assert_eq!(roster.live_count(), 1);
    }

    #[test]
    fn duplicate_identity_on_live_connection_is_rejected() {
        let mut roster = Roster::new();
        join(&mut roster, Uuid::new_v4(), "21CS001");

        let err = roster
            .bind(
                Uuid::new_v4(),
                "Impostor".into(),
                "21CS001".into(),
                PlayerStatus::Active,
            )
            .unwrap_err();
        assert_eq!(err, JoinError::IdentityInUse("21CS001".into()));
        assert_eq!(roster.live_count(), 1);
    }

    #[test]
    fn reconnect_transfers_the_existing_record() {
        let mut roster = Roster::new();
        let first = Uuid::new_v4();
        join(&mut roster, first, "21CS001");

        {
            let record = roster.record_mut("21CS001").unwrap();
            record.score = 7;
            record.round_scores.insert(1, 7);
            record.status = PlayerStatus::Spectator;
            record.answers.insert(
                QuestionKey { round: 1, index: 0 },
                AnswerRecord {
                    question_id: Uuid::new_v4(),
                    payload: AnswerPayload::Choice(2),
                    submitted_at: SystemTime::now(),
                    sequence: 0,
                    time_remaining: 12,
                },
            );
        }

        assert_eq!(roster.disconnect(first), Some("21CS001".into()));
        assert_eq!(roster.live_count(), 0);
        assert!(roster.record("21CS001").is_some());

        let second = Uuid::new_v4();
        assert_eq!(join(&mut roster, second, "21CS001"), JoinOutcome::Rebound);

        let record = roster.record_for_connection(second).unwrap();
        assert_eq!(record.score, 7);
        assert_eq!(record.round_score(1), 7);
        assert_eq!(record.status, PlayerStatus::Spectator);
        assert_eq!(record.answers.len(), 1);
    }

    #[test]
    fn disconnect_of_unknown_connection_is_a_noop() {
        let mut roster = Roster::new();
        assert_eq!(roster.disconnect(Uuid::new_v4()), None);
    }

    #[test]
    fn reset_for_new_game_reactivates_everyone() {
        let mut roster = Roster::new();
        join(&mut roster, Uuid::new_v4(), "21CS001");
        {
            let record = roster.record_mut("21CS001").unwrap();
            record.score = 4;
            record.status = PlayerStatus::Spectator;
        }

        roster.reset_for_new_game();
        let record = roster.record("21CS001").unwrap();
        assert_eq!(record.score, 0);
        assert_eq!(record.status, PlayerStatus::Active);
        assert!(record.answers.is_empty());
    }
}
