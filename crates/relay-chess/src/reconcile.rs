//! Merging authoritative game-state records with optimistic moves.

use tracing::{debug, info, instrument};

use crate::move_id::MoveId;
use crate::optimistic::OptimisticMoveManager;
use crate::protocol::GameStateRecord;
use crate::types::chess::Position;
use crate::types::game::{GameId, MoveRecord, MoveStatus};

/// What [`Reconciler::reconcile`] did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record was newer than anything seen and is now the latest.
    Applied {
        /// In-flight moves the record confirmed.
        confirmed: Vec<MoveId>,
        /// In-flight moves the record did not account for. What to do with
        /// them is the host's call.
        unmatched: Vec<MoveId>,
    },
    /// `received` is not above `last_seen`; nothing changed.
    Stale { last_seen: u32, received: u32 },
    /// The record belongs to another game; nothing changed.
    ForeignGame { expected: GameId, received: GameId },
}

/// Position to display: the newest pending move's resulting position, or the
/// confirmed record's position when nothing is pending.
pub fn effective_position(manager: &OptimisticMoveManager, confirmed: &GameStateRecord) -> Position {
    manager.effective_position(&confirmed.position)
}

/// Tracks the latest authoritative record of one game.
#[derive(Debug)]
pub struct Reconciler {
    game_id: GameId,
    manager: OptimisticMoveManager,
    latest: Option<GameStateRecord>,
}

impl Reconciler {
    pub fn new(game_id: GameId, manager: OptimisticMoveManager) -> Self {
        Self {
            game_id,
            manager,
            latest: None,
        }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn manager(&self) -> &OptimisticMoveManager {
        &self.manager
    }

    pub fn latest(&self) -> Option<&GameStateRecord> {
        self.latest.as_ref()
    }

    /// Move number of the latest applied record.
    pub fn last_seen(&self) -> Option<u32> {
        self.latest.as_ref().map(|r| r.move_number)
    }

    /// Position to display, falling back to the initial position before any
    /// record arrived.
    pub fn effective_position(&self) -> Position {
        match &self.latest {
            Some(record) => effective_position(&self.manager, record),
            None => self.manager.effective_position(&Position::initial()),
        }
    }

    /// Apply `record` if it is newer than the latest one.
    ///
    /// A record whose move number does not exceed the last seen one is
    /// discarded. Otherwise every in-flight move whose resulting position
    /// matches the record's board, or whose move equals the record's
    /// `lastMove` (coordinate or SAN), is confirmed.
    #[instrument(skip_all, fields(game_id = %self.game_id, move_number = record.move_number))]
    pub fn reconcile(&mut self, record: GameStateRecord) -> ReconcileOutcome {
        if record.game_id != self.game_id {
            debug!(received = %record.game_id, "ignoring record of another game");
            return ReconcileOutcome::ForeignGame {
                expected: self.game_id.clone(),
                received: record.game_id,
            };
        }
        if let Some(last_seen) = self.last_seen() {
            if record.move_number <= last_seen {
                self.manager.metrics().stale_states.inc();
                debug!(last_seen, "discarding stale game state");
                return ReconcileOutcome::Stale {
                    last_seen,
                    received: record.move_number,
                };
            }
        }

        let mut confirmed = Vec::new();
        let mut unmatched = Vec::new();
        for pending in self.manager.in_flight_moves() {
            if matches_record(&pending, &record)
                && self
                    .manager
                    .update_status(pending.id, MoveStatus::Confirmed, None)
            {
                confirmed.push(pending.id);
            } else {
                unmatched.push(pending.id);
            }
        }
        if !confirmed.is_empty() {
            info!(confirmed = confirmed.len(), "optimistic moves confirmed by game state");
        }

        self.latest = Some(record);
        ReconcileOutcome::Applied {
            confirmed,
            unmatched,
        }
    }
}

fn matches_record(pending: &MoveRecord, record: &GameStateRecord) -> bool {
    if pending.resulting_position.same_board(&record.position) {
        return true;
    }
    record
        .last_move
        .as_deref()
        .is_some_and(|last| last == pending.mv.uci() || last == pending.san)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::protocol::GameStateContent;
    use crate::types::game::{GameResult, PlayerKey};
    use chrono::Utc;

    fn record(game: &str, move_number: u32, position: &Position, last_move: Option<&str>) -> GameStateRecord {
        GameStateRecord {
            game_id: GameId::new(game),
            white: PlayerKey::new("w"),
            black: PlayerKey::new("b"),
            position: position.clone(),
            move_history: String::new(),
            last_move: last_move.map(str::to_string),
            move_number,
            updated_at: Utc::now(),
            result: GameResult::Ongoing,
            started_at: None,
        }
    }

    fn setup() -> (Reconciler, OptimisticMoveManager) {
        let manager = OptimisticMoveManager::new(ClientConfig::default());
        (Reconciler::new(GameId::new("g"), manager.clone()), manager)
    }

    #[test]
    fn matching_position_confirms() {
        let (mut reconciler, manager) = setup();
        let pending = manager
            .add_move(&Position::initial(), &"e2e4".parse().unwrap())
            .unwrap();

        let outcome = reconciler.reconcile(record("g", 1, &pending.resulting_position, None));
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                confirmed: vec![pending.id],
                unmatched: vec![]
            }
        );
        assert_eq!(manager.get(pending.id).unwrap().status, MoveStatus::Confirmed);
        assert_eq!(reconciler.last_seen(), Some(1));
    }

    #[test]
    fn matching_last_move_confirms() {
        let (mut reconciler, manager) = setup();
        let pending = manager
            .add_move(&Position::initial(), &"g1f3".parse().unwrap())
            .unwrap();
        // Opponent already replied, so the board differs but lastMove names ours.
        let later = Position::parse("rnbqkbnr/pppp1ppp/8/4p3/8/5N2/PPPPPPPP/RNBQKB1R w KQkq - 0 2")
            .unwrap();

        let by_san = reconciler.reconcile(record("g", 1, &later, Some("Nf3")));
        assert!(matches!(by_san, ReconcileOutcome::Applied { ref confirmed, .. } if confirmed == &vec![pending.id]));
    }

    #[test]
    fn unmatched_moves_are_reported() {
        let (mut reconciler, manager) = setup();
        let pending = manager
            .add_move(&Position::initial(), &"e2e4".parse().unwrap())
            .unwrap();
        let outcome = reconciler.reconcile(record("g", 1, &Position::initial(), Some("d2d4")));
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                confirmed: vec![],
                unmatched: vec![pending.id]
            }
        );
        assert_eq!(manager.get(pending.id).unwrap().status, MoveStatus::Pending);
    }

    #[test]
    fn stale_and_duplicate_records_are_discarded() {
        let (mut reconciler, manager) = setup();
        reconciler.reconcile(record("g", 5, &Position::initial(), None));

        let pending = manager
            .add_move(&Position::initial(), &"e2e4".parse().unwrap())
            .unwrap();
        let before = reconciler.effective_position();

        for n in [5, 4, 0] {
            let outcome = reconciler.reconcile(record("g", n, &pending.resulting_position, Some("e2e4")));
            assert_eq!(
                outcome,
                ReconcileOutcome::Stale {
                    last_seen: 5,
                    received: n
                }
            );
        }
        assert_eq!(manager.get(pending.id).unwrap().status, MoveStatus::Pending);
        assert_eq!(reconciler.effective_position(), before);
        assert_eq!(manager.metrics().stale_states.get(), 3);
    }

    #[test]
    fn foreign_game_is_ignored() {
        let (mut reconciler, _manager) = setup();
        let outcome = reconciler.reconcile(record("other", 3, &Position::initial(), None));
        assert!(matches!(outcome, ReconcileOutcome::ForeignGame { .. }));
        assert_eq!(reconciler.last_seen(), None);
    }

    #[test]
    fn effective_position_prefers_pending() {
        let (mut reconciler, manager) = setup();
        assert_eq!(reconciler.effective_position(), Position::initial());

        let content = GameStateContent::new_game();
        let confirmed = GameStateRecord::from_content(
            GameId::new("g"),
            PlayerKey::new("w"),
            PlayerKey::new("b"),
            &content,
        )
        .unwrap();
        reconciler.reconcile(confirmed.clone());
        assert_eq!(effective_position(&manager, &confirmed), confirmed.position);

        let pending = manager
            .add_move(&confirmed.position, &"e2e4".parse().unwrap())
            .unwrap();
        assert_eq!(reconciler.effective_position(), pending.resulting_position);
    }
}
