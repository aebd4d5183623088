//! Chess rules.
//!
//! Pure, synchronous functions over positions and moves. Nothing here keeps
//! state between calls; failures are returned as [`RulesError`] values.

pub mod engine;
pub mod replay;

pub use engine::{ChessPosition, LegalMove, LegalMoves, PlayedMove, RulesError};
pub use replay::{moves_from_pgn, validate_move_sequence, Replay, SequenceError};

use serde::{Deserialize, Serialize};

use crate::types::chess::{Color, Move, PieceType, Position, Square};
use crate::types::game::Termination;

/// Validate `mv` from `position` and compute the resulting position and SAN.
pub fn validate_move(position: &Position, mv: &Move) -> Result<PlayedMove, RulesError> {
    ChessPosition::from_position(position)?.play(mv)
}

/// Check that `expected` is the side to move in `position`.
pub fn validate_turn(position: &Position, expected: Color) -> Result<(), RulesError> {
    let actual = position.side_to_move();
    if actual != expected {
        return Err(RulesError::WrongTurn { expected, actual });
    }
    Ok(())
}

/// Check that `fen` is a valid, playable position.
pub fn validate_position_well_formed(fen: &str) -> Result<(), RulesError> {
    ChessPosition::from_fen(fen).map(|_| ())
}

/// Termination status of `position`.
///
/// Repetition cannot be judged from a single position; use [`Replay`] for
/// that.
pub fn check_termination(position: &Position) -> Result<Termination, RulesError> {
    Ok(ChessPosition::from_position(position)?.termination())
}

/// Legal moves of `position`, optionally only those starting on `from`.
pub fn legal_moves(position: &Position, from: Option<Square>) -> Result<LegalMoves, RulesError> {
    Ok(ChessPosition::from_position(position)?.legal_moves(from))
}

/// True iff `mv` moves a pawn from its second-to-last rank onto its last rank.
#[must_use]
pub fn requires_promotion(position: &Position, mv: &Move) -> bool {
    ChessPosition::from_position(position)
        .map(|p| p.requires_promotion(mv))
        .unwrap_or(false)
}

/// Origin and destination typed in by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    pub from: Square,
    pub to: Square,
}

impl MoveInput {
    /// Turn the input into a [`Move`] with an optional promotion piece.
    pub fn into_move(self, promotion: Option<PieceType>) -> Result<Move, RulesError> {
        Ok(Move::new(self.from, self.to)?.with_promotion(promotion))
    }
}

/// Parse `e2e4`, `e2-e4` or `e2 e4` (case-insensitive, surrounding whitespace
/// ignored). Anything else, including extra tokens, yields `None`.
#[must_use]
pub fn parse_user_move_input(text: &str) -> Option<MoveInput> {
    let text = text.trim().to_ascii_lowercase();
    if !text.is_ascii() {
        return None;
    }
    let (from, to) = match text.len() {
        4 => (&text[0..2], &text[2..4]),
        5 => {
            let sep = text.as_bytes()[2];
            if sep != b'-' && !sep.is_ascii_whitespace() {
                return None;
            }
            (&text[0..2], &text[3..5])
        }
        _ => return None,
    };
    Some(MoveInput {
        from: from.parse().ok()?,
        to: to.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::game::{TerminationReason, Winner};

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_move_from_initial() {
        let played = validate_move(&Position::initial(), &mv("e2e4")).unwrap();
        assert_eq!(played.san, "e4");
        assert_eq!(played.resulting_position.side_to_move(), Color::Black);
    }

    #[test]
    fn test_validate_move_rejects_every_move_outside_legal_set() {
        let positions = [
            Position::initial(),
            // Both sides may castle either way
            Position::parse("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap(),
            // exf6 en passant is available
            Position::parse("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap(),
        ];
        for position in &positions {
            assert_matches_legal_set(position);
        }
    }

    fn assert_matches_legal_set(position: &Position) {
        let legal = legal_moves(position, None).unwrap();
        for from_idx in 0..64u8 {
            for to_idx in 0..64u8 {
                let (Some(from), Some(to)) = (
                    Square::new(from_idx % 8, from_idx / 8),
                    Square::new(to_idx % 8, to_idx / 8),
                ) else {
                    continue;
                };
                let Ok(candidate) = Move::new(from, to) else {
                    continue;
                };
                let result = validate_move(position, &candidate);
                if legal.contains(&candidate) {
                    assert!(result.is_ok(), "{candidate} should be legal in {position}");
                } else {
                    assert!(
                        matches!(result, Err(RulesError::InvalidMove { .. })),
                        "{candidate} should be rejected in {position}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_validate_turn() {
        let position = Position::initial();
        assert!(validate_turn(&position, Color::White).is_ok());
        assert_eq!(
            validate_turn(&position, Color::Black),
            Err(RulesError::WrongTurn {
                expected: Color::Black,
                actual: Color::White
            })
        );
    }

    #[test]
    fn test_validate_position_well_formed() {
        assert!(validate_position_well_formed(Position::STARTING_FEN).is_ok());
        assert!(matches!(
            validate_position_well_formed("rnbqkbnr/pppppppp w"),
            Err(RulesError::MalformedPosition { .. })
        ));
    }

    #[test]
    fn test_check_termination_checkmate() {
        let position =
            Position::parse("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        let t = check_termination(&position).unwrap();
        assert!(t.is_over);
        assert_eq!(t.reason, Some(TerminationReason::Checkmate));
        assert_eq!(t.winner, Some(Winner::Black));
        assert!(t.in_check);
    }

    #[test]
    fn test_requires_promotion() {
        let position = Position::parse("8/P7/8/8/8/8/1p6/4K2k w - - 0 1").unwrap();
        assert!(requires_promotion(&position, &mv("a7a8")));
        assert!(!requires_promotion(&position, &mv("e1d1")));
        // Black pawn on its seventh rank heading to rank 1
        assert!(requires_promotion(&position, &mv("b2b1")));
        assert!(!requires_promotion(&Position::initial(), &mv("e2e4")));
    }

    #[test]
    fn test_parse_user_move_input() {
        let expected = Some(MoveInput {
            from: "e2".parse().unwrap(),
            to: "e4".parse().unwrap(),
        });
        assert_eq!(parse_user_move_input("e2e4"), expected);
        assert_eq!(parse_user_move_input("e2-e4"), expected);
        assert_eq!(parse_user_move_input("E2 E4"), expected);
        assert_eq!(parse_user_move_input("  e2e4 "), expected);

        assert_eq!(parse_user_move_input("e2e9"), None);
        assert_eq!(parse_user_move_input("e2e4 e5"), None);
        assert_eq!(parse_user_move_input("e2_e4"), None);
        assert_eq!(parse_user_move_input("e2  e4"), None);
        assert_eq!(parse_user_move_input("Nf3"), None);
        assert_eq!(parse_user_move_input(""), None);
    }

    #[test]
    fn test_move_input_into_move() {
        let input = parse_user_move_input("a7a8").unwrap();
        let m = input.into_move(Some(PieceType::Queen)).unwrap();
        assert_eq!(m.uci(), "a7a8q");
        assert!(parse_user_move_input("e2e2").unwrap().into_move(None).is_err());
    }
}
