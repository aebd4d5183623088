//! Replaying claimed game histories.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::engine::{ChessPosition, RulesError};
use crate::types::chess::Position;
use crate::types::game::{Termination, TerminationReason, Winner};

/// Failure while replaying a move history.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SequenceError {
    /// The starting position could not be parsed.
    #[error("history starts from an invalid position: {0}")]
    MalformedStart(RulesError),

    /// The move at `index` (1-based) is illegal.
    #[error("illegal move at position {index}: {notation}")]
    IllegalMove { index: usize, notation: String },
}

/// A game replayed move by move, tracking repetitions.
#[derive(Debug, Clone)]
pub struct Replay {
    start: Position,
    position: ChessPosition,
    sans: Vec<String>,
    repetitions: HashMap<String, u32>,
}

impl Replay {
    /// Start a replay from `start`, or the standard initial position.
    pub fn new(start: Option<&Position>) -> Result<Self, RulesError> {
        let position = match start {
            Some(p) => ChessPosition::from_position(p)?,
            None => ChessPosition::new(),
        };
        let mut repetitions = HashMap::new();
        repetitions.insert(position.repetition_key(), 1);
        Ok(Self {
            start: position.to_position(),
            position,
            sans: Vec::new(),
            repetitions,
        })
    }

    /// Play one move in algebraic or coordinate notation.
    pub fn push(&mut self, notation: &str) -> Result<&str, RulesError> {
        let san = self.position.make_notation_move(notation)?;
        *self
            .repetitions
            .entry(self.position.repetition_key())
            .or_insert(0) += 1;
        self.sans.push(san);
        Ok(self.sans.last().map(String::as_str).unwrap_or_default())
    }

    /// The position reached so far.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position.to_position()
    }

    #[must_use]
    pub fn start(&self) -> &Position {
        &self.start
    }

    /// Canonical SAN of every move played.
    #[must_use]
    pub fn moves(&self) -> &[String] {
        &self.sans
    }

    /// Termination status including threefold repetition.
    #[must_use]
    pub fn termination(&self) -> Termination {
        let termination = self.position.termination();
        if termination.is_over {
            return termination;
        }
        let key = self.position.repetition_key();
        if self.repetitions.get(&key).copied().unwrap_or(0) >= 3 {
            return Termination::over(
                TerminationReason::ThreefoldRepetition,
                Winner::Draw,
                termination.in_check,
            );
        }
        termination
    }

    /// Render the history as numbered movetext (`1. e4 e5 2. Nf3`).
    #[must_use]
    pub fn to_pgn(&self) -> String {
        let start = ChessPosition::from_position(&self.start).unwrap_or_default();
        let mut number = start.fullmove_number();
        let mut white_to_move = start.turn().is_white();
        let mut out = Vec::with_capacity(self.sans.len() * 2);

        for (i, san) in self.sans.iter().enumerate() {
            if white_to_move {
                out.push(format!("{number}."));
            } else if i == 0 {
                out.push(format!("{number}..."));
            }
            out.push(san.clone());
            if !white_to_move {
                number += 1;
            }
            white_to_move = !white_to_move;
        }
        out.join(" ")
    }
}

/// Replay `moves` from `start` (default: the initial position).
///
/// Fails at the first illegal move with its 1-based index and text.
pub fn validate_move_sequence<I, S>(moves: I, start: Option<&Position>) -> Result<Replay, SequenceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut replay = Replay::new(start).map_err(SequenceError::MalformedStart)?;
    for (i, notation) in moves.into_iter().enumerate() {
        let notation = notation.as_ref();
        if replay.push(notation).is_err() {
            return Err(SequenceError::IllegalMove {
                index: i + 1,
                notation: notation.to_string(),
            });
        }
    }
    Ok(replay)
}

/// Split PGN-like movetext into move tokens.
///
/// Move numbers (`12.`, `12...`), `{comments}`, `(variations)`, NAGs (`$1`)
/// and result markers are dropped.
#[must_use]
pub fn moves_from_pgn(pgn: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(pgn.len());
    let mut depth_brace = 0usize;
    let mut depth_paren = 0usize;
    for line in pgn.lines() {
        // Header lines
        if line.trim_start().starts_with('[') {
            continue;
        }
        for c in line.chars() {
            match c {
                '{' => depth_brace += 1,
                '}' => depth_brace = depth_brace.saturating_sub(1),
                '(' if depth_brace == 0 => depth_paren += 1,
                ')' if depth_brace == 0 => depth_paren = depth_paren.saturating_sub(1),
                _ if depth_brace == 0 && depth_paren == 0 => cleaned.push(c),
                _ => {}
            }
        }
        cleaned.push(' ');
    }

    cleaned
        .split_whitespace()
        .filter_map(|token| {
            let token = strip_move_number(token);
            if token.is_empty()
                || token.starts_with('$')
                || matches!(token, "*" | "1-0" | "0-1" | "1/2-1/2")
            {
                None
            } else {
                Some(token.to_string())
            }
        })
        .collect()
}

/// `12.`, `12...` and `1.e4` lose their number; anything else, including
/// `0-0` and result markers, is returned as is.
fn strip_move_number(token: &str) -> &str {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < token.len() && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_legal_sequence() {
        let replay = validate_move_sequence(["e4", "e5", "Nf3", "Nc6", "Bb5"], None).unwrap();
        assert_eq!(replay.moves().len(), 5);
        assert_eq!(replay.to_pgn(), "1. e4 e5 2. Nf3 Nc6 3. Bb5");
        assert!(!replay.termination().is_over);
    }

    #[test]
    fn test_replay_reports_first_illegal_move() {
        let err = validate_move_sequence(["e4", "e5", "Ke3", "Nf3"], None).unwrap_err();
        assert_eq!(
            err,
            SequenceError::IllegalMove {
                index: 3,
                notation: "Ke3".to_string()
            }
        );
    }

    #[test]
    fn test_replay_accepts_coordinate_notation() {
        let replay = validate_move_sequence(["e2e4", "e7e5", "g1f3"], None).unwrap();
        assert_eq!(replay.moves(), ["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_replay_from_custom_start() {
        let start =
            Position::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let replay = validate_move_sequence(["e5", "Nf3"], Some(&start)).unwrap();
        assert_eq!(replay.to_pgn(), "1... e5 2. Nf3");
        assert!(validate_move_sequence(["e4"], Some(&start)).is_err());
    }

    #[test]
    fn test_replay_detects_checkmate() {
        let replay = validate_move_sequence(["f3", "e5", "g4", "Qh4#"], None).unwrap();
        let t = replay.termination();
        assert_eq!(t.reason, Some(TerminationReason::Checkmate));
        assert_eq!(t.winner, Some(Winner::Black));
    }

    #[test]
    fn test_replay_detects_threefold_repetition() {
        let moves = ["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"];
        let replay = validate_move_sequence(moves, None).unwrap();
        let t = replay.termination();
        assert!(t.is_over);
        assert_eq!(t.reason, Some(TerminationReason::ThreefoldRepetition));
        assert_eq!(t.winner, Some(Winner::Draw));
    }

    #[test]
    fn test_moves_from_pgn() {
        let pgn = "[Event \"casual\"]\n1. e4 {best by test} e5 2.Nf3 (2. f4 exf4) Nc6 $1 3. Bb5 1-0";
        assert_eq!(moves_from_pgn(pgn), ["e4", "e5", "Nf3", "Nc6", "Bb5"]);
        assert!(moves_from_pgn("").is_empty());
        assert_eq!(moves_from_pgn("1... e5 2. Nf3 *"), ["e5", "Nf3"]);
        assert_eq!(moves_from_pgn("1.e4 e5 0-1"), ["e4", "e5"]);
    }

    #[test]
    fn test_zero_castling_survives_pgn_split() {
        let pgn = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. 0-0 Nf6 5. d3 d6 6. Bg5 Bg4 7. Nc3 Qd7 8. Qd2 0-0-0";
        let tokens = moves_from_pgn(pgn);
        assert_eq!(tokens.len(), 16);
        assert_eq!(tokens[6], "0-0");
        assert_eq!(tokens[15], "0-0-0");

        let replay = validate_move_sequence(&tokens, None).unwrap();
        assert_eq!(replay.moves()[6], "O-O");
        assert_eq!(replay.moves()[15], "O-O-O");
    }
}
