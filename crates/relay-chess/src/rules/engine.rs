//! Chess engine integration with shakmaty.
//!
//! This module provides a high-level interface to shakmaty for:
//! - Position management and FEN parsing
//! - Move validation and application
//! - Legal move generation
//! - Game end detection (checkmate, stalemate, draw conditions)

use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, san::SanPlus, uci::UciMove, CastlingMode, Chess, EnPassantMode, Position as _,
};
use thiserror::Error;

use crate::types::chess::{Color, Move, Piece, PieceType, Position, Square};
use crate::types::game::{Termination, TerminationReason, Winner};

/// Errors that can occur during chess operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RulesError {
    /// The position is not a valid FEN.
    #[error("malformed position: {reason}")]
    MalformedPosition { reason: String },

    /// Move is not legal in the current position.
    #[error("invalid move {notation}: {reason}")]
    InvalidMove { notation: String, reason: String },

    /// The position has the other side to move.
    #[error("not {expected}'s turn - it is {actual}'s turn")]
    WrongTurn { expected: Color, actual: Color },
}

impl RulesError {
    fn invalid(notation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            notation: notation.into(),
            reason: reason.into(),
        }
    }
}

/// A validated move applied to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayedMove {
    /// Position after the move.
    pub resulting_position: Position,
    /// The move in SAN notation, with check suffix (e.g. "Qh4#").
    pub san: String,
}

/// Legal move information for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalMove {
    /// UCI notation (e.g., "e2e4").
    pub uci: String,
    /// SAN notation (e.g., "e4").
    pub san: String,
    /// Is this a capture?
    pub is_capture: bool,
    /// Is this a check?
    pub is_check: bool,
}

/// Legal moves of a position, converted lazily on iteration.
///
/// Iterating does not consume the set; call [`LegalMoves::iter`] again to
/// restart from the first move.
#[derive(Debug, Clone)]
pub struct LegalMoves {
    moves: Vec<shakmaty::Move>,
}

impl LegalMoves {
    /// Iterate over the moves in generation order.
    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        self.moves.iter().filter_map(to_move)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Returns true if `mv` is among the legal moves.
    #[must_use]
    pub fn contains(&self, mv: &Move) -> bool {
        self.iter().any(|m| m == *mv)
    }
}

/// A chess position with move validation and game state tracking.
#[derive(Debug, Clone)]
pub struct ChessPosition {
    position: Chess,
}

impl ChessPosition {
    /// Create a new position from the standard starting position.
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
        }
    }

    /// Create a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let fen: Fen = fen
            .trim()
            .parse()
            .map_err(|e| RulesError::MalformedPosition {
                reason: format!("{e}"),
            })?;
        let position: Chess =
            fen.into_position(CastlingMode::Standard)
                .map_err(|e| RulesError::MalformedPosition {
                    reason: format!("{e}"),
                })?;
        Ok(Self { position })
    }

    /// Create a position from an already validated [`Position`].
    pub fn from_position(position: &Position) -> Result<Self, RulesError> {
        Self::from_fen(position.as_str())
    }

    /// Get the FEN string for the current position.
    #[must_use]
    pub fn to_fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// The current position as a value.
    #[must_use]
    pub fn to_position(&self) -> Position {
        Position::from_engine(self.to_fen())
    }

    /// Get whose turn it is to move.
    #[must_use]
    pub fn turn(&self) -> Color {
        self.position.turn().into()
    }

    /// Check if the side to move is in check.
    #[must_use]
    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    /// Termination status judged from this position alone.
    ///
    /// Threefold repetition needs history; see [`super::Replay::termination`].
    #[must_use]
    pub fn termination(&self) -> Termination {
        let in_check = self.position.is_check();
        if self.position.is_checkmate() {
            // The side to move is mated, so the side that just moved wins.
            Termination::over(
                TerminationReason::Checkmate,
                Winner::from(self.turn().opposite()),
                in_check,
            )
        } else if self.position.is_stalemate() {
            Termination::over(TerminationReason::Stalemate, Winner::Draw, in_check)
        } else if self.position.is_insufficient_material() {
            Termination::over(
                TerminationReason::InsufficientMaterial,
                Winner::Draw,
                in_check,
            )
        } else if self.can_claim_fifty_move_draw() {
            Termination::over(TerminationReason::Draw, Winner::Draw, in_check)
        } else {
            Termination::ongoing(in_check)
        }
    }

    /// Check if the game is over.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.termination().is_over
    }

    /// Legal moves, optionally restricted to those starting on `from`.
    #[must_use]
    pub fn legal_moves(&self, from: Option<Square>) -> LegalMoves {
        let from = from.map(shakmaty::Square::from);
        let moves = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|m| from.is_none() || uci_from(m) == from)
            .collect();
        LegalMoves { moves }
    }

    /// Legal moves with notation and capture/check flags.
    #[must_use]
    pub fn legal_move_details(&self, from: Option<Square>) -> Vec<LegalMove> {
        self.legal_moves(from)
            .moves
            .iter()
            .map(|m| {
                let mut after = self.position.clone();
                let san = SanPlus::from_move_and_play_unchecked(&mut after, m);
                LegalMove {
                    uci: UciMove::from_move(m, CastlingMode::Standard).to_string(),
                    san: san.to_string(),
                    is_capture: m.is_capture(),
                    is_check: after.is_check(),
                }
            })
            .collect()
    }

    /// Validate a move without applying it.
    pub fn play(&self, mv: &Move) -> Result<PlayedMove, RulesError> {
        let m = self.resolve(mv)?;
        let mut after = self.position.clone();
        let san = SanPlus::from_move_and_play_unchecked(&mut after, &m);
        Ok(PlayedMove {
            resulting_position: Self { position: after }.to_position(),
            san: san.to_string(),
        })
    }

    /// Validate and apply a move. Returns the move in SAN notation.
    pub fn make_move(&mut self, mv: &Move) -> Result<String, RulesError> {
        let m = self.resolve(mv)?;
        Ok(self.apply(&m))
    }

    /// Validate and apply a move given in algebraic notation.
    ///
    /// Accepts SAN with or without a check suffix (`Nf3`, `Qh4#`) and falls
    /// back to coordinate notation (`e2e4`). Returns the canonical SAN.
    pub fn make_notation_move(&mut self, notation: &str) -> Result<String, RulesError> {
        let notation = notation.trim();
        let castling;
        let notation = if notation.starts_with("0-0") {
            castling = notation.replace('0', "O");
            castling.as_str()
        } else {
            notation
        };
        let m = match notation.parse::<SanPlus>() {
            Ok(san) => san.san.to_move(&self.position).ok(),
            Err(_) => None,
        };
        let m = match m {
            Some(m) => m,
            None => {
                let mv: Move = notation
                    .parse()
                    .map_err(|_| RulesError::invalid(notation, "not a legal move"))?;
                self.resolve(&mv)?
            }
        };
        Ok(self.apply(&m))
    }

    /// Piece standing on a square.
    #[must_use]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square.into()).map(Piece::from)
    }

    /// Get the halfmove clock (for 50-move rule).
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    /// Check if the 50-move rule draw can be claimed.
    #[must_use]
    pub fn can_claim_fifty_move_draw(&self) -> bool {
        self.halfmove_clock() >= 100
    }

    /// Get the fullmove number.
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }

    /// Placement, side to move, castling and en-passant fields: the parts of
    /// the FEN that decide whether two positions repeat.
    #[must_use]
    pub(crate) fn repetition_key(&self) -> String {
        self.to_fen()
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    // --- Private helper methods ---

    fn apply(&mut self, m: &shakmaty::Move) -> String {
        SanPlus::from_move_and_play_unchecked(&mut self.position, m).to_string()
    }

    /// Map a [`Move`] onto the legal shakmaty move it denotes.
    fn resolve(&self, mv: &Move) -> Result<shakmaty::Move, RulesError> {
        let notation = mv.uci();
        let piece = self
            .piece_at(mv.from())
            .ok_or_else(|| RulesError::invalid(&notation, format!("no piece on {}", mv.from())))?;
        if piece.color != self.turn() {
            return Err(RulesError::invalid(
                &notation,
                format!("it is {}'s turn", self.turn()),
            ));
        }
        if mv.promotion().is_none() && self.requires_promotion(mv) {
            return Err(RulesError::invalid(&notation, "promotion piece required"));
        }

        let uci = UciMove::Normal {
            from: mv.from().into(),
            to: mv.to().into(),
            promotion: mv.promotion().map(Into::into),
        };
        let m = uci
            .to_move(&self.position)
            .map_err(|_| RulesError::invalid(&notation, "not a legal move"))?;

        // King-takes-rook castling resolves too; only the king's own squares count.
        if !self.position.is_legal(&m) || to_move(&m).as_ref() != Some(mv) {
            return Err(RulesError::invalid(&notation, "not a legal move"));
        }
        Ok(m)
    }

    /// True iff the piece on the origin square is a pawn stepping onto its
    /// last rank from the one before it.
    #[must_use]
    pub fn requires_promotion(&self, mv: &Move) -> bool {
        let Some(piece) = self.piece_at(mv.from()) else {
            return false;
        };
        if piece.piece_type != PieceType::Pawn {
            return false;
        }
        match piece.color {
            Color::White => mv.from().rank() == 6 && mv.to().rank() == 7,
            Color::Black => mv.from().rank() == 1 && mv.to().rank() == 0,
        }
    }
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::new()
    }
}

fn uci_from(m: &shakmaty::Move) -> Option<shakmaty::Square> {
    match UciMove::from_move(m, CastlingMode::Standard) {
        UciMove::Normal { from, .. } => Some(from),
        _ => None,
    }
}

fn to_move(m: &shakmaty::Move) -> Option<Move> {
    match UciMove::from_move(m, CastlingMode::Standard) {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => Move::new(from.into(), to.into())
            .ok()
            .map(|mv| mv.with_promotion(promotion.map(PieceType::from))),
        _ => None,
    }
}
