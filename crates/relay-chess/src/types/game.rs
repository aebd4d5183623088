//! Game-related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chess::{Color, Move, Position};
use crate::move_id::MoveId;

/// Identifier of a game, carried in the `d` tag of its game-state record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random game ID.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public key of a player, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerKey(String);

impl PlayerKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result field of an authoritative game-state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// White won.
    White,
    /// Black won.
    Black,
    /// Drawn.
    Draw,
    /// Still being played.
    #[default]
    Ongoing,
}

impl GameResult {
    /// Returns true if the game is still ongoing.
    #[must_use]
    pub const fn is_ongoing(&self) -> bool {
        matches!(self, Self::Ongoing)
    }

    /// Returns the winning color if any.
    #[must_use]
    pub const fn winner(&self) -> Option<Color> {
        match self {
            Self::White => Some(Color::White),
            Self::Black => Some(Color::Black),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
            Self::Draw => write!(f, "draw"),
            Self::Ongoing => write!(f, "ongoing"),
        }
    }
}

/// Winner of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Color> for Winner {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

impl From<Winner> for GameResult {
    fn from(w: Winner) -> Self {
        match w {
            Winner::White => Self::White,
            Winner::Black => Self::Black,
            Winner::Draw => Self::Draw,
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        GameResult::from(*self).fmt(f)
    }
}

/// Reason why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Checkmate.
    Checkmate,
    /// Stalemate.
    Stalemate,
    /// Fifty-move rule.
    Draw,
    /// Insufficient material.
    InsufficientMaterial,
    /// Threefold repetition.
    ThreefoldRepetition,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkmate => write!(f, "checkmate"),
            Self::Stalemate => write!(f, "stalemate"),
            Self::Draw => write!(f, "draw"),
            Self::InsufficientMaterial => write!(f, "insufficient_material"),
            Self::ThreefoldRepetition => write!(f, "threefold_repetition"),
        }
    }
}

/// Termination report for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    pub is_over: bool,
    pub reason: Option<TerminationReason>,
    pub winner: Option<Winner>,
    pub in_check: bool,
}

impl Termination {
    pub(crate) const fn ongoing(in_check: bool) -> Self {
        Self {
            is_over: false,
            reason: None,
            winner: None,
            in_check,
        }
    }

    pub(crate) const fn over(reason: TerminationReason, winner: Winner, in_check: bool) -> Self {
        Self {
            is_over: true,
            reason: Some(reason),
            winner: Some(winner),
            in_check,
        }
    }

    /// The record-level result this termination implies.
    #[must_use]
    pub fn result(&self) -> GameResult {
        self.winner.map_or(GameResult::Ongoing, GameResult::from)
    }
}

/// Lifecycle status of an optimistic move.
///
/// `Confirmed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStatus {
    /// Validated locally, shown to the user.
    Pending,
    /// Waiting for a signature.
    Signing,
    /// Being published to relays.
    Sending,
    /// Accepted by a relay or matched by an authoritative record.
    Confirmed,
    /// Rejected by the transport.
    Failed,
}

impl MoveStatus {
    /// Returns true for `Confirmed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Returns true while the move awaits the network.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Signing | Self::Sending)
    }
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Signing => write!(f, "signing"),
            Self::Sending => write!(f, "sending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A locally applied move awaiting network confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Registry-unique identifier, never reused.
    pub id: MoveId,
    #[serde(rename = "move")]
    pub mv: Move,
    /// Position after the move.
    pub resulting_position: Position,
    /// Standard Algebraic Notation (e.g., "Nf3", "Qh4#").
    pub san: String,
    pub created_at: DateTime<Utc>,
    pub status: MoveStatus,
    /// Transport error message for `Failed` moves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
