//! Type definitions shared across the crate.
//!
//! ## Modules
//!
//! - `chess` - Chess value types wrapping shakmaty (Color, Square, Move, Position)
//! - `game` - Game-related types (GameId, GameResult, MoveStatus, MoveRecord)

pub mod chess;
pub mod game;

pub use chess::{Color, Move, Piece, PieceType, Position, Square};
pub use game::{
    GameId, GameResult, MoveRecord, MoveStatus, PlayerKey, Termination, TerminationReason, Winner,
};
