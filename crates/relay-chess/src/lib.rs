//! Chess over replaceable relay events.
//!
//! Both players publish the current state of a game as a replaceable
//! record (kind 30005). This crate validates moves, shows them to the local
//! player before the network confirms them, and reconciles them with the
//! records that arrive afterwards.
//!
//! ```
//! use relay_chess::config::ClientConfig;
//! use relay_chess::optimistic::OptimisticMoveManager;
//! use relay_chess::types::{MoveStatus, Position};
//!
//! let manager = OptimisticMoveManager::new(ClientConfig::default());
//! let record = manager
//!     .add_move(&Position::initial(), &"e2e4".parse().unwrap())
//!     .unwrap();
//! assert_eq!(record.status, MoveStatus::Pending);
//! assert_eq!(manager.pending_moves().len(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod move_id;
pub mod optimistic;
pub mod protocol;
pub mod reconcile;
pub mod rules;
pub mod testing;
pub mod types;

pub use error::Error;
