//! Optimistic move management.
//!
//! [`OptimisticMoveManager`] owns the lifecycle of every locally applied move:
//!
//! ```text
//! Pending -> Signing -> Sending -> Confirmed | Failed
//! ```
//!
//! Any non-terminal record accepts any status write; `Confirmed` and `Failed`
//! are final and evicted after their grace delay.

pub mod executor;
pub mod manager;

pub use executor::{SendError, SendProgress, SignAndSend};
pub use manager::{Listener, OptimisticMoveManager, Subscription};
