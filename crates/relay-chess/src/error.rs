use crate::cache::CacheError;
use crate::optimistic::SendError;
use crate::protocol::CodecError;
use crate::rules::{RulesError, SequenceError};

/// Errors surfaced by the client core.
///
/// Stale game-state records and unknown move ids are not errors; they show up
/// as [`ReconcileOutcome::Stale`](crate::reconcile::ReconcileOutcome::Stale)
/// and `false` returns respectively.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
