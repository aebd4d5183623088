//! Driving an optimistic move through signing and publication.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::manager::OptimisticMoveManager;
use crate::move_id::MoveId;
use crate::rules::RulesError;
use crate::types::chess::{Move, Position};
use crate::types::game::{MoveRecord, MoveStatus};

/// Rejection reported by the signing+transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SendError {
    pub message: String,
}

impl SendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Signs a move and publishes it to relays.
///
/// Resolves once a relay accepted the event. Retrying is up to the
/// implementation; the manager only records the final outcome.
#[async_trait]
pub trait SignAndSend: Send + Sync {
    async fn sign_and_send(
        &self,
        record: &MoveRecord,
        progress: &SendProgress,
    ) -> Result<(), SendError>;
}

/// Lets the transport report that signing finished.
pub struct SendProgress {
    manager: OptimisticMoveManager,
    id: MoveId,
}

impl SendProgress {
    pub fn id(&self) -> MoveId {
        self.id
    }

    /// Move the record from `Signing` to `Sending`. Returns `false` if the
    /// record is gone or not in `Signing`.
    pub fn signed(&self) -> bool {
        self.manager
            .transition(self.id, MoveStatus::Signing, MoveStatus::Sending)
    }
}

impl OptimisticMoveManager {
    /// Add `mv` optimistically, then sign and send it through `transport`.
    ///
    /// Returns the record in its final state: `Confirmed` when the transport
    /// succeeded, `Failed` carrying the transport's message otherwise. An
    /// illegal move is rejected before anything is shown or sent. The registry
    /// lock is never held while the transport runs.
    #[instrument(skip_all, fields(mv = %mv))]
    pub async fn execute<T>(
        &self,
        from: &Position,
        mv: &Move,
        transport: &T,
    ) -> Result<MoveRecord, RulesError>
    where
        T: SignAndSend + ?Sized,
    {
        let mut record = self.add_move(from, mv)?;
        if !self.transition(record.id, MoveStatus::Pending, MoveStatus::Signing) {
            // Removed before it could be sent.
            return Ok(record);
        }
        record.status = MoveStatus::Signing;

        let progress = SendProgress {
            manager: self.clone(),
            id: record.id,
        };
        let (status, error) = match transport.sign_and_send(&record, &progress).await {
            Ok(()) => {
                info!(move_id = %record.id, san = %record.san, "move published");
                (MoveStatus::Confirmed, None)
            }
            Err(e) => (MoveStatus::Failed, Some(e.message)),
        };
        self.update_status(record.id, status, error.clone());

        Ok(self.get(record.id).unwrap_or(MoveRecord {
            status,
            error,
            ..record
        }))
    }
}
