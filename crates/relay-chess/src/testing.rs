//! Test doubles for the signing+transport collaborator.
//!
//! [`ScriptedTransport`] records every move it is handed, reports signing
//! through [`SendProgress::signed`], then succeeds or fails as scripted.
//!
//! # Example
//!
//! ```ignore
//! let transport = ScriptedTransport::rejecting("network timeout");
//! let record = manager.execute(&position, &mv, &transport).await?;
//! assert_eq!(record.status, MoveStatus::Failed);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::optimistic::{SendError, SendProgress, SignAndSend};
use crate::types::game::MoveRecord;

/// A scripted signing+transport fake.
pub struct ScriptedTransport {
    /// Outcomes consumed in order; `fallback` applies once exhausted.
    script: Mutex<VecDeque<Result<(), SendError>>>,
    fallback: Result<(), SendError>,
    delay: Option<Duration>,
    sent: Mutex<Vec<MoveRecord>>,
    acknowledged: Mutex<Vec<bool>>,
}

impl ScriptedTransport {
    /// Accept every move.
    pub fn accepting() -> Self {
        Self::with_fallback(Ok(()))
    }

    /// Reject every move with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_fallback(Err(SendError::new(message)))
    }

    /// Play `outcomes` in order, then accept.
    pub fn scripted(outcomes: impl IntoIterator<Item = Result<(), SendError>>) -> Self {
        let transport = Self::accepting();
        transport.script.lock().extend(outcomes);
        transport
    }

    fn with_fallback(fallback: Result<(), SendError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            sent: Mutex::new(Vec::new()),
            acknowledged: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay` after signing, before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Records handed to the transport, as they were at hand-off.
    pub fn sent(&self) -> Vec<MoveRecord> {
        self.sent.lock().clone()
    }

    /// What each `signed()` call returned.
    pub fn signing_acknowledged(&self) -> Vec<bool> {
        self.acknowledged.lock().clone()
    }
}

#[async_trait]
impl SignAndSend for ScriptedTransport {
    async fn sign_and_send(
        &self,
        record: &MoveRecord,
        progress: &SendProgress,
    ) -> Result<(), SendError> {
        self.sent.lock().push(record.clone());
        let acknowledged = progress.signed();
        self.acknowledged.lock().push(acknowledged);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::optimistic::OptimisticMoveManager;
    use crate::types::{MoveStatus, Position};

    #[tokio::test]
    async fn scripted_outcomes_play_in_order() {
        let manager = OptimisticMoveManager::new(ClientConfig::default());
        let transport =
            ScriptedTransport::scripted([Err(SendError::new("first try fails")), Ok(())]);
        let start = Position::initial();

        let first = manager
            .execute(&start, &"e2e4".parse().unwrap(), &transport)
            .await
            .unwrap();
        let second = manager
            .execute(&start, &"e2e4".parse().unwrap(), &transport)
            .await
            .unwrap();
        let third = manager
            .execute(&start, &"d2d4".parse().unwrap(), &transport)
            .await
            .unwrap();

        assert_eq!(first.status, MoveStatus::Failed);
        assert_eq!(second.status, MoveStatus::Confirmed);
        assert_eq!(third.status, MoveStatus::Confirmed);
        assert_eq!(transport.sent().len(), 3);
        assert_eq!(transport.signing_acknowledged(), vec![true, true, true]);
    }
}
