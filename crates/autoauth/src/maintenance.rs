//! Periodic cleanup of expired state.
//!
//! Codes, token records, revocation entries and retired signing keys all
//! carry their own expiry. Nothing reads them past that point, so a sweep
//! only bounds storage growth; correctness never depends on it running.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::clock::Clock;
use crate::storage::{CodeStorage, KeyStorage, RevocationIndex, TokenStorage};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub codes: u64,
    pub tokens: u64,
    pub revocations: u64,
    pub keys: u64,
}

impl SweepReport {
    /// Total number of removed entries.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.codes + self.tokens + self.revocations + self.keys
    }
}

/// Sweeps expired entries out of every store.
#[derive(Clone)]
pub struct Maintenance {
    codes: Arc<dyn CodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    revocations: Arc<dyn RevocationIndex>,
    keys: Arc<dyn KeyStorage>,
}

impl Maintenance {
    #[must_use]
    pub fn new(
        codes: Arc<dyn CodeStorage>,
        tokens: Arc<dyn TokenStorage>,
        revocations: Arc<dyn RevocationIndex>,
        keys: Arc<dyn KeyStorage>,
    ) -> Self {
        Self {
            codes,
            tokens,
            revocations,
            keys,
        }
    }

    /// Runs one sweep as of `now`.
    ///
    /// Active keys are never removed, even when expired; the key manager
    /// deactivates them first.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; stores swept before it stay swept.
    pub async fn run_once(&self, now: OffsetDateTime) -> AuthResult<SweepReport> {
        let report = SweepReport {
            codes: self.codes.delete_expired(now).await?,
            tokens: self.tokens.delete_expired(now).await?,
            revocations: self.revocations.purge_expired(now).await?,
            keys: self.keys.delete_expired(now).await?,
        };

        if report.total() > 0 {
            tracing::info!(
                codes = report.codes,
                tokens = report.tokens,
                revocations = report.revocations,
                keys = report.keys,
                "Maintenance sweep removed expired entries"
            );
        } else {
            tracing::debug!("Maintenance sweep found nothing to remove");
        }

        Ok(report)
    }

    /// Starts a background task sweeping every `period`.
    pub fn start(self, clock: Arc<dyn Clock>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; skip it so startup isn't a sweep.
            interval.tick().await;

            loop {
                interval.tick().await;

                if let Err(e) = self.run_once(clock.now()).await {
                    tracing::warn!(error = %e, "Maintenance sweep failed");
                }
            }
        })
    }
}
