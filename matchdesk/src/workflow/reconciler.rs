//! Background repair of leads whose payment was accepted but never promoted to `paid`.
//!
//! Acceptance writes the payment and the lead in two statements. If the process dies or the
//! second statement fails in between, the lead is left behind; this task finds such leads and
//! finishes the promotion. The repair statement is idempotent and safe to run from several
//! processes at once.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{config::ReconcilerConfig, db::handlers::Traffic, errors::Error};

pub struct Reconciler {
    db: PgPool,
    interval: Duration,
}

impl Reconciler {
    pub fn new(db: PgPool, config: &ReconcilerConfig) -> Self {
        Self {
            db,
            interval: config.interval,
        }
    }

    /// One repair pass. Returns the number of leads promoted.
    #[instrument(skip(self), err)]
    pub async fn run_once(&self) -> Result<u64, Error> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let repaired = Traffic::new(&mut conn).promote_leads_with_accepted_payments().await?;

        if repaired > 0 {
            warn!(repaired, "Promoted leads with accepted payments that were not marked paid");
        } else {
            debug!("No leads needed repair");
        }
        Ok(repaired)
    }

    /// Run a pass immediately, then every interval until `shutdown` is cancelled. Failed passes
    /// are logged and retried on the next tick.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval = %humantime::format_duration(self.interval), "Starting payment reconciler");

        let mut timer = tokio::time::interval(self.interval);
        // Use Delay to avoid a burst of passes after runtime hiccups
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Received shutdown signal, stopping payment reconciler");
                    break;
                }
                // The first tick completes immediately, giving the startup pass
                _ = timer.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Reconciler pass failed: {}", e);
                    }
                }
            }
        }
    }
}
