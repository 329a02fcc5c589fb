//! Transcript retention sweeper
//!
//! Reads already scrub expired transcripts lazily. The sweeper enforces the
//! same window for calls nobody reads, and optionally prunes old records.

use crate::db::{prune_old_calls, sweep_expired_transcripts};
use ava_common::config::RetentionConfig;
use ava_common::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub transcripts_scrubbed: u64,
    pub calls_pruned: u64,
}

/// One retention pass at `now`
pub async fn sweep_once(
    pool: &SqlitePool,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let transcripts_scrubbed = sweep_expired_transcripts(pool, now, config.transcript_window()).await?;

    let calls_pruned = match config.prune_after_days {
        Some(days) if days > 0 => prune_old_calls(pool, now - Duration::days(days)).await?,
        _ => 0,
    };

    Ok(SweepReport {
        transcripts_scrubbed,
        calls_pruned,
    })
}

/// Run [`sweep_once`] every `sweep_interval_secs` until `cancel` fires.
///
/// Returns `None` when the interval is 0.
pub fn spawn_retention_sweeper(
    pool: SqlitePool,
    config: RetentionConfig,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if config.sweep_interval_secs == 0 {
        info!("Retention sweeper disabled");
        return None;
    }

    let period = std::time::Duration::from_secs(config.sweep_interval_secs);
    info!(
        interval_secs = config.sweep_interval_secs,
        transcript_hours = config.transcript_hours,
        "Starting retention sweeper"
    );

    Some(tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Retention sweeper stopping");
                    break;
                }
                _ = tick.tick() => {
                    match sweep_once(&pool, &config, ava_common::time::now()).await {
                        Ok(report) if report != SweepReport::default() => info!(
                            transcripts_scrubbed = report.transcripts_scrubbed,
                            calls_pruned = report.calls_pruned,
                            "Retention sweep complete"
                        ),
                        Ok(_) => debug!("Retention sweep found nothing to do"),
                        Err(e) => error!(error = %e, "Retention sweep failed"),
                    }
                }
            }
        }
    }))
}
