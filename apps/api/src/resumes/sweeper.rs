//! Reconciliation sweep for interrupted uploads and deletes.
//!
//! A `pending` row whose status has not changed within the grace period
//! belongs to an upload that never finalized; a `deleting` row belongs to a
//! delete that never finished. Both are removed together with their blob.
//!
//! A `pending` row may still be finalized late, so its row is claimed first
//! and the blob removed only once the row is gone. The worst case is then an
//! orphaned blob, never a live row without one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::coordinator::ResumeStore;
use crate::errors::AppError;
use crate::models::resume::{ResumeRow, ResumeStatus};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub removed: usize,
    pub failed: usize,
}

impl ResumeStore {
    /// Removes every stale `pending`/`deleting` row last touched before `cutoff`.
    pub async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let stale = self.repo.stale_resumes(cutoff).await?;
        let mut report = SweepReport {
            examined: stale.len(),
            ..Default::default()
        };

        for resume in stale {
            let removed = match resume.status {
                ResumeStatus::Pending => self.sweep_row_then_blob(&resume).await,
                _ => self.sweep_blob_then_row(&resume).await,
            };
            match removed {
                Ok(true) => report.removed += 1,
                // Status moved on since the scan; the row is someone else's now.
                Ok(false) => {}
                Err(()) => report.failed += 1,
            }
        }

        Ok(report)
    }

    async fn sweep_row_then_blob(&self, resume: &ResumeRow) -> Result<bool, ()> {
        match self.repo.delete_resume_row(resume.resume_id, resume.status).await {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => {
                warn!("Sweep could not delete row for resume {}: {e}", resume.resume_id);
                return Err(());
            }
        }
        if let Err(e) = self.store.delete(&resume.storage_key).await {
            warn!(
                "Sweep removed resume {} but left blob {} orphaned: {e}",
                resume.resume_id, resume.storage_key
            );
            return Err(());
        }
        Ok(true)
    }

    async fn sweep_blob_then_row(&self, resume: &ResumeRow) -> Result<bool, ()> {
        if let Err(e) = self.store.delete(&resume.storage_key).await {
            warn!(
                "Sweep could not delete blob {} for resume {}: {e}",
                resume.storage_key, resume.resume_id
            );
            return Err(());
        }
        self.repo
            .delete_resume_row(resume.resume_id, resume.status)
            .await
            .map_err(|e| warn!("Sweep could not delete row for resume {}: {e}", resume.resume_id))
    }
}

/// Runs `sweep` every `interval`, treating markers older than `grace` as abandoned.
pub fn spawn_sweeper(resumes: ResumeStore, interval: Duration, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = match chrono::Duration::from_std(grace) {
                Ok(grace) => Utc::now() - grace,
                Err(e) => {
                    error!("Invalid sweep grace period: {e}");
                    return;
                }
            };
            match resumes.sweep(cutoff).await {
                Ok(report) if report.examined > 0 => info!(
                    "Sweep removed {} of {} stale resumes ({} failed)",
                    report.removed, report.examined, report.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Sweep failed: {e}"),
            }
        }
    })
}
