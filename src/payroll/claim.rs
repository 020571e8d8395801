//! Run calculation claims.
//!
//! At most one calculation holds a run at a time. A [`RunClaim`] is the
//! proof of holding it; dropping a claim that was never completed (the
//! calculation future was dropped or panicked) returns the run to draft
//! with no entries.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use super::store::RunStore;
use crate::models::{RunStatus, RunTotals};

/// Run ids with a calculation in flight.
#[derive(Debug, Default)]
pub struct ClaimTable {
    claimed: Mutex<HashSet<Uuid>>,
}

impl ClaimTable {
    /// Claims a run. Returns false if it is already claimed.
    pub fn try_claim(&self, run_id: Uuid) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id)
    }

    /// Releases a run.
    pub fn release(&self, run_id: Uuid) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run_id);
    }

    /// Whether a calculation holds the run.
    pub fn is_claimed(&self, run_id: Uuid) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&run_id)
    }
}

/// Holds a run for the duration of one calculation.
#[derive(Debug)]
pub struct RunClaim {
    run_id: Uuid,
    claims: Arc<ClaimTable>,
    runs: Arc<RunStore>,
    completed: bool,
}

impl RunClaim {
    /// Wraps a claim already taken in `claims`.
    pub(crate) fn new(run_id: Uuid, claims: Arc<ClaimTable>, runs: Arc<RunStore>) -> Self {
        Self {
            run_id,
            claims,
            runs,
            completed: false,
        }
    }

    /// The claimed run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Marks the calculation as committed; the run is left as it is.
    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if !self.completed {
            warn!(run_id = %self.run_id, "Calculation abandoned, returning run to draft");
            let restored = self.runs.update(self.run_id, |record| {
                if record.run.status == RunStatus::Calculating {
                    record.run.status = RunStatus::Draft;
                    record.run.totals = RunTotals::default();
                    record.run.failures.clear();
                    record.run.updated_at = Utc::now();
                    record.entries.clear();
                }
                Ok(())
            });
            if let Err(error) = restored {
                warn!(run_id = %self.run_id, %error, "Could not restore abandoned run");
            }
        }
        self.claims.release(self.run_id);
    }
}
