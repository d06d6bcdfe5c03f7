//! # Batch and record lifecycle
//!
//! ```text
//!   ingest:     (new) -> processing -> pending | error
//!   reconcile:  any -> processing -> pending | processing | completed
//!   synthesize/single: (new) -> pending
//! ```
//!
//! Records move `pending -> generated` when an artifact is attached; a
//! re-upload keeps them `generated` with a fresh path. A record is
//! `generated` exactly when it carries an artifact path.

use crate::models::batch::BatchStatus;

/// Status after reconciliation given the processed and total counts
pub fn reconciled_status(processed: i32, total: i32) -> BatchStatus {
    if processed <= 0 {
        BatchStatus::Pending
    } else if processed >= total {
        BatchStatus::Completed
    } else {
        BatchStatus::Processing
    }
}
