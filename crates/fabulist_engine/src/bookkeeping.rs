//! Best-effort secondary writes: activity records and aggregate counters.
//!
//! Failures here are logged and swallowed; they never fail the operation
//! that triggered them.

use fabulist_core::NewActivity;
use fabulist_error::FabulistResult;
use fabulist_interface::ActivityStore;
use tracing::warn;

/// Record an activity, logging instead of failing.
pub(crate) async fn record<S>(store: &S, activity: NewActivity)
where
    S: ActivityStore + ?Sized,
{
    let kind = activity.kind;
    let story_id = activity.story_id;
    if let Err(e) = store.record_activity(activity).await {
        warn!(error = %e, kind = %kind, story_id = %story_id, "Failed to record activity");
    }
}

/// Keep the value of a secondary write, logging the failure instead.
pub(crate) fn settle<T>(result: FabulistResult<T>, what: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, what, "Secondary bookkeeping failed");
            None
        }
    }
}
