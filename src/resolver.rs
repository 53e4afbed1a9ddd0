//! Flair resolution for generation requests.
//!
//! Flair references on tasks are weak: a flair can be edited or deleted after
//! a task was tagged with it, so ids that resolve to nothing are dropped
//! silently rather than failing the request. Whether "nothing resolved" is an
//! error depends on the rest of the request and is decided by the service.

use std::collections::HashSet;

use crate::db::ScheduleDb;
use crate::error::SchedulerError;
use crate::types::Flair;

/// Look up each id independently, de-duplicated, preserving first-seen order.
/// Missing ids are skipped with a warning.
pub fn resolve_flairs(db: &ScheduleDb, flair_ids: &[String]) -> Result<Vec<Flair>, SchedulerError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut flairs = Vec::new();

    for id in flair_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match db.get_flair(id)? {
            Some(flair) => flairs.push(flair),
            None => log::warn!("resolve_flairs: no flair with id {}, skipping", id),
        }
    }

    Ok(flairs)
}
