//! Request-scoped orchestration of the generation flow.
//!
//! One request runs strictly sequentially: resolve flairs → compile the
//! prompt (existing schedule included as context) → call the generator →
//! merge → persist. Merge and persistence happen only after generation fully
//! succeeds, so an abandoned or failed request never leaves partial state.
//!
//! No retries and no timeouts live here; the caller wraps the whole call with
//! its own deadline and backoff policy.

use chrono::Utc;

use crate::db::ScheduleDb;
use crate::error::SchedulerError;
use crate::generation::ScheduleGenerator;
use crate::types::{GenerateScheduleRequest, Schedule};
use crate::{merge, prompt, resolver};

pub struct SchedulerService<G> {
    db: ScheduleDb,
    generator: G,
}

impl<G: ScheduleGenerator> SchedulerService<G> {
    pub fn new(db: ScheduleDb, generator: G) -> Self {
        Self { db, generator }
    }

    pub fn db(&self) -> &ScheduleDb {
        &self.db
    }

    /// Generate new tasks from the request and merge them into the owner's
    /// schedule, returning the full replacement schedule.
    pub async fn generate_schedule(
        &self,
        req: &GenerateScheduleRequest,
    ) -> Result<Schedule, SchedulerError> {
        let description = req
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let flair_ids = req.flair_ids.as_deref().unwrap_or_default();

        if description.is_none() && flair_ids.is_empty() {
            return Err(SchedulerError::InvalidRequest);
        }

        let flairs = resolver::resolve_flairs(&self.db, flair_ids)?;
        // Flair ids were supplied but none resolved; without a description
        // there is no task source left.
        if flairs.is_empty() && !flair_ids.is_empty() && description.is_none() {
            return Err(SchedulerError::NoFlairData);
        }

        let existing = self.db.find_schedule_by_owner(&req.owner_id)?;
        let compiled = prompt::compile(
            description,
            &flairs,
            existing.as_ref(),
            Utc::now().date_naive(),
        )?;

        log::info!(
            "generate_schedule: owner={} flairs={} existing_items={}",
            req.owner_id,
            flairs.len(),
            existing.as_ref().map_or(0, |s| s.items.len())
        );

        let new_items = self.generator.generate(&compiled).await?;
        let merged = merge::merge(new_items, existing.as_ref())?;
        let schedule = self.db.upsert_schedule(&req.owner_id, &merged)?;

        log::info!(
            "generate_schedule: owner={} persisted {} items",
            req.owner_id,
            schedule.items.len()
        );
        Ok(schedule)
    }

    /// The owner's schedule, or the empty-schedule sentinel when none exists
    /// yet. "No schedule yet" is a legitimate state, never an error.
    pub fn get_schedule(&self, owner_id: &str) -> Result<Schedule, SchedulerError> {
        Ok(self
            .db
            .find_schedule_by_owner(owner_id)?
            .unwrap_or_else(|| Schedule::empty(owner_id)))
    }
}
