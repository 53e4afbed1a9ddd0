//! Dayweave: natural-language task scheduling with conflict-free merging.
//!
//! A caller submits a free-text description (and/or a set of flair ids — user
//! defined category labels), the prompt compiler turns that into a strict
//! instruction for an external text-generation backend, and the merge engine
//! combines the generated tasks with the owner's existing schedule so the
//! persisted result is always chronologically sorted with no time overlaps.
//!
//! The generation backend is modeled as a single-method trait
//! ([`generation::ScheduleGenerator`]) so tests and alternative providers can
//! swap in without touching the merge engine or the service flow.

pub mod db;
pub mod error;
pub mod generation;
pub mod merge;
mod migrations;
pub mod prompt;
pub mod resolver;
pub mod service;
pub mod types;

pub use error::{ApiError, SchedulerError};
pub use service::SchedulerService;
pub use types::{Flair, GenerateScheduleRequest, Schedule, ScheduleItem, TaskDuration};
