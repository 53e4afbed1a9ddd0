//! Prompt compilation for the schedule generator.
//!
//! The scheduling rules (time-of-day windows, date priority, non-overlap)
//! live as plain data so they can be tested without rendering any text;
//! `compile` validates the task sources and renders the full instruction the
//! generation backend receives.

use chrono::NaiveDate;

use crate::error::SchedulerError;
use crate::types::{Flair, Schedule};

/// A vague time-of-day phrase mapped to a concrete hour range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub name: &'static str,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Interpretation of "morning" / "afternoon" / "evening" in task descriptions.
pub const TIME_WINDOWS: [TimeWindow; 3] = [
    TimeWindow {
        name: "morning",
        start_hour: 9,
        end_hour: 12,
    },
    TimeWindow {
        name: "afternoon",
        start_hour: 13,
        end_hour: 17,
    },
    TimeWindow {
        name: "evening",
        start_hour: 18,
        end_hour: 21,
    },
];

/// Look up a window by its phrase.
pub fn window_named(name: &str) -> Option<&'static TimeWindow> {
    TIME_WINDOWS.iter().find(|w| w.name == name)
}

/// A fully rendered instruction ready for the generation backend.
#[derive(Debug, Clone)]
pub struct CompiledPrompt {
    pub text: String,
}

/// Build the generator instruction from the request's task sources.
///
/// At least one source (non-empty description, or at least one resolved
/// flair) is required; otherwise `InvalidRequest`. The existing schedule is
/// included as context only — the generator is told to emit new tasks, not to
/// repeat the schedule back.
pub fn compile(
    description: Option<&str>,
    flairs: &[Flair],
    existing: Option<&Schedule>,
    today: NaiveDate,
) -> Result<CompiledPrompt, SchedulerError> {
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    if description.is_none() && flairs.is_empty() {
        return Err(SchedulerError::InvalidRequest);
    }

    let mut sections: Vec<String> = Vec::new();

    sections.push(
        "You are an intelligent task scheduler. Convert the user's request into new \
         schedule items."
            .to_string(),
    );

    if let Some(schedule) = existing.filter(|s| !s.items.is_empty()) {
        // Pretty-printed so the model sees one field per line.
        let items_json = serde_json::to_string_pretty(&schedule.items)
            .unwrap_or_else(|_| "[]".to_string());
        sections.push(format!(
            "Existing schedule context:\n\
             The user already has the tasks below. Treat them as fixed and immovable. \
             Do NOT repeat them in your output; output only the new tasks, scheduled \
             around them without time conflicts.\n{items_json}"
        ));
    } else {
        sections.push(
            "The user has no existing schedule. Output the new tasks, sorted \
             chronologically."
                .to_string(),
        );
    }

    if !flairs.is_empty() {
        let flairs_json =
            serde_json::to_string_pretty(flairs).unwrap_or_else(|_| "[]".to_string());
        sections.push(format!(
            "Source 1: pre-defined flair tasks\n\
             Create one task from the 'description' field of each flair object below. \
             Every task created from a flair MUST carry that flair's 'id' in the \
             task's 'flairId' field.\n{flairs_json}"
        ));
    }

    if let Some(desc) = description {
        let association = if flairs.is_empty() {
            String::new()
        } else {
            "\nIf one of the flairs above is clearly relevant to a task, set that \
             flair's 'id' as the task's 'flairId'; otherwise omit 'flairId'."
                .to_string()
        };
        sections.push(format!(
            "Source 2: the user's request\n\
             Create tasks from this natural-language description:\n\
             \"{desc}\"{association}"
        ));
    }

    sections.push(format!(
        "Current date context: the request is being made on {}. Use this date only \
         as an anchor for relative terms like \"today\" or \"tomorrow\".",
        today.format("%A, %B %-d, %Y")
    ));

    sections.push(render_rules());

    sections.push(
        "Required output: a JSON array where each element has 'title' (string), \
         'startTime' (ISO 8601 instant, e.g. '2025-07-25T09:00:00Z'), 'duration' \
         (e.g. '30 minutes', '1 hour'), and optionally 'flairId' (string). Respond \
         with ONLY the JSON array — no markdown fencing, no commentary."
            .to_string(),
    );

    Ok(CompiledPrompt {
        text: sections.join("\n\n"),
    })
}

/// Render the scheduling rules from their data form.
fn render_rules() -> String {
    let windows = TIME_WINDOWS
        .iter()
        .map(|w| {
            format!(
                "\"{}\" means {:02}:00-{:02}:00",
                w.name, w.start_hour, w.end_hour
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Scheduling rules:\n\
         1. Strict non-overlap: no two tasks (new or existing) may have overlapping \
         times. Place a conflicting new task at the earliest available slot instead.\n\
         2. Date priority: a specific date (\"July 25th\") or relative date (\"next \
         Monday\") stated in the request always wins over the current date anchor.\n\
         3. Time interpretation: {windows}."
    )
}
