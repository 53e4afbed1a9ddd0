//! Generation client for the natural-language-to-schedule backend.
//!
//! The backend is non-deterministic; calling it twice with the same prompt
//! must never be assumed to return the same result. No retries happen here —
//! retry policy belongs to the caller. [`ScheduleGenerator`] is the only seam
//! that talks to the outside world for generation, so tests substitute a
//! deterministic stub without touching the merge engine.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::GenerationError;
use crate::prompt::CompiledPrompt;
use crate::types::{ScheduleItem, TaskDuration};

/// One method, a closed set of typed failures. Any concrete backend slots in.
#[async_trait]
pub trait ScheduleGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &CompiledPrompt,
    ) -> Result<Vec<ScheduleItem>, GenerationError>;
}

/// One element of the generator's declared output schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    title: String,
    start_time: String,
    duration: String,
    #[serde(default)]
    flair_id: Option<String>,
}

/// Parse the backend's textual payload into schedule items.
///
/// The model is told to answer with bare JSON, but in practice it sometimes
/// wraps the array in Markdown code fencing or surrounding prose; both are
/// stripped before parsing.
pub fn parse_payload(text: &str) -> Result<Vec<ScheduleItem>, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let payload = extract_json_array(trimmed);
    let raw: Vec<RawTask> = serde_json::from_str(payload)
        .map_err(|e| GenerationError::Malformed(format!("not a schedule array: {e}")))?;

    raw.into_iter().map(convert_task).collect()
}

fn convert_task(raw: RawTask) -> Result<ScheduleItem, GenerationError> {
    let start_time = chrono::DateTime::parse_from_rfc3339(&raw.start_time)
        .map_err(|e| {
            GenerationError::Malformed(format!(
                "task {:?} has invalid startTime {:?}: {e}",
                raw.title, raw.start_time
            ))
        })?
        .to_utc();

    let duration: TaskDuration = raw.duration.parse().map_err(|_| {
        GenerationError::Malformed(format!(
            "task {:?} has invalid duration {:?}",
            raw.title, raw.duration
        ))
    })?;

    Ok(ScheduleItem {
        title: raw.title,
        start_time,
        duration,
        flair_id: raw.flair_id.filter(|id| !id.is_empty()),
    })
}

/// Strip Markdown code fencing and surrounding prose, leaving the JSON array.
fn extract_json_array(text: &str) -> &str {
    let mut s = text.trim();

    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json") up to the first newline, and the
        // closing fence if present.
        let rest = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
        s = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    // Prose-wrapped: keep the outermost bracketed span.
    if !s.starts_with('[') {
        if let (Some(open), Some(close)) = (s.find('['), s.rfind(']')) {
            if open < close {
                s = &s[open..=close];
            }
        }
    }

    s
}

// ---------------------------------------------------------------------------
// Gemini backend
// ---------------------------------------------------------------------------

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Generator backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Strict output schema sent with every request, mirroring the item wire
    /// shape. `title`, `startTime`, and `duration` are required; `flairId` is
    /// optional.
    fn response_schema() -> Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "startTime": { "type": "STRING", "format": "date-time" },
                    "duration": { "type": "STRING" },
                    "flairId": { "type": "STRING" }
                },
                "required": ["title", "startTime", "duration"]
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ScheduleGenerator for GeminiGenerator {
    async fn generate(
        &self,
        prompt: &CompiledPrompt,
    ) -> Result<Vec<ScheduleItem>, GenerationError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt.text }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::response_schema(),
            }
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Upstream(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream(format!(
                "generateContent returned {status}: {detail}"
            )));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(format!("invalid response envelope: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        log::debug!("gemini: {} chars of schedule payload", text.len());
        parse_payload(&text)
    }
}
