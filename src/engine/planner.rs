use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::engine::clients::TextGenerationClient;
use crate::engine::types::{PlanOutcome, ShotBrief};

/// Segments shorter than this (trimmed) are treated as noise left over from
/// splitting on shot markers, not real shot descriptions.
const SHOT_SEGMENT_MIN_CHARS: usize = 20;

/// Upper bound on shots per campaign regardless of how many ideas the brief
/// contains.
pub const SHOT_COUNT_CAP: usize = 8;

pub const FALLBACK_VARIATION_SUFFIX: &str =
    "DYNAMIC VARIATION: side profile / walking motion / active stance";
pub const FALLBACK_DETAIL_SUFFIX: &str =
    "DETAIL SHOT: close-up / alternative angle / texture focus";

static SHOT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)shot\s*\d+").expect("valid shot marker regex"));

fn shot_list_system_instruction(min_count: usize) -> String {
    format!(
        "You are an art director planning a fashion photo shoot. Break the creative brief \
         into distinct shots.\n\
         Rules:\n\
         1. Produce at least {min_count} shots. If the brief contains more than {min_count} \
         distinct ideas, produce one shot per idea, up to a maximum of {SHOT_COUNT_CAP}.\n\
         2. Every shot must use a different camera angle and a different pose.\n\
         3. The same model and the same apparel appear in every shot.\n\
         4. Respond with ONLY a JSON array of objects of the form \
         {{\"title\": string, \"description\": string}}. No prose, no markdown."
    )
}

#[derive(Debug, Deserialize)]
struct PlannedShot {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
}

/// Decomposes a creative brief into an ordered shot list.
///
/// Resolution order: structured `Shot N` markers in the brief win when they
/// yield at least two usable segments; otherwise the text collaborator is
/// asked for a JSON shot list; any failure there degrades to a deterministic
/// three-entry list. A collaborator outage never fails the session.
pub async fn plan(
    client: &dyn TextGenerationClient,
    brief: &str,
    moodboard: Option<&[u8]>,
    min_count: usize,
) -> PlanOutcome {
    if let Some(shots) = split_structured_brief(brief) {
        debug!(
            "Structured brief fast path produced {} shot(s)",
            shots.len()
        );
        return PlanOutcome {
            shots,
            degraded: false,
        };
    }

    let system_instruction = shot_list_system_instruction(min_count.max(1));
    let images: Vec<Vec<u8>> = moodboard.map(|bytes| bytes.to_vec()).into_iter().collect();

    match client
        .generate_json(&system_instruction, brief, &images)
        .await
    {
        Ok(raw) => match parse_shot_list(&raw, min_count.max(1)) {
            Some(shots) => {
                return PlanOutcome {
                    shots,
                    degraded: false,
                }
            }
            None => warn!(
                "Shot list response failed validation; using deterministic fallback plan"
            ),
        },
        Err(err) => warn!("Shot list generation failed: {err}; using deterministic fallback plan"),
    }

    PlanOutcome {
        shots: fallback_shots(brief),
        degraded: true,
    }
}

/// Structured-brief fast path: split on `Shot N` markers and keep each
/// non-trivial segment as one shot, in encounter order. Returns None when
/// fewer than two usable segments result.
fn split_structured_brief(brief: &str) -> Option<Vec<ShotBrief>> {
    let lowered = brief.to_lowercase();
    if !(lowered.contains("shot 1") && lowered.contains("shot 2")) {
        return None;
    }

    let mut shots = Vec::new();
    for segment in SHOT_MARKER_RE.split(brief) {
        let trimmed = segment.trim();
        if trimmed.chars().count() <= SHOT_SEGMENT_MIN_CHARS {
            continue;
        }
        let description = trimmed.trim_start_matches([':', '-', '.']).trim();
        if description.is_empty() {
            continue;
        }
        shots.push(ShotBrief::new(shots.len(), None, description.to_string()));
        if shots.len() == SHOT_COUNT_CAP {
            break;
        }
    }

    if shots.len() >= 2 {
        Some(shots)
    } else {
        None
    }
}

/// Parses the collaborator's JSON shot list, tolerating code-fence wrapping.
/// Returns None unless at least `min_count` entries carry a non-empty
/// description.
fn parse_shot_list(raw: &str, min_count: usize) -> Option<Vec<ShotBrief>> {
    let unfenced = strip_code_fences(raw);
    let parsed: Vec<PlannedShot> = serde_json::from_str(&unfenced).ok()?;

    let mut shots = Vec::new();
    for entry in parsed {
        let description = entry.description.trim();
        if description.is_empty() {
            continue;
        }
        let title = entry
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string);
        shots.push(ShotBrief::new(shots.len(), title, description.to_string()));
        if shots.len() == SHOT_COUNT_CAP {
            break;
        }
    }

    if shots.len() >= min_count {
        Some(shots)
    } else {
        None
    }
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(stripped) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let stripped = stripped
        .strip_prefix("json")
        .or_else(|| stripped.strip_prefix("JSON"))
        .unwrap_or(stripped);
    let stripped = stripped.trim();
    stripped
        .strip_suffix("```")
        .unwrap_or(stripped)
        .trim()
        .to_string()
}

/// Deterministic plan used when the collaborator is unavailable or returns
/// unusable output: the brief as-is plus two fixed variations.
fn fallback_shots(brief: &str) -> Vec<ShotBrief> {
    vec![
        ShotBrief::new(0, None, brief.to_string()),
        ShotBrief::new(1, None, format!("{brief} {FALLBACK_VARIATION_SUFFIX}")),
        ShotBrief::new(2, None, format!("{brief} {FALLBACK_DETAIL_SUFFIX}")),
    ]
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::engine::error::TransportError;

    struct CannedClient {
        response: Result<String, ()>,
    }

    #[async_trait]
    impl TextGenerationClient for CannedClient {
        async fn generate_json(
            &self,
            _system_instruction: &str,
            _user_text: &str,
            _images: &[Vec<u8>],
        ) -> Result<String, TransportError> {
            self.response
                .clone()
                .map_err(|_| TransportError::Connect("refused".to_string()))
        }
    }

    fn failing_client() -> CannedClient {
        CannedClient { response: Err(()) }
    }

    #[tokio::test]
    async fn structured_brief_markers_take_precedence_over_llm_path() {
        // The collaborator always fails here, so a non-degraded result proves
        // the structural path never reached it.
        let outcome = plan(
            &failing_client(),
            "Shot 1: red dress on beach. Shot 2: red dress at night.",
            None,
            3,
        )
        .await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.shots.len(), 2);
        assert!(outcome.shots[0].description.contains("red dress on beach"));
        assert!(outcome.shots[1].description.contains("red dress at night"));
        assert_eq!(outcome.shots[0].index, 0);
        assert_eq!(outcome.shots[1].index, 1);
    }

    #[tokio::test]
    async fn collaborator_failure_degrades_to_three_entry_fallback() {
        let brief = "High fashion portrait, moody lighting";
        let outcome = plan(&failing_client(), brief, None, 3).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.shots.len(), 3);
        assert_eq!(outcome.shots[0].description, brief);
        assert!(outcome.shots[1].description.contains("DYNAMIC VARIATION"));
        assert!(outcome.shots[2].description.contains("DETAIL SHOT"));
    }

    #[tokio::test]
    async fn valid_json_response_is_accepted_with_titles() {
        let client = CannedClient {
            response: Ok(r#"[
                {"title": "Opener", "description": "Full body, golden hour"},
                {"title": "Motion", "description": "Walking toward camera"},
                {"title": "Detail", "description": "Close-up on fabric"}
            ]"#
            .to_string()),
        };
        let outcome = plan(&client, "golden hour editorial", None, 3).await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.shots.len(), 3);
        assert_eq!(outcome.shots[0].title.as_deref(), Some("Opener"));
        assert_eq!(outcome.shots[2].description, "Close-up on fabric");
    }

    #[tokio::test]
    async fn fenced_json_response_is_unwrapped_before_parsing() {
        let client = CannedClient {
            response: Ok("```json\n[{\"title\": \"A\", \"description\": \"one shot idea\"}, \
                          {\"title\": \"B\", \"description\": \"another shot idea\"}, \
                          {\"title\": \"C\", \"description\": \"third shot idea\"}]\n```"
                .to_string()),
        };
        let outcome = plan(&client, "brief", None, 3).await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.shots.len(), 3);
    }

    #[tokio::test]
    async fn too_few_usable_entries_degrades_to_fallback() {
        let client = CannedClient {
            response: Ok(r#"[{"title": "A", "description": ""}, {"description": "only one"}]"#
                .to_string()),
        };
        let outcome = plan(&client, "brief", None, 3).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.shots.len(), 3);
    }

    #[tokio::test]
    async fn shot_list_is_capped_even_when_collaborator_overdelivers() {
        let entries: Vec<String> = (0..12)
            .map(|i| format!("{{\"description\": \"shot idea number {i}\"}}"))
            .collect();
        let client = CannedClient {
            response: Ok(format!("[{}]", entries.join(","))),
        };
        let outcome = plan(&client, "brief", None, 3).await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.shots.len(), SHOT_COUNT_CAP);
    }

    #[test]
    fn short_marker_segments_fall_through_to_other_paths() {
        assert!(split_structured_brief("Shot 1: a. Shot 2: b.").is_none());
        assert!(split_structured_brief("no markers at all in this brief").is_none());
    }
}
