use std::fmt;

use chrono::{DateTime, Utc};

/// Role a reference image plays in a generation call. Ordering of the
/// model/apparel/location roles mirrors the order images are attached to the
/// request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceRole {
    ModelFace,
    ModelBody,
    Apparel,
    Location,
    Accessory,
    Moodboard,
}

impl ReferenceRole {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceRole::ModelFace => "model face",
            ReferenceRole::ModelBody => "model body",
            ReferenceRole::Apparel => "apparel",
            ReferenceRole::Location => "location",
            ReferenceRole::Accessory => "accessory",
            ReferenceRole::Moodboard => "moodboard",
        }
    }
}

impl fmt::Display for ReferenceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded reference images for one generation session.
///
/// `model_legacy` holds the single-image form older model records carry; the
/// split face/body slots take precedence over it whenever either is present.
#[derive(Debug, Clone, Default)]
pub struct ReferenceImageSet {
    pub model_face: Option<Vec<u8>>,
    pub model_body: Option<Vec<u8>>,
    pub model_legacy: Option<Vec<u8>>,
    pub apparel: Option<Vec<u8>>,
    pub location: Option<Vec<u8>>,
    pub accessory: Option<Vec<u8>>,
    pub moodboard: Option<Vec<u8>>,
}

impl ReferenceImageSet {
    /// Ordered (role, bytes) payload for the main shoot call: face, body,
    /// apparel, location. A legacy model image stands in for the body slot
    /// only when neither split slot is populated.
    pub fn ordered_payload(&self) -> Vec<(ReferenceRole, &[u8])> {
        let mut payload: Vec<(ReferenceRole, &[u8])> = Vec::new();
        if self.model_face.is_some() || self.model_body.is_some() {
            if let Some(face) = self.model_face.as_deref() {
                payload.push((ReferenceRole::ModelFace, face));
            }
            if let Some(body) = self.model_body.as_deref() {
                payload.push((ReferenceRole::ModelBody, body));
            }
        } else if let Some(legacy) = self.model_legacy.as_deref() {
            payload.push((ReferenceRole::ModelBody, legacy));
        }
        if let Some(apparel) = self.apparel.as_deref() {
            payload.push((ReferenceRole::Apparel, apparel));
        }
        if let Some(location) = self.location.as_deref() {
            payload.push((ReferenceRole::Location, location));
        }
        payload
    }
}

/// One planned camera setup within a campaign. Produced by the planner as a
/// proposal; the caller owns the list and may edit entries before generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotBrief {
    pub index: usize,
    pub title: Option<String>,
    pub description: String,
}

impl ShotBrief {
    pub fn new(index: usize, title: Option<String>, description: String) -> Self {
        ShotBrief {
            index,
            title,
            description,
        }
    }
}

/// Final prompt string handed to the image-generation collaborator. Built
/// fresh per shot, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt(String);

impl ComposedPrompt {
    pub fn new(text: String) -> Self {
        ComposedPrompt(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ComposedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated image together with the prompt that produced it. Ownership
/// passes to the artifact store right after generation.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub prompt_text: String,
    pub image_bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Planner result. `degraded` is true when the deterministic fallback was
/// used instead of the LLM path, so callers can tell the user the plan is
/// heuristic rather than AI-assisted.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub shots: Vec<ShotBrief>,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_roles_win_over_legacy_model_image() {
        let refs = ReferenceImageSet {
            model_face: Some(vec![1]),
            model_body: Some(vec![2]),
            model_legacy: Some(vec![9]),
            apparel: Some(vec![3]),
            ..Default::default()
        };
        let roles: Vec<ReferenceRole> = refs.ordered_payload().iter().map(|(r, _)| *r).collect();
        assert_eq!(
            roles,
            vec![
                ReferenceRole::ModelFace,
                ReferenceRole::ModelBody,
                ReferenceRole::Apparel
            ]
        );
    }

    #[test]
    fn legacy_model_image_fills_body_slot_when_split_absent() {
        let refs = ReferenceImageSet {
            model_legacy: Some(vec![9]),
            apparel: Some(vec![3]),
            location: Some(vec![4]),
            ..Default::default()
        };
        let payload = refs.ordered_payload();
        assert_eq!(payload[0].0, ReferenceRole::ModelBody);
        assert_eq!(payload[0].1, &[9]);
        assert_eq!(payload[1].0, ReferenceRole::Apparel);
        assert_eq!(payload[2].0, ReferenceRole::Location);
    }
}
