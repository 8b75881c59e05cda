use std::fmt;
use std::str::FromStr;

use crate::engine::error::ConfigurationError;
use crate::engine::styles::BrandStyle;
use crate::engine::types::{ComposedPrompt, ReferenceRole};

/// Camera/quality boilerplate prefixed to every composed prompt.
pub const MASTER_BASE_PROMPT: &str =
    "Professional e-commerce fashion photography, wide shot, rule of thirds composition. \
     Framing: Model is centered with visible headroom above and floor space below. \
     Anatomy: Anatomically correct proportions, natural human height, realistic body structure. \
     Camera: Shot on Phase One XF IQ4, 100MP, 50mm lens (eye-level angle), f/8 aperture. \
     Quality: 4k native resolution, hyper-realistic, uncompressed, sharp details. \
     Cloth Physics: Clothing must drape naturally over the body, respecting gravity and fabric \
     weight. Avoid rigid or floating textures. Realistic seam interaction with the pose.";

/// Exclusion clause appended to every composed prompt.
pub const NEGATIVE_PROMPT: &str =
    "elongated body, stretched torso, long neck, unnatural height, distorted proportions, \
     alien anatomy, cinematic lighting, dramatic shadows, artistic blur, bokeh, messy background, \
     illustration, painting, 3d render, low contrast, grain, noise, watermark, text.";

/// Literal directive that lets an attached location photo take precedence
/// over the style preset's baked-in environment.
pub const LOCATION_OVERRIDE_DIRECTIVE: &str =
    "IGNORE STYLE ENVIRONMENT. USE LOCATION IMAGE BACKGROUND.";

/// Fixed precedence order for the visual-mapping section. Numbering follows
/// this order and must match the order images are attached to the request.
const MAPPING_ROLE_ORDER: [ReferenceRole; 4] = [
    ReferenceRole::ModelFace,
    ReferenceRole::ModelBody,
    ReferenceRole::Apparel,
    ReferenceRole::Location,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "1:1" | "square" => Ok(AspectRatio::Square),
            "16:9" | "landscape" => Ok(AspectRatio::Landscape),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait),
            _ => Err(ConfigurationError::UnknownAspectRatio(value.to_string())),
        }
    }
}

fn mapping_instruction(role: ReferenceRole) -> &'static str {
    match role {
        ReferenceRole::ModelFace => {
            "MODEL FACE REF. PRIORITY: CRITICAL IDENTITY PRESERVATION. The output face must be \
             indistinguishable from this reference. Strict carbon-copy. Do NOT 'beautify', \
             'optimize', or 'average' the features. Maintain exact eye shape, nose structure, \
             and facial landmarks."
        }
        ReferenceRole::ModelBody => {
            "MODEL BODY REF. Use this for body proportions and pose. Ensure natural anatomical \
             connection to the head."
        }
        ReferenceRole::Apparel => {
            "APPAREL REF. PRIORITY: TEXTURE & CUT FIDELITY. However, the FIT must be realistic. \
             The fabric should fold, crease, and hang according to the model's pose and gravity. \
             Do not make it look like a sticker. It must wrap around the 3D form."
        }
        ReferenceRole::Location => {
            "LOCATION REF. Use this background. Integrate the subject with matching lighting \
             and shadows."
        }
        // Accessory and moodboard references never appear in the main shoot
        // mapping; edit payloads describe them in their own prompt text.
        ReferenceRole::Accessory | ReferenceRole::Moodboard => "",
    }
}

/// Builds the final structured prompt for one shot.
///
/// The visual-mapping numbering is strictly positional over the attached
/// roles: "Image 2" in the text is always the second image in the payload.
pub fn compose(
    subject: &str,
    style: BrandStyle,
    aspect_ratio: AspectRatio,
    location_override: bool,
    attached_roles: &[ReferenceRole],
) -> ComposedPrompt {
    let mut style_text = style.prompt_fragment().to_string();
    if location_override {
        style_text.push(' ');
        style_text.push_str(LOCATION_OVERRIDE_DIRECTIVE);
    }

    let mut text = format!(
        "STRICT INSTRUCTION: {MASTER_BASE_PROMPT} Aspect Ratio: {aspect_ratio}. \
         Subject: {subject}. Style Guide: {style_text} Exclude: {NEGATIVE_PROMPT}"
    );

    if !attached_roles.is_empty() {
        text.push_str("\n\nVISUAL MAPPING:");
        let mut image_number = 1;
        for role in MAPPING_ROLE_ORDER {
            if !attached_roles.contains(&role) {
                continue;
            }
            text.push_str(&format!(
                "\n- Image {image_number}: {}",
                mapping_instruction(role)
            ));
            image_number += 1;
        }

        text.push_str("\n\nFINAL INSTRUCTION: NATURAL CONSISTENCY ALL THE TIME.");
        text.push_str("\n1. The Reference Face MUST match the Output Face.");
        text.push_str("\n2. The Reference Apparel MUST match the Output Apparel.");
        text.push_str("\n3. Lighting must be coherent across Model, Clothes, and Background.");
    }

    ComposedPrompt::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn boilerplate_and_negative_clause_appear_exactly_once() {
        for aspect in [AspectRatio::Square, AspectRatio::Landscape, AspectRatio::Portrait] {
            for style in BrandStyle::ALL {
                let prompt = compose("red dress", style, aspect, false, &[]);
                assert_eq!(occurrences(prompt.as_str(), MASTER_BASE_PROMPT), 1);
                assert_eq!(occurrences(prompt.as_str(), NEGATIVE_PROMPT), 1);
            }
        }
    }

    #[test]
    fn location_override_directive_present_exactly_once_when_enabled() {
        let with = compose(
            "red dress",
            BrandStyle::Urban,
            AspectRatio::Square,
            true,
            &[],
        );
        assert_eq!(occurrences(with.as_str(), LOCATION_OVERRIDE_DIRECTIVE), 1);

        let without = compose(
            "red dress",
            BrandStyle::Urban,
            AspectRatio::Square,
            false,
            &[],
        );
        assert_eq!(occurrences(without.as_str(), LOCATION_OVERRIDE_DIRECTIVE), 0);
    }

    #[test]
    fn visual_mapping_numbering_is_positional_and_contiguous() {
        let prompt = compose(
            "red dress",
            BrandStyle::Minimalist,
            AspectRatio::Portrait,
            false,
            &[ReferenceRole::ModelFace, ReferenceRole::Apparel],
        );
        let text = prompt.as_str();
        assert!(text.contains("- Image 1: MODEL FACE REF."));
        assert!(text.contains("- Image 2: APPAREL REF."));
        assert!(!text.contains("- Image 3:"));
    }

    #[test]
    fn full_reference_set_numbers_all_four_roles_in_order() {
        let prompt = compose(
            "red dress",
            BrandStyle::Luxury,
            AspectRatio::Square,
            true,
            &[
                ReferenceRole::ModelFace,
                ReferenceRole::ModelBody,
                ReferenceRole::Apparel,
                ReferenceRole::Location,
            ],
        );
        let text = prompt.as_str();
        assert!(text.contains("- Image 1: MODEL FACE REF."));
        assert!(text.contains("- Image 2: MODEL BODY REF."));
        assert!(text.contains("- Image 3: APPAREL REF."));
        assert!(text.contains("- Image 4: LOCATION REF."));
    }

    #[test]
    fn consistency_checklist_only_present_with_references() {
        let bare = compose(
            "red dress",
            BrandStyle::Pop,
            AspectRatio::Square,
            false,
            &[],
        );
        assert!(!bare.as_str().contains("VISUAL MAPPING:"));
        assert!(!bare.as_str().contains("FINAL INSTRUCTION:"));

        let mapped = compose(
            "red dress",
            BrandStyle::Pop,
            AspectRatio::Square,
            false,
            &[ReferenceRole::Apparel],
        );
        assert!(mapped.as_str().contains("VISUAL MAPPING:"));
        assert!(mapped
            .as_str()
            .contains("FINAL INSTRUCTION: NATURAL CONSISTENCY ALL THE TIME."));
        assert!(mapped
            .as_str()
            .contains("3. Lighting must be coherent across Model, Clothes, and Background."));
    }

    #[test]
    fn aspect_ratio_parses_both_ratio_and_word_forms() {
        assert_eq!("1:1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert_eq!(
            "landscape".parse::<AspectRatio>().unwrap(),
            AspectRatio::Landscape
        );
        assert!(matches!(
            "4:3".parse::<AspectRatio>().unwrap_err(),
            ConfigurationError::UnknownAspectRatio(_)
        ));
    }
}
