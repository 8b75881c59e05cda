use std::fmt;
use std::str::FromStr;

use crate::engine::error::ConfigurationError;

/// Fixed brand style presets. The set is closed; each preset expands to a
/// long-form Environment / Lighting / Pose creative-direction fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrandStyle {
    Minimalist,
    Urban,
    Luxury,
    Pop,
}

impl BrandStyle {
    pub const ALL: [BrandStyle; 4] = [
        BrandStyle::Minimalist,
        BrandStyle::Urban,
        BrandStyle::Luxury,
        BrandStyle::Pop,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            BrandStyle::Minimalist => "Minimalist / Zara (Clean)",
            BrandStyle::Urban => "Urban / Streetwear (Hype)",
            BrandStyle::Luxury => "Luxury / Editorial (Vogue)",
            BrandStyle::Pop => "Pop / Fast Fashion (Bright)",
        }
    }

    pub fn prompt_fragment(self) -> &'static str {
        match self {
            BrandStyle::Minimalist => {
                "Environment: Infinite white cyclorama background, clean studio floor. \
                 Lighting: Softbox studio lighting, even illumination, neutral white balance, \
                 no harsh shadows. Pose: Neutral standing pose, arms relaxed, looking at camera, \
                 bored expression."
            }
            BrandStyle::Urban => {
                "Environment: Concrete wall, outdoor city street daytime, blurred depth. \
                 Lighting: Natural sunlight, slight hard shadow, high contrast. \
                 Pose: Candid walking motion, looking away, dynamic angle, streetwear aesthetic."
            }
            BrandStyle::Luxury => {
                "Environment: Dark grey textured backdrop, moody studio atmosphere. \
                 Lighting: Single spotlight, rim lighting on silhouette, dramatic contrast, \
                 warm tones. Pose: Sharp angular high-fashion pose, intense gaze, confident, \
                 elegant."
            }
            BrandStyle::Pop => {
                "Environment: Solid bright pastel color background (pink or yellow). \
                 Lighting: High-key lighting, overexposed brightness, vibrant colors. \
                 Pose: Cheerful, smiling, playful movement, hand on hip, energetic."
            }
        }
    }
}

impl fmt::Display for BrandStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BrandStyle {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "minimalist" => Ok(BrandStyle::Minimalist),
            "urban" => Ok(BrandStyle::Urban),
            "luxury" => Ok(BrandStyle::Luxury),
            "pop" => Ok(BrandStyle::Pop),
            _ => Err(ConfigurationError::UnknownStyle(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_style_expands_to_environment_lighting_pose_cues() {
        for style in BrandStyle::ALL {
            let fragment = style.prompt_fragment();
            assert!(!fragment.is_empty());
            assert!(fragment.contains("Environment:"), "{style} lacks environment");
            assert!(fragment.contains("Lighting:"), "{style} lacks lighting");
            assert!(fragment.contains("Pose:"), "{style} lacks pose");
        }
    }

    #[test]
    fn unknown_style_id_is_a_configuration_error() {
        let err = "vaporwave".parse::<BrandStyle>().unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownStyle(_)));
    }

    #[test]
    fn style_ids_parse_case_insensitively() {
        assert_eq!("Urban".parse::<BrandStyle>().unwrap(), BrandStyle::Urban);
        assert_eq!(" LUXURY ".parse::<BrandStyle>().unwrap(), BrandStyle::Luxury);
    }
}
