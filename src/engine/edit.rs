//! Prompt builders for the two secondary transforms: instruction-based remix
//! of an existing shot and accessory insertion into an existing shot.

/// Prompt for a localized remix of an existing generated image. Pose,
/// composition and lighting are preserved unless the instruction says
/// otherwise.
pub fn remix(base_description: &str, edit_instruction: &str) -> String {
    format!(
        "STRICT INSTRUCTION: Image Editing / Remix. \
         Base Context: {base_description}. \
         User Edit Request: {edit_instruction}. \
         Constraints: 1. KEEP the original Pose, Composition, and Lighting structure unless \
         explicitly told to change it. \
         2. Apply the user's edit naturally into the scene. \
         3. Maintain high photorealism and 4k quality. \
         Output: A final composited e-commerce shot."
    )
}

/// Prompt for compositing a named accessory into an existing generated image
/// without touching the model's identity or the garment.
pub fn insert_accessory(base_description: &str, accessory_description: &str) -> String {
    format!(
        "STRICT INSTRUCTION: Image Editing / Object Insertion. \
         Base Context: {base_description}. \
         Task: Add the following accessory to the model: {accessory_description}. \
         Requirements: 1. The accessory must look photorealistic and chemically bonded to the \
         image (lighting, shadows, reflections). \
         2. DO NOT change the Model's face or the original garment. \
         3. High Fidelity Texture: Ensure gold looks like gold, leather looks like leather. \
         Output: A final composited e-commerce shot."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remix_preserves_pose_and_applies_requested_change() {
        let prompt = remix("High fashion portrait", "make the dress red");
        assert!(prompt.contains("Base Context: High fashion portrait."));
        assert!(prompt.contains("User Edit Request: make the dress red."));
        assert!(prompt.contains("KEEP the original Pose, Composition, and Lighting"));
        assert!(prompt.contains("photorealism"));
    }

    #[test]
    fn accessory_insertion_protects_identity_and_emphasizes_materials() {
        let prompt = insert_accessory("Existing fashion shoot", "gold chunky necklace");
        assert!(prompt.contains("Add the following accessory to the model: gold chunky necklace."));
        assert!(prompt.contains("DO NOT change the Model's face or the original garment."));
        assert!(prompt.contains("gold looks like gold, leather looks like leather"));
    }
}
