use chrono::Utc;
use tracing::{info, warn};

use crate::engine::clients::{GenerationResponse, ImageGenerationClient, ResponsePart};
use crate::engine::error::{ConfigurationError, GenerationError};
use crate::engine::prompt::{self, AspectRatio};
use crate::engine::styles::BrandStyle;
use crate::engine::types::{
    ComposedPrompt, GeneratedArtifact, ReferenceImageSet, ReferenceRole, ShotBrief,
};

pub type ShotResult = (ShotBrief, Result<GeneratedArtifact, GenerationError>);

/// Runs one generation call per shot, in index order.
///
/// Shots are independent units of work: one shot's failure is recorded in
/// its slot and never aborts the siblings. Apparel is mandatory for the main
/// shoot; its absence is a configuration error raised before any call.
pub async fn generate_shots(
    client: &dyn ImageGenerationClient,
    shots: &[ShotBrief],
    references: &ReferenceImageSet,
    style: BrandStyle,
    aspect_ratio: AspectRatio,
    location_override: bool,
) -> Result<Vec<ShotResult>, ConfigurationError> {
    if references.apparel.is_none() {
        return Err(ConfigurationError::MissingReference(ReferenceRole::Apparel));
    }

    let payload = references.ordered_payload();
    let roles: Vec<ReferenceRole> = payload.iter().map(|(role, _)| *role).collect();
    let images: Vec<Vec<u8>> = payload.iter().map(|(_, bytes)| bytes.to_vec()).collect();

    let mut results = Vec::with_capacity(shots.len());
    for shot in shots {
        let outcome = generate_single_shot(
            client,
            shot,
            &roles,
            &images,
            style,
            aspect_ratio,
            location_override,
        )
        .await;
        match &outcome {
            Ok(_) => info!("Shot {} generated", shot.index + 1),
            Err(err) => warn!("Shot {} failed: {err}", shot.index + 1),
        }
        results.push((shot.clone(), outcome));
    }

    Ok(results)
}

async fn generate_single_shot(
    client: &dyn ImageGenerationClient,
    shot: &ShotBrief,
    roles: &[ReferenceRole],
    images: &[Vec<u8>],
    style: BrandStyle,
    aspect_ratio: AspectRatio,
    location_override: bool,
) -> Result<GeneratedArtifact, GenerationError> {
    if shot.description.trim().is_empty() {
        return Err(GenerationError::EmptyBrief { index: shot.index });
    }

    let prompt = prompt::compose(
        &shot.description,
        style,
        aspect_ratio,
        location_override,
        roles,
    );

    let response = client
        .generate(prompt.as_str(), images)
        .await
        .map_err(|source| GenerationError::Transport {
            index: shot.index,
            source,
        })?;

    artifact_from_response(shot.index, prompt, response)
}

/// Extracts and normalizes the first inline image of a generation response.
/// A text part carrying a URL where an image was expected is the soft
/// failure "link returned instead of image", distinct from a plain miss.
pub fn artifact_from_response(
    index: usize,
    prompt: ComposedPrompt,
    response: GenerationResponse,
) -> Result<GeneratedArtifact, GenerationError> {
    let mut link: Option<String> = None;

    for part in response.parts {
        match part {
            ResponsePart::InlineImage(data) => {
                let decoded = crate::llm::media::decode_inline_payload(&data).map_err(|err| {
                    GenerationError::Decode {
                        index,
                        detail: err.to_string(),
                    }
                })?;
                let normalized =
                    crate::llm::media::normalize_artifact_png(&decoded).map_err(|err| {
                        GenerationError::Decode {
                            index,
                            detail: err.to_string(),
                        }
                    })?;
                return Ok(GeneratedArtifact {
                    prompt_text: prompt.into_string(),
                    image_bytes: normalized,
                    created_at: Utc::now(),
                });
            }
            ResponsePart::Text(text) => {
                if link.is_none() && text.contains("http") {
                    link = Some(text.trim().to_string());
                }
            }
        }
    }

    match link {
        Some(url) => Err(GenerationError::LinkInsteadOfImage { index, url }),
        None => Err(GenerationError::NoImage { index }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

    use super::*;
    use crate::engine::error::TransportError;

    fn sample_png() -> Vec<u8> {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, Rgb([200, 10, 10]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn image_response() -> GenerationResponse {
        GenerationResponse {
            parts: vec![
                ResponsePart::Text("here is your shot".to_string()),
                ResponsePart::InlineImage(sample_png()),
            ],
        }
    }

    struct ScriptedClient {
        script: Mutex<VecDeque<Result<GenerationResponse, TransportError>>>,
        prompts: Mutex<Vec<String>>,
        image_counts: Mutex<Vec<usize>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<GenerationResponse, TransportError>>) -> Self {
            ScriptedClient {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
                image_counts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageGenerationClient for ScriptedClient {
        async fn generate(
            &self,
            prompt: &str,
            images: &[Vec<u8>],
        ) -> Result<GenerationResponse, TransportError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.image_counts.lock().unwrap().push(images.len());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra generation call")
        }
    }

    fn shots(descriptions: &[&str]) -> Vec<ShotBrief> {
        descriptions
            .iter()
            .enumerate()
            .map(|(index, text)| ShotBrief::new(index, None, text.to_string()))
            .collect()
    }

    fn full_references() -> ReferenceImageSet {
        ReferenceImageSet {
            model_face: Some(sample_png()),
            model_body: Some(sample_png()),
            apparel: Some(sample_png()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn one_failing_shot_does_not_block_siblings() {
        let client = ScriptedClient::new(vec![
            Ok(image_response()),
            Err(TransportError::Timeout(90)),
            Ok(image_response()),
        ]);
        let results = generate_shots(
            &client,
            &shots(&["first", "second", "third"]),
            &full_references(),
            BrandStyle::Minimalist,
            AspectRatio::Square,
            false,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(results[2].1.is_ok());
        let err = results[1].1.as_ref().unwrap_err();
        assert_eq!(err.shot_index(), 1);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_apparel_is_a_configuration_error_before_any_call() {
        let client = ScriptedClient::new(vec![]);
        let references = ReferenceImageSet {
            model_face: Some(sample_png()),
            ..Default::default()
        };
        let err = generate_shots(
            &client,
            &shots(&["only shot"]),
            &references,
            BrandStyle::Urban,
            AspectRatio::Square,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::MissingReference(ReferenceRole::Apparel)
        ));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_numbering_matches_attached_image_order() {
        let client = ScriptedClient::new(vec![Ok(image_response())]);
        let results = generate_shots(
            &client,
            &shots(&["hero shot"]),
            &full_references(),
            BrandStyle::Luxury,
            AspectRatio::Portrait,
            false,
        )
        .await
        .unwrap();
        assert!(results[0].1.is_ok());

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("- Image 1: MODEL FACE REF."));
        assert!(prompts[0].contains("- Image 2: MODEL BODY REF."));
        assert!(prompts[0].contains("- Image 3: APPAREL REF."));
        assert_eq!(client.image_counts.lock().unwrap()[0], 3);
    }

    #[tokio::test]
    async fn link_in_text_part_is_a_distinct_soft_failure() {
        let response = GenerationResponse {
            parts: vec![ResponsePart::Text(
                "your render: https://example.com/render.png".to_string(),
            )],
        };
        let client = ScriptedClient::new(vec![Ok(response)]);
        let results = generate_shots(
            &client,
            &shots(&["one shot"]),
            &full_references(),
            BrandStyle::Pop,
            AspectRatio::Square,
            false,
        )
        .await
        .unwrap();

        assert!(matches!(
            results[0].1.as_ref().unwrap_err(),
            GenerationError::LinkInsteadOfImage { index: 0, .. }
        ));
    }

    #[tokio::test]
    async fn empty_response_reports_no_image() {
        let client = ScriptedClient::new(vec![Ok(GenerationResponse::default())]);
        let results = generate_shots(
            &client,
            &shots(&["one shot"]),
            &full_references(),
            BrandStyle::Pop,
            AspectRatio::Square,
            false,
        )
        .await
        .unwrap();

        assert!(matches!(
            results[0].1.as_ref().unwrap_err(),
            GenerationError::NoImage { index: 0 }
        ));
    }

    #[tokio::test]
    async fn empty_brief_is_skipped_without_calling_collaborator() {
        let client = ScriptedClient::new(vec![Ok(image_response())]);
        let results = generate_shots(
            &client,
            &shots(&["   ", "real shot"]),
            &full_references(),
            BrandStyle::Urban,
            AspectRatio::Landscape,
            false,
        )
        .await
        .unwrap();

        assert!(matches!(
            results[0].1.as_ref().unwrap_err(),
            GenerationError::EmptyBrief { index: 0 }
        ));
        assert!(results[1].1.is_ok());
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn base64_inline_data_is_accepted_transparently() {
        use base64::{engine::general_purpose, Engine as _};

        let png = sample_png();
        let as_base64 = GenerationResponse {
            parts: vec![ResponsePart::InlineImage(
                general_purpose::STANDARD.encode(&png).into_bytes(),
            )],
        };
        let as_raw = GenerationResponse {
            parts: vec![ResponsePart::InlineImage(png)],
        };

        let prompt = ComposedPrompt::new("p".to_string());
        let from_base64 = artifact_from_response(0, prompt.clone(), as_base64).unwrap();
        let from_raw = artifact_from_response(0, prompt, as_raw).unwrap();
        assert_eq!(from_base64.image_bytes, from_raw.image_bytes);
    }
}
