use async_trait::async_trait;

use crate::engine::error::TransportError;

/// One part of a generation response, decoded once at the adapter boundary
/// so the engine never inspects provider-shaped payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    InlineImage(Vec<u8>),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    pub parts: Vec<ResponsePart>,
}

/// Multimodal image-generation collaborator. Treated as unreliable: it may
/// error, time out, or answer with no image part at all.
#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        images: &[Vec<u8>],
    ) -> Result<GenerationResponse, TransportError>;
}

/// Text-generation collaborator used by the shot-list planner. `images`
/// carries the optional moodboard; the response is expected to be JSON.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate_json(
        &self,
        system_instruction: &str,
        user_text: &str,
        images: &[Vec<u8>],
    ) -> Result<String, TransportError>;
}
