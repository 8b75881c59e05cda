use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::engine::clients::{
    GenerationResponse, ImageGenerationClient, ResponsePart, TextGenerationClient,
};
use crate::engine::error::TransportError;
use crate::llm::media::detect_mime_type;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const MAX_RETRY_ATTEMPTS: usize = 2;
const RETRY_BASE_DELAY_MS: u64 = 900;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn redact_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn transport_error_from(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(CONFIG.request_timeout_seconds)
    } else if err.is_connect() {
        TransportError::Connect(redact_api_key(&err.to_string()))
    } else {
        TransportError::Request(redact_api_key(&err.to_string()))
    }
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn build_safety_settings() -> Vec<Value> {
    let profile = CONFIG.gemini_safety_settings.as_str();
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

/// Prompt text first, then every reference image inline in order; the
/// composed prompt's "Image N" numbering relies on that order.
fn build_request_parts(prompt: &str, images: &[Vec<u8>]) -> Vec<Value> {
    let mut parts = vec![json!({ "text": prompt })];
    for image in images {
        let mime_type = detect_mime_type(image).unwrap_or_else(|| "image/png".to_string());
        let encoded = general_purpose::STANDARD.encode(image);
        parts.push(json!({
            "inlineData": {
                "mimeType": mime_type,
                "data": encoded
            }
        }));
    }
    parts
}

fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized = Vec::new();
        for content in contents {
            let parts: Vec<Value> = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .map(|part| {
                            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                                json!({ "text": truncate_for_log(text, 200) })
                            } else if let Some(inline) = part.get("inlineData") {
                                let mime = inline
                                    .get("mimeType")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("unknown");
                                let len = inline
                                    .get("data")
                                    .and_then(|v| v.as_str())
                                    .map(|v| v.len())
                                    .unwrap_or(0);
                                json!({ "inlineData": { "mimeType": mime, "dataLen": len } })
                            } else {
                                json!({ "unknownPart": true })
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            summarized.push(json!({ "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;

    for candidate in response.candidates.as_deref().unwrap_or(&[]) {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in content.parts.as_deref().unwrap_or(&[]) {
            match part {
                GeminiPart::Text { .. } => text_parts += 1,
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") {
                        image_parts += 1;
                    }
                }
            }
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|c| c.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts
    })
}

async fn call_gemini_api(
    model: &str,
    payload: Value,
    system_prompt_label: &str,
) -> Result<GeminiResponse, TransportError> {
    let client = get_http_client();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, CONFIG.gemini_api_key
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!(
            target: "llm.gemini",
            model = model,
            system_prompt = system_prompt_label,
            payload = %summarize_payload(&payload)
        );
    }

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let response = match client
            .post(&url)
            .timeout(Duration::from_secs(CONFIG.request_timeout_seconds))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let should_retry = should_retry_error(&err) && attempt < MAX_RETRY_ATTEMPTS;
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                    redact_api_key(&err.to_string()),
                    err.is_timeout(),
                    err.is_connect(),
                    should_retry
                );
                if should_retry {
                    tokio::time::sleep(retry_delay(attempt)).await;
                    continue;
                }
                return Err(transport_error_from(err));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            let should_retry = should_retry_status(status) && attempt < MAX_RETRY_ATTEMPTS;
            warn!(
                "Gemini API error: status={}, body={}, retrying={}",
                status, body_summary, should_retry
            );
            if should_retry {
                tokio::time::sleep(retry_delay(attempt)).await;
                continue;
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail: message.unwrap_or(body_summary),
            });
        }

        let value = response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| TransportError::InvalidResponse(redact_api_key(&err.to_string())))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = model, response = %summarize_response(&value));
        }
        return Ok(value);
    }
}

/// Flattens the provider-shaped candidates/content/parts nesting into the
/// engine's tagged parts. Inline data is base64 on the wire; bytes that do
/// not decode are passed through raw and resolved downstream.
fn response_parts(response: GeminiResponse) -> Vec<ResponsePart> {
    let mut parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts.unwrap_or_default() {
            match part {
                GeminiPart::Text { text } => {
                    if !text.trim().is_empty() {
                        parts.push(ResponsePart::Text(text));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if !inline_data.mime_type.starts_with("image/") {
                        continue;
                    }
                    match general_purpose::STANDARD.decode(inline_data.data.as_bytes()) {
                        Ok(bytes) => parts.push(ResponsePart::InlineImage(bytes)),
                        Err(_) => {
                            parts.push(ResponsePart::InlineImage(inline_data.data.into_bytes()))
                        }
                    }
                }
            }
        }
    }
    parts
}

fn joined_text(parts: &[ResponsePart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ResponsePart::Text(text) => Some(text.as_str()),
            ResponsePart::InlineImage(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gemini-backed implementation of both collaborator seams.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiClient;

impl GeminiClient {
    pub fn new() -> Self {
        GeminiClient
    }
}

#[async_trait]
impl ImageGenerationClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        images: &[Vec<u8>],
    ) -> Result<GenerationResponse, TransportError> {
        let system_instruction = if images.is_empty() {
            "Generate an image based on the prompt. CRITICAL: the response must be an image, NOT TEXT."
        } else {
            "Generate an image based on the prompt and the attached reference images. \
             CRITICAL: the response must be an image, NOT TEXT."
        };

        let payload = json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": build_request_parts(prompt, images) }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
            "safetySettings": build_safety_settings(),
        });

        let model = &CONFIG.gemini_image_model;
        log_llm_timing("gemini", model, "generate_image", None, || async {
            let response = call_gemini_api(model, payload, "image_generation_system_prompt").await?;
            Ok(GenerationResponse {
                parts: response_parts(response),
            })
        })
        .await
    }
}

#[async_trait]
impl TextGenerationClient for GeminiClient {
    async fn generate_json(
        &self,
        system_instruction: &str,
        user_text: &str,
        images: &[Vec<u8>],
    ) -> Result<String, TransportError> {
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": build_request_parts(user_text, images) }],
            "generationConfig": {
                "temperature": CONFIG.gemini_temperature,
                "topK": CONFIG.gemini_top_k,
                "topP": CONFIG.gemini_top_p,
                "maxOutputTokens": CONFIG.gemini_max_output_tokens,
                "responseMimeType": "application/json",
            },
            "safetySettings": build_safety_settings(),
        });

        let model = &CONFIG.gemini_text_model;
        log_llm_timing("gemini", model, "plan_shot_list", None, || async {
            let response = call_gemini_api(model, payload, "shot_list_system_prompt").await?;
            let text = joined_text(&response_parts(response));
            if text.trim().is_empty() {
                return Err(TransportError::InvalidResponse(
                    "no text parts in response".to_string(),
                ));
            }
            Ok(text)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_parts_flatten_into_tagged_union() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "caption" },
                        { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } },
                        { "inlineData": { "mimeType": "application/pdf", "data": "aGVsbG8=" } }
                    ]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let parts = response_parts(response);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], ResponsePart::Text("caption".to_string()));
        assert_eq!(parts[1], ResponsePart::InlineImage(b"hello".to_vec()));
    }

    #[test]
    fn empty_candidates_yield_no_parts() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(response_parts(response).is_empty());
    }

    #[test]
    fn request_parts_keep_text_first_and_image_order() {
        let parts = build_request_parts("the prompt", &[vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].get("text").unwrap().as_str(), Some("the prompt"));
        assert!(parts[1].get("inlineData").is_some());
        assert!(parts[2].get("inlineData").is_some());
    }
}
