//! Gemini image generation client.
//!
//! Implements [`ImageGenPort`] against the Google Generative Language REST
//! API. One request carries the reference image, the face image, and the
//! fixed compositing prompt, in that order, and expects a single inline PNG
//! back. Different API builds surface the candidate list either at the top
//! level or under a `response` wrapper; both shapes are parsed explicitly
//! and anything else fails loudly instead of silently yielding no image.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{GeneratedImage, ImageGenError, ImageGenPort, ImagePart};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model_id: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, model_id)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>, model_id: &str) -> Self {
        // Generation can take a while; generous timeout, no internal retry.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: model_id.to_string(),
        }
    }

    fn inline_part(image: &ImagePart) -> RequestPart {
        RequestPart::Inline {
            inline_data: InlineData {
                mime_type: image.mime.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            },
        }
    }
}

#[async_trait]
impl ImageGenPort for GeminiClient {
    async fn generate(
        &self,
        face: &ImagePart,
        reference: &ImagePart,
        prompt: &str,
    ) -> Result<GeneratedImage, ImageGenError> {
        // Fail before any request is attempted.
        let api_key = self.api_key.as_deref().ok_or(ImageGenError::MissingCredential)?;

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    Self::inline_part(reference),
                    Self::inline_part(face),
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
                response_mime_type: "image/png",
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_id
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ImageGenError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImageGenError::Upstream(format!("status {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ImageGenError::Upstream(e.to_string()))?;
        let image_base64 = extract_image_base64(&body)?;
        Ok(GeneratedImage {
            image_base64,
            model_id: self.model_id.clone(),
        })
    }
}

// =============================================================================
// Gemini API types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateContentResponse {
    /// Candidates at the top level.
    Direct(CandidateList),
    /// Candidates nested under a response wrapper.
    Wrapped { response: CandidateList },
}

impl GenerateContentResponse {
    fn candidates(self) -> Vec<Candidate> {
        match self {
            Self::Direct(list) => list.candidates,
            Self::Wrapped { response } => response.candidates,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CandidateList {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    data: Option<String>,
}

/// Pick the first part carrying inline image data under either response
/// shape. A shape we do not recognize is an error in its own right, kept
/// distinct from a recognized response that contains no image.
fn extract_image_base64(body: &str) -> Result<String, ImageGenError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ImageGenError::InvalidResponse(format!("unknown response shape: {e}")))?;

    parsed
        .candidates()
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.inline_data)
        .filter_map(|d| d.data)
        .find(|data| !data.is_empty())
        .ok_or(ImageGenError::NoImageProduced)
}
