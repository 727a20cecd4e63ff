/// Vision-language client for an OpenAI-compatible multimodal chat API.
///
/// Images are sent inline as base64 data URIs. Descriptions come back as
/// plain text; classification verdicts come back as a small JSON object the
/// model is prompted to emit, tolerating the code fences chat models like to
/// wrap JSON in.
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::application::providers::{
    DirectClassification, GeneratedText, ProviderError, ProviderResult, VisionModel,
};
use crate::domain::value_objects::{Category, DescriptionType};

/// Connection settings for the vision service
#[derive(Debug, Clone)]
pub struct VisionClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl VisionClientConfig {
    /// Reads `VISION_API_KEY`, and optionally `VISION_BASE_URL` and
    /// `VISION_MODEL`, from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("VISION_API_KEY")
            .map_err(|_| anyhow::anyhow!("VISION_API_KEY is not set"))?;
        let base_url = std::env::var("VISION_BASE_URL")
            .unwrap_or_else(|_| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string());
        let model = std::env::var("VISION_MODEL").unwrap_or_else(|_| "qwen-vl-plus".to_string());
        Ok(VisionClientConfig {
            base_url,
            api_key,
            model,
            request_timeout: Duration::from_secs(60),
        })
    }
}

pub struct DashScopeVision {
    client: reqwest::Client,
    config: VisionClientConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct VerdictJson {
    category: String,
    confidence: f32,
}

impl DashScopeVision {
    pub fn new(config: VisionClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(DashScopeVision { client, config })
    }

    fn describe_prompt(description_type: DescriptionType) -> &'static str {
        match description_type {
            DescriptionType::Basic => {
                "Describe this image in one or two plain sentences: what it shows, \
                 the main subject, and the setting."
            }
            DescriptionType::Detailed => {
                "Describe this image thoroughly: every visible object, their spatial \
                 arrangement, colors, textures, and any text or symbols."
            }
            DescriptionType::Emotional => {
                "Describe the mood and atmosphere of this image: the feelings it \
                 evokes, its emotional tone, and what creates that impression."
            }
            DescriptionType::Technical => {
                "Describe this image in photographic terms: composition, lighting, \
                 focus, color palette, perspective, and apparent capture conditions."
            }
        }
    }

    async fn image_data_uri(&self, image_path: &Path) -> ProviderResult<String> {
        let bytes = tokio::fs::read(image_path).await?;
        let mime = match image_path.extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };
        Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }

    async fn chat(&self, image_path: &Path, prompt: &str) -> ProviderResult<String> {
        let data_uri = self.image_data_uri(image_path).await?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Malformed chat response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("Chat response had no choices".into()))
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(Duration::from_secs(60))
    } else if error.is_connect() {
        ProviderError::Unreachable(error.to_string())
    } else {
        ProviderError::InvalidResponse(error.to_string())
    }
}

/// Chat models often wrap JSON in markdown fences; strip them before parsing.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn parse_verdict(content: &str, categories: &[Category]) -> ProviderResult<DirectClassification> {
    let verdict: VerdictJson = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| ProviderError::InvalidResponse(format!("Unparseable verdict: {}", e)))?;

    let name = verdict.category.trim().to_lowercase();
    let category = categories
        .iter()
        .find(|c| c.as_str() == name)
        .cloned()
        .ok_or_else(|| {
            ProviderError::InvalidResponse(format!("Model chose unknown category: {}", name))
        })?;

    Ok(DirectClassification {
        category,
        confidence: verdict.confidence.clamp(0.0, 1.0),
    })
}

#[async_trait]
impl VisionModel for DashScopeVision {
    async fn describe(
        &self,
        image_path: &Path,
        description_type: DescriptionType,
    ) -> ProviderResult<GeneratedText> {
        debug!(%description_type, path = %image_path.display(), "Requesting description");
        let text = self
            .chat(image_path, Self::describe_prompt(description_type))
            .await?;

        // Chat completions carry no token-level confidence; a fixed value
        // keeps downstream weighting neutral across angles.
        Ok(GeneratedText {
            text,
            confidence: 0.9,
        })
    }

    async fn classify(
        &self,
        image_path: &Path,
        categories: &[Category],
    ) -> ProviderResult<DirectClassification> {
        let names: Vec<&str> = categories.iter().map(Category::as_str).collect();
        let prompt = format!(
            "Classify this image into exactly one of these categories: {}. \
             Respond with only a JSON object of the form \
             {{\"category\": \"<name>\", \"confidence\": <0.0-1.0>}}.",
            names.join(", ")
        );

        let content = self.chat(image_path, &prompt).await?;
        parse_verdict(&content, categories)
    }

    async fn health(&self) -> ProviderResult<()> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Api {
                status: status.as_u16(),
                message: "health probe rejected".into(),
            })
        }
    }
}
