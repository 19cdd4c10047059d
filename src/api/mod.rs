// Invocation collaborator: wire types and the client seam

pub mod bedrock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerateError;
use crate::models::{GenerationParams, Quality};

pub use bedrock::{BedrockInvoker, BedrockSettings};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A single model invocation, as handed to the collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub model_id: String,
    pub content_type: String,
    pub accept: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InvokeError {
    pub message: String,
}

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns a request payload into a raw model response
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageInvoker: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError>;

    /// Short label for the status line, e.g. "AWS Bedrock"
    fn backend_name(&self) -> &str {
        "remote"
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    TextImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageParams<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationConfig {
    pub cfg_scale: f32,
    pub seed: u32,
    pub quality: Quality,
    pub width: u32,
    pub height: u32,
    pub number_of_images: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageBody<'a> {
    pub task_type: TaskType,
    pub text_to_image_params: TextToImageParams<'a>,
    pub image_generation_config: ImageGenerationConfig,
}

impl<'a> TextToImageBody<'a> {
    pub fn new(prompt: &'a str, params: &'a GenerationParams) -> Self {
        Self {
            task_type: TaskType::TextImage,
            text_to_image_params: TextToImageParams {
                text: prompt,
                negative_text: params.negative_text.as_deref(),
            },
            image_generation_config: ImageGenerationConfig {
                cfg_scale: params.cfg_scale,
                seed: params.seed,
                quality: params.quality,
                width: params.width,
                height: params.height,
                number_of_images: params.number_of_images,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageResponseBody {
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InvokeRequest {
    pub fn text_to_image(
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Self, GenerateError> {
        let body = serde_json::to_vec(&TextToImageBody::new(prompt, params))
            .map_err(|e| GenerateError::Encoding(e.to_string()))?;

        Ok(Self {
            model_id: model_id.to_string(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            accept: JSON_CONTENT_TYPE.to_string(),
            body,
        })
    }
}

impl InvokeResponse {
    /// Decode the body and return the first base64 image
    pub fn first_image(&self) -> Result<String, GenerateError> {
        let text = std::str::from_utf8(&self.body)
            .map_err(|e| GenerateError::MalformedResponse(format!("body is not UTF-8: {e}")))?;

        let parsed: ImageResponseBody = serde_json::from_str(text)
            .map_err(|e| GenerateError::MalformedResponse(format!("body is not valid JSON: {e}")))?;

        if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
            return Err(GenerateError::Service(error));
        }

        parsed
            .images
            .and_then(|images| images.into_iter().next())
            .ok_or_else(|| GenerateError::MalformedResponse("no images returned".to_string()))
    }
}
