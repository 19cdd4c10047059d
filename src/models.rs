use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MODEL_ID: &str = "amazon.titan-image-generator-v1";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    Premium,
}

/// Knobs forwarded to the model's `imageGenerationConfig` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationParams {
    pub cfg_scale: f32,
    pub seed: u32,
    pub quality: Quality,
    pub width: u32,
    pub height: u32,
    pub number_of_images: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_text: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            cfg_scale: 8.0,
            seed: 0,
            quality: Quality::Standard,
            width: 1024,
            height: 1024,
            number_of_images: 1,
            negative_text: None,
        }
    }
}

/// Base64 image payload as returned by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub base64: String,
}

impl GeneratedImage {
    pub const fn new(base64: String) -> Self {
        Self { base64 }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.base64.trim())
    }

    /// Width and height read from the PNG IHDR chunk, if the payload is a PNG
    pub fn png_dimensions(&self) -> Option<(u32, u32)> {
        const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

        let bytes = self.bytes().ok()?;
        if bytes.len() < 24 || !bytes.starts_with(SIGNATURE) || &bytes[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
        let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
        Some((width, height))
    }
}

/// Metadata saved next to every generated image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: Uuid,
    pub prompt: String,
    pub model_id: String,
    pub params: GenerationParams,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub size_bytes: usize,
}

impl ImageRecord {
    pub fn new(prompt: String, model_id: String, params: GenerationParams, size_bytes: usize) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            prompt,
            model_id,
            params,
            created_at: Utc::now(),
            file_name: format!("{id}.png"),
            size_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub generation: GenerationParams,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: default_region(),
            endpoint_url: None,
            output_dir: None,
            generation: GenerationParams::default(),
        }
    }
}
