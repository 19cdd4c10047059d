// Amazon Bedrock runtime client

use std::fmt;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::config::Credentials;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;

use super::{ImageInvoker, InvokeError, InvokeRequest, InvokeResponse};
use crate::error::GenerateError;
use crate::models::AppConfig;

pub const MODEL_ID_VAR: &str = "MODEL_ID";
pub const REGION_VAR: &str = "AWS_REGION";
pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";
pub const ENDPOINT_VAR: &str = "BEDROCK_ENDPOINT_URL";

#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Everything needed to build a Bedrock client. Captured once, never reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedrockSettings {
    pub model_id: String,
    pub region: String,
    /// `None` falls back to the SDK's default provider chain
    pub credentials: Option<StaticCredentials>,
    pub endpoint_url: Option<String>,
}

impl BedrockSettings {
    /// Resolve settings from the config file, letting `lookup` (normally the
    /// process environment) override individual values.
    pub fn resolve<F>(config: &AppConfig, lookup: F) -> Result<Self, GenerateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let model_id = var(MODEL_ID_VAR).unwrap_or_else(|| config.model_id.clone());
        let region = var(REGION_VAR).unwrap_or_else(|| config.region.clone());
        let endpoint_url = var(ENDPOINT_VAR).or_else(|| config.endpoint_url.clone());

        let credentials = match (var(ACCESS_KEY_VAR), var(SECRET_KEY_VAR)) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: var(SESSION_TOKEN_VAR),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(GenerateError::Configuration(format!(
                    "{ACCESS_KEY_VAR} is set but {SECRET_KEY_VAR} is missing"
                )))
            }
            (None, Some(_)) => {
                return Err(GenerateError::Configuration(format!(
                    "{SECRET_KEY_VAR} is set but {ACCESS_KEY_VAR} is missing"
                )))
            }
        };

        let settings = Self {
            model_id,
            region,
            credentials,
            endpoint_url,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.region.trim().is_empty() {
            return Err(GenerateError::Configuration("region is empty".to_string()));
        }
        if self.model_id.trim().is_empty() {
            return Err(GenerateError::Configuration("model id is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BedrockInvoker {
    client: Client,
    region: String,
}

impl BedrockInvoker {
    pub async fn connect(settings: &BedrockSettings) -> Result<Self, GenerateError> {
        settings.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));

        if let Some(creds) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                creds.session_token.clone(),
                None,
                "promptshot",
            ));
        }

        if let Some(url) = &settings.endpoint_url {
            loader = loader.endpoint_url(url.clone());
        }

        let sdk_config = loader.load().await;
        log::info!(
            "Bedrock client ready (region: {}, static credentials: {})",
            settings.region,
            settings.credentials.is_some()
        );

        Ok(Self {
            client: Client::new(&sdk_config),
            region: settings.region.clone(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl ImageInvoker for BedrockInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        log::debug!(
            "Invoking model {} ({} byte body)",
            request.model_id,
            request.body.len()
        );

        let output = self
            .client
            .invoke_model()
            .model_id(&request.model_id)
            .content_type(&request.content_type)
            .accept(&request.accept)
            .body(Blob::new(request.body.clone()))
            .send()
            .await
            .map_err(|e| {
                let message = e
                    .as_service_error()
                    .and_then(|se| se.message())
                    .map_or_else(|| DisplayErrorContext(&e).to_string(), str::to_string);
                log::warn!("Model invocation failed: {}", DisplayErrorContext(&e));
                InvokeError::new(message)
            })?;

        log::debug!("Successfully invoked model {}", request.model_id);

        Ok(InvokeResponse {
            body: output.body.into_inner(),
        })
    }

    fn backend_name(&self) -> &str {
        "AWS Bedrock"
    }
}
