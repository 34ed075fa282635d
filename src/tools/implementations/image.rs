//! Image generation tool
//!
//! Optional capability backed by a hosted prediction API. The backend is
//! probed once at startup; when the probe fails the tool is never
//! registered.

use crate::config::ImageConfig;
use crate::errors::ToolError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 2048;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImageArgs {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_dimension() -> u32 {
    1024
}

fn default_style() -> String {
    "artistic".to_string()
}

/// Validated request handed to a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Backend output
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub urls: Vec<String>,
    pub prediction_id: Option<String>,
}

/// Image generation backend
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ToolError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

fn style_suffix(style: &str) -> Option<&'static str> {
    match style {
        "artistic" => Some("artistic, painterly, highly detailed"),
        "photorealistic" => Some("photorealistic, natural lighting, sharp focus"),
        "minimalist" => Some("minimalist, clean lines, simple composition"),
        "fantasy" => Some("fantasy art, epic scale, magical atmosphere"),
        "literary" => Some("book illustration, storybook style, soft palette"),
        _ => None,
    }
}

impl GenerateImageArgs {
    /// Validate and apply the style preset
    pub fn into_request(self) -> Result<ImageRequest, ToolError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ToolError::invalid_args(
                "generate_image",
                "prompt cannot be empty",
            ));
        }

        for (label, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(ToolError::invalid_args(
                    "generate_image",
                    format!(
                        "{} must be between {} and {}, got {}",
                        label, MIN_DIMENSION, MAX_DIMENSION, value
                    ),
                ));
            }
        }

        let suffix = style_suffix(&self.style).ok_or_else(|| {
            ToolError::invalid_args(
                "generate_image",
                format!("unknown style preset '{}'", self.style),
            )
        })?;

        Ok(ImageRequest {
            prompt: format!("{}, {}", prompt, suffix),
            negative_prompt: self.negative_prompt.filter(|n| !n.trim().is_empty()),
            width: self.width,
            height: self.height,
        })
    }
}

/// Run generate_image against a backend
///
/// Payload: `{prompt, style, width, height, images, prediction_id}`.
pub async fn generate_image(
    args: GenerateImageArgs,
    generator: &dyn ImageGenerator,
) -> Result<Value, ToolError> {
    let style = args.style.clone();
    let request = args.into_request()?;
    debug!(
        backend = generator.name(),
        width = request.width,
        height = request.height,
        "generating image"
    );

    let image = generator.generate(&request).await?;
    if image.urls.is_empty() {
        return Err(ToolError::ExecutionFault(
            "image backend returned no output".to_string(),
        ));
    }

    Ok(json!({
        "prompt": request.prompt,
        "style": style,
        "width": request.width,
        "height": request.height,
        "images": image.urls,
        "prediction_id": image.prediction_id,
    }))
}

/// Replicate prediction API client
#[derive(Debug, Clone)]
pub struct ReplicateImageGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ReplicateImageGenerator {
    pub fn new(
        base_url: &str,
        model: &str,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFault(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_token: api_token.into(),
        })
    }

    /// Probe configuration and credentials
    ///
    /// Returns `None` when the capability is disabled, the token variable is
    /// unset, or the client cannot be built.
    pub fn probe(config: &ImageConfig) -> Option<Self> {
        if !config.enabled {
            debug!("image generation disabled in configuration");
            return None;
        }

        let token = match std::env::var(&config.api_token_env) {
            Ok(token) if !token.trim().is_empty() => token,
            _ => {
                warn!(
                    env = %config.api_token_env,
                    "image generation enabled but no API token set, tool not registered"
                );
                return None;
            }
        };

        match Self::new(
            &config.base_url,
            &config.model,
            token,
            Duration::from_secs(config.timeout_sec),
        ) {
            Ok(generator) => {
                info!(model = %config.model, "image generation available");
                Some(generator)
            }
            Err(e) => {
                warn!(error = %e, "image backend unavailable");
                None
            }
        }
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/models/{}/predictions", self.base_url, self.model)
    }

    fn collect_urls(output: Option<Value>) -> Vec<String> {
        match output {
            Some(Value::String(url)) => vec![url],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl ImageGenerator for ReplicateImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ToolError> {
        let response = self
            .client
            .post(self.predictions_url())
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&json!({ "input": request }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFault(format!("image request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::ExecutionFault(format!(
                "image backend HTTP {}: {}",
                status, error_text
            )));
        }

        let prediction: PredictionResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFault(format!("failed to parse prediction: {}", e)))?;

        if let Some(error) = prediction.error.filter(|e| !e.is_null()) {
            return Err(ToolError::ExecutionFault(format!(
                "image generation failed: {}",
                error
            )));
        }

        match prediction.status.as_deref() {
            Some("succeeded") | None => {}
            Some(other) => {
                return Err(ToolError::ExecutionFault(format!(
                    "prediction did not complete (status: {})",
                    other
                )))
            }
        }

        Ok(GeneratedImage {
            urls: Self::collect_urls(prediction.output),
            prediction_id: prediction.id,
        })
    }

    fn name(&self) -> &str {
        "replicate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGenerator(Vec<String>);

    #[async_trait]
    impl ImageGenerator for FixedGenerator {
        async fn generate(&self, _request: &ImageRequest) -> Result<GeneratedImage, ToolError> {
            Ok(GeneratedImage {
                urls: self.0.clone(),
                prediction_id: Some("p-1".to_string()),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn args(prompt: &str) -> GenerateImageArgs {
        serde_json::from_value(json!({ "prompt": prompt })).unwrap()
    }

    #[test]
    fn test_defaults_and_style() {
        let request = args("a lighthouse").into_request().unwrap();
        assert_eq!(request.width, 1024);
        assert_eq!(request.height, 1024);
        assert!(request.prompt.starts_with("a lighthouse, "));
        assert!(request.prompt.contains("painterly"));
    }

    #[test]
    fn test_rejects_bad_dimensions_and_style() {
        let mut bad = args("x");
        bad.width = 10_000;
        assert!(bad.into_request().is_err());

        let mut bad = args("x");
        bad.style = "vaporwave".to_string();
        assert!(bad.into_request().is_err());

        assert!(args("  ").into_request().is_err());
    }

    #[tokio::test]
    async fn test_generate_image_payload() {
        let generator = FixedGenerator(vec!["https://img/1.png".to_string()]);
        let payload = generate_image(args("a fox"), &generator).await.unwrap();
        assert_eq!(payload["images"][0], "https://img/1.png");
        assert_eq!(payload["style"], "artistic");
        assert_eq!(payload["prediction_id"], "p-1");
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let generator = FixedGenerator(Vec::new());
        assert!(generate_image(args("a fox"), &generator).await.is_err());
    }

    #[test]
    fn test_probe_disabled() {
        let config = ImageConfig::default();
        assert!(ReplicateImageGenerator::probe(&config).is_none());
    }

    #[test]
    fn test_probe_without_token() {
        let config = ImageConfig {
            enabled: true,
            api_token_env: "GUARDHOUSE_TEST_UNSET_IMAGE_TOKEN".to_string(),
            ..ImageConfig::default()
        };
        assert!(ReplicateImageGenerator::probe(&config).is_none());
    }

    #[test]
    fn test_collect_urls() {
        assert_eq!(
            ReplicateImageGenerator::collect_urls(Some(json!("u"))),
            vec!["u".to_string()]
        );
        assert_eq!(
            ReplicateImageGenerator::collect_urls(Some(json!(["a", "b", 3]))),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(ReplicateImageGenerator::collect_urls(None).is_empty());
    }
}
