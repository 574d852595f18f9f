//! OpenAI-backed text and image generation.
//!
//! Image acquisition is a two-step protocol: the API returns a URL to a
//! freshly-generated PNG, and the client downloads and verifies it before
//! handing the bytes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const TEXT_MODEL: &str = "gpt-4o-mini";
const IMAGE_MODEL: &str = "dall-e-3";

/// A generated image downloaded from the generation API
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the single completion produced for the prompt. The opaque
    /// user id is forwarded for upstream abuse tracking.
    async fn generate_text(&self, prompt: &str, opaque_user_id: &str) -> Result<String>;

    /// Generates a single 1024x1024 PNG for the prompt and downloads its
    /// bytes.
    async fn generate_image(&self, prompt: &str, opaque_user_id: &str) -> Result<GeneratedImage>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        // Image generation routinely takes tens of seconds.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to create HTTP client");
        Self { client, api_key }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    user: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
    response_format: &'a str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Distinguishes a prompt rejection from any other API failure. A 400 of
/// type `invalid_request_error` means the prompt itself was refused; the
/// original client-facing message is preserved for the audit trail.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::BAD_REQUEST {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
            if parsed.error.error_type == "invalid_request_error" {
                return Err(Error::Rejected(parsed.error.message));
            }
        }
    }
    Err(Error::Transport(format!(
        "generation API error ({status}): {body}"
    )))
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate_text(&self, prompt: &str, opaque_user_id: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: TEXT_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            user: opaque_user_id,
        };
        let response = self
            .client
            .post(format!("{OPENAI_BASE_URL}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_response(response).await?;

        let completion: ChatCompletionResponse = response.json().await?;
        if completion.choices.len() != 1 {
            return Err(Error::Transport(format!(
                "expected 1 completion choice from the generation API; got {}",
                completion.choices.len()
            )));
        }
        let text = completion.choices.into_iter().next().expect("one choice");
        debug!(prompt = %prompt, "text generation complete");
        Ok(text.message.content)
    }

    async fn generate_image(&self, prompt: &str, opaque_user_id: &str) -> Result<GeneratedImage> {
        // This request blocks until the image is ready.
        let request = ImageGenerationRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: "1024x1024",
            quality: "standard",
            style: "vivid",
            response_format: "url",
            user: opaque_user_id,
        };
        let response = self
            .client
            .post(format!("{OPENAI_BASE_URL}/images/generations"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_response(response).await?;

        let generated: ImageGenerationResponse = response.json().await?;
        if generated.data.len() != 1 {
            return Err(Error::Transport(format!(
                "expected 1 result image from the generation API; got {}",
                generated.data.len()
            )));
        }
        let url = &generated.data[0].url;
        info!("image generation complete; downloading result");
        self.fetch_image_data(url).await
    }
}

impl OpenAiClient {
    /// Downloads the API-hosted PNG so it can be stored permanently.
    async fn fetch_image_data(&self, url: &str) -> Result<GeneratedImage> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Transport(format!(
                "got status {status} from request for generated image"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type != "image/png" {
            return Err(Error::Transport(format!(
                "got unexpected content-type '{content_type}' for generated image"
            )));
        }

        let data = response.bytes().await?.to_vec();
        Ok(GeneratedImage {
            content_type,
            data,
        })
    }
}
