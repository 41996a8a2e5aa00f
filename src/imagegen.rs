use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

const SYSTEM_PROMPT: &str = "You are a professional fashion and textile image generation assistant. \
Your task is to create ultra-realistic outfit mockups that look like real studio product photos. \
Rules: \
1. The garment should always maintain natural folds, shadows, and lighting consistency. \
2. Apply the requested color and fabric realistically. \
3. Overlay the print design in the correct scale and position. \
4. Add the logo on the correct chest area per the requested placement. \
5. The result must NOT look cartoonish, painted, or AI-generated. \
6. Output a clean, eCommerce-ready garment photo with a neutral background.";

pub struct InlineImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.bytes)
        )
    }
}

#[derive(Default)]
pub struct GenerationAttributes {
    pub description: Option<String>,
    pub color_html_code: Option<String>,
    pub fabric: Option<String>,
    pub print_scale_preset: Option<String>,
    pub logo_placement: Option<String>,
    pub render_size: Option<String>,
}

/// Everything the proxy forwards: the base garment image, optional print
/// design and logo, and the free-text attributes.
pub struct GenerationRequest {
    pub base_image: InlineImage,
    pub print_image: Option<InlineImage>,
    pub logo_image: Option<InlineImage>,
    pub attributes: GenerationAttributes,
}

/// Build the user-facing prompt sentence by sentence. Image ordinals follow
/// the order the images are attached: base first, then print, then logo.
pub fn assemble_prompt(request: &GenerationRequest) -> String {
    let attrs = &request.attributes;
    let mut parts = vec![
        "Generate a high-quality, photorealistic clothing mockup image.".to_string(),
        "Use the first image as the base outfit image.".to_string(),
    ];
    if let Some(fabric) = &attrs.fabric {
        parts.push(format!("Apply fabric texture: {fabric}."));
    }
    if let Some(color) = &attrs.color_html_code {
        parts.push(format!("Set the main garment color to: {color}."));
    }
    if request.print_image.is_some() {
        if let Some(scale) = &attrs.print_scale_preset {
            parts.push(format!(
                "Overlay the second image as print design ({scale} scale) on the front."
            ));
        } else {
            parts.push("Overlay the second image as print design on the front.".to_string());
        }
    }
    if request.logo_image.is_some() {
        if let Some(placement) = &attrs.logo_placement {
            parts.push(format!(
                "Place the next image as logo on the {placement} chest area."
            ));
        } else {
            parts.push("Place the next image as logo on the chest area.".to_string());
        }
    }
    if let Some(description) = &attrs.description {
        parts.push(format!("Design description: {description}."));
    }
    if let Some(size) = &attrs.render_size {
        parts.push(format!(
            "Render size: {size}. Use realistic lighting, true fabric texture, \
             and professional fashion photography style."
        ));
    }
    parts.join(" ")
}

/// Remote image generation behind a trait so the provider can be swapped
/// without touching the request handler.
#[async_trait]
pub trait ImageGenerator: Send + Sync + 'static {
    /// Returns the raw bytes of the generated image.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>>;
}

pub struct OpenAiImages {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiImages {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_image_model.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not configured"))?;

        let mut content = vec![ContentPart::Text {
            text: assemble_prompt(request),
        }];
        content.push(ContentPart::Image {
            image_url: request.base_image.to_data_url(),
        });
        if let Some(print) = &request.print_image {
            content.push(ContentPart::Image {
                image_url: print.to_data_url(),
            });
        }
        if let Some(logo) = &request.logo_image {
            content.push(ContentPart::Image {
                image_url: logo.to_data_url(),
            });
        }

        let payload = ResponsesRequest {
            model: &self.model,
            input: vec![
                InputMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                InputMessage {
                    role: "user",
                    content: MessageContent::Parts(content),
                },
            ],
            tools: vec![Tool {
                kind: "image_generation",
            }],
        };

        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .context("image generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "image generation request rejected");
            bail!("image generation failed with status {status}");
        }

        let parsed: ResponsesResponse = response
            .json()
            .await
            .context("failed to parse image generation response")?;

        let encoded = parsed
            .output
            .into_iter()
            .find(|item| item.kind == "image_generation_call")
            .and_then(|item| item.result)
            .ok_or_else(|| anyhow!("image generation returned no image output"))?;

        BASE64
            .decode(encoded.as_bytes())
            .context("image generation returned invalid base64")
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    tools: Vec<Tool<'a>>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "input_text")]
    Text { text: String },
    #[serde(rename = "input_image")]
    Image { image_url: String },
}

#[derive(Serialize)]
struct Tool<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct ResponsesResponse {
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    result: Option<String>,
}
