//! OpenAI-compatible capability client
//!
//! Talks to any endpoint exposing `/chat/completions` (with image inputs) and
//! `/embeddings`. One client serves every capability trait; it is built once
//! at startup from [`AiConfig`] and shared through `Arc` handles.
//!
//! # API Reference
//! - Chat: `POST {base_url}/chat/completions`
//! - Embeddings: `POST {base_url}/embeddings`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use snailtrack_common::config::AiConfig;
use tracing::debug;

use super::parsing::{parse_age_estimate, parse_analysis, parse_comparison};
use super::{
    AgeEstimate, AgeEstimator, CapabilityError, Comparison, EmbeddingGenerator, ImageAnalyzer,
    PairwiseComparator, SnailAnalysis,
};

const ANALYZE_PROMPT: &str = "You are helping a family track the snails in their garden. \
Look at this snail photo and identify: the likely species (common and scientific name if you can), \
whether it is a \"juvenile\", \"adult\" or \"old\" snail, a one or two sentence kid-friendly \
explanation of the age estimate (shell size, shine, wear, colour), your confidence in the age \
estimate (\"low\", \"medium\" or \"high\"), and a short list of distinctive visual features that \
would help recognise this individual again (bands, chips, scars, colouring). Respond only with JSON: \
{\"species\": \"...\", \"age\": \"juvenile|adult|old\", \"ageExplanation\": \"...\", \
\"ageConfidence\": \"low|medium|high\", \"distinctiveFeatures\": [\"...\"]}";

const ESTIMATE_AGE_PROMPT: &str = "You are helping kids track snails in their garden. Look at this \
snail photo and estimate if it is a \"juvenile\" (young/small), \"adult\" (medium/mature), or \"old\" \
(large/aged) snail. Give a kid-friendly explanation (1-2 sentences) mentioning shell size, shine, \
wear, or colour. Rate your confidence as \"low\", \"medium\", or \"high\". Respond only with JSON: \
{\"age\": \"juvenile|adult|old\", \"explanation\": \"...\", \"confidence\": \"low|medium|high\"}";

const COMPARE_PROMPT: &str = "Here are two snail photos. Decide whether they show the SAME \
individual snail, judging by shell banding, colour, shape, chips and other markings rather than \
by background or lighting. Respond only with JSON: {\"same\": true|false, \"confidence\": <0-100, \
how likely it is the same individual>, \"reasoning\": \"one short sentence\"}";

const ANALYZE_MAX_TOKENS: u32 = 400;
const ESTIMATE_MAX_TOKENS: u32 = 300;
const COMPARE_MAX_TOKENS: u32 = 200;

/// OpenAI-compatible client for every AI capability
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    vision_model: String,
    embedding_model: String,
}

// Request/response structs for the OpenAI-compatible API
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client. Fails with `NotConfigured` when no API key is set.
    pub fn new(config: &AiConfig) -> Result<Self, CapabilityError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CapabilityError::NotConfigured)?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CapabilityError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.base_url.clone(),
            vision_model: config.vision_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    /// Send a prompt plus images and return the raw reply text
    async fn chat_with_images(
        &self,
        prompt: &str,
        image_urls: &[&str],
        max_tokens: u32,
    ) -> Result<String, CapabilityError> {
        let mut content = vec![ContentPart::Text { text: prompt }];
        content.extend(image_urls.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: *url },
        }));

        let request = ChatRequest {
            model: &self.vision_model,
            messages: vec![Message {
                role: "user",
                content,
            }],
            max_tokens,
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.vision_model, images = image_urls.len(), "Sending chat request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let reply = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(reply_len = reply.len(), "Chat reply received");
        Ok(reply)
    }
}

#[async_trait]
impl ImageAnalyzer for OpenAiClient {
    async fn analyze_image(&self, image_url: &str) -> Result<SnailAnalysis, CapabilityError> {
        let reply = self
            .chat_with_images(ANALYZE_PROMPT, &[image_url], ANALYZE_MAX_TOKENS)
            .await?;
        Ok(parse_analysis(&reply))
    }
}

#[async_trait]
impl AgeEstimator for OpenAiClient {
    async fn estimate_age(&self, image_url: &str) -> Result<AgeEstimate, CapabilityError> {
        let reply = self
            .chat_with_images(ESTIMATE_AGE_PROMPT, &[image_url], ESTIMATE_MAX_TOKENS)
            .await?;
        Ok(parse_age_estimate(&reply))
    }
}

#[async_trait]
impl PairwiseComparator for OpenAiClient {
    async fn compare(&self, image_a: &str, image_b: &str) -> Result<Comparison, CapabilityError> {
        let reply = self
            .chat_with_images(COMPARE_PROMPT, &[image_a, image_b], COMPARE_MAX_TOKENS)
            .await?;
        Ok(parse_comparison(&reply))
    }
}

#[async_trait]
impl EmbeddingGenerator for OpenAiClient {
    /// Text embeddings stand in for image embeddings: the input is a short
    /// textual reference to the photo, not its pixels.
    async fn embed_image(&self, image_url: &str) -> Result<Vec<f32>, CapabilityError> {
        let input = format!("snail image at {}", image_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: &input,
        };

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Api { status, body });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CapabilityError::Parse("Embedding response contained no vector".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = AiConfig {
            api_key: None,
            ..AiConfig::default()
        };
        assert!(matches!(
            OpenAiClient::new(&config),
            Err(CapabilityError::NotConfigured)
        ));

        let blank = AiConfig {
            api_key: Some("   ".to_string()),
            ..AiConfig::default()
        };
        assert!(OpenAiClient::new(&blank).is_err());
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "compare" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: "https://a/1.jpg" },
                    },
                ],
            }],
            max_tokens: 10,
            temperature: 0.2,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "https://a/1.jpg"
        );
    }

    #[test]
    fn test_chat_response_tolerates_null_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
