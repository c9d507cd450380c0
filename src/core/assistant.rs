//! External text-generation backend for the chatbot.
//!
//! The chatbot talks to an [`Assistant`]. Production uses [`GeminiAssistant`],
//! which calls the Generative Language `generateContent` endpoint once per
//! question, synchronously and without retries.

use crate::{
    entities::ChatRole,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde_json::{Value, json};

/// One prior turn sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who said it
    pub role: ChatRole,
    /// What was said
    pub text: String,
}

/// Everything the model sees for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    /// Instructions plus the institution's transaction ledger
    pub system: String,
    /// Prior conversation, oldest first, ending with the new question
    pub turns: Vec<Turn>,
}

impl AssistantRequest {
    /// Total characters in the request, used for context budgeting.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.system.chars().count()
            + self
                .turns
                .iter()
                .map(|t| t.text.chars().count())
                .sum::<usize>()
    }
}

/// A text-generation backend.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Produces the model's reply to the last turn of `request`.
    async fn generate(&self, request: &AssistantRequest) -> Result<String>;
}

/// Client for the Generative Language API.
pub struct GeminiAssistant {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiAssistant {
    /// Creates a client. Without an API key every call fails with [`Error::Assistant`].
    #[must_use]
    pub fn new(api_base: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }
}

/// Builds the JSON body for a `generateContent` call.
#[must_use]
pub fn request_body(request: &AssistantRequest) -> Value {
    let contents: Vec<Value> = request
        .turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.text }] })
        })
        .collect();

    json!({
        "systemInstruction": { "parts": [{ "text": request.system }] },
        "contents": contents,
    })
}

/// Pulls the reply text out of a `generateContent` response.
pub fn extract_reply(response: &Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| Error::Assistant {
            message: "response contained no candidates".to_string(),
        })?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();
    if text.trim().is_empty() {
        return Err(Error::Assistant {
            message: "response contained no text".to_string(),
        });
    }
    Ok(text)
}

#[async_trait]
impl Assistant for GeminiAssistant {
    async fn generate(&self, request: &AssistantRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| Error::Assistant {
            message: "no API key configured".to_string(),
        })?;

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| Error::Assistant {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Assistant {
                message: format!("upstream returned {status}: {body}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Assistant {
            message: format!("invalid response body: {e}"),
        })?;
        extract_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn request() -> AssistantRequest {
        AssistantRequest {
            system: "You answer questions about City finances.".to_string(),
            turns: vec![
                Turn {
                    role: ChatRole::User,
                    text: "How much went to Roads?".to_string(),
                },
                Turn {
                    role: ChatRole::Model,
                    text: "$1,000.".to_string(),
                },
                Turn {
                    role: ChatRole::User,
                    text: "And Parks?".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body(&request());
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You answer questions about City finances."
        );
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "And Parks?");
    }

    #[test]
    fn test_extract_reply() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Parks got " }, { "text": "$300." }] } }]
        });
        assert_eq!(extract_reply(&response).unwrap(), "Parks got $300.");
    }

    #[test]
    fn test_extract_reply_errors() {
        assert!(matches!(
            extract_reply(&json!({ "candidates": [] })),
            Err(Error::Assistant { .. })
        ));
        assert!(matches!(
            extract_reply(&json!({ "candidates": [{ "content": { "parts": [{ "text": " " }] } }] })),
            Err(Error::Assistant { .. })
        ));
    }

    #[test]
    fn test_char_len() {
        let req = request();
        assert_eq!(
            req.char_len(),
            req.system.len() + "How much went to Roads?".len() + "$1,000.".len() + "And Parks?".len()
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_assistant_error() {
        let assistant = GeminiAssistant::new(
            "http://127.0.0.1:9".to_string(),
            "test-model".to_string(),
            None,
        );
        let result = assistant.generate(&request()).await;
        assert!(matches!(result, Err(Error::Assistant { .. })));
    }
}
