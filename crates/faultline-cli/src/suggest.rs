//! Remediation hints from an OpenAI-compatible chat-completions service.
//!
//! The collaborator is optional: without an API key configured there is no
//! client, and "no suggestion" is a normal outcome rather than an error.

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Suggestion service configuration.
#[derive(Debug, Clone)]
pub struct SuggestConfig {
    /// API base URL (`FAULTLINE_SUGGEST_URL`).
    pub base_url: String,
    /// Model name (`FAULTLINE_SUGGEST_MODEL`).
    pub model: String,
    /// Bearer token (`OPENAI_API_KEY`).
    pub api_key: String,
}

impl SuggestConfig {
    /// Read the configuration from the environment. `None` without an API
    /// key, which disables the collaborator entirely.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())?;
        Some(SuggestConfig {
            base_url: std::env::var("FAULTLINE_SUGGEST_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("FAULTLINE_SUGGEST_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Client for the suggestion service.
pub struct SuggestClient {
    config: SuggestConfig,
    http: reqwest::Client,
}

impl SuggestClient {
    pub fn new(config: SuggestConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("faultline/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");
        SuggestClient { config, http }
    }

    /// Client from environment configuration, if any.
    pub fn from_env() -> Option<Self> {
        SuggestConfig::from_env().map(Self::new)
    }

    /// Ask for a short remediation hint for the boundary revision.
    ///
    /// `Ok(None)` when the service has nothing to offer; transport and API
    /// failures are errors the caller may downgrade to "no suggestion".
    pub async fn suggest(
        &self,
        commit_message: &str,
        diff_text: &str,
    ) -> anyhow::Result<Option<String>> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(commit_message, diff_text),
            }],
        };
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("suggestion request failed")?
            .error_for_status()
            .context("suggestion service rejected the request")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("malformed suggestion response")?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

fn build_prompt(commit_message: &str, diff_text: &str) -> String {
    format!(
        "Below is the first bad commit that caused a test to fail.\n\
         Identify the change that caused the failure and give a short\n\
         suggestion on how to fix it.\n\n\
         Commit message:\n{commit_message}\n\n\
         Diff text:\n{diff_text}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_carries_message_and_diff() {
        let prompt = build_prompt("fix: things", "diff --git a/x b/x");
        assert!(prompt.contains("fix: things"));
        assert!(prompt.contains("diff --git a/x b/x"));
    }

    #[test]
    fn test_config_requires_api_key() {
        // Exercise both branches in one test; env mutation is process-wide.
        std::env::remove_var("OPENAI_API_KEY");
        assert!(SuggestConfig::from_env().is_none());

        std::env::set_var("OPENAI_API_KEY", "test-key");
        std::env::remove_var("FAULTLINE_SUGGEST_URL");
        std::env::remove_var("FAULTLINE_SUGGEST_MODEL");
        let config = SuggestConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{"choices":[{"message":{"content":"  try reverting the cast  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string());
        assert_eq!(text.as_deref(), Some("try reverting the cast"));
    }
}
