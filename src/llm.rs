//! Local LLM client for summarization and question answering.
//!
//! Calls a local Ollama instance's `/api/generate` endpoint with fixed prompt
//! templates. Model selection is a configuration value; output is returned
//! raw, without validation.
//!
//! Input content is truncated to `llm.prompt_budget` characters before being
//! placed into a template, so an oversized review can never blow up the
//! prompt. Transient HTTP failures retry with the same backoff policy as the
//! embedding client.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::LlmConfig;

/// Fixed response used when retrieval produces no usable context.
pub const NO_CONTEXT_ANSWER: &str = "No relevant information found.";

pub struct LlmClient {
    model: String,
    url: String,
    prompt_budget: usize,
    max_retries: u32,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.clone(),
            prompt_budget: config.prompt_budget,
            max_retries: config.max_retries,
            http,
        })
    }

    /// Summarize review content with the fixed summary template.
    pub async fn summarize(&self, content: &str) -> Result<String> {
        let prompt = summary_prompt(content, self.prompt_budget);
        self.generate(&prompt).await
    }

    /// Answer a question against retrieved context with the fixed Q&A
    /// template.
    pub async fn answer(&self, context: &str, question: &str) -> Result<String> {
        let prompt = answer_prompt(context, question);
        self.generate(&prompt).await
    }

    /// Send a raw prompt to the model and return its text output.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_generate_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "LLM connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM generation failed after retries")))
    }
}

/// Render the summary prompt, truncating content to the prompt budget.
fn summary_prompt(content: &str, budget: usize) -> String {
    format!(
        "Summarize the following content:\n\n{}",
        truncate_chars(content, budget)
    )
}

/// Render the question-answering prompt over retrieved context.
fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context, answer the question:\n\n{}\n\nQuestion: {}\nAnswer:",
        context, question
    )
}

/// Truncate to at most `max` characters on a `char` boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Parse the Ollama generate response JSON (`{"response": "..."}`).
fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid generate response: missing response field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_respects_budget() {
        let content = "r".repeat(4000);
        let prompt = summary_prompt(&content, 1000);
        let embedded = prompt.trim_start_matches("Summarize the following content:\n\n");
        assert_eq!(embedded.chars().count(), 1000);
    }

    #[test]
    fn test_summary_prompt_short_content_untouched() {
        let prompt = summary_prompt("A fine film.", 1000);
        assert!(prompt.ends_with("A fine film."));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "ñ".repeat(1500);
        let cut = truncate_chars(&text, 1000);
        assert_eq!(cut.chars().count(), 1000);
    }

    #[test]
    fn test_answer_prompt_shape() {
        let prompt = answer_prompt("some context", "is it good?");
        assert!(prompt.contains("some context"));
        assert!(prompt.contains("Question: is it good?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_parse_generate_response() {
        let json = serde_json::json!({"model": "stablelm2", "response": "A summary."});
        assert_eq!(parse_generate_response(&json).unwrap(), "A summary.");
    }

    #[test]
    fn test_parse_generate_response_missing_field() {
        let json = serde_json::json!({"model": "stablelm2"});
        assert!(parse_generate_response(&json).is_err());
    }
}
