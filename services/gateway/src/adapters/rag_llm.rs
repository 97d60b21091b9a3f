//! services/gateway/src/adapters/rag_llm.rs
//!
//! This module contains the adapter for retrieval-augmented answers.
//! It implements the `RetrievalGenerationService` port by calling the model's
//! `generateContent` endpoint with a file-search tool bound to the store.

use async_trait::async_trait;
use file_search_core::{PortError, PortResult, RetrievalGenerationService};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::gemini::GeminiClient;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    file_search: FileSearchTool<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileSearchTool<'a> {
    file_search_store_names: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn answer(self) -> PortResult<String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(PortError::RemoteOperationFailed(format!(
                "The model returned no answer ({})",
                reason
            )));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Ok(text)
    }
}

pub struct GeminiRagAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiRagAdapter {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl RetrievalGenerationService for GeminiRagAdapter {
    async fn generate(&self, store_id: &str, prompt: &str) -> PortResult<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: prompt }],
            }],
            tools: vec![Tool {
                file_search: FileSearchTool {
                    file_search_store_names: vec![store_id],
                },
            }],
        };

        let url = self
            .client
            .api_url(&format!("models/{}:generateContent", self.model));
        let request = self.client.http().post(url).json(&body);
        let response: GenerateResponse = self.client.send_json(request).await?;

        let answer = response.answer()?;
        if answer.is_empty() {
            warn!("Model {} returned an empty answer", self.model);
        }
        debug!(chars = answer.len(), "Received generated answer");
        Ok(answer)
    }
}
