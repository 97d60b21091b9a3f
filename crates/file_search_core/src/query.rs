//! crates/file_search_core/src/query.rs
//!
//! Retrieval-augmented questions against the bound store.

use std::sync::Arc;

use tracing::info;

use crate::ports::{PortError, PortResult, RetrievalGenerationService};
use crate::store::RemoteStoreHandle;

pub struct QueryGateway {
    store: Arc<RemoteStoreHandle>,
    generator: Arc<dyn RetrievalGenerationService>,
    instruction_prefix: Option<String>,
}

impl QueryGateway {
    pub fn new(
        store: Arc<RemoteStoreHandle>,
        generator: Arc<dyn RetrievalGenerationService>,
        instruction_prefix: Option<String>,
    ) -> Self {
        Self {
            store,
            generator,
            instruction_prefix: instruction_prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Answers `question` from the documents of the bound store. A blank
    /// question is refused before anything is sent.
    pub async fn ask(&self, question: &str) -> PortResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PortError::Validation(
                "question is missing or empty".to_string(),
            ));
        }
        let store = self.store.require()?;

        info!("Question: {}", question);
        let prompt = compose_prompt(self.instruction_prefix.as_deref(), question);
        self.generator.generate(&store.id, &prompt).await
    }
}

/// `prefix + "\n" + question`, or the question alone without a prefix.
pub fn compose_prompt(prefix: Option<&str>, question: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}\n{}", prefix, question),
        _ => question.to_string(),
    }
}
