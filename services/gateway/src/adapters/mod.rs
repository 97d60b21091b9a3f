pub mod credentials;
pub mod gemini;
pub mod rag_llm;

pub use credentials::JsonCredentialStore;
pub use gemini::{GeminiClient, GeminiFileSearchAdapter};
pub use rag_llm::GeminiRagAdapter;
