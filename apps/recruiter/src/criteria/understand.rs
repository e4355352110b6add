use async_trait::async_trait;
use serde_json::Value;

use super::{prompts, SearchCriteria};
use crate::llm_client::{LlmClient, LlmError};

/// Loosely typed output of the language-understanding step, fed to the normalizer.
pub type StructuredQuery = Value;

/// What the understanding step may know about the conversation so far.
#[derive(Debug, Clone, Default)]
pub struct UnderstandContext {
    pub previous_criteria: Option<SearchCriteria>,
}

/// Turns free text into a structured query. Implementations must be cancel-safe: the caller
/// wraps every call in a timeout and drops the future when it fires.
#[async_trait]
pub trait QueryUnderstander: Send + Sync {
    async fn understand(
        &self,
        text: &str,
        context: &UnderstandContext,
    ) -> Result<StructuredQuery, LlmError>;
}

pub struct LlmQueryUnderstander {
    llm: LlmClient,
}

impl LlmQueryUnderstander {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QueryUnderstander for LlmQueryUnderstander {
    async fn understand(
        &self,
        text: &str,
        context: &UnderstandContext,
    ) -> Result<StructuredQuery, LlmError> {
        let prompt = prompts::build_query_prompt(text, context.previous_criteria.as_ref());
        self.llm
            .call_json(&prompt, &prompts::query_system_prompt())
            .await
    }
}
