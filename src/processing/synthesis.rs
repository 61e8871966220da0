//! Context assembly and prompt construction for answer generation.

use crate::{
    generation::{GenerationError, Generator},
    processing::types::{Answer, SearchResult},
};
use std::sync::Arc;

/// Answer returned when retrieval produced nothing to ground a response on.
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";

const PROMPT_PREAMBLE: &str = "You are a helpful assistant that answers questions based on provided documents.

Using the following documents, answer the user's question succinctly and accurately.

IMPORTANT INSTRUCTIONS:
- Base your answer ONLY on the information provided in the documents below
- If the documents don't contain enough information to answer the question, say so
- Cite which sources you used when possible
- Be concise but comprehensive
- If you're unsure, acknowledge the uncertainty";

/// Render retrieved chunks as numbered, labelled sources.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "[Source {} - {}]\n{}\n",
                index + 1,
                result.metadata.filename,
                result.document
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Combine the instruction preamble, the context block, and the question.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!("{PROMPT_PREAMBLE}\n\nDOCUMENTS:\n{context}\n\nQUESTION: {query}\n\nANSWER:")
}

/// Produces answers from retrieved chunks via a [`Generator`].
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    max_tokens: u32,
}

impl Synthesizer {
    /// Wrap `generator`, capping answers at `max_tokens`.
    pub fn new(generator: Arc<dyn Generator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Model identifier of the wrapped generator.
    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Answer `query` from `results`.
    ///
    /// With no results the fixed [`NO_RESULTS_ANSWER`] is returned and the generator is not
    /// called.
    pub async fn synthesize(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> Result<Answer, GenerationError> {
        if results.is_empty() {
            return Ok(Answer {
                answer: NO_RESULTS_ANSWER.to_string(),
                source_count: 0,
                model: self.model().to_string(),
            });
        }

        let prompt = build_prompt(query, &build_context(results));
        tracing::debug!(
            sources = results.len(),
            prompt_chars = prompt.len(),
            model = self.model(),
            "Generating answer"
        );
        let answer = self.generator.generate(&prompt, self.max_tokens).await?;

        Ok(Answer {
            answer,
            source_count: results.len(),
            model: self.model().to_string(),
        })
    }

    /// Send a minimal prompt to confirm the generator is reachable.
    pub async fn probe(&self) -> Result<String, GenerationError> {
        self.generator
            .generate("Say 'Hello' if you can receive this message.", 10)
            .await
    }
}
