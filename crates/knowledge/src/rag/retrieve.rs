//! Retrieval stage.

use crate::rag::pipeline::ChatPipeline;
use crate::rag::types::Retrieval;
use crate::search::SearchRequest;
use crate::types::{EvidenceDocument, PipelineContext};
use chatread_core::AppResult;

impl ChatPipeline {
    /// Fetch evidence for `query` from the search index.
    ///
    /// Documents keep the index's order. Search errors propagate.
    pub async fn retrieve(&self, query: &str, context: &PipelineContext) -> AppResult<Retrieval> {
        let request = SearchRequest {
            query: query.to_string(),
            filter: context.search_filter(),
            top: context.top(),
        };

        let documents = self.search.search(&request).await?;
        let evidence = documents.iter().map(EvidenceDocument::evidence_line).collect();

        tracing::debug!(
            query = %query,
            documents = documents.len(),
            filter = ?request.filter,
            "Evidence retrieved"
        );

        Ok(Retrieval {
            query: request.query,
            documents,
            evidence,
        })
    }
}
