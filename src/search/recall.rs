/// Multi-query recall: one vector query per query variant, merged and
/// deduplicated by exact chunk text.
use std::collections::HashSet;

use tracing::{debug, warn};

use crate::db::{KnowledgeStore, RecalledChunk};
use crate::embedder::Embedder;

/// Recall up to `top_n` chunks per query and merge them.
///
/// Returns the unique chunks in first-seen order plus one warning line per
/// query whose embedding failed.
pub fn multi_recall(
    store: &dyn KnowledgeStore,
    embedder: &dyn Embedder,
    queries: &[String],
    top_n: usize,
) -> (Vec<RecalledChunk>, Vec<String>) {
    let mut merged = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut logs = Vec::new();

    for query in queries {
        let embedding = match embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("Embedding failed for '{query}': {e}");
                logs.push(format!("Warning: recall for '{query}' failed: {e}"));
                continue;
            }
        };

        let hits = store.query_by_vector(&embedding, top_n);
        debug!("'{query}' recalled {} chunks", hits.len());

        for chunk in hits {
            if seen.insert(chunk.text.clone()) {
                merged.push(chunk);
            }
        }
    }

    (merged, logs)
}
