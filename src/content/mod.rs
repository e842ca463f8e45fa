//! Generated content: the profile summary and flight/house candidates.
//!
//! Both go through an `LlmProvider`. Model output is treated as untrusted
//! text; anything that does not parse becomes an empty result.

pub mod listings;
pub mod summary;

pub use listings::{Candidate, ListingGenerator};
pub use summary::SummaryGenerator;

use tracing::error;

/// Pull a JSON value out of model output that may carry markdown fences or
/// chatter around it.
pub(crate) fn extract_json(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Fenced block, tagged or not
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('[') || inner.starts_with('{') {
                    return inner.to_string();
                }
            }
        }
    }

    // Outermost bracket pair, arrays first
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    error!(text = trimmed, "Could not extract JSON from LLM response");
    trimmed.to_string()
}
