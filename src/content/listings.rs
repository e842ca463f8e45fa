//! Flight and house candidates for the booking screens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::journey::{BookingKind, OptionId};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Most candidates kept from one response.
pub const MAX_CANDIDATES: usize = 3;

/// One bookable option. Only `id` is required; the rest is display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: OptionId,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Candidate {
    /// Short human label: airline for flights, name for houses.
    pub fn label(&self) -> String {
        ["airline", "name"]
            .iter()
            .find_map(|key| self.details.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("option {}", self.id))
    }

    /// Display string of a detail field, if present.
    pub fn detail(&self, key: &str) -> Option<String> {
        match self.details.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

pub struct ListingGenerator {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl ListingGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: 0.8,
        }
    }

    /// Ask for candidates. Provider errors and unusable output yield an
    /// empty list.
    pub async fn discover(&self, kind: BookingKind, country: &str, region: &str) -> Vec<Candidate> {
        info!(%kind, country, region, "Discovering candidates");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You produce realistic sample listings for working holiday travellers. \
                 Respond with JSON only.",
            ),
            ChatMessage::user(listing_prompt(kind, country, region)),
        ])
        .with_temperature(self.temperature)
        .with_json();

        match self.llm.complete(request).await {
            Ok(response) => {
                let candidates = parse_candidates(kind, &response.content);
                info!(%kind, count = candidates.len(), "Candidates ready");
                candidates
            }
            Err(e) => {
                warn!(%kind, error = %e, "Candidate discovery failed");
                Vec::new()
            }
        }
    }
}

fn listing_prompt(kind: BookingKind, country: &str, region: &str) -> String {
    match kind {
        BookingKind::Flight => format!(
            "Create {MAX_CANDIDATES} realistic flight options from Seoul (ICN) to {region}, \
             {country} as a JSON array. Fields: id, airline, price (KRW), duration, \
             type (direct or layover), color (airline theme hex)."
        ),
        BookingKind::House => format!(
            "Create {MAX_CANDIDATES} realistic share houses or rooms for working holiday \
             makers in {region}, {country} as a JSON array. Fields: id, name, area (real \
             suburb name), price (weekly, local currency), rating, description."
        ),
    }
}

/// Parse model output into at most `MAX_CANDIDATES` candidates.
///
/// Accepts a bare array or an object holding the array under the kind's
/// collection key (`flights` / `houses`). Entries without a usable `id` are
/// skipped.
pub fn parse_candidates(kind: BookingKind, text: &str) -> Vec<Candidate> {
    let json_str = super::extract_json(text);
    let value: Value = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            warn!(%kind, error = %e, response = text, "Failed to parse candidate listing");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove(kind.collection_key()) {
            Some(Value::Array(items)) => items,
            _ => {
                warn!(%kind, "Listing object has no '{}' array", kind.collection_key());
                return Vec::new();
            }
        },
        _ => {
            warn!(%kind, "Listing is neither an array nor an object");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Candidate>(item) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(%kind, error = %e, "Skipping candidate without a usable id");
                None
            }
        })
        .take(MAX_CANDIDATES)
        .collect()
}
