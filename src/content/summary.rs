//! Professional summary for the job-seeker profile.

use std::sync::Arc;

use tracing::info;

use crate::error::LlmError;
use crate::journey::UserProfile;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Writes a short job-seeking summary from the user's career and skills.
pub struct SummaryGenerator {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl SummaryGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: 0.7,
            max_tokens: 512,
        }
    }

    /// Generate the summary. Empty output is an `InvalidResponse`.
    pub async fn generate(
        &self,
        country: &str,
        region: &str,
        profile: &UserProfile,
    ) -> Result<String, LlmError> {
        info!(country, region, skills = profile.skills.len(), "Generating profile summary");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You write concise, professional job-seeking summaries for working holiday \
                 applicants. Write exactly two sentences in Korean. Output only the summary.",
            ),
            ChatMessage::user(summary_prompt(country, region, profile)),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.llm.complete(request).await?;
        let bio = response.content.trim().to_string();
        if bio.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty summary".to_string(),
            });
        }
        Ok(bio)
    }
}

fn summary_prompt(country: &str, region: &str, profile: &UserProfile) -> String {
    format!(
        "Professional summary for a job search in {region}, {country}.\n\
         Career: \"{career}\"\n\
         Skills: {skills}",
        career = profile.career_details.trim(),
        skills = profile.skills.join(", "),
    )
}
