use std::sync::Arc;

use hawkins_llm::prompts::critique_prompt;
use hawkins_llm::{ensure_credential, CredentialGate, GenerationService};

pub const SILENT_VOID: &str = "The void remains silent. Proceed with caution.";
pub const UNSTABLE_RIFT: &str = "The rift is too unstable for analysis. Trust your gut.";

/// One-shot critique of a project idea. Never fails; errors become a canned line.
#[derive(Clone)]
pub struct IdeaCritic {
    service: Arc<dyn GenerationService>,
    credentials: Arc<dyn CredentialGate>,
}

impl IdeaCritic {
    pub fn new(service: Arc<dyn GenerationService>, credentials: Arc<dyn CredentialGate>) -> Self {
        Self {
            service,
            credentials,
        }
    }

    /// Returns `None` for a blank idea without calling the service.
    pub async fn critique(&self, description: &str) -> Option<String> {
        let description = description.trim();
        if description.is_empty() {
            return None;
        }

        ensure_credential(self.credentials.as_ref()).await;

        let verdict = match self.service.critique_text(&critique_prompt(description)).await {
            Ok(text) if text.trim().is_empty() => SILENT_VOID.to_string(),
            Ok(text) => text,
            Err(err) => {
                log::warn!("Idea critique failed: {}", err);
                if err.is_credential_failure() {
                    self.credentials.request_selection().await;
                }
                UNSTABLE_RIFT.to_string()
            }
        };
        Some(verdict)
    }
}
