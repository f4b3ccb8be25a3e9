//! Credential check performed before every call into the Generation Service.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Authorized,
    NeedsSelection,
}

#[async_trait]
pub trait CredentialGate: Send + Sync {
    async fn check(&self) -> CredentialStatus;

    /// Start the "reselect credential" flow.
    async fn request_selection(&self) {
        log::warn!("Credential selection requested but no selector is installed");
    }
}

/// Run the check and, if nothing is selected, ask for a selection.
///
/// The call proceeds either way; a missing key surfaces later as a credential failure.
pub async fn ensure_credential(gate: &dyn CredentialGate) -> CredentialStatus {
    let status = gate.check().await;
    if status == CredentialStatus::NeedsSelection {
        log::info!("No API credential selected, requesting selection");
        gate.request_selection().await;
    }
    status
}

/// Authorized iff an API key was configured.
#[derive(Debug, Clone)]
pub struct ConfigCredentialGate {
    has_key: bool,
}

impl ConfigCredentialGate {
    pub fn new(config: &hawkins_core::Config) -> Self {
        Self {
            has_key: config.has_api_key(),
        }
    }
}

#[async_trait]
impl CredentialGate for ConfigCredentialGate {
    async fn check(&self) -> CredentialStatus {
        if self.has_key {
            CredentialStatus::Authorized
        } else {
            CredentialStatus::NeedsSelection
        }
    }
}
