//! Send cycle: record the user message, then ask each mentioned target in turn
//!
//! Targets run strictly one after another. Each reply is appended and the
//! workspace persisted before the next target starts, so the transcript order
//! always matches the mention order. Failures never escape a send; they are
//! stored as diagnostic replies instead. A failed save is logged, retried once
//! at the end of the cycle, and reported in [`SendReport::persist_error`].

use crate::catalog::ProviderRegistry;
use crate::config::DispatchConfig;
use crate::conversation::{build_history, Attachment, Message};
use crate::llm::{AdapterError, AdapterRegistry, ChatRequest, NormalizedResponse, OpenAiCompatAdapter};
use crate::mention::{DispatchTarget, MentionResolver, TargetKind, UnconfiguredMention};
use crate::storage::WorkspaceStore;
use crate::workspace::{CredentialStore, TranscriptStore, Workspace, WorkspaceError};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Stored in place of an empty reply
pub const NO_CONTENT_SENTINEL: &str = "(no response content)";

/// Shown when a send names no reachable target
pub const NO_TARGET_HINT: &str = "Tip: mention an AI model with @ to get a reply";

/// Transcript text for a failed target
pub fn diagnostic_message(error: &str) -> String {
    format!(
        "**Error**: {}\n\nPlease check:\n1. The API key is configured correctly\n2. The network connection is working\n3. The API quota is sufficient",
        error
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TargetState {
    Pending,
    Success,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub target: DispatchTarget,
    /// Id of the reply appended for this target
    pub message_id: u64,
    #[serde(flatten)]
    pub state: TargetState,
}

/// Result of one send
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub channel_id: String,
    pub user_message_id: u64,
    pub outcomes: Vec<TargetOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub unconfigured: Vec<UnconfiguredMention>,
    /// Set when the transcript could not be saved at the end of the cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

impl SendReport {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, TargetState::Failed { .. }))
            .count()
    }
}

/// Progress callbacks for a send; purely informational
pub trait DispatchObserver: Send + Sync {
    fn on_pending(&self, _target: &DispatchTarget) {}
    fn on_complete(&self, _target: &DispatchTarget, _state: &TargetState) {}
}

struct Silent;

impl DispatchObserver for Silent {}

/// Owns the workspace and runs send cycles against it
pub struct Dispatcher {
    workspace: Workspace,
    registry: ProviderRegistry,
    adapters: Arc<AdapterRegistry>,
    store: Option<WorkspaceStore>,
    settings: DispatchConfig,
    snapshots: Option<watch::Sender<Workspace>>,
}

impl Dispatcher {
    /// In-memory dispatcher; nothing is persisted
    pub fn new(workspace: Workspace, adapters: Arc<AdapterRegistry>, settings: DispatchConfig) -> Self {
        Self {
            workspace,
            registry: ProviderRegistry::builtin(),
            adapters,
            store: None,
            settings,
            snapshots: None,
        }
    }

    /// Persist through `store` after every mutation
    pub fn with_store(mut self, store: WorkspaceStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Copies of the workspace, republished after every mutation
    ///
    /// Readers never wait on a send in progress.
    pub fn subscribe(&mut self) -> watch::Receiver<Workspace> {
        if let Some(sender) = &self.snapshots {
            return sender.subscribe();
        }
        let (sender, receiver) = watch::channel(self.workspace.clone());
        self.snapshots = Some(sender);
        receiver
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    /// Apply `change` to the workspace and persist the result
    pub fn update<R>(&mut self, change: impl FnOnce(&mut Workspace, &ProviderRegistry) -> R) -> Result<R> {
        let result = change(&mut self.workspace, &self.registry);
        self.persist()?;
        Ok(result)
    }

    fn persist(&self) -> Result<()> {
        if let Some(snapshots) = &self.snapshots {
            snapshots.send_replace(self.workspace.clone());
        }
        if let Some(store) = &self.store {
            store.save(&self.workspace)?;
        }
        Ok(())
    }

    /// Save without failing the send; the error is kept on the report
    fn persist_logged(&self, report: &mut SendReport) {
        if let Err(err) = self.persist() {
            tracing::error!("Failed to save transcript of #{}: {:#}", report.channel_id, err);
            report.persist_error = Some(format!("{:#}", err));
        }
    }

    pub async fn send(
        &mut self,
        channel_id: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<SendReport> {
        self.send_observed(channel_id, text, attachment, &Silent).await
    }

    /// Run one send cycle, reporting progress to `observer`
    pub async fn send_observed(
        &mut self,
        channel_id: &str,
        text: &str,
        attachment: Option<Attachment>,
        observer: &dyn DispatchObserver,
    ) -> Result<SendReport> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(WorkspaceError::EmptyMessage.into());
        }
        if self.workspace.channel(channel_id).is_none() {
            return Err(WorkspaceError::ChannelNotFound(channel_id.to_string()).into());
        }

        let resolution = MentionResolver::new(&self.registry, &self.workspace).resolve(text);
        let context_name = resolution.context.as_ref().map(|c| c.mention.clone());

        let id = self.workspace.allocate_message_id();
        self.workspace
            .append(channel_id, Message::user(id, text, attachment, resolution.context))?;

        let mut report = SendReport {
            channel_id: channel_id.to_string(),
            user_message_id: id,
            outcomes: Vec::with_capacity(resolution.targets.len()),
            context: context_name,
            hint: None,
            unconfigured: resolution.unconfigured,
            persist_error: None,
        };
        self.persist_logged(&mut report);

        if resolution.targets.is_empty() {
            tracing::info!("No dispatch targets in message {} on #{}", id, channel_id);
            report.hint = Some(hint_for(&report.unconfigured));
            self.retry_persist(&mut report);
            return Ok(report);
        }

        for target in resolution.targets {
            tracing::debug!("@{} pending ({})", target.mention, target.provider_id());
            observer.on_pending(&target);

            let state = match self.call_target(channel_id, &target).await {
                Ok(response) => {
                    tracing::info!("@{} replied", target.mention);
                    let text = response.text();
                    let content = if text.is_empty() { NO_CONTENT_SENTINEL } else { text };
                    self.append_reply(channel_id, &target, content, &mut report)?;
                    TargetState::Success
                }
                Err(err) => {
                    tracing::warn!("@{} failed: {}", target.mention, err);
                    let content = diagnostic_message(&err.to_string());
                    self.append_reply(channel_id, &target, &content, &mut report)?;
                    TargetState::Failed {
                        error: err.to_string(),
                    }
                }
            };

            observer.on_complete(&target, &state);
            let message_id = self
                .workspace
                .read(channel_id)
                .last()
                .map(|m| m.id)
                .unwrap_or_default();
            report.outcomes.push(TargetOutcome {
                target,
                message_id,
                state,
            });
        }

        self.retry_persist(&mut report);
        Ok(report)
    }

    /// One more save at the end of a cycle that hit a save error
    fn retry_persist(&self, report: &mut SendReport) {
        if report.persist_error.is_none() {
            return;
        }
        report.persist_error = None;
        self.persist_logged(report);
        if report.persist_error.is_none() {
            tracing::info!("Transcript of #{} saved on retry", report.channel_id);
        }
    }

    fn append_reply(
        &mut self,
        channel_id: &str,
        target: &DispatchTarget,
        content: &str,
        report: &mut SendReport,
    ) -> Result<()> {
        let id = self.workspace.allocate_message_id();
        self.workspace
            .append(channel_id, Message::assistant(id, &target.mention, content))?;
        self.persist_logged(report);
        Ok(())
    }

    async fn call_target(
        &self,
        channel_id: &str,
        target: &DispatchTarget,
    ) -> Result<NormalizedResponse, AdapterError> {
        let history = self
            .workspace
            .channel(channel_id)
            .map(|c| build_history(c, self.settings.history_window))
            .unwrap_or_default();
        let request = ChatRequest::new(target.model_id(), history, self.settings.max_tokens);

        match &target.kind {
            TargetKind::Catalog { provider_id, .. } => {
                let credential = self.credential_for(provider_id);
                self.adapters.send(provider_id, &credential, &request).await
            }
            TargetKind::Assistant { .. } => {
                let credential = self.credential_for("openai");
                self.adapters.send("openai", &credential, &request).await
            }
            TargetKind::Custom {
                endpoint, api_key, ..
            } => {
                let adapter = OpenAiCompatAdapter::custom(endpoint.as_str());
                self.adapters
                    .send_with(&adapter, api_key.as_deref().unwrap_or(""), &request)
                    .await
            }
        }
    }

    fn credential_for(&self, provider_id: &str) -> String {
        self.registry
            .provider(provider_id)
            .and_then(|p| self.workspace.credentials.get(p.key_name))
            .unwrap_or_default()
    }
}

fn hint_for(unconfigured: &[UnconfiguredMention]) -> String {
    if unconfigured.is_empty() {
        return NO_TARGET_HINT.to_string();
    }
    let missing: Vec<String> = unconfigured
        .iter()
        .map(|u| format!("@{} needs an API key for {}", u.token, u.providers.join(" or ")))
        .collect();
    format!("{}. {}", missing.join("; "), NO_TARGET_HINT)
}
