//! Narrative generation via LLM providers.
//!
//! Supports:
//! - **Gemini**: the default briefing model, via rig-core
//! - **Anthropic**: alternative backend, via rig-core
//!
//! The pipeline consumes the [`NarrativeGenerator`] trait as an opaque
//! "structured input → narrative text" capability. Prompt prose lives in
//! [`NarrativeStageConfig`] values — it is configuration data, not
//! behavior, and a failed call surfaces as a stage failure upstream.

mod costs;
pub(crate) mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::error::LlmError;
use costs::CostTable;

/// Max tokens for a single narrative section.
const NARRATIVE_MAX_TOKENS: u64 = 2048;

/// Low temperature — briefing prose should be steady, not creative.
const NARRATIVE_TEMPERATURE: f64 = 0.3;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    Anthropic,
}

/// Configuration for creating a narrative generator.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Role/goal/context prose for one narrative pipeline stage.
///
/// Mirrors the agent definitions of the briefing flow: the role and goal
/// become the system preamble, the context describes what the stage's
/// input contains.
#[derive(Debug, Clone)]
pub struct NarrativeStageConfig {
    pub role: String,
    pub goal: String,
    pub context: String,
}

impl NarrativeStageConfig {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            context: context.into(),
        }
    }

    /// System preamble for the generation call.
    pub fn preamble(&self) -> String {
        format!("You are {}. {}", self.role, self.goal)
    }
}

/// Opaque narrative-generation collaborator.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Model identifier for logging and reports.
    fn model_name(&self) -> &str;

    /// Generate narrative text for one stage.
    async fn generate(
        &self,
        stage: &NarrativeStageConfig,
        context: &str,
        input: &str,
    ) -> Result<String, LlmError>;
}

/// Create a narrative generator from configuration.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn NarrativeGenerator>, LlmError> {
    match config.backend {
        LlmBackend::Gemini => create_gemini_generator(config),
        LlmBackend::Anthropic => create_anthropic_generator(config),
    }
}

fn create_gemini_generator(config: &LlmConfig) -> Result<Arc<dyn NarrativeGenerator>, LlmError> {
    use rig::providers::gemini;

    let client = gemini::Client::new(config.api_key.expose_secret()).map_err(|e| {
        LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        }
    })?;

    let model = client.completion_model(&config.model);
    info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigGenerator::new(model, "gemini", &config.model)))
}

fn create_anthropic_generator(
    config: &LlmConfig,
) -> Result<Arc<dyn NarrativeGenerator>, LlmError> {
    use rig::providers::anthropic;

    let client: anthropic::Client = anthropic::Client::new(config.api_key.expose_secret())
        .map_err(|e| LlmError::RequestFailed {
            provider: "anthropic".to_string(),
            reason: format!("Failed to create Anthropic client: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigGenerator::new(
        model,
        "anthropic",
        &config.model,
    )))
}

// ── Rig bridge ──────────────────────────────────────────────────────

/// Bridges a rig `CompletionModel` to [`NarrativeGenerator`].
struct RigGenerator<M: CompletionModel> {
    model: M,
    provider: &'static str,
    model_name: String,
    costs: CostTable,
}

impl<M: CompletionModel> RigGenerator<M> {
    fn new(model: M, provider: &'static str, model_name: &str) -> Self {
        Self {
            model,
            provider,
            model_name: model_name.to_string(),
            costs: CostTable::default(),
        }
    }

    async fn complete_once(&self, preamble: &str, user: &str) -> Result<String, LlmError> {
        let request = self
            .model
            .completion_request(Message::user(user))
            .preamble(preamble.to_string())
            .temperature(NARRATIVE_TEMPERATURE)
            .max_tokens(NARRATIVE_MAX_TOKENS)
            .build();

        let response =
            self.model
                .completion(request)
                .await
                .map_err(|e| LlmError::RequestFailed {
                    provider: self.provider.to_string(),
                    reason: e.to_string(),
                })?;

        let usage = response.usage;
        if let Some(cost) = self
            .costs
            .estimate(&self.model_name, usage.input_tokens, usage.output_tokens)
        {
            debug!(
                model = %self.model_name,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cost_usd = %cost,
                "narrative call complete"
            );
        }

        let text: String = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(t) => Some(t.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "empty completion".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl<M: CompletionModel + Send + Sync> NarrativeGenerator for RigGenerator<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(
        &self,
        stage: &NarrativeStageConfig,
        context: &str,
        input: &str,
    ) -> Result<String, LlmError> {
        let preamble = stage.preamble();
        let user = format!("{}\n\n{}\n\nInput:\n{}", stage.context, context, input);

        retry::with_retry(self.provider, || self.complete_once(&preamble, &user)).await
    }
}
