//! Resolves configured providers into live adapters at startup.
//!
//! Grounded in the teacher's `ProviderRegistry`: providers that fail to
//! initialize (usually a missing API key) are logged and recorded rather
//! than aborting the whole process, so a misconfigured provider doesn't
//! take down a gateway that has at least one working one.

use std::collections::HashMap;
use std::sync::Arc;

use chatcore_domain::config::{ProviderConfig, ProviderKind};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::ProviderAdapter;
use crate::util::resolve_api_key;

/// Records a provider that failed to initialize, surfaced by the gateway's
/// `doctor`/health reporting rather than crashing startup.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub message: String,
}

pub struct ProviderRegistry {
    providers: parking_lot::RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    default_provider: Option<String>,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    pub fn from_config(configs: &[ProviderConfig], default_provider: Option<String>) -> Self {
        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut init_errors = Vec::new();

        for cfg in configs {
            let base_url = cfg.base_url.clone().unwrap_or_else(|| default_base_url(cfg.kind).to_string());
            let result = resolve_api_key(cfg.api_key_env.as_deref()).map(|key| {
                let adapter: Arc<dyn ProviderAdapter> = match cfg.kind {
                    ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
                        cfg.id.clone(),
                        base_url,
                        key,
                        cfg.default_model.clone(),
                    )),
                    ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::new(
                        cfg.id.clone(),
                        base_url,
                        key,
                        cfg.default_model.clone(),
                    )),
                };
                adapter
            });

            match result {
                Ok(adapter) => {
                    tracing::info!(provider_id = %cfg.id, kind = ?cfg.kind, "registered provider");
                    providers.insert(cfg.id.clone(), adapter);
                }
                Err(e) => {
                    tracing::warn!(provider_id = %cfg.id, error = %e, "failed to initialize provider, skipping");
                    init_errors.push(ProviderInitError {
                        provider_id: cfg.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Self {
            providers: parking_lot::RwLock::new(providers),
            default_provider,
            init_errors,
        }
    }

    /// Registers (or replaces) a provider adapter at runtime. Takes `&self`
    /// — like the Tool Registry, concurrent reads (`get`/`resolve`) are
    /// always safe; this just adds one more writer behind the lock.
    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.write().insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.read().get(id).cloned()
    }

    /// Resolves a requested provider id, falling back to the configured
    /// default when `None`.
    pub fn resolve(&self, id: Option<&str>) -> Option<Arc<dyn ProviderAdapter>> {
        match id {
            Some(id) => self.get(id),
            None => self.default_provider.as_deref().and_then(|id| self.get(id)),
        }
    }

    pub fn providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "https://api.anthropic.com",
        ProviderKind::OpenaiCompat => "https://api.openai.com/v1",
    }
}
