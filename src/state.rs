//! Application state shared by every connection and HTTP handler.
//!
//! This module owns:
//!   - the read-only topic catalog
//!   - the AI gateway (OpenAI client or the disabled stand-in, plus prompts)
//!   - plan generation settings
//!
//! Per-user state lives in `Session`, one per WebSocket connection.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::{load_coach_config_from_env, CoachConfig, PlanSettings};
use crate::gateway::{AiGateway, CompletionService, DisabledService};
use crate::openai::OpenAI;
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub gateway: AiGateway,
    pub plan: PlanSettings,
}

impl AppState {
    /// Build state from env: load config, build the catalog, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_coach_config_from_env().unwrap_or_default();

        let service: Arc<dyn CompletionService> = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "coach_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "coach_backend", "OpenAI disabled (no OPENAI_API_KEY). Every AI call returns its fallback.");
                Arc::new(DisabledService)
            }
        };

        let state = Self::with_service(Catalog::division_b(), service, cfg);

        let enabled = state.catalog.enabled().count();
        info!(
            target: "coach_backend",
            topics = state.catalog.topics().len(),
            enabled,
            event_date = %state.plan.event_date,
            "Startup catalog inventory"
        );
        state
    }

    /// Explicit construction, used by `new` and by tests.
    pub fn with_service(catalog: Catalog, service: Arc<dyn CompletionService>, cfg: CoachConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            gateway: AiGateway::new(service, cfg.prompts),
            plan: cfg.plan,
        }
    }

    /// Fresh per-connection session over the shared catalog.
    pub fn new_session(&self) -> Session {
        Session::new(self.catalog.clone())
    }
}
