//! Wiring: store, provider and orchestrator assembled into the HTTP router.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::{AppConfig, MentorConfig};
use crate::error::Result;
use crate::llm::{LlmProvider, create_provider};
use crate::mentor::{MentorOrchestrator, MentorRouteState, mentor_routes};
use crate::store::{Database, LibSqlBackend};

/// Open the database, create the provider and build the router.
pub async fn build(config: &AppConfig) -> Result<Router> {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let llm = create_provider(config)?;
    Ok(build_with(db, llm, config.mentor.clone()))
}

/// Build the router around an existing store and provider.
pub fn build_with(
    db: Arc<dyn Database>,
    llm: Arc<dyn LlmProvider>,
    config: MentorConfig,
) -> Router {
    let mentor = Arc::new(MentorOrchestrator::new(db, llm, config));
    mentor_routes(MentorRouteState { mentor }).layer(CorsLayer::permissive())
}
