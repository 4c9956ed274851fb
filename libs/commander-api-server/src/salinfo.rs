use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use commander_api::TopicCategory;
use component_catalog::{MetadataMap, TopicDataMap, TopicNamesMap};

use crate::AppState;
use crate::error::GatewayError;

/// `?categories=event-telemetry`; пусто или неизвестно → все категории.
#[derive(Deserialize)]
pub(crate) struct CategoriesQuery {
    #[serde(default)]
    categories: String,
}

impl CategoriesQuery {
    fn parsed(&self) -> Vec<TopicCategory> {
        TopicCategory::parse_list(&self.categories)
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /salinfo/*
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_metadata(State(state): State<AppState>) -> Result<Json<MetadataMap>, GatewayError> {
    Ok(Json(state.catalog.metadata().await?))
}

pub(crate) async fn handle_topic_names(
    State(state): State<AppState>,
    Query(query): Query<CategoriesQuery>,
) -> Result<Json<TopicNamesMap>, GatewayError> {
    Ok(Json(state.catalog.topic_names(&query.parsed()).await?))
}

pub(crate) async fn handle_topic_data(
    State(state): State<AppState>,
    Query(query): Query<CategoriesQuery>,
) -> Result<Json<TopicDataMap>, GatewayError> {
    Ok(Json(state.catalog.topic_data(&query.parsed()).await?))
}
