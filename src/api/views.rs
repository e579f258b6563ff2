use axum::extract::{Path, State};
use axum::Json;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::Result;
use crate::counter;
use crate::database::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct ViewCount {
    #[new(value = "true")]
    pub success: bool,
    pub total_views: u64,
}

#[instrument(skip(db))]
pub async fn show(State(db): State<Database>, Path(id): Path<String>) -> Result<Json<ViewCount>> {
    let total_views = counter::get_view(&db, &id).await?;
    Ok(Json(ViewCount::new(total_views)))
}

#[instrument(skip(db))]
pub async fn increment(State(db): State<Database>, Path(id): Path<String>) -> Result<Json<ViewCount>> {
    let total_views = counter::increment_view(&db, &id).await?;
    Ok(Json(ViewCount::new(total_views)))
}
