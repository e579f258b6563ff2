use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;

use super::Result;
use crate::auth::Session;
use crate::database::Database;
use crate::github::GitHub;

/// Shared caches may keep owner stats for five minutes and serve them stale for ten more while revalidating.
pub const OWNER_STATS_CACHE: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Repository metrics are revalidated at the edge once an hour.
pub const GITHUB_STATS_CACHE: &str = "public, s-maxage=3600";

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn owner(State(db): State<Database>, Session(principal): Session) -> Result<impl IntoResponse> {
    let stats = crate::stats::compute_owner_stats(&db, &principal).await?;
    Ok(([(header::CACHE_CONTROL, OWNER_STATS_CACHE)], Json(stats)))
}

#[instrument(skip_all)]
pub async fn github(State(github): State<GitHub>) -> impl IntoResponse {
    let metrics = github.fetch().await.into_snapshot();
    ([(header::CACHE_CONTROL, GITHUB_STATS_CACHE)], Json(metrics))
}
