use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::{OwnerNotFoundSnafu, PromptNotFoundSnafu, Result, StoreSnafu};
use crate::auth::Session;
use crate::database::Database;
use crate::model::{Like, Owner, Prompt, Timestamp};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrompt {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptView {
    pub id: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub view_count: u64,
    pub like_count: u64,
    pub created_at: Timestamp,
}

impl PromptView {
    fn new(prompt: Prompt, like_count: u64) -> Self {
        Self {
            id: prompt.id,
            author: prompt.author,
            title: prompt.title,
            content: prompt.content,
            view_count: prompt.view_count,
            like_count,
            created_at: prompt.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u64,
}

async fn existing_prompt(id: &str, db: &Database) -> Result<Prompt> {
    Prompt::get(id, db)
        .await
        .context(StoreSnafu)?
        .context(PromptNotFoundSnafu { id })
}

async fn existing_owner(email: &str, db: &Database) -> Result<Owner> {
    Owner::get(email, db)
        .await
        .context(StoreSnafu)?
        .context(OwnerNotFoundSnafu { email })
}

async fn like_count(prompt: &str, db: &Database) -> Result<u64> {
    let count = Like::count_by_prompt(prompt, db).await.context(StoreSnafu)?;
    Ok(count.unwrap_or(0))
}

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn create(
    State(db): State<Database>,
    Session(principal): Session,
    Json(payload): Json<NewPrompt>,
) -> Result<(StatusCode, Json<PromptView>)> {
    let owner = existing_owner(&principal.email, &db).await?;

    let prompt = Prompt::new(owner.email, payload.title, payload.content);
    prompt.insert(&db).await.context(StoreSnafu)?;
    tracing::info!(prompt = %prompt.id, "created a prompt");

    Ok((StatusCode::CREATED, Json(PromptView::new(prompt, 0))))
}

#[instrument(skip(db))]
pub async fn show(State(db): State<Database>, Path(id): Path<String>) -> Result<Json<PromptView>> {
    let prompt = existing_prompt(&id, &db).await?;
    let likes = like_count(&id, &db).await?;
    Ok(Json(PromptView::new(prompt, likes)))
}

#[instrument(skip(db, principal), fields(owner = %principal.email))]
pub async fn like(
    State(db): State<Database>,
    Session(principal): Session,
    Path(id): Path<String>,
) -> Result<Json<LikeState>> {
    let owner = existing_owner(&principal.email, &db).await?;
    existing_prompt(&id, &db).await?;

    let created = Like::new(owner.email, id.clone())
        .insert(&db)
        .await
        .context(StoreSnafu)?;
    tracing::debug!(created, "liked a prompt");

    Ok(Json(LikeState {
        liked: true,
        like_count: like_count(&id, &db).await?,
    }))
}

#[instrument(skip(db, principal), fields(owner = %principal.email))]
pub async fn unlike(
    State(db): State<Database>,
    Session(principal): Session,
    Path(id): Path<String>,
) -> Result<Json<LikeState>> {
    let owner = existing_owner(&principal.email, &db).await?;
    existing_prompt(&id, &db).await?;

    let removed = Like::remove(&owner.email, &id, &db).await.context(StoreSnafu)?;
    tracing::debug!(removed, "unliked a prompt");

    Ok(Json(LikeState {
        liked: false,
        like_count: like_count(&id, &db).await?,
    }))
}
