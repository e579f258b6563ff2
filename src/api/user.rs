use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::{InvalidBlobSnafu, OwnerNotFoundSnafu, Result, StoreSnafu};
use crate::auth::Session;
use crate::database::Database;
use crate::model::{Blob, Owner, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: Timestamp,
}

impl From<Owner> for Profile {
    fn from(owner: Owner) -> Self {
        Profile {
            email: owner.email,
            name: owner.name,
            created_at: owner.created_at,
        }
    }
}

// Any JSON object is accepted as is, other JSON values are refused.
fn into_blob(value: Value) -> Result<Blob> {
    match value {
        Value::Object(blob) => Ok(blob),
        _ => InvalidBlobSnafu.fail(),
    }
}

/// Creates the owner record on first sign-in. Repeated calls return the same profile.
#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn register(State(db): State<Database>, Session(principal): Session) -> Result<Json<Profile>> {
    let owner = Owner::register(&principal.email, principal.name, &db)
        .await
        .context(StoreSnafu)?;
    Ok(Json(owner.into()))
}

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn settings(State(db): State<Database>, Session(principal): Session) -> Result<Json<Blob>> {
    let settings = Owner::settings(&principal.email, &db)
        .await
        .context(StoreSnafu)?
        .context(OwnerNotFoundSnafu { email: &principal.email })?;
    Ok(Json(settings.unwrap_or_default()))
}

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn update_settings(
    State(db): State<Database>,
    Session(principal): Session,
    Json(settings): Json<Value>,
) -> Result<Json<Blob>> {
    let settings = into_blob(settings)?;
    let stored = Owner::replace_settings(&principal.email, &settings, &db)
        .await
        .context(StoreSnafu)?
        .context(OwnerNotFoundSnafu { email: &principal.email })?;
    Ok(Json(stored))
}

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn privacy(State(db): State<Database>, Session(principal): Session) -> Result<Json<Blob>> {
    let privacy = Owner::privacy(&principal.email, &db)
        .await
        .context(StoreSnafu)?
        .context(OwnerNotFoundSnafu { email: &principal.email })?;
    Ok(Json(privacy.unwrap_or_default()))
}

#[instrument(skip_all, fields(owner = %principal.email))]
pub async fn update_privacy(
    State(db): State<Database>,
    Session(principal): Session,
    Json(privacy): Json<Value>,
) -> Result<Json<Blob>> {
    let privacy = into_blob(privacy)?;
    let stored = Owner::replace_privacy(&principal.email, &privacy, &db)
        .await
        .context(StoreSnafu)?
        .context(OwnerNotFoundSnafu { email: &principal.email })?;
    Ok(Json(stored))
}
