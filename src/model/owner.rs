use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use super::*;
use crate::database::{Database, Result};
use crate::define_relation;

/// An opaque JSON document. The store keeps whatever object the owner sends, no schema is applied.
pub type Blob = serde_json::Map<String, serde_json::Value>;

/// A registered user, keyed by the stable identifier of the signed-in principal.
///
/// A blob that is missing or null in the store reads as an empty object.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Owner {
    pub email: String,
    pub name: Option<String>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
    #[new(default)]
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub settings: Blob,
    #[new(default)]
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub privacy: Blob,
}

define_relation! {
    Owner > get(email: &str) > Option<Owner>
        where "SELECT email, name, created_at, settings, privacy FROM type::thing('users', $email)"
}

// Outer `None` means the owner is missing, inner `None` means the stored blob is absent or null.
define_relation! {
    Owner > settings(email: &str) > Option<Option<Blob>>
        where "SELECT VALUE settings FROM type::thing('users', $email)"
}

define_relation! {
    Owner > privacy(email: &str) > Option<Option<Blob>>
        where "SELECT VALUE privacy FROM type::thing('users', $email)"
}

define_relation! {
    Owner > replace_settings(email: &str, blob: &Blob) > Option<Blob>
        where "UPDATE users SET settings = $blob WHERE email = $email RETURN VALUE settings"
}

define_relation! {
    Owner > replace_privacy(email: &str, blob: &Blob) > Option<Blob>
        where "UPDATE users SET privacy = $blob WHERE email = $email RETURN VALUE privacy"
}

impl Owner {
    pub async fn insert(&self, db: &Database) -> Result<()> {
        db.sql(
            "CREATE type::thing('users', $email) SET email = $email, name = $name, created_at = $created_at, \
             settings = $settings, privacy = $privacy RETURN NONE",
        )
        .bind(("email", &self.email))
        .bind(("name", &self.name))
        .bind(("created_at", self.created_at))
        .bind(("settings", &self.settings))
        .bind(("privacy", &self.privacy))
        .execute()
        .await?;

        Ok(())
    }

    /// Returns the existing owner, or creates one on first sign-in.
    #[tracing::instrument(skip(db))]
    pub async fn register(email: &str, name: Option<String>, db: &Database) -> Result<Owner> {
        if let Some(owner) = Owner::get(email, db).await? {
            return Ok(owner);
        }

        let owner = Owner::new(email.to_string(), name);
        match owner.insert(db).await {
            Ok(()) => {
                tracing::info!(owner = %email, "registered a new owner");
                Ok(owner)
            }
            // a concurrent sign-in may have created the record first
            Err(err) => match Owner::get(email, db).await? {
                Some(owner) => Ok(owner),
                None => Err(err),
            },
        }
    }
}
