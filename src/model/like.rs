use derive_new::new;
use serde::{Deserialize, Serialize};

use super::*;
use crate::database::{Database, Result};
use crate::define_relation;

/// An owner's approval of a prompt. The `likes_pair` unique index allows one per (owner, prompt).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Like {
    pub owner: String,
    pub prompt: String,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_relation! {
    Like > count_by_owner(owner: &str) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM likes WHERE owner = $owner))"
}

define_relation! {
    Like > count_by_prompt(prompt: &str) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM likes WHERE prompt = $prompt))"
}

define_relation! {
    Like > count_pair(owner: &str, prompt: &str) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM likes WHERE owner = $owner AND prompt = $prompt))"
}

impl Like {
    pub async fn exists(owner: &str, prompt: &str, db: &Database) -> Result<bool> {
        let count = Like::count_pair(owner, prompt, db).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    /// Stores the relation. Returns `false` when the owner already liked the prompt.
    pub async fn insert(&self, db: &Database) -> Result<bool> {
        if Like::exists(&self.owner, &self.prompt, db).await? {
            return Ok(false);
        }

        let created = db
            .sql("CREATE likes SET owner = $owner, prompt = $prompt, created_at = $created_at RETURN NONE")
            .bind(("owner", &self.owner))
            .bind(("prompt", &self.prompt))
            .bind(("created_at", self.created_at))
            .execute()
            .await;

        match created {
            Ok(_) => Ok(true),
            // lost a race against the same pair, the unique index kept a single relation
            Err(err) => match Like::exists(&self.owner, &self.prompt, db).await? {
                true => Ok(false),
                false => Err(err),
            },
        }
    }

    /// Removes the relation. Returns `false` when there was nothing to remove.
    pub async fn remove(owner: &str, prompt: &str, db: &Database) -> Result<bool> {
        if !Like::exists(owner, prompt, db).await? {
            return Ok(false);
        }

        db.sql("DELETE likes WHERE owner = $owner AND prompt = $prompt RETURN NONE")
            .bind(("owner", owner))
            .bind(("prompt", prompt))
            .execute()
            .await?;

        Ok(true)
    }
}
