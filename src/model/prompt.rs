use derive_new::new;
use serde::{Deserialize, Serialize};

use super::*;
use crate::database::{Database, Result};
use crate::define_relation;

pub fn new_prompt_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A shareable prompt. `view_count` only ever grows through [Prompt::add_view].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Prompt {
    #[new(value = "new_prompt_id()")]
    pub id: String,
    pub author: String,
    pub title: String,
    pub content: String,
    #[new(default)]
    pub view_count: u64,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_relation! {
    Prompt > get(id: &str) > Option<Prompt>
        where "SELECT meta::id(id) AS id, author, title, content, view_count, created_at FROM type::thing('prompts', $id)"
}

define_relation! {
    Prompt > views(id: &str) > Option<u64>
        where "SELECT VALUE view_count FROM type::thing('prompts', $id)"
}

// The add happens inside a single UPDATE statement, so concurrent callers never overwrite each other.
// Only the addressed record is read. The WHERE guard skips a record that does not exist yet,
// so an unknown id is never created on the fly.
define_relation! {
    Prompt > add_view(id: &str) > Option<u64>
        where "UPDATE type::thing('prompts', $id) SET view_count += 1 WHERE view_count != NONE RETURN VALUE view_count"
}

define_relation! {
    Prompt > count_by_author(author: &str) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM prompts WHERE author = $author))"
}

impl Prompt {
    pub async fn insert(&self, db: &Database) -> Result<()> {
        db.sql(
            "CREATE type::thing('prompts', $id) SET author = $author, title = $title, content = $content, \
             view_count = $view_count, created_at = $created_at RETURN NONE",
        )
        .bind(("id", &self.id))
        .bind(("author", &self.author))
        .bind(("title", &self.title))
        .bind(("content", &self.content))
        .bind(("view_count", self.view_count))
        .bind(("created_at", self.created_at))
        .execute()
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get() {
        let db = Database::memory().await.unwrap();
        let prompt = Prompt::new("ada@example.com".into(), "Haiku".into(), "Write a haiku".into());
        prompt.insert(&db).await.unwrap();

        let stored = Prompt::get(&prompt.id, &db).await.unwrap();
        assert_eq!(stored, Some(prompt));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let db = Database::memory().await.unwrap();
        let mut prompt = Prompt::new("ada@example.com".into(), "One".into(), "first".into());
        prompt.id = "fixed".into();
        prompt.insert(&db).await.unwrap();

        assert!(prompt.insert(&db).await.is_err());
    }

    #[tokio::test]
    async fn counts_only_the_authors_prompts() {
        let db = Database::memory().await.unwrap();
        for author in ["ada@example.com", "ada@example.com", "bob@example.com"] {
            Prompt::new(author.into(), "t".into(), "c".into())
                .insert(&db)
                .await
                .unwrap();
        }

        let count = Prompt::count_by_author("ada@example.com", &db).await.unwrap();
        assert_eq!(count, Some(2));
    }
}
