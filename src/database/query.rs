use derive_new::new;
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use surrealdb::engine::any::Any;
use surrealdb::opt::QueryResult;

use super::*;

impl Database {
    /// Create a builder to execute a SurrealQL query against the store. Parameters are bound with [Bindings::bind].
    ///
    /// # Example
    /// ```ignore
    /// let views: Option<u64> = db.sql("SELECT VALUE view_count FROM type::thing('prompts', $id)")
    ///     .bind(("id", "abc"))
    ///     .fetch_first()
    ///     .await?;
    /// ```
    pub fn sql(&self, query: &str) -> Bindings<'_> {
        Bindings::new(self.database.query(query))
    }
}

#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return the raw [surrealdb::Response]. Errors raised by any statement are surfaced here.
    pub async fn execute(self) -> Result<surrealdb::Response> {
        let response = self.query.await.context(DatabaseQuerySnafu)?;
        let response = response.check().context(DatabaseQuerySnafu)?;
        tracing::trace!(?response, "executed query");
        Ok(response)
    }

    /// Execute the query and deserialize the result of the first statement.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        statements.take::<T>(0).context(DatabaseDeserializeSnafu)
    }
}
