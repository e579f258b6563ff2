use derive_new::new;
use serde::Deserialize;
use snafu::{Location, ResultExt, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;

/// Helper for executing parameterized SurrealQL queries.
pub mod query;

/// Macros for attaching queries to model types.
pub mod macros;

pub use query::Bindings;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

const SETUP: &str = include_str!("../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{endpoint}` at {location}: {source}"))]
    DatabaseConnection {
        endpoint: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to apply the database schema at {location}: {source}"))]
    Schema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to query the database at {location}: {source}"))]
    DatabaseQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    DatabaseDeserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A cheap-to-clone handle to the record store.
#[derive(Debug, Clone, new)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects to the configured endpoint, signs in when credentials are present and applies the schema.
    #[tracing::instrument(skip(config), fields(endpoint = %config.endpoint))]
    pub async fn connect(config: &SurrealConfig) -> Result<Self> {
        let endpoint = config.endpoint.as_str();

        let database = surrealdb::engine::any::connect(endpoint)
            .await
            .context(DatabaseConnectionSnafu { endpoint })?;

        if let Some(credentials) = &config.credentials {
            database
                .signin(credentials.auth())
                .await
                .context(DatabaseConnectionSnafu { endpoint })?;
        }

        database
            .use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .context(DatabaseConnectionSnafu { endpoint })?;

        database.query(SETUP).await.context(SchemaSnafu)?;

        tracing::info!("connected to the database");
        Ok(Database { database })
    }

    /// A fresh in-memory store, used by tests and local runs.
    pub async fn memory() -> Result<Self> {
        Self::connect(&SurrealConfig::default()).await
    }
}

impl std::ops::Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurrealConfig {
    #[serde(rename = "surreal_endpoint", default = "default_endpoint")]
    pub endpoint: String,
    #[serde(rename = "surreal_namespace", default = "default_scope")]
    pub namespace: String,
    #[serde(rename = "surreal_database", default = "default_scope")]
    pub database: String,
    #[serde(flatten)]
    pub credentials: Option<SurrealCredentials>,
}

impl Default for SurrealConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            namespace: default_scope(),
            database: default_scope(),
            credentials: None,
        }
    }
}

fn default_endpoint() -> String {
    "mem://".to_string()
}

fn default_scope() -> String {
    "promptstats".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurrealCredentials {
    #[serde(rename = "surreal_username")]
    username: String,
    #[serde(rename = "surreal_password")]
    password: String,
}

impl SurrealCredentials {
    fn auth(&self) -> auth::Root<'_> {
        auth::Root {
            username: &self.username,
            password: &self.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_databases_are_isolated() {
        let first = Database::memory().await.unwrap();
        let second = Database::memory().await.unwrap();

        first
            .sql("CREATE type::thing('prompts', 'only-here') SET view_count = 0 RETURN NONE")
            .execute()
            .await
            .unwrap();

        let seen: Option<u64> = second
            .sql("SELECT VALUE view_count FROM type::thing('prompts', 'only-here')")
            .fetch_first()
            .await
            .unwrap();

        assert_eq!(seen, None);
    }
}
