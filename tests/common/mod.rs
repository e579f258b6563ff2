//! Server test utilities.

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Duration;
use promptstats::api::{create_router, App};
use promptstats::auth::{Authenticator, Principal};
use promptstats::database::Database;
use promptstats::github::{GitHub, GitHubConfig};
use promptstats::model::{Owner, Prompt};
use secrecy::SecretString;

pub const SECRET: &str = "test-secret";

/// An in-memory application and a handle to its store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub database: Database,
    pub authenticator: Authenticator,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let database = Database::memory().await.expect("Failed to open the in-memory store");
        let authenticator = Authenticator::new(SecretString::new(SECRET.into()), "session");
        let github = GitHub::from_config(&GitHubConfig::default()).expect("Failed to build the GitHub client");

        let app = App::new(database.clone(), authenticator.clone(), github);
        let server = TestServer::new(create_router(app)).expect("Failed to start the test server");

        TestApp {
            server,
            database,
            authenticator,
        }
    }

    /// A valid session token for `email`, valid for an hour.
    pub fn session(&self, email: &str) -> String {
        let principal = Principal::new(email.to_string(), Some("Tester".to_string()));
        self.authenticator
            .issue(&principal, Duration::hours(1))
            .expect("Failed to issue a session")
    }

    /// `Authorization` header carrying a session for `email`.
    pub fn bearer(&self, email: &str) -> (HeaderName, HeaderValue) {
        let value = format!("Bearer {}", self.session(email));
        (
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&value).expect("Failed to build the header"),
        )
    }

    pub async fn register(&self, email: &str) -> Owner {
        Owner::register(email, None, &self.database)
            .await
            .expect("Failed to register the owner")
    }

    /// Stores a prompt with a fixed id and a starting view count.
    pub async fn seed_prompt(&self, id: &str, author: &str, views: u64) -> Prompt {
        let mut prompt = Prompt::new(author.to_string(), "Seeded".to_string(), "seeded content".to_string());
        prompt.id = id.to_string();
        prompt.view_count = views;
        prompt.insert(&self.database).await.expect("Failed to seed the prompt");
        prompt
    }
}
