use axum::extract::FromRef;
use derive_new::new;

use crate::auth::Authenticator;
use crate::database::Database;
use crate::github::GitHub;

/// Shared handles every handler can extract with `State<T>`.
#[derive(Debug, Clone, FromRef, new)]
pub struct App {
    pub database: Database,
    pub authenticator: Authenticator,
    pub github: GitHub,
}
