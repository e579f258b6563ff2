use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use snafu::ResultExt;

use crate::auth::{Authenticator, SessionConfig};
use crate::database::{Database, SurrealConfig};
use crate::error::{ApplicationError, ConfigLoadSnafu, ConnectDatabaseSnafu, HttpClientSnafu};
use crate::github::{GitHub, GitHubConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(flatten)]
    pub surreal: SurrealConfig,
    #[serde(flatten)]
    pub session: SessionConfig,
    #[serde(flatten)]
    pub github: GitHubConfig,
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub async fn database(&self) -> Result<Database, ApplicationError> {
        Database::connect(&self.surreal).await.context(ConnectDatabaseSnafu)
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::from_config(&self.session)
    }

    pub fn github(&self) -> Result<GitHub, ApplicationError> {
        GitHub::from_config(&self.github).context(HttpClientSnafu)
    }
}
