use std::sync::Arc;
use std::time::Duration;

use futures::Future;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use snafu::{ensure, Location, ResultExt as _, Snafu};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::instrument;
use url::Url;

use crate::cache::Coalescer;
use crate::model::{ExternalMetrics, OwnerStats};

/// How long an owner stats answer is shared between requests.
pub const OWNER_STATS_WINDOW: Duration = Duration::from_secs(300);

/// How long a repository metrics answer is shared between requests.
pub const GITHUB_STATS_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("request to `{url}` failed: {source}"))]
    Request {
        url: Url,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{url}` answered with status {status}"))]
    Status {
        url: Url,
        status: StatusCode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not decode the body of `{url}`: {source}"))]
    Decode {
        url: Url,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{path}` is not a valid path below the base url: {source}"))]
    Endpoint {
        path: String,
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A failing fetch is never retried more often than this, whatever the configuration says.
pub const MAX_RETRIES: usize = 1;

/// A failing fetch is attempted again `retries` times, at most [MAX_RETRIES], waiting `delay` before each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub async fn run<A, Fut, T, E>(&self, action: A) -> Result<T, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let strategy = FixedInterval::new(self.delay).take(self.retries.min(MAX_RETRIES));
        Retry::spawn(strategy, action).await
    }
}

/// Which client events drop every remembered answer. Both are off unless asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidatePolicy {
    pub on_focus: bool,
    pub on_reconnect: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: Url,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay")]
    #[serde_as(as = "DisplayFromStr")]
    pub retry_delay: humantime::Duration,
    #[serde(default)]
    pub revalidate_on_focus: bool,
    #[serde(default)]
    pub revalidate_on_reconnect: bool,
}

impl ClientConfig {
    /// Reads `STATS_CLIENT_*` variables, e.g. `STATS_CLIENT_BASE_URL`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STATS_CLIENT_").from_env()
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries.min(MAX_RETRIES),
            delay: *self.retry_delay,
        }
    }

    pub fn revalidate(&self) -> RevalidatePolicy {
        RevalidatePolicy {
            on_focus: self.revalidate_on_focus,
            on_reconnect: self.revalidate_on_reconnect,
        }
    }
}

fn default_retries() -> usize {
    RetryPolicy::default().retries
}

fn default_retry_delay() -> humantime::Duration {
    RetryPolicy::default().delay.into()
}

/// Consumer of the statistics endpoints.
///
/// Requests for the same resource made within its window share one answer. A failing request is retried
/// according to the [RetryPolicy] and, if it still fails, is surfaced and forgotten.
#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    base_url: Url,
    owner_stats: Coalescer<String, OwnerStats, ClientError>,
    github: Coalescer<(), ExternalMetrics, ClientError>,
    retry: RetryPolicy,
    revalidate: RevalidatePolicy,
}

impl StatsClient {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        StatsClient {
            http,
            base_url: config.base_url.clone(),
            owner_stats: Coalescer::new(OWNER_STATS_WINDOW),
            github: Coalescer::new(GITHUB_STATS_WINDOW),
            retry: config.retry(),
            revalidate: config.revalidate(),
        }
    }

    /// Statistics of the owner behind `session`. Answers are shared per session token.
    #[instrument(skip_all)]
    pub async fn owner_stats(&self, session: &str) -> Result<OwnerStats, Arc<ClientError>> {
        let fetch = {
            let this = self.clone();
            let session = session.to_string();
            move || async move { this.fetch_with_retry("stats", Some(session)).await }
        };

        self.owner_stats.get(session.to_string(), fetch).await
    }

    #[instrument(skip_all)]
    pub async fn github_stats(&self) -> Result<ExternalMetrics, Arc<ClientError>> {
        let fetch = {
            let this = self.clone();
            move || async move { this.fetch_with_retry("github/stats", None).await }
        };

        self.github.get((), fetch).await
    }

    /// Forgets the remembered stats of `session`, e.g. after the owner created a prompt.
    pub fn invalidate_owner_stats(&self, session: &str) {
        self.owner_stats.invalidate(&session.to_string());
    }

    pub fn on_focus(&self) {
        if self.revalidate.on_focus {
            self.invalidate_all();
        }
    }

    pub fn on_reconnect(&self) {
        if self.revalidate.on_reconnect {
            self.invalidate_all();
        }
    }

    fn invalidate_all(&self) {
        tracing::debug!("dropping every remembered answer");
        self.owner_stats.clear();
        self.github.clear();
    }

    async fn fetch_with_retry<T>(&self, path: &str, session: Option<String>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path).context(EndpointSnafu { path })?;

        self.retry
            .run(|| {
                let url = url.clone();
                let session = session.clone();
                async move {
                    let result = self.fetch(url, session).await;
                    if let Err(err) = &result {
                        tracing::warn!(error = %err, "stats request failed");
                    }
                    result
                }
            })
            .await
    }

    async fn fetch<T>(&self, url: Url, session: Option<String>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let mut request = self.http.get(url.clone());
        if let Some(session) = session {
            request = request.header(AUTHORIZATION, format!("Bearer {session}"));
        }

        let response = request.send().await.context(RequestSnafu { url: url.clone() })?;

        let status = response.status();
        ensure!(status.is_success(), StatusSnafu { url, status });

        response.json().await.context(DecodeSnafu { url })
    }
}
