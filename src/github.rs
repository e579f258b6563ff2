use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use snafu::{ensure, OptionExt as _, ResultExt as _, Snafu};
use tracing::instrument;

use crate::cache::Coalescer;
use crate::model::{now, ExternalMetrics};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// How long a successful upstream answer is served before asking again.
pub const FRESHNESS: Duration = Duration::from_secs(60 * 60);

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = ParseRepositoryError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (owner, name) = text
            .trim()
            .split_once('/')
            .context(ParseRepositorySnafu { text })?;

        let valid = |part: &str| !part.is_empty() && !part.contains('/') && !part.contains(char::is_whitespace);
        ensure!(valid(owner) && valid(name), ParseRepositorySnafu { text });

        Ok(Repository {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("expected a repository in the form `owner/repo`, got `{text}`"))]
pub struct ParseRepositoryError {
    text: String,
}

/// Why a zeroed snapshot was served instead of upstream data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DegradeCause {
    #[snafu(display("no repository is configured"))]
    Unconfigured,

    #[snafu(display("upstream answered with status {status}"))]
    UpstreamStatus { status: StatusCode },

    #[snafu(display("upstream request failed: {source}"))]
    Transport { source: reqwest::Error },

    #[snafu(display("upstream body could not be decoded: {source}"))]
    Body { source: reqwest::Error },
}

/// The outcome of a metrics fetch. Callers that only need the numbers use [Fetched::into_snapshot].
#[derive(Debug, Clone)]
pub enum Fetched {
    Fresh(ExternalMetrics),
    Degraded(ExternalMetrics, Arc<DegradeCause>),
}

impl Fetched {
    fn degraded(cause: impl Into<Arc<DegradeCause>>) -> Self {
        Fetched::Degraded(ExternalMetrics::zero(), cause.into())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Degraded(..))
    }

    pub fn into_snapshot(self) -> ExternalMetrics {
        match self {
            Fetched::Fresh(metrics) | Fetched::Degraded(metrics, _) => metrics,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(rename = "github_repo")]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub repository: Option<Repository>,
    #[serde(rename = "github_token", default)]
    pub token: Option<String>,
    #[serde(rename = "github_api", default = "default_api")]
    pub api: String,
    #[serde(rename = "github_timeout", default = "default_timeout")]
    #[serde_as(as = "DisplayFromStr")]
    pub timeout: humantime::Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            api: default_api(),
            timeout: default_timeout(),
        }
    }
}

fn default_api() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> humantime::Duration {
    Duration::from_secs(10).into()
}

#[derive(Debug, Deserialize)]
struct RepositoryBody {
    stargazers_count: u64,
    forks_count: u64,
    watchers_count: u64,
}

/// Fetches repository counters from the GitHub REST API, degrading to zeros on any failure.
#[derive(Debug, Clone)]
pub struct GitHub {
    http: reqwest::Client,
    api: String,
    repository: Option<Repository>,
    token: Option<SecretString>,
    memo: Coalescer<Repository, ExternalMetrics, DegradeCause>,
}

impl GitHub {
    pub fn from_config(config: &GitHubConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(*config.timeout)
            .build()?;

        Ok(GitHub {
            http,
            api: config.api.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            token: config.token.clone().map(SecretString::new),
            memo: Coalescer::new(FRESHNESS),
        })
    }

    pub fn repository(&self) -> Option<&Repository> {
        self.repository.as_ref()
    }

    /// Returns the repository counters. Never fails: any problem yields a zeroed snapshot and its cause.
    #[instrument(skip(self), fields(repository))]
    pub async fn fetch(&self) -> Fetched {
        let Some(repository) = self.repository.clone() else {
            tracing::debug!("no repository configured, serving zeroed metrics");
            return Fetched::degraded(DegradeCause::Unconfigured);
        };
        tracing::Span::current().record("repository", tracing::field::display(&repository));

        let request = self.request(&repository);
        match self.memo.get(repository, move || fetch_repository(request)).await {
            Ok(metrics) => Fetched::Fresh(metrics),
            Err(cause) => {
                tracing::warn!(error = %cause, "serving zeroed repository metrics");
                Fetched::degraded(cause)
            }
        }
    }

    fn request(&self, repository: &Repository) -> RequestBuilder {
        let url = format!("{}/repos/{}/{}", self.api, repository.owner, repository.name);
        let request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");

        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

async fn fetch_repository(request: RequestBuilder) -> Result<ExternalMetrics, DegradeCause> {
    let response = request.send().await.context(TransportSnafu)?;

    let status = response.status();
    ensure!(status.is_success(), UpstreamStatusSnafu { status });

    let body: RepositoryBody = response.json().await.context(BodySnafu)?;
    tracing::debug!(?body, "fetched repository metrics");

    Ok(ExternalMetrics {
        stars: body.stargazers_count,
        forks: body.forks_count,
        watchers: body.watchers_count,
        last_updated: Some(now()),
    })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Upstream {
        hits: Arc<AtomicUsize>,
        authorization: Arc<Mutex<Option<String>>>,
    }

    async fn spawn_upstream(status: AxumStatus, delay: Duration) -> (SocketAddr, Upstream) {
        let upstream = Upstream::default();

        let handler = move |State(upstream): State<Upstream>, headers: HeaderMap| async move {
            upstream.hits.fetch_add(1, Ordering::SeqCst);
            *upstream.authorization.lock().unwrap() = headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            tokio::time::sleep(delay).await;
            let body = json!({ "stargazers_count": 42, "forks_count": 7, "watchers_count": 42 });
            (status, Json(body)).into_response()
        };

        let app = Router::new()
            .route("/repos/:owner/:repo", get(handler))
            .with_state(upstream.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (address, upstream)
    }

    fn github(address: SocketAddr, repository: Option<&str>, token: Option<&str>) -> GitHub {
        let config = GitHubConfig {
            repository: repository.map(|repo| repo.parse().unwrap()),
            token: token.map(str::to_string),
            api: format!("http://{address}"),
            timeout: Duration::from_millis(200).into(),
        };
        GitHub::from_config(&config).unwrap()
    }

    #[test]
    fn parses_owner_and_name() {
        let repository: Repository = "octo/hello-world".parse().unwrap();
        assert_eq!(repository.owner, "octo");
        assert_eq!(repository.name, "hello-world");
        assert_eq!(repository.to_string(), "octo/hello-world");
    }

    #[test]
    fn rejects_malformed_repositories() {
        for text in ["octo", "octo/", "/repo", "a/b/c", "octo/hello world"] {
            assert!(text.parse::<Repository>().is_err(), "{text} should be rejected");
        }
    }

    #[tokio::test]
    async fn unconfigured_repository_never_touches_the_network() {
        let (address, upstream) = spawn_upstream(AxumStatus::OK, Duration::ZERO).await;

        let fetched = github(address, None, None).fetch().await;

        assert!(matches!(&fetched, Fetched::Degraded(_, cause) if matches!(**cause, DegradeCause::Unconfigured)));
        assert_eq!(fetched.into_snapshot(), ExternalMetrics::zero());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_error_degrades_to_zero() {
        let (address, upstream) = spawn_upstream(AxumStatus::INTERNAL_SERVER_ERROR, Duration::ZERO).await;

        let fetched = github(address, Some("octo/hello"), None).fetch().await;

        assert!(matches!(
            &fetched,
            Fetched::Degraded(_, cause) if matches!(**cause, DegradeCause::UpstreamStatus { status } if status == StatusCode::INTERNAL_SERVER_ERROR)
        ));
        assert_eq!(fetched.into_snapshot(), ExternalMetrics::zero());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_upstream_degrades_after_the_timeout() {
        let (address, _upstream) = spawn_upstream(AxumStatus::OK, Duration::from_secs(2)).await;

        let fetched = github(address, Some("octo/hello"), None).fetch().await;

        assert!(fetched.is_degraded());
        assert_eq!(fetched.into_snapshot(), ExternalMetrics::zero());
    }

    #[tokio::test]
    async fn unreachable_upstream_degrades_to_zero() {
        // bind then drop to get a port nobody listens on
        let address = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let fetched = github(address, Some("octo/hello"), None).fetch().await;

        assert!(matches!(&fetched, Fetched::Degraded(_, cause) if matches!(**cause, DegradeCause::Transport { .. })));
    }

    #[tokio::test]
    async fn success_is_mapped_and_memoized() {
        let (address, upstream) = spawn_upstream(AxumStatus::OK, Duration::ZERO).await;
        let github = github(address, Some("octo/hello"), None);

        let first = github.fetch().await;
        let second = github.fetch().await;

        let Fetched::Fresh(metrics) = first else {
            panic!("expected fresh metrics, got {first:?}");
        };
        assert_eq!((metrics.stars, metrics.forks, metrics.watchers), (42, 7, 42));
        assert!(metrics.last_updated.is_some());
        assert_eq!(second.into_snapshot(), metrics);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_is_sent_as_bearer_credential() {
        let (address, upstream) = spawn_upstream(AxumStatus::OK, Duration::ZERO).await;

        github(address, Some("octo/hello"), Some("s3cret")).fetch().await;

        let authorization = upstream.authorization.lock().unwrap().clone();
        assert_eq!(authorization.as_deref(), Some("Bearer s3cret"));
    }

    #[tokio::test]
    async fn missing_token_sends_no_credential() {
        let (address, upstream) = spawn_upstream(AxumStatus::OK, Duration::ZERO).await;

        github(address, Some("octo/hello"), None).fetch().await;

        assert_eq!(*upstream.authorization.lock().unwrap(), None);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }
}
