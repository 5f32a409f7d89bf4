//! GitHub profile statistics with a short-lived local cache.
//!
//! The stats page shows a profile card, star and fork totals, language
//! counts and the most recently updated repositories. Fetching is done once
//! per page view at most: a fresh cached copy wins, and a failed fetch is
//! reported to the caller instead of being retried.

use std::{collections::BTreeMap, fmt};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const GITHUB_USERNAME: &str = "DenxVil";
pub const CACHE_KEY: &str = "denvil_github_stats";
/// Five minutes, in milliseconds.
pub const CACHE_TTL_MS: f64 = 5.0 * 60.0 * 1000.0;
pub const TOP_REPOS: usize = 6;

/// User record as returned by the GitHub users endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiUser {
    pub login: String,
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    #[serde(default)]
    pub created_at: String,
}

/// Repository record as returned by the GitHub repos endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiRepo {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    pub language: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub language: Option<String>,
    pub url: String,
    pub updated_at: String,
}

/// Aggregated profile statistics, stored in the cache as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubStats {
    pub user: UserSummary,
    pub total_stars: u64,
    pub total_forks: u64,
    /// Number of repositories per primary language.
    pub languages: BTreeMap<String, u32>,
    pub top_repos: Vec<RepoSummary>,
    /// Milliseconds since the Unix epoch.
    pub fetched_at: f64,
}

impl GithubStats {
    /// Summarize a user and their repositories. `repos` is expected in
    /// most-recently-updated order; the first [`TOP_REPOS`] are kept.
    pub fn aggregate(user: ApiUser, repos: &[ApiRepo], fetched_at: f64) -> Self {
        let mut languages = BTreeMap::new();
        for language in repos.iter().filter_map(|r| r.language.as_ref()) {
            *languages.entry(language.clone()).or_insert(0) += 1;
        }
        GithubStats {
            total_stars: repos.iter().map(|r| r.stargazers_count as u64).sum(),
            total_forks: repos.iter().map(|r| r.forks_count as u64).sum(),
            languages,
            top_repos: repos
                .iter()
                .take(TOP_REPOS)
                .map(|r| RepoSummary {
                    name: r.name.clone(),
                    description: r.description.clone(),
                    stars: r.stargazers_count,
                    forks: r.forks_count,
                    language: r.language.clone(),
                    url: r.html_url.clone(),
                    updated_at: r.updated_at.clone(),
                })
                .collect(),
            user: UserSummary {
                name: user.name.unwrap_or(user.login),
                avatar: user.avatar_url,
                bio: user.bio,
                location: user.location,
                public_repos: user.public_repos,
                followers: user.followers,
                following: user.following,
                created_at: user.created_at,
            },
            fetched_at,
        }
    }

    /// Languages by repository count, most used first, ties by name.
    pub fn top_languages(&self, n: usize) -> Vec<(&str, u32)> {
        let mut sorted: Vec<(&str, u32)> = self
            .languages
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        sorted.truncate(n);
        sorted
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatsError {
    /// The request could not be made or the server refused it.
    Fetch(String),
    /// The response was not the expected JSON.
    Decode(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::Fetch(msg) => write!(f, "Failed to fetch GitHub data: {}", msg),
            StatsError::Decode(msg) => write!(f, "Unexpected GitHub response: {}", msg),
        }
    }
}

impl std::error::Error for StatsError {}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self {
        StatsError::Decode(e.to_string())
    }
}

/// String key-value storage, e.g. the browser's local storage. Writes may
/// fail silently (quota, private mode); the cache treats that as best effort.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> bool;

    fn remove(&self, key: &str);
}

pub struct StatsCache<'a> {
    store: &'a dyn KeyValueStore,
    key: &'a str,
    ttl_ms: f64,
}

impl<'a> StatsCache<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            key: CACHE_KEY,
            ttl_ms: CACHE_TTL_MS,
        }
    }

    pub fn with_ttl(mut self, ttl_ms: f64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Cached stats if younger than the TTL. Stale or unreadable entries
    /// are removed.
    pub fn get(&self, now_ms: f64) -> Option<GithubStats> {
        let raw = self.store.get(self.key)?;
        match serde_json::from_str::<GithubStats>(&raw) {
            Ok(stats) if now_ms - stats.fetched_at <= self.ttl_ms => Some(stats),
            Ok(_) => {
                debug!("cached stats expired");
                self.store.remove(self.key);
                None
            }
            Err(e) => {
                warn!("dropping unreadable cached stats: {}", e);
                self.store.remove(self.key);
                None
            }
        }
    }

    pub fn put(&self, stats: &GithubStats) {
        let stored = serde_json::to_string(stats)
            .map(|json| self.store.set(self.key, &json))
            .unwrap_or(false);
        if !stored {
            warn!("Could not cache GitHub stats");
        }
    }
}

/// Where raw profile data comes from.
#[allow(async_fn_in_trait)]
pub trait StatsSource {
    async fn fetch_user(&self, username: &str) -> Result<ApiUser, StatsError>;

    /// Repositories, most recently updated first.
    async fn fetch_repos(&self, username: &str) -> Result<Vec<ApiRepo>, StatsError>;
}

/// Cached stats if fresh, otherwise one fetch of user and repositories.
/// A failed fetch is returned as is; nothing is retried.
pub async fn load_stats<S: StatsSource>(
    source: &S,
    cache: &StatsCache<'_>,
    username: &str,
    now_ms: f64,
) -> Result<GithubStats, StatsError> {
    if let Some(stats) = cache.get(now_ms) {
        debug!("using cached GitHub stats");
        return Ok(stats);
    }
    let (user, repos) = futures::future::try_join(
        source.fetch_user(username),
        source.fetch_repos(username),
    )
    .await?;
    let stats = GithubStats::aggregate(user, &repos, now_ms);
    cache.put(&stats);
    info!(
        "fetched GitHub stats: {} repos, {} stars",
        repos.len(),
        stats.total_stars
    );
    Ok(stats)
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::{HttpStatsSource, LocalStore};

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{ApiRepo, ApiUser, KeyValueStore, StatsError, StatsSource};

    /// `window.localStorage`. Every call is a no-op when storage is
    /// unavailable.
    pub struct LocalStore(Option<web_sys::Storage>);

    impl LocalStore {
        pub fn new() -> Self {
            Self(
                web_sys::window()
                    .and_then(|w| w.local_storage().ok())
                    .flatten(),
            )
        }
    }

    impl Default for LocalStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl KeyValueStore for LocalStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.as_ref()?.get_item(key).ok().flatten()
        }

        fn set(&self, key: &str, value: &str) -> bool {
            self.0
                .as_ref()
                .is_some_and(|s| s.set_item(key, value).is_ok())
        }

        fn remove(&self, key: &str) {
            if let Some(storage) = &self.0 {
                let _ = storage.remove_item(key);
            }
        }
    }

    /// The public GitHub REST API.
    pub struct HttpStatsSource {
        base: String,
    }

    impl HttpStatsSource {
        pub fn new() -> Self {
            Self {
                base: "https://api.github.com".to_string(),
            }
        }

        async fn get_text(&self, path: &str) -> Result<String, StatsError> {
            let url = format!("{}{}", self.base, path);
            let response = reqwest::get(&url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StatsError::Fetch(e.to_string()))?;
            response
                .text()
                .await
                .map_err(|e| StatsError::Fetch(e.to_string()))
        }
    }

    impl Default for HttpStatsSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StatsSource for HttpStatsSource {
        async fn fetch_user(&self, username: &str) -> Result<ApiUser, StatsError> {
            let text = self.get_text(&format!("/users/{}", username)).await?;
            Ok(serde_json::from_str(&text)?)
        }

        async fn fetch_repos(&self, username: &str) -> Result<Vec<ApiRepo>, StatsError> {
            let text = self
                .get_text(&format!("/users/{}/repos?per_page=100&sort=updated", username))
                .await?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}
