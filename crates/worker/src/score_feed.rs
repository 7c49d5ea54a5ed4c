//! Source of external community scores.

use std::time::Duration;

use async_trait::async_trait;
use credit_core::score::ExternalScore;
use serde::Deserialize;

use crate::error::WorkerError;

/// Placeholder replaced by the page number in the feed URL.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// A paged feed of absolute scores. An empty page ends the walk.
#[async_trait]
pub trait ScoreFeed: Send + Sync {
    /// Fetches one zero-based page.
    async fn fetch_page(&self, page: u32) -> Result<Vec<ExternalScore>, WorkerError>;
}

#[derive(Debug, Deserialize)]
struct LeaderboardPage {
    #[serde(default)]
    users: Vec<LeaderboardUser>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardUser {
    id: i64,
    #[serde(default)]
    username: String,
    total_score: i64,
}

impl From<LeaderboardUser> for ExternalScore {
    fn from(user: LeaderboardUser) -> Self {
        Self {
            account_id: user.id,
            username: user.username,
            score: user.total_score,
        }
    }
}

/// Reads the community leaderboard over HTTP.
///
/// The URL carries a `{page}` placeholder; without one, `page` is appended
/// as a query parameter.
#[derive(Debug, Clone)]
pub struct HttpScoreFeed {
    http: reqwest::Client,
    url_template: String,
}

impl HttpScoreFeed {
    /// Creates a feed reading from `url_template`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url_template: impl Into<String>) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url_template: url_template.into(),
        })
    }

    /// URL of one page.
    #[must_use]
    pub fn page_url(&self, page: u32) -> String {
        if self.url_template.contains(PAGE_PLACEHOLDER) {
            self.url_template
                .replace(PAGE_PLACEHOLDER, &page.to_string())
        } else {
            let separator = if self.url_template.contains('?') { '&' } else { '?' };
            format!("{}{separator}page={page}", self.url_template)
        }
    }
}

#[async_trait]
impl ScoreFeed for HttpScoreFeed {
    async fn fetch_page(&self, page: u32) -> Result<Vec<ExternalScore>, WorkerError> {
        let response = self.http.get(self.page_url(page)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Feed(status.as_u16()));
        }
        let body: LeaderboardPage = response.json().await?;
        Ok(body.users.into_iter().map(ExternalScore::from).collect())
    }
}
