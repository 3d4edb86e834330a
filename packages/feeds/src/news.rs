//! Weather and climate headlines from `NewsAPI`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landcover_models::readings::NewsHeadline;
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{FeedError, NewsFeed, str_at};

/// Placeholder title `NewsAPI` uses for withdrawn articles.
const REMOVED_TITLE: &str = "[Removed]";

pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    query: String,
    page_size: u32,
}

impl NewsApiClient {
    /// Builds a client from the registry entry and `NEWS_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured or the key
    /// is missing.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("newsapi")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not a `NewsAPI` entry or its
    /// key variable is unset.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::NewsApi {
            base_url,
            api_key_env,
            query,
            page_size,
        } = &service.provider
        else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        Ok(Self {
            client: crate::http_client(service)?,
            base_url: base_url.clone(),
            api_key: crate::api_key(api_key_env)?,
            query: query.clone(),
            page_size: *page_size,
        })
    }
}

#[async_trait]
impl NewsFeed for NewsApiClient {
    async fn headlines(&self) -> Result<Vec<NewsHeadline>, FeedError> {
        let page_size = self.page_size.to_string();
        let body = retry::send_json(RetryPolicy::FEED, || {
            self.client.get(&self.base_url).query(&[
                ("q", self.query.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
        })
        .await?;
        parse_headlines(&body)
    }
}

/// Parses an `everything` response, skipping withdrawn articles.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] if the service reports an error status.
pub fn parse_headlines(body: &Value) -> Result<Vec<NewsHeadline>, FeedError> {
    if str_at(body, "/status") == Some("error") {
        return Err(FeedError::parse(
            str_at(body, "/message").unwrap_or("news service returned an error"),
        ));
    }
    let Some(articles) = body.get("articles").and_then(Value::as_array) else {
        return Ok(vec![]);
    };

    Ok(articles
        .iter()
        .filter_map(|article| {
            let title = str_at(article, "/title")?.trim();
            if title.is_empty() || title == REMOVED_TITLE {
                return None;
            }
            Some(NewsHeadline {
                title: title.to_string(),
                source: str_at(article, "/source/name")
                    .unwrap_or("Unknown")
                    .to_string(),
                published_at: str_at(article, "/publishedAt")
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                url: str_at(article, "/url").map(ToString::to_string),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn skips_removed_articles() {
        let body = json!({
            "status": "ok",
            "articles": [
                {"title": "Monsoon arrives early", "source": {"name": "The Hindu"},
                 "publishedAt": "2024-06-01T08:30:00Z", "url": "https://example.org/a"},
                {"title": "[Removed]", "source": {"name": "x"}},
                {"title": "Heatwave grips north", "source": {}}
            ]
        });
        let headlines = parse_headlines(&body).unwrap();
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].source, "The Hindu");
        assert!(headlines[0].published_at.is_some());
        assert_eq!(headlines[1].source, "Unknown");
        assert!(headlines[1].url.is_none());
    }

    #[test]
    fn error_status_is_an_error() {
        let body = json!({"status": "error", "message": "apiKeyInvalid"});
        let err = parse_headlines(&body).unwrap_err();
        assert!(err.to_string().contains("apiKeyInvalid"));
    }
}
