//! Concurrent collection of the optional context feeds.
//!
//! Every branch runs under its own timeout. A branch that fails or
//! times out is logged and contributes nothing; gathering never fails.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use landcover_models::Coordinates;
use landcover_models::readings::{AirQualityReading, DisasterEvent, NewsHeadline, WeatherReading};
use serde::Serialize;

use crate::news::NewsApiClient;
use crate::noaa::NoaaClient;
use crate::openweather::OpenWeatherClient;
use crate::service_registry::{self, DEFAULT_TIMEOUT_SECS};
use crate::usgs::UsgsClient;
use crate::{AirQualityFeed, DisasterFeed, FeedError, NewsFeed, WeatherFeed};

/// Everything the context feeds returned for one point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBundle {
    pub weather: Option<WeatherReading>,
    pub air_quality: Option<AirQualityReading>,
    /// Most severe first, then nearest.
    pub disasters: Vec<DisasterEvent>,
    pub news: Vec<NewsHeadline>,
}

/// The configured context feeds. Any of them may be absent.
#[derive(Clone)]
pub struct FeedSet {
    weather: Option<Arc<dyn WeatherFeed>>,
    air_quality: Option<Arc<dyn AirQualityFeed>>,
    disasters: Vec<Arc<dyn DisasterFeed>>,
    news: Option<Arc<dyn NewsFeed>>,
    timeout: Duration,
}

impl Default for FeedSet {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl std::fmt::Debug for FeedSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSet")
            .field("weather", &self.weather.is_some())
            .field("air_quality", &self.air_quality.is_some())
            .field(
                "disasters",
                &self.disasters.iter().map(|d| d.name().to_string()).collect::<Vec<_>>(),
            )
            .field("news", &self.news.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FeedSet {
    /// An empty set whose branches each get `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            weather: None,
            air_quality: None,
            disasters: Vec::new(),
            news: None,
            timeout,
        }
    }

    /// Builds every feed the environment allows. Feeds whose key is
    /// missing are left out with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let timeout_secs = ["openweather", "usgs", "noaa", "newsapi"]
            .iter()
            .filter_map(|id| service_registry::service(id))
            .map(|s| s.timeout_secs)
            .max()
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let mut feeds = Self::new(Duration::from_secs(timeout_secs));

        match OpenWeatherClient::from_env() {
            Ok(client) => {
                let client = Arc::new(client);
                feeds.weather = Some(client.clone());
                feeds.air_quality = Some(client.clone());
                feeds.disasters.push(client);
            }
            Err(e) => log::warn!("Weather, air quality and alerts disabled: {e}"),
        }
        match UsgsClient::from_env() {
            Ok(client) => feeds.disasters.push(Arc::new(client)),
            Err(e) => log::warn!("Earthquake feed disabled: {e}"),
        }
        match NoaaClient::from_env() {
            Ok(client) => feeds.disasters.push(Arc::new(client)),
            Err(e) => log::warn!("Storm feed disabled: {e}"),
        }
        match NewsApiClient::from_env() {
            Ok(client) => feeds.news = Some(Arc::new(client)),
            Err(e) => log::warn!("News feed disabled: {e}"),
        }

        feeds
    }

    #[must_use]
    pub fn with_weather(mut self, feed: Arc<dyn WeatherFeed>) -> Self {
        self.weather = Some(feed);
        self
    }

    #[must_use]
    pub fn with_air_quality(mut self, feed: Arc<dyn AirQualityFeed>) -> Self {
        self.air_quality = Some(feed);
        self
    }

    #[must_use]
    pub fn with_disaster_feed(mut self, feed: Arc<dyn DisasterFeed>) -> Self {
        self.disasters.push(feed);
        self
    }

    #[must_use]
    pub fn with_news(mut self, feed: Arc<dyn NewsFeed>) -> Self {
        self.news = Some(feed);
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queries all feeds for `at` concurrently.
    pub async fn gather(&self, at: Coordinates) -> FeedBundle {
        let weather = async {
            match &self.weather {
                Some(feed) => bounded("weather", self.timeout, feed.current_weather(at)).await,
                None => None,
            }
        };
        let air_quality = async {
            match &self.air_quality {
                Some(feed) => bounded("air quality", self.timeout, feed.air_quality(at)).await,
                None => None,
            }
        };
        let disasters = join_all(
            self.disasters
                .iter()
                .map(|feed| bounded(feed.name(), self.timeout, feed.disasters(at))),
        );
        let news = async {
            match &self.news {
                Some(feed) => bounded("news", self.timeout, feed.headlines()).await,
                None => None,
            }
        };

        let (weather, air_quality, disasters, news) =
            tokio::join!(weather, air_quality, disasters, news);

        let mut disasters: Vec<DisasterEvent> = disasters.into_iter().flatten().flatten().collect();
        disasters.sort_by(|a, b| {
            b.severity.cmp(&a.severity).then_with(|| {
                a.distance_km
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
            })
        });

        FeedBundle {
            weather,
            air_quality,
            disasters,
            news: news.unwrap_or_default(),
        }
    }
}

async fn bounded<T>(
    label: &str,
    timeout: Duration,
    future: impl Future<Output = Result<T, FeedError>>,
) -> Option<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log::warn!("{label} feed failed: {e}");
            None
        }
        Err(_) => {
            log::warn!("{label} feed timed out after {timeout:?}");
            None
        }
    }
}
