use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),

    #[error("not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Whether a lookup targets the movie or the TV side of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    Movie,
    Series,
}

impl TitleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Series => "tv",
        }
    }
}

/// Title-level metadata as the external catalog reports it. The release
/// date stays a raw `YYYY-MM-DD` string; the resolver owns year parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleDetails {
    pub id: u64,
    pub original_title: String,
    pub original_language: String,
    pub adult: bool,
    pub release_date: String,
}

/// One page of search results plus the catalog's total count. The resolver
/// cares about `total_results`, not just what fit on the page.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub total_results: usize,
    pub results: Vec<TitleDetails>,
}

/// Metadata lookup collaborator consumed by every recognizer.
///
/// Implementations must be safe for concurrent use; one instance is shared
/// across all root workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Free-text title search with an optional year hint.
    async fn search(
        &self,
        kind: TitleKind,
        name: &str,
        year_hint: Option<u16>,
    ) -> Result<SearchPage, ProviderError>;

    /// Fetch one title by its external numeric id.
    async fn details(&self, kind: TitleKind, id: u64) -> Result<TitleDetails, ProviderError>;
}

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3/";

/// TMDB v3 client.
#[derive(Debug, Clone)]
pub struct TmdbProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl TmdbProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: Url::parse(TMDB_API_BASE).expect("static base url"),
        }
    }

    /// Point the client somewhere else, for tests against a local stub.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        mut url: Url,
    ) -> Result<T, ProviderError> {
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        debug!(path = url.path(), "tmdb request");
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(ProviderError::InvalidApiKey),
            StatusCode::NOT_FOUND => return Err(ProviderError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            status if !status.is_success() => {
                return Err(ProviderError::Api(format!("unexpected status {status}")));
            }
            _ => {}
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct MovieRow {
    id: u64,
    #[serde(default)]
    original_title: String,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    release_date: String,
}

impl From<MovieRow> for TitleDetails {
    fn from(row: MovieRow) -> Self {
        TitleDetails {
            id: row.id,
            original_title: row.original_title,
            original_language: row.original_language,
            adult: row.adult,
            release_date: row.release_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    id: u64,
    #[serde(default)]
    original_name: String,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    first_air_date: String,
}

impl From<SeriesRow> for TitleDetails {
    fn from(row: SeriesRow) -> Self {
        TitleDetails {
            id: row.id,
            original_title: row.original_name,
            original_language: row.original_language,
            adult: row.adult,
            release_date: row.first_air_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody<T> {
    #[serde(default)]
    total_results: usize,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search(
        &self,
        kind: TitleKind,
        name: &str,
        year_hint: Option<u16>,
    ) -> Result<SearchPage, ProviderError> {
        let mut url = self.endpoint(&format!("search/{}", kind.as_str()))?;
        url.query_pairs_mut().append_pair("query", name);
        if let Some(year) = year_hint {
            let key = match kind {
                TitleKind::Movie => "year",
                TitleKind::Series => "first_air_date_year",
            };
            url.query_pairs_mut().append_pair(key, &year.to_string());
        }

        let page = match kind {
            TitleKind::Movie => {
                let body: SearchBody<MovieRow> = self.get_json(url).await?;
                SearchPage {
                    total_results: body.total_results,
                    results: body.results.into_iter().map(Into::into).collect(),
                }
            }
            TitleKind::Series => {
                let body: SearchBody<SeriesRow> = self.get_json(url).await?;
                SearchPage {
                    total_results: body.total_results,
                    results: body.results.into_iter().map(Into::into).collect(),
                }
            }
        };
        Ok(page)
    }

    async fn details(&self, kind: TitleKind, id: u64) -> Result<TitleDetails, ProviderError> {
        let url = self.endpoint(&format!("{}/{id}", kind.as_str()))?;
        match kind {
            TitleKind::Movie => Ok(self.get_json::<MovieRow>(url).await?.into()),
            TitleKind::Series => Ok(self.get_json::<SeriesRow>(url).await?.into()),
        }
    }
}
