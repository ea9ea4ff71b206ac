//! Thin TMDB client implementing [`MetadataProvider`] with cache-then-network
//! semantics over a [`TmdbCacheStore`] (spec section 4.4).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use forgecast_data::TmdbCacheStore;
use forgecast_domain::{PipelineError, PipelineResult, TmdbCacheEntry};
use forgecast_resilience::{retry_with_backoff, ServiceRegistry};
use tracing::debug;

use crate::http_support::{classify_status, network_error};
use crate::model::MovieMetadata;
use crate::traits::MetadataProvider;

const MAX_ATTEMPTS: u32 = 5;
const SERVICE: &str = "tmdb";

/// Default `reqwest`-backed TMDB client. Rate-limited under the `"tmdb"`
/// bucket and retried per component A; cache lookups bypass both.
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    cache: TmdbCacheStore,
    cache_ttl: Duration,
    registry: Arc<ServiceRegistry>,
}

impl TmdbClient {
    /// Construct a client with credentials and a cache TTL in days.
    #[must_use]
    pub fn new(http: reqwest::Client, api_key: String, cache: TmdbCacheStore, cache_ttl_days: u32, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            http,
            api_key,
            cache,
            cache_ttl: Duration::days(i64::from(cache_ttl_days)),
            registry,
        }
    }

    async fn fetch_from_network(&self, tmdb_id: u64) -> PipelineResult<MovieMetadata> {
        self.registry
            .rate_limiter()
            .acquire("tmdb", 1.0, forgecast_resilience::rate_limiter::TMDB_DEFAULT)
            .await;
        let breaker = self.registry.breaker(SERVICE);

        retry_with_backoff("tmdb/get_movie", MAX_ATTEMPTS, Some(self.registry.metrics()), |_attempt| {
            let breaker = Arc::clone(&breaker);
            async move {
                breaker.before_call()?;
                let url = format!("https://api.themoviedb.org/3/movie/{tmdb_id}");
                let response = self
                    .http
                    .get(url)
                    .query(&[("api_key", self.api_key.as_str()), ("append_to_response", "credits")])
                    .send()
                    .await;

                let response = match response {
                    Ok(response) => response,
                    Err(source) => {
                        breaker.record_failure();
                        return Err(network_error("get_movie", &source));
                    }
                };

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    breaker.record_failure();
                    return Err(classify_status(SERVICE, "get_movie", status));
                }

                let body = response
                    .json::<TmdbMovieResponse>()
                    .await
                    .map_err(|source| network_error("get_movie", &source))?;
                breaker.record_success();
                Ok(body.into_metadata(tmdb_id))
            }
        })
        .await
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn get_movie(&self, tmdb_id: u64) -> PipelineResult<MovieMetadata> {
        let now = Utc::now();
        if let Some(cached) = self
            .cache
            .get(tmdb_id)
            .await
            .map_err(|source| PipelineError::InternalInvariant {
                detail: format!("tmdb cache read failed: {source}"),
            })?
        {
            if cached.is_valid(now) {
                debug!(tmdb_id, "tmdb cache hit");
                return serde_json::from_value(cached.payload).map_err(|source| PipelineError::InternalInvariant {
                    detail: format!("corrupt tmdb cache payload: {source}"),
                });
            }
        }

        let metadata = self.fetch_from_network(tmdb_id).await?;
        let payload = serde_json::to_value(&metadata).map_err(|source| PipelineError::InternalInvariant {
            detail: format!("failed to serialize tmdb metadata: {source}"),
        })?;
        let entry = TmdbCacheEntry {
            tmdb_id,
            payload,
            cached_at: now,
            expires_at: now + self.cache_ttl,
        };
        self.cache.upsert(&entry).await.map_err(|source| PipelineError::InternalInvariant {
            detail: format!("tmdb cache write failed: {source}"),
        })?;
        Ok(metadata)
    }

    async fn search_movie(&self, title: &str, year: Option<u16>) -> PipelineResult<Option<u64>> {
        self.registry
            .rate_limiter()
            .acquire("tmdb", 1.0, forgecast_resilience::rate_limiter::TMDB_DEFAULT)
            .await;
        let breaker = self.registry.breaker(SERVICE);
        breaker.before_call()?;

        let mut query = vec![("api_key", self.api_key.clone()), ("query", title.to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        let response = self
            .http
            .get("https://api.themoviedb.org/3/search/movie")
            .query(&query)
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(source) => {
                breaker.record_failure();
                return Err(network_error("search_movie", &source));
            }
        };
        if !response.status().is_success() {
            let status = response.status().as_u16();
            breaker.record_failure();
            return Err(classify_status(SERVICE, "search_movie", status));
        }

        let body = response
            .json::<TmdbSearchResponse>()
            .await
            .map_err(|source| network_error("search_movie", &source))?;
        breaker.record_success();
        Ok(body.results.into_iter().next().map(|result| result.id))
    }
}

#[derive(serde::Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchResult>,
}

#[derive(serde::Deserialize)]
struct TmdbSearchResult {
    id: u64,
}

#[derive(serde::Deserialize)]
struct TmdbMovieResponse {
    title: String,
    #[serde(default)]
    original_title: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    production_countries: Vec<TmdbCountry>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
    #[serde(default)]
    credits: Option<TmdbCredits>,
}

#[derive(serde::Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(serde::Deserialize)]
struct TmdbCountry {
    iso_3166_1: String,
}

#[derive(serde::Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCastMember>,
    #[serde(default)]
    crew: Vec<TmdbCrewMember>,
}

#[derive(serde::Deserialize)]
struct TmdbCastMember {
    name: String,
}

#[derive(serde::Deserialize)]
struct TmdbCrewMember {
    name: String,
    job: String,
}

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

impl TmdbMovieResponse {
    fn into_metadata(self, tmdb_id: u64) -> MovieMetadata {
        let year = self
            .release_date
            .split('-')
            .next()
            .and_then(|y| y.parse().ok())
            .unwrap_or_default();
        let (cast, director) = self.credits.map_or_else(
            || (Vec::new(), None),
            |credits| {
                let cast = credits.cast.into_iter().map(|member| member.name).collect();
                let director = credits.crew.into_iter().find(|member| member.job == "Director").map(|member| member.name);
                (cast, director)
            },
        );

        MovieMetadata {
            tmdb_id,
            title: self.title,
            original_title: self.original_title,
            year,
            overview: self.overview,
            tagline: self.tagline.filter(|t| !t.is_empty()),
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            cast,
            director,
            country: self.production_countries.into_iter().map(|c| c.iso_3166_1).collect(),
            runtime_minutes: self.runtime,
            rating: self.vote_average,
            poster_url: self.poster_path.map(|path| format!("{IMAGE_BASE_URL}{path}")),
            backdrop_url: self.backdrop_path.map(|path| format!("{IMAGE_BASE_URL}{path}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_is_parsed_from_the_release_date_prefix() {
        let response = TmdbMovieResponse {
            title: "Example".to_string(),
            original_title: "Example".to_string(),
            release_date: "2024-03-15".to_string(),
            overview: String::new(),
            tagline: None,
            genres: Vec::new(),
            production_countries: Vec::new(),
            runtime: None,
            vote_average: None,
            poster_path: None,
            backdrop_path: None,
            credits: None,
        };
        assert_eq!(response.into_metadata(42).year, 2024);
    }

    #[test]
    fn director_is_found_among_crew_by_job_title() {
        let response = TmdbMovieResponse {
            title: "Example".to_string(),
            original_title: "Example".to_string(),
            release_date: String::new(),
            overview: String::new(),
            tagline: None,
            genres: Vec::new(),
            production_countries: Vec::new(),
            runtime: None,
            vote_average: None,
            poster_path: None,
            backdrop_path: None,
            credits: Some(TmdbCredits {
                cast: vec![TmdbCastMember { name: "Lead Actor".to_string() }],
                crew: vec![
                    TmdbCrewMember {
                        name: "Gaffer".to_string(),
                        job: "Lighting".to_string(),
                    },
                    TmdbCrewMember {
                        name: "The Director".to_string(),
                        job: "Director".to_string(),
                    },
                ],
            }),
        };
        let metadata = response.into_metadata(7);
        assert_eq!(metadata.director, Some("The Director".to_string()));
        assert_eq!(metadata.cast, vec!["Lead Actor".to_string()]);
    }
}
