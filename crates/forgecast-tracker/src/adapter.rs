//! Wires a parsed [`TrackerSchema`] to an HTTP transport guarded by the
//! resilience layer (component A/B/C), producing the operations component E
//! needs: authenticate, search, duplicate-check, and upload.

use std::sync::Arc;

use forgecast_config::TrackerCredentials;
use forgecast_domain::{ErrorKind, PipelineError, PipelineResult, TrackerOutcome, TrackerResult};
use forgecast_resilience::{classify_http_status, retry_with_backoff, ServiceRegistry};
use reqwest::multipart;
use tracing::{info, warn};

use crate::context::BuildContext;
use crate::error::SchemaError;
use crate::fields::{self, ResolvedField};
use crate::schema::{AuthKind, EndpointSpec, HttpMethod, TrackerSchema};
use crate::search::{self, SearchResult};
use crate::validate;

/// Maximum number of attempts the retry wrapper spends on one tracker call.
const MAX_ATTEMPTS: u32 = 5;

/// An HTTP-backed tracker, built from a parsed declarative schema plus the
/// operator-supplied credentials for that tracker.
pub struct TrackerAdapter {
    schema: TrackerSchema,
    credentials: TrackerCredentials,
    http: reqwest::Client,
    registry: Arc<ServiceRegistry>,
}

impl TrackerAdapter {
    /// Construct an adapter over an already-parsed schema.
    #[must_use]
    pub const fn new(
        schema: TrackerSchema,
        credentials: TrackerCredentials,
        http: reqwest::Client,
        registry: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            schema,
            credentials,
            http,
            registry,
        }
    }

    /// This tracker's unique slug.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.schema.tracker.slug
    }

    fn endpoint_url(&self, endpoint: &EndpointSpec) -> String {
        if endpoint.path.starts_with("http://") || endpoint.path.starts_with("https://") {
            endpoint.path.clone()
        } else {
            format!(
                "{}/{}",
                self.schema.tracker.base_url.trim_end_matches('/'),
                endpoint.path.trim_start_matches('/')
            )
        }
    }

    fn apply_auth(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.schema.auth.kind {
            AuthKind::Bearer => {
                if let Some(token) = &self.credentials.api_key {
                    let header = self.schema.auth.header.as_deref().unwrap_or("Authorization");
                    let prefix = self.schema.auth.prefix.as_deref().unwrap_or("Bearer ");
                    builder = builder.header(header, format!("{prefix}{token}"));
                }
            }
            AuthKind::ApiKey => {
                if let (Some(header), Some(token)) = (&self.schema.auth.header, &self.credentials.api_key) {
                    builder = builder.header(header.as_str(), token.as_str());
                }
            }
            AuthKind::Passkey => {
                if let (Some(param), Some(passkey)) = (&self.schema.auth.passkey_param, &self.credentials.passkey) {
                    builder = builder.query(&[(param.as_str(), passkey.as_str())]);
                }
            }
            AuthKind::Cookie => {
                // Session cookie is established by `authenticate` and carried
                // by the shared client's cookie store; nothing to add here.
            }
        }
        builder
    }

    fn request(&self, endpoint: &EndpointSpec) -> reqwest::RequestBuilder {
        let url = self.endpoint_url(endpoint);
        let builder = match endpoint.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
        };
        self.apply_auth(builder)
    }

    /// Perform the cookie-session login flow for trackers declaring
    /// `auth.type: cookie`. A no-op for every other auth kind.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AuthRejected`] on a non-2xx response, or a
    /// transient/circuit error per the usual classification.
    pub async fn authenticate(&self) -> PipelineResult<()> {
        if self.schema.auth.kind != AuthKind::Cookie {
            return Ok(());
        }
        let Some(endpoint) = &self.schema.endpoints.authenticate else {
            return Ok(());
        };

        let breaker = self.registry.breaker(self.slug());
        let key = format!("tracker/{}/authenticate", self.slug());
        retry_with_backoff(&key, MAX_ATTEMPTS, Some(self.registry.metrics()), |_attempt| {
            let breaker = Arc::clone(&breaker);
            async move {
                breaker.before_call()?;
                let response = self
                    .request(endpoint)
                    .form(&[
                        ("username", self.credentials.username.clone().unwrap_or_default()),
                        ("password", self.credentials.password.clone().unwrap_or_default()),
                    ])
                    .send()
                    .await
                    .map_err(|source| network_error("authenticate", &source))?;

                let status = response.status();
                if status.is_success() {
                    breaker.record_success();
                    Ok(())
                } else {
                    breaker.record_failure();
                    Err(self.classify_status("authenticate", status.as_u16()))
                }
            }
        })
        .await
    }

    /// Run the tracker's search endpoint and parse its response.
    ///
    /// # Errors
    ///
    /// Returns a classified [`PipelineError`] on transport failure, or wraps
    /// a [`SchemaError`] as [`PipelineError::ValidationError`] if the
    /// response cannot be parsed per the declared format.
    pub async fn search(&self, query: &str) -> PipelineResult<Vec<SearchResult>> {
        self.registry
            .rate_limiter()
            .acquire(
                &format!("tracker/{}/search", self.slug()),
                1.0,
                forgecast_resilience::rate_limiter::TRACKER_SEARCH_DEFAULT,
            )
            .await;

        let breaker = self.registry.breaker(self.slug());
        let key = format!("tracker/{}/search", self.slug());
        let spec = self.schema.search.clone();
        retry_with_backoff(&key, MAX_ATTEMPTS, Some(self.registry.metrics()), |_attempt| {
            let breaker = Arc::clone(&breaker);
            let spec = spec.clone();
            async move {
                breaker.before_call()?;
                let response = self
                    .request(&self.schema.endpoints.search)
                    .query(&[("q", query)])
                    .send()
                    .await
                    .map_err(|source| network_error("search", &source))?;

                let status = response.status();
                if !status.is_success() {
                    breaker.record_failure();
                    return Err(self.classify_status("search", status.as_u16()));
                }
                let body = response
                    .text()
                    .await
                    .map_err(|source| network_error("search", &source))?;
                breaker.record_success();
                search::parse_response(&spec, &body).map_err(schema_to_pipeline_error)
            }
        })
        .await
    }

    /// Run a search restricted to checking for an existing release; shares
    /// the search endpoint, since trackers in this pack expose one query
    /// surface for both uses.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search`].
    pub async fn duplicate_check(&self, release_name: &str) -> PipelineResult<Vec<SearchResult>> {
        self.search(release_name).await
    }

    /// Resolve and validate every upload field against a build context,
    /// without sending anything. Used both by [`Self::upload`] and by the
    /// `test_upload` dry-run operation.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if a required field cannot be resolved, an
    /// option has no mapping, or a resolved value fails validation.
    pub fn build_fields(&self, ctx: &BuildContext) -> Result<Vec<(String, ResolvedField)>, SchemaError> {
        let resolved = fields::resolve_all(&self.schema.upload.fields, &self.schema.options, ctx)?;
        for (name, value) in &resolved {
            if let Some(rule) = self.schema.validation.get(name) {
                validate::validate_field(name, rule, value)?;
            }
        }
        Ok(resolved)
    }

    /// Upload a release to this tracker.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ValidationError`] if field resolution fails,
    /// or a classified transport/tracker error on a failed request.
    pub async fn upload(
        &self,
        ctx: &BuildContext,
        torrent_bytes: Vec<u8>,
        torrent_filename: &str,
    ) -> PipelineResult<TrackerResult> {
        let resolved = self.build_fields(ctx).map_err(schema_to_pipeline_error)?;

        self.registry
            .rate_limiter()
            .acquire(
                &format!("tracker/{}/upload", self.slug()),
                1.0,
                forgecast_resilience::rate_limiter::TRACKER_UPLOAD_DEFAULT,
            )
            .await;

        let breaker = self.registry.breaker(self.slug());
        let key = format!("tracker/{}/upload", self.slug());
        retry_with_backoff(&key, MAX_ATTEMPTS, Some(self.registry.metrics()), |_attempt| {
            let breaker = Arc::clone(&breaker);
            let resolved = resolved.clone();
            let torrent_bytes = torrent_bytes.clone();
            let filename = torrent_filename.to_string();
            async move {
                breaker.before_call()?;
                let form = build_multipart(resolved, torrent_bytes, &filename);
                let response = self
                    .request(&self.schema.endpoints.upload)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|source| network_error("upload", &source))?;

                let status = response.status();
                if !status.is_success() {
                    breaker.record_failure();
                    return Err(self.classify_status("upload", status.as_u16()));
                }
                let body = response
                    .text()
                    .await
                    .map_err(|source| network_error("upload", &source))?;
                let outcome = self.interpret_upload_response(&body)?;
                breaker.record_success();
                Ok(outcome)
            }
        })
        .await
    }

    fn interpret_upload_response(&self, body: &str) -> PipelineResult<TrackerResult> {
        let document: serde_json::Value = serde_json::from_str(body).map_err(|source| PipelineError::ValidationError {
            field: "response".to_string(),
            reason: format!("upload response was not valid JSON: {source}"),
        })?;

        let spec = &self.schema.response.upload;
        let success_path = spec.success_field.split('.');
        let actual = success_path
            .fold(Some(&document), |current, segment| current.and_then(|v| v.get(segment)));

        if actual == Some(&spec.success_value) {
            Ok(TrackerResult {
                tracker_slug: self.slug().to_string(),
                outcome: TrackerOutcome::Uploaded,
                remote_torrent_id: None,
                remote_url: None,
                error: None,
            })
        } else {
            let detail = spec
                .error_field
                .as_deref()
                .and_then(|path| path.split('.').fold(Some(&document), |current, segment| current.and_then(|v| v.get(segment))))
                .and_then(|v| v.as_str())
                .unwrap_or("tracker rejected the upload")
                .to_string();
            warn!(tracker = self.slug(), detail, "upload rejected by tracker");
            Err(PipelineError::TrackerPermanent {
                tracker_slug: self.slug().to_string(),
                operation: "upload",
                detail,
            })
        }
    }

    fn classify_status(&self, operation: &'static str, status: u16) -> PipelineError {
        match classify_http_status(status, operation) {
            Some(ErrorKind::RateLimited) => PipelineError::RateLimited {
                operation,
                retry_after: None,
            },
            Some(ErrorKind::NetworkTransient) => PipelineError::NetworkTransient {
                operation,
                source: Box::new(std::io::Error::other(format!("http {status}"))),
            },
            Some(ErrorKind::AuthRejected) => PipelineError::AuthRejected { operation },
            Some(ErrorKind::TrackerPermanent) | None => PipelineError::TrackerPermanent {
                tracker_slug: self.slug().to_string(),
                operation,
                detail: format!("http {status}"),
            },
            Some(other) => {
                info!(?other, status, "unexpected error classification for http status");
                PipelineError::TrackerPermanent {
                    tracker_slug: self.slug().to_string(),
                    operation,
                    detail: format!("http {status}"),
                }
            }
        }
    }
}

fn build_multipart(resolved: Vec<(String, ResolvedField)>, torrent_bytes: Vec<u8>, filename: &str) -> multipart::Form {
    resolved.into_iter().fold(multipart::Form::new(), |form, (name, value)| match value {
        ResolvedField::Scalar(text) => form.text(name, text),
        ResolvedField::Repeated(items) => items
            .into_iter()
            .fold(form, |form, item| form.text(name.clone(), item)),
        ResolvedField::File => {
            let part = multipart::Part::bytes(torrent_bytes.clone()).file_name(filename.to_string());
            form.part(name, part)
        }
    })
}

fn network_error(operation: &'static str, source: &reqwest::Error) -> PipelineError {
    PipelineError::NetworkTransient {
        operation,
        source: Box::new(std::io::Error::other(source.to_string())),
    }
}

fn schema_to_pipeline_error(err: SchemaError) -> PipelineError {
    PipelineError::ValidationError {
        field: "schema".to_string(),
        reason: err.to_string(),
    }
}
