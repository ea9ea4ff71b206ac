//! Thin [`ImageHost`] uploading screenshot bytes to a generic multipart
//! upload endpoint (spec section 4.4).

use std::sync::Arc;

use async_trait::async_trait;
use forgecast_domain::PipelineResult;
use forgecast_resilience::{rate_limiter::IMAGE_UPLOAD_DEFAULT, retry_with_backoff, ServiceRegistry};
use reqwest::multipart;
use serde::Deserialize;

use crate::http_support::{classify_status, network_error};
use crate::traits::ImageHost;

const MAX_ATTEMPTS: u32 = 5;
const SERVICE: &str = "image_host";

/// Uploads to an endpoint accepting a single multipart `file` part and
/// responding with `{"url": "..."}`.
pub struct HttpImageHost {
    http: reqwest::Client,
    upload_url: String,
    registry: Arc<ServiceRegistry>,
}

impl HttpImageHost {
    /// Construct a host client pointed at `upload_url`.
    #[must_use]
    pub const fn new(http: reqwest::Client, upload_url: String, registry: Arc<ServiceRegistry>) -> Self {
        Self { http, upload_url, registry }
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, bytes: Vec<u8>) -> PipelineResult<String> {
        self.registry.rate_limiter().acquire("image_host/upload", 1.0, IMAGE_UPLOAD_DEFAULT).await;
        let breaker = self.registry.breaker(SERVICE);

        retry_with_backoff("image_host/upload", MAX_ATTEMPTS, Some(self.registry.metrics()), |_attempt| {
            let bytes = bytes.clone();
            let breaker = Arc::clone(&breaker);
            async move {
                breaker.before_call()?;
                let part = multipart::Part::bytes(bytes).file_name("screenshot.png");
                let form = multipart::Form::new().part("file", part);

                let response = self.http.post(&self.upload_url).multipart(form).send().await;
                let response = match response {
                    Ok(response) => response,
                    Err(source) => {
                        breaker.record_failure();
                        return Err(network_error("upload", &source));
                    }
                };

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    breaker.record_failure();
                    return Err(classify_status(SERVICE, "upload", status));
                }

                let body = response
                    .json::<UploadResponse>()
                    .await
                    .map_err(|source| network_error("upload", &source))?;
                breaker.record_success();
                Ok(body.url)
            }
        })
        .await
    }
}
