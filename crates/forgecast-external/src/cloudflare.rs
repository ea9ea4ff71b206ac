//! Thin [`CloudflareBypassClient`] backed by a FlareSolverr-compatible HTTP
//! service, guarded by the circuit breaker per spec section 4.4.

use std::sync::Arc;

use async_trait::async_trait;
use forgecast_domain::PipelineResult;
use forgecast_resilience::ServiceRegistry;
use serde::{Deserialize, Serialize};

use crate::http_support::network_error;
use crate::model::CloudflareSession;
use crate::traits::CloudflareBypassClient;

const SERVICE: &str = "flaresolverr";

/// Calls a FlareSolverr instance's `POST /v1` endpoint with the
/// `request.get` command and extracts the solved cookies and user agent.
pub struct FlaresolverrClient {
    http: reqwest::Client,
    base_url: String,
    registry: Arc<ServiceRegistry>,
}

impl FlaresolverrClient {
    /// Construct a client pointed at a FlareSolverr base URL.
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: String, registry: Arc<ServiceRegistry>) -> Self {
        Self { http, base_url, registry }
    }
}

#[derive(Serialize)]
struct SolverRequest<'a> {
    cmd: &'static str,
    url: &'a str,
    #[serde(rename = "maxTimeout")]
    max_timeout: u32,
}

#[derive(Deserialize)]
struct SolverResponse {
    solution: SolverSolution,
}

#[derive(Deserialize)]
struct SolverSolution {
    #[serde(default)]
    cookies: Vec<SolverCookie>,
    #[serde(rename = "userAgent")]
    user_agent: String,
}

#[derive(Deserialize)]
struct SolverCookie {
    name: String,
    value: String,
}

#[async_trait]
impl CloudflareBypassClient for FlaresolverrClient {
    async fn get_session(&self, url: &str) -> PipelineResult<CloudflareSession> {
        let breaker = self.registry.breaker(SERVICE);
        breaker.before_call()?;

        let request = SolverRequest {
            cmd: "request.get",
            url,
            max_timeout: 60_000,
        };
        let response = self.http.post(format!("{}/v1", self.base_url)).json(&request).send().await;
        let response = match response {
            Ok(response) => response,
            Err(source) => {
                breaker.record_failure();
                return Err(network_error("get_session", &source));
            }
        };

        if !response.status().is_success() {
            breaker.record_failure();
            return Err(crate::http_support::classify_status(SERVICE, "get_session", response.status().as_u16()));
        }

        let body = response
            .json::<SolverResponse>()
            .await
            .map_err(|source| network_error("get_session", &source))?;
        breaker.record_success();

        let cookies = body
            .solution
            .cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(CloudflareSession {
            cookies,
            user_agent: body.solution.user_agent,
        })
    }
}
