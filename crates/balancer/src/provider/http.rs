//! HTTP provider.
//!
//! Talks to a balancer (or a thin control service in front of one) exposing:
//!
//! - `POST {url}/servers/{server}/suspend` with `{"farm": .., "method": ..}`
//! - `POST {url}/servers/{server}/resume` with `{"farm": ..}`
//!
//! A suspend response body may carry `{"prevent_deployment": true, "reason": ".."}`
//! to keep the server out of rotation without deploying to it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{LoadBalancerConfig, LoadBalancerMode, SuspendMethod, SuspendOutcome};

use super::LoadBalancer;

#[derive(Debug, Serialize)]
struct SuspendRequest<'a> {
    farm: &'a str,
    method: SuspendMethod,
}

#[derive(Debug, Serialize)]
struct ResumeRequest<'a> {
    farm: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SuspendResponse {
    #[serde(default)]
    prevent_deployment: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Balancer reached over a small JSON API.
pub struct HttpLoadBalancer {
    agent: ureq::Agent,
    mode: LoadBalancerMode,
    base_url: String,
    token: Option<String>,
}

impl HttpLoadBalancer {
    /// Build from the `[load_balancer]` configuration (`url`, optional `token`)
    pub fn from_config(config: &LoadBalancerConfig) -> Result<Self> {
        let base_url = config.require_option("url")?.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        Ok(Self {
            agent: ureq::Agent::new_with_defaults(),
            mode: config.mode()?,
            base_url,
            token: config.option("token").map(str::to_string),
        })
    }

    /// Build the endpoint URL for a server action
    fn endpoint(&self, server: &str, action: &str) -> String {
        format!(
            "{}/servers/{}/{}",
            self.base_url,
            encode_segment(server),
            action
        )
    }

    /// POST a JSON body and return the raw response text
    fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<String> {
        log::debug!("POST {url}");
        let mut request = self.agent.post(url).header("User-Agent", "stagehand");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let mut response = request.send_json(body)?;
        Ok(response.body_mut().read_to_string()?)
    }
}

/// Percent-encode one URL path segment, keeping only unreserved characters
fn encode_segment(segment: &str) -> String {
    // "." and ".." would be collapsed as dot-segments
    if segment == "." || segment == ".." {
        return segment.replace('.', "%2E");
    }

    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Interpret a suspend response body
fn parse_suspend_response(body: &str) -> Result<SuspendOutcome> {
    if body.trim().is_empty() {
        return Ok(SuspendOutcome::Suspended);
    }

    let response: SuspendResponse = serde_json::from_str(body).map_err(|e| Error::Http {
        message: format!("invalid suspend response: {}", e),
        status: None,
    })?;

    if response.prevent_deployment {
        Ok(SuspendOutcome::Held {
            reason: response
                .reason
                .unwrap_or_else(|| "balancer prevented deployment".to_string()),
        })
    } else {
        Ok(SuspendOutcome::Suspended)
    }
}

impl LoadBalancer for HttpLoadBalancer {
    fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    fn suspend(&self, server: &str, farm: &str, method: SuspendMethod) -> Result<SuspendOutcome> {
        let body = self.post(
            &self.endpoint(server, "suspend"),
            &SuspendRequest { farm, method },
        )?;
        parse_suspend_response(&body)
    }

    fn resume(&self, server: &str, farm: &str) -> Result<()> {
        self.post(&self.endpoint(server, "resume"), &ResumeRequest { farm })?;
        Ok(())
    }
}
