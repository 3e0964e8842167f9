// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sightengine image classifier.
//!
//! Calls the `check.json` endpoint with the `nudity-2.0` and `wad` models
//! and maps the scores through [`CategoryScores::verdict`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use anonmatch_config::model::ModerationConfig;
use anonmatch_core::types::Verdict;
use anonmatch_core::{AdapterType, AnonmatchError, ContentClassifier, HealthStatus, PluginAdapter};

use crate::moderation::CategoryScores;

#[derive(Debug, Default, Deserialize)]
struct NudityScores {
    #[serde(default)]
    sexual_activity: f64,
    #[serde(default)]
    sexual_display: f64,
    #[serde(default)]
    erotica: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct RequestInfo {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    status: String,
    #[serde(default)]
    nudity: NudityScores,
    #[serde(default)]
    weapon: f64,
    #[serde(default)]
    drugs: f64,
    #[serde(default)]
    request: RequestInfo,
    #[serde(default)]
    error: ApiError,
}

impl CheckResponse {
    fn scores(&self) -> CategoryScores {
        CategoryScores {
            sexual_activity: self.nudity.sexual_activity,
            sexual_display: self.nudity.sexual_display,
            erotica: self.nudity.erotica,
            weapon: self.weapon,
            drugs: self.drugs,
        }
    }
}

/// HTTP client for the Sightengine moderation API.
#[derive(Debug, Clone)]
pub struct SightengineClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_user: String,
    api_secret: String,
}

impl SightengineClassifier {
    pub fn new(config: &ModerationConfig) -> Result<Self, AnonmatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnonmatchError::Moderation {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_user: config.api_user.clone().unwrap_or_default(),
            api_secret: config.api_secret.clone().unwrap_or_default(),
        })
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.starts_with('/'))
}

#[async_trait]
impl PluginAdapter for SightengineClassifier {
    fn name(&self) -> &str {
        "sightengine"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Moderation
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        if self.is_enabled() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("credentials not configured".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        Ok(())
    }
}

#[async_trait]
impl ContentClassifier for SightengineClassifier {
    fn is_enabled(&self) -> bool {
        !self.api_user.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    async fn classify(&self, url: &str) -> Result<Verdict, AnonmatchError> {
        if !self.is_enabled() {
            return Ok(Verdict::Safe);
        }
        if !is_http_url(url) {
            return Err(AnonmatchError::invalid("media_url", "not an http(s) URL"));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("models", "nudity-2.0,wad"),
                ("api_user", self.api_user.as_str()),
                ("api_secret", self.api_secret.as_str()),
                ("url", url),
            ])
            .send()
            .await
            .map_err(|e| AnonmatchError::Moderation {
                message: format!("sightengine request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AnonmatchError::Moderation {
                message: format!("sightengine returned {status}"),
                source: None,
            });
        }

        let body: CheckResponse = response.json().await.map_err(|e| AnonmatchError::Moderation {
            message: format!("failed to decode sightengine response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.status == "failure" {
            warn!(
                code = body.error.code,
                message = %body.error.message,
                request_id = %body.request.id,
                "sightengine reported failure"
            );
            return Ok(Verdict::Safe);
        }

        let verdict = body.scores().verdict();
        debug!(request_id = %body.request.id, safe = verdict == Verdict::Safe, "media classified");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier(server: &MockServer) -> SightengineClassifier {
        SightengineClassifier::new(&ModerationConfig {
            api_user: Some("user".into()),
            api_secret: Some("secret".into()),
            endpoint: format!("{}/1.0/check.json", server.uri()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn safe_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.0/check.json"))
            .and(query_param("models", "nudity-2.0,wad"))
            .and(query_param("api_user", "user"))
            .and(query_param("url", "https://cdn.example/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "nudity": {"sexual_activity": 0.01, "sexual_display": 0.02, "erotica": 0.1},
                "weapon": 0.01,
                "drugs": 0.0,
                "request": {"id": "req_1"}
            })))
            .mount(&server)
            .await;

        let verdict = classifier(&server)
            .classify("https://cdn.example/a.jpg")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Safe);
    }

    #[tokio::test]
    async fn nsfw_image_is_unsafe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "nudity": {"sexual_activity": 0.93, "sexual_display": 0.1, "erotica": 0.2},
                "weapon": 0.0,
                "drugs": 0.0
            })))
            .mount(&server)
            .await;

        let verdict = classifier(&server)
            .classify("https://cdn.example/b.jpg")
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Unsafe { .. }));
    }

    #[tokio::test]
    async fn api_failure_status_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failure",
                "error": {"code": 21, "message": "quota exceeded"}
            })))
            .mount(&server)
            .await;

        let verdict = classifier(&server)
            .classify("https://cdn.example/c.jpg")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Safe);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = classifier(&server)
            .classify("https://cdn.example/d.jpg")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn rejects_non_http_urls_and_missing_credentials() {
        let server = MockServer::start().await;
        let c = classifier(&server);
        assert!(c.classify("file:///etc/passwd").await.is_err());

        let disabled = SightengineClassifier::new(&ModerationConfig::default()).unwrap();
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.classify("ftp://x").await.unwrap(), Verdict::Safe);
    }
}
