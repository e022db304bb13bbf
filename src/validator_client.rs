//! Client for the external VCF structural validator.
//!
//! Sends `POST <url>` with `{"vcf_file_path": "<absolute path>"}` and
//! expects a JSON body whose success flag (see
//! [`pharmaguard_core::normalize::VALIDATION_SUCCESS_KEYS`]) is `true`.
//! Transport errors, timeouts, non-JSON bodies, and any other flag value
//! count as rejection. The caller only ever sees [`MSG_STRUCTURE_INVALID`];
//! the underlying cause goes to the log.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;

use pharmaguard_core::normalize::validation_succeeded;

use crate::config::ValidatorConfig;

pub const MSG_STRUCTURE_INVALID: &str = "Invalid VCF structure or corrupted file.";

/// Result of one structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralVerdict {
    Valid { warnings: Vec<String> },
    Rejected,
}

pub struct StructuralValidationClient {
    url: String,
    http: reqwest::Client,
}

impl StructuralValidationClient {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build validator HTTP client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Returns `None` when no validator address is configured.
    pub fn from_config(config: &ValidatorConfig) -> Result<Option<Self>> {
        config
            .url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.timeout()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Asks the validator whether the file at `vcf_path` parses as VCF.
    pub async fn check(&self, vcf_path: &Path) -> StructuralVerdict {
        match self.request(vcf_path).await {
            Ok(body) if validation_succeeded(&body) => {
                let warnings = body
                    .get("warnings")
                    .and_then(Value::as_array)
                    .map(|w| {
                        w.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                StructuralVerdict::Valid { warnings }
            }
            Ok(body) => {
                let reason = body.get("message").and_then(Value::as_str).unwrap_or("");
                tracing::info!(url = %self.url, reason, "structural validator rejected upload");
                StructuralVerdict::Rejected
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %format!("{:#}", e), "structural validator call failed");
                StructuralVerdict::Rejected
            }
        }
    }

    async fn request(&self, vcf_path: &Path) -> Result<Value> {
        let body = json!({ "vcf_file_path": vcf_path.to_string_lossy() });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("validator request failed")?;
        let status = response.status();
        let json: Value = response
            .json()
            .await
            .with_context(|| format!("validator returned non-JSON body (status {})", status))?;
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::time::Duration;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/validate", addr)
    }

    #[tokio::test]
    async fn test_valid_with_warnings() {
        let app = Router::new().route(
            "/validate",
            post(|Json(body): Json<Value>| async move {
                assert!(body["vcf_file_path"].as_str().unwrap().ends_with(".vcf"));
                Json(json!({"vcf_parsing_success": true, "warnings": ["Missing INFO fields (warnings): STAR"]}))
            }),
        );
        let url = spawn(app).await;
        let client = StructuralValidationClient::new(url, Duration::from_secs(5)).unwrap();
        let verdict = client.check(Path::new("/tmp/sample.vcf")).await;
        assert_eq!(
            verdict,
            StructuralVerdict::Valid {
                warnings: vec!["Missing INFO fields (warnings): STAR".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_false_flag_rejected() {
        let app = Router::new().route(
            "/validate",
            post(|| async {
                Json(json!({"vcf_parsing_success": false, "message": "Invalid VCF structure or corrupted file."}))
            }),
        );
        let url = spawn(app).await;
        let client = StructuralValidationClient::new(url, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.check(Path::new("/tmp/x.vcf")).await,
            StructuralVerdict::Rejected
        );
    }

    #[tokio::test]
    async fn test_unreachable_rejected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = StructuralValidationClient::new(
            format!("http://{}/validate", addr),
            Duration::from_millis(500),
        )
        .unwrap();
        assert_eq!(
            client.check(Path::new("/tmp/x.vcf")).await,
            StructuralVerdict::Rejected
        );
    }

    #[tokio::test]
    async fn test_timeout_rejected() {
        let app = Router::new().route(
            "/validate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"vcf_parsing_success": true}))
            }),
        );
        let url = spawn(app).await;
        let client = StructuralValidationClient::new(url, Duration::from_millis(100)).unwrap();
        assert_eq!(
            client.check(Path::new("/tmp/x.vcf")).await,
            StructuralVerdict::Rejected
        );
    }

    #[test]
    fn test_unconfigured_is_none() {
        let config = ValidatorConfig::default();
        assert!(StructuralValidationClient::from_config(&config)
            .unwrap()
            .is_none());
    }
}
