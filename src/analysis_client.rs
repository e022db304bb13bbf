//! Client for the external pharmacogenomic analysis engine.
//!
//! Each attempt sends a multipart `POST <url>` with three fields:
//!
//! | Field | Content |
//! |-------|---------|
//! | `patient_id` | the generated request identifier |
//! | `drugs` | comma-joined drug names |
//! | `vcf_file` | the VCF bytes, under the client's original file name |
//!
//! The upload is read from disk once per request; every attempt resends
//! the same buffer.
//!
//! An attempt succeeds only on a 2xx status with a JSON body. Anything
//! else (transport error, timeout, non-2xx, unparsable body) is a failed
//! attempt. Attempts follow the configured [`RetryPolicy`]; when every
//! attempt fails the client reports [`AnalysisOutcome::Exhausted`] and the
//! caller moves on to its fallbacks.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::Value;
use std::time::Duration;

use pharmaguard_core::models::AnalysisRequest;
use pharmaguard_core::retry::RetryPolicy;

use crate::config::AnalysisConfig;
use crate::fallback::{ResponseProvider, ResponseSource};

/// Result of a full retry cycle against the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success { body: Value, attempts: u32 },
    Exhausted { attempts: u32 },
}

pub struct AnalysisClient {
    url: String,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl AnalysisClient {
    pub fn new(url: impl Into<String>, timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build analysis HTTP client")?;
        Ok(Self {
            url: url.into(),
            http,
            policy,
        })
    }

    /// Returns `None` when no engine address is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>> {
        config
            .url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.timeout(), config.retry_policy()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs the retry cycle. Never returns an error; failures are logged.
    ///
    /// An upload that cannot be read is reported as exhausted after zero
    /// attempts.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisOutcome {
        let vcf = match tokio::fs::read(&request.vcf_path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::warn!(
                    patient_id = %request.patient_id,
                    path = %request.vcf_path.display(),
                    error = %e,
                    "upload unreadable, analysis engine not called"
                );
                return AnalysisOutcome::Exhausted { attempts: 0 };
            }
        };
        let max = self.policy.max_attempts();
        let mut made = 0;

        for attempt in self.policy.attempts() {
            if !attempt.delay.is_zero() {
                tokio::time::sleep(attempt.delay).await;
            }
            made = attempt.number;

            match self.send(request, vcf.clone()).await {
                Ok(body) => {
                    tracing::info!(
                        patient_id = %request.patient_id,
                        attempt = attempt.number,
                        "analysis engine answered"
                    );
                    return AnalysisOutcome::Success {
                        body,
                        attempts: attempt.number,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        patient_id = %request.patient_id,
                        attempt = attempt.number,
                        max_attempts = max,
                        error = %format!("{:#}", e),
                        "analysis attempt failed"
                    );
                }
            }
        }

        tracing::warn!(
            patient_id = %request.patient_id,
            attempts = made,
            "analysis engine unavailable, retries exhausted"
        );
        AnalysisOutcome::Exhausted { attempts: made }
    }

    async fn send(&self, request: &AnalysisRequest, vcf: Bytes) -> Result<Value> {
        let len = vcf.len() as u64;
        let part = reqwest::multipart::Part::stream_with_length(vcf, len)
            .file_name(request.original_name.clone())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new()
            .text("patient_id", request.patient_id.clone())
            .text("drugs", request.drugs.join(","))
            .part("vcf_file", part);

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("analysis request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("analysis engine error ({}): {}", status, body);
        }

        response
            .json::<Value>()
            .await
            .context("analysis engine returned non-JSON body")
    }
}

#[async_trait]
impl ResponseProvider for AnalysisClient {
    fn source(&self) -> ResponseSource {
        ResponseSource::Live
    }

    async fn produce(&self, request: &AnalysisRequest) -> Option<Value> {
        match self.analyze(request).await {
            AnalysisOutcome::Success { body, .. } => Some(body),
            AnalysisOutcome::Exhausted { .. } => None,
        }
    }
}
