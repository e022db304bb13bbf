//! Ordered response providers.
//!
//! A [`ProviderChain`] holds every way the gateway can answer an analysis
//! request, most authoritative first:
//!
//! ```text
//! live engine ──unavailable──▶ cached payload ──unavailable──▶ degraded synthesis
//! ```
//!
//! Each [`ResponseProvider`] either produces a JSON answer or reports
//! itself unavailable by returning `None`; the chain stops at the first
//! answer. The degraded provider never declines, so a chain built by
//! [`ProviderChain::from_config`] always answers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};

use pharmaguard_core::degraded::degraded_envelope;
use pharmaguard_core::models::AnalysisRequest;

use crate::analysis_client::AnalysisClient;
use crate::config::Config;

/// Which provider produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// The analysis engine answered.
    Live,
    /// A static reference payload from disk.
    Cached,
    /// Synthesized placeholder results.
    Degraded,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ResponseProvider: Send + Sync {
    fn source(&self) -> ResponseSource;

    /// Produces an answer, or `None` when this provider cannot.
    async fn produce(&self, request: &AnalysisRequest) -> Option<Value>;
}

/// Serves a fixed JSON payload from disk, verbatim.
pub struct StaticPayloadProvider {
    path: PathBuf,
}

impl StaticPayloadProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResponseProvider for StaticPayloadProvider {
    fn source(&self) -> ResponseSource {
        ResponseSource::Cached
    }

    async fn produce(&self, _request: &AnalysisRequest) -> Option<Value> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "static payload unreadable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "static payload is not valid JSON");
                None
            }
        }
    }
}

/// Synthesizes an "unknown" result for every requested drug.
pub struct DegradedResponseProvider;

#[async_trait]
impl ResponseProvider for DegradedResponseProvider {
    fn source(&self) -> ResponseSource {
        ResponseSource::Degraded
    }

    async fn produce(&self, request: &AnalysisRequest) -> Option<Value> {
        let envelope = degraded_envelope(&request.patient_id, &request.drugs, Utc::now());
        match serde_json::to_value(envelope) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize degraded envelope");
                None
            }
        }
    }
}

/// Providers tried in order until one answers.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ResponseProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl ResponseProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push(&mut self, provider: Box<dyn ResponseProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Standard chain: live engine (when configured), static payload, degraded.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut chain = Self::new();
        if let Some(client) = AnalysisClient::from_config(&config.analysis)? {
            chain.push(Box::new(client));
        }
        chain.push(Box::new(StaticPayloadProvider::new(
            config.storage.static_payload_path.clone(),
        )));
        chain.push(Box::new(DegradedResponseProvider));
        Ok(chain)
    }

    /// Returns the first answer and the provider that gave it.
    pub async fn produce(&self, request: &AnalysisRequest) -> Option<(ResponseSource, Value)> {
        for provider in &self.providers {
            if let Some(body) = provider.produce(request).await {
                return Some((provider.source(), body));
            }
            tracing::info!(
                patient_id = %request.patient_id,
                source = %provider.source(),
                "provider unavailable, falling through"
            );
        }
        None
    }
}
