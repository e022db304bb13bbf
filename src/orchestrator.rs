//! End-to-end analyze pipeline.
//!
//! ```text
//! Validating ─▶ StructuralValidating ─▶ Analyzing ─────────────▶ Logging ─▶ Responding
//!      │                 │                  │                        ▲
//!      │                 │                  └─ engine exhausted ─▶ Fallback
//!      └──────────────── ┴──────────────────────────▶ Error
//! ```
//!
//! The orchestrator owns the uploaded temporary file from the moment it
//! is handed in and deletes it before returning, whatever the outcome.
//! Log store failures are logged and never change the answer.

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use pharmaguard_core::models::AnalysisRequest;
use pharmaguard_core::normalize::{log_entries, new_patient_id};
use pharmaguard_core::store::LogStore;

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::fallback::{ProviderChain, ResponseSource};
use crate::log_store::FileLogStore;
use crate::upload::{parse_drugs, UploadValidator, UploadedFile};
use crate::validator_client::{StructuralValidationClient, StructuralVerdict, MSG_STRUCTURE_INVALID};

/// Pipeline stage, carried on trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    StructuralValidating,
    Analyzing,
    /// The engine gave no answer; a cached or synthesized one is used.
    Fallback,
    Logging,
    Responding,
    /// The request was rejected or could not be answered.
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::StructuralValidating => "structural_validating",
            Self::Analyzing => "analyzing",
            Self::Fallback => "fallback",
            Self::Logging => "logging",
            Self::Responding => "responding",
            Self::Error => "error",
        }
    }

    /// Stage entered once the provider chain answered from `source`.
    pub fn after_chain(source: ResponseSource) -> Self {
        match source {
            ResponseSource::Live => Self::Logging,
            ResponseSource::Cached | ResponseSource::Degraded => Self::Fallback,
        }
    }
}

/// A successful (possibly degraded) answer.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub patient_id: String,
    pub source: ResponseSource,
    pub body: Value,
    /// Entries appended to the history; zero when logging failed.
    pub logged: usize,
}

pub struct AnalysisOrchestrator {
    upload_validator: UploadValidator,
    validator: Option<StructuralValidationClient>,
    chain: ProviderChain,
    store: Arc<dyn LogStore>,
}

impl AnalysisOrchestrator {
    pub fn new(
        upload_validator: UploadValidator,
        validator: Option<StructuralValidationClient>,
        chain: ProviderChain,
        store: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            upload_validator,
            validator,
            chain,
            store,
        }
    }

    /// Wires the standard pipeline with a file-backed history.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            UploadValidator::from_config(&config.upload),
            StructuralValidationClient::from_config(&config.validator)?,
            ProviderChain::from_config(config)?,
            Arc::new(FileLogStore::from_config(&config.storage)),
        ))
    }

    pub fn store(&self) -> Arc<dyn LogStore> {
        self.store.clone()
    }

    pub fn upload_validator(&self) -> &UploadValidator {
        &self.upload_validator
    }

    /// Runs one analysis. `upload` is always deleted before this returns.
    pub async fn run(
        &self,
        upload: Option<UploadedFile>,
        drugs: Option<&str>,
    ) -> Result<Analysis, AnalyzeError> {
        let outcome = self.run_stages(upload, drugs).await;
        if let Err(e) = &outcome {
            tracing::info!(
                stage = Stage::Error.as_str(),
                error_type = e.error_type(),
                error = %e,
                "analysis request failed"
            );
        }
        outcome
    }

    async fn run_stages(
        &self,
        upload: Option<UploadedFile>,
        drugs: Option<&str>,
    ) -> Result<Analysis, AnalyzeError> {
        tracing::debug!(stage = Stage::Validating.as_str(), "analyze request received");
        let upload = self.upload_validator.validate(upload).await?;

        let drugs = match parse_drugs(drugs) {
            Ok(d) => d,
            Err(e) => {
                upload.discard();
                return Err(e);
            }
        };

        if let Some(validator) = &self.validator {
            tracing::debug!(stage = Stage::StructuralValidating.as_str(), url = validator.url());
            match validator.check(&upload.absolute_path()).await {
                StructuralVerdict::Valid { warnings } => {
                    for warning in warnings {
                        tracing::info!(file = upload.original_name(), warning = %warning, "VCF warning");
                    }
                }
                StructuralVerdict::Rejected => {
                    upload.discard();
                    return Err(AnalyzeError::vcf(MSG_STRUCTURE_INVALID));
                }
            }
        }

        let patient_id = new_patient_id(Utc::now());
        let request = AnalysisRequest {
            patient_id: patient_id.clone(),
            drugs,
            vcf_path: upload.absolute_path(),
            original_name: upload.original_name().to_string(),
        };

        tracing::debug!(stage = Stage::Analyzing.as_str(), patient_id = %patient_id, drugs = request.drugs.len());
        let produced = self.chain.produce(&request).await;
        upload.discard();

        let (source, body) = produced
            .ok_or_else(|| anyhow!("no response provider produced an answer"))
            .inspect_err(|e| tracing::error!(patient_id = %patient_id, error = %e, "analysis failed"))?;

        if Stage::after_chain(source) == Stage::Fallback {
            tracing::info!(
                stage = Stage::Fallback.as_str(),
                patient_id = %patient_id,
                source = %source,
                "analysis engine unavailable, answering from fallback"
            );
        }

        tracing::debug!(stage = Stage::Logging.as_str(), patient_id = %patient_id);
        let logged = self.record(&patient_id, &body).await;

        tracing::info!(
            stage = Stage::Responding.as_str(),
            patient_id = %patient_id,
            source = %source,
            logged,
            "analysis complete"
        );
        Ok(Analysis {
            patient_id,
            source,
            body,
            logged,
        })
    }

    /// Best-effort history append.
    async fn record(&self, patient_id: &str, body: &Value) -> usize {
        let entries = log_entries(body, Utc::now());
        let count = entries.len();
        match self.store.append(entries).await {
            Ok(_) => count,
            Err(e) => {
                tracing::warn!(patient_id, error = %format!("{:#}", e), "failed to append analysis log");
                0
            }
        }
    }
}
