//! Degraded response synthesis.
//!
//! When neither the live analysis engine nor a cached payload can answer,
//! the orchestrator still returns a well-formed envelope: one result per
//! requested drug, every field set to an explicit "unknown" sentinel and
//! the quality flags marking the analysis as not performed.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{
    AnalysisEnvelope, AnalysisResult, ClinicalRecommendation, EnvelopeQuality, Explanation,
    PharmacogenomicProfile, QualityMetrics, RiskAssessment,
};

pub const DEGRADED_STATUS: &str = "degraded";
pub const UNKNOWN_LABEL: &str = "Unknown";
pub const UNKNOWN_SEVERITY: &str = "unknown";
pub const ENGINE_UNAVAILABLE_MESSAGE: &str =
    "Pharmacogenomic analysis engine unavailable; no clinical recommendation could be generated. \
     Re-run the analysis once the service is reachable.";

fn degraded_result(patient_id: &str, drug: &str, timestamp: &str) -> AnalysisResult {
    AnalysisResult {
        patient_id: Some(patient_id.to_string()),
        drug: drug.to_string(),
        timestamp: Some(timestamp.to_string()),
        risk_assessment: RiskAssessment {
            risk_label: UNKNOWN_LABEL.to_string(),
            confidence_score: 0.0,
            severity: UNKNOWN_SEVERITY.to_string(),
            dosage_guidance: Some("Unavailable".to_string()),
            ..Default::default()
        },
        pharmacogenomic_profile: PharmacogenomicProfile {
            primary_gene: UNKNOWN_LABEL.to_string(),
            diplotype: UNKNOWN_LABEL.to_string(),
            phenotype: UNKNOWN_LABEL.to_string(),
            detected_variants: Vec::new(),
            ..Default::default()
        },
        clinical_recommendation: Some(ClinicalRecommendation::Text(
            ENGINE_UNAVAILABLE_MESSAGE.to_string(),
        )),
        llm_generated_explanation: Some(Explanation {
            summary: Some(ENGINE_UNAVAILABLE_MESSAGE.to_string()),
            ..Default::default()
        }),
        quality_metrics: QualityMetrics {
            vcf_parsing_success: false,
            total_variants: Some(0),
            genes_covered: Some(0),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Builds the degraded envelope for `drugs`, in request order.
pub fn degraded_envelope(
    patient_id: &str,
    drugs: &[String],
    now: DateTime<Utc>,
) -> AnalysisEnvelope {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    AnalysisEnvelope {
        status: DEGRADED_STATUS.to_string(),
        patient_id: patient_id.to_string(),
        timestamp: timestamp.clone(),
        results: drugs
            .iter()
            .map(|drug| degraded_result(patient_id, drug, &timestamp))
            .collect(),
        quality_metrics: EnvelopeQuality {
            vcf_parsing_success: false,
            analysis_engine_available: false,
        },
    }
}
