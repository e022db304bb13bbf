//! Report data models shared by the orchestrator, the fallback chain,
//! and the log store.
//!
//! Field names follow the analysis engine's JSON output. Every nested
//! section keeps unrecognised keys in an `extra` map so that engine
//! payloads survive a round trip through the log store unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lenient;

/// One analysis request as it leaves the orchestrator.
///
/// The uploaded file itself is owned by the request handler; the request
/// only carries its location on temporary storage.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Generated identifier, unique per request.
    pub patient_id: String,
    /// Requested drug names, in the order the client supplied them.
    pub drugs: Vec<String>,
    /// Path of the uploaded VCF on temporary storage.
    pub vcf_path: std::path::PathBuf,
    /// Original client-side file name.
    pub original_name: String,
}

/// Risk classification for one drug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    #[serde(deserialize_with = "lenient::string")]
    pub risk_label: String,
    /// Confidence in `[0, 1]`.
    #[serde(deserialize_with = "lenient::number")]
    pub confidence_score: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub severity: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub dosage_guidance: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Gene-level profile the engine derived from the VCF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmacogenomicProfile {
    #[serde(deserialize_with = "lenient::string")]
    pub primary_gene: String,
    #[serde(deserialize_with = "lenient::string")]
    pub diplotype: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phenotype: String,
    /// Engine-specific variant records, kept as raw JSON.
    #[serde(deserialize_with = "lenient::values")]
    pub detected_variants: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured form of a clinical recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidelineRecommendation {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub cpic_guideline: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub action: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub data_quality_notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A recommendation is free text, a guideline/action/notes triple, or,
/// for anything else an engine sends, the raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClinicalRecommendation {
    Text(String),
    Guideline(GuidelineRecommendation),
    Other(Value),
}

/// Generated explanation attached to a result.
///
/// `limitations` and `recommended_next_steps` are whatever JSON the
/// language model produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Explanation {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub summary: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub clinician_summary: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_raw"
    )]
    pub limitations: Option<Value>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_raw"
    )]
    pub recommended_next_steps: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMetrics {
    #[serde(deserialize_with = "lenient::flag")]
    pub vcf_parsing_success: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_count"
    )]
    pub total_variants: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_count"
    )]
    pub genes_covered: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-drug analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub drug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_recommendation: Option<ClinicalRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_generated_explanation: Option<Explanation>,
    pub quality_metrics: QualityMetrics,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request-level quality flags on a synthesized envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeQuality {
    pub vcf_parsing_success: bool,
    pub analysis_engine_available: bool,
}

/// Multi-drug response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub status: String,
    pub patient_id: String,
    pub timestamp: String,
    pub results: Vec<AnalysisResult>,
    pub quality_metrics: EnvelopeQuality,
}

/// One row of the analysis history.
///
/// Serializes flat: the result's fields sit beside `id`,
/// `patient_label`, and `logged_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sortable identifier: creation millis plus a random suffix.
    pub id: String,
    pub patient_label: String,
    /// RFC 3339 creation time.
    pub logged_at: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recommendation_accepts_text_and_structured() {
        let text: ClinicalRecommendation = serde_json::from_value(json!("Avoid codeine")).unwrap();
        assert_eq!(text, ClinicalRecommendation::Text("Avoid codeine".to_string()));

        let structured: ClinicalRecommendation = serde_json::from_value(json!({
            "cpic_guideline": "CPIC CYP2D6/codeine",
            "action": "Avoid",
            "data_quality_notes": null
        }))
        .unwrap();
        match structured {
            ClinicalRecommendation::Guideline(g) => {
                assert_eq!(g.action.as_deref(), Some("Avoid"));
                assert!(g.data_quality_notes.is_none());
            }
            other => panic!("expected guideline, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "drug": "WARFARIN",
            "risk_assessment": {"risk_label": "Adjust Dosage", "confidence_score": 0.8, "severity": "moderate"},
            "pharmacogenomic_profile": {"primary_gene": "CYP2C9", "diplotype": "*1/*3", "phenotype": "IM", "detected_variants": [], "activity_score": 1.0},
            "quality_metrics": {"vcf_parsing_success": true},
            "engine_version": "2.1"
        });
        let result: AnalysisResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(result.extra.get("engine_version"), Some(&json!("2.1")));
        assert_eq!(
            result.pharmacogenomic_profile.extra.get("activity_score"),
            Some(&json!(1.0))
        );

        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["engine_version"], "2.1");
        assert_eq!(back["pharmacogenomic_profile"]["activity_score"], 1.0);
    }

    #[test]
    fn test_log_entry_serializes_flat() {
        let entry = LogEntry {
            id: "1700000000000-abcd1234".to_string(),
            patient_label: "PATIENT_1".to_string(),
            logged_at: "2024-01-01T00:00:00+00:00".to_string(),
            result: AnalysisResult {
                drug: "CODEINE".to_string(),
                ..Default::default()
            },
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["id"], "1700000000000-abcd1234");
        assert_eq!(v["drug"], "CODEINE");
        assert!(v.get("result").is_none());

        let parsed: LogEntry = serde_json::from_value(v).unwrap();
        assert_eq!(parsed, entry);
    }
}
