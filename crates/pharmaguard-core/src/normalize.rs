//! Field precedence adapter for analysis payloads.
//!
//! Analysis engines and cached payloads have used several names for the
//! same value over time. Each semantic field has one fixed precedence
//! list below; the first key holding a non-null value wins. The adapter
//! turns any accepted envelope shape into typed [`AnalysisResult`]s and,
//! from there, into [`LogEntry`] rows.
//!
//! # Accepted envelope shapes
//!
//! | Shape | Results |
//! |-------|---------|
//! | `{ "results": [ ... ] }` (or `reports` / `data`) | each array element |
//! | `[ ... ]` | each array element |
//! | `{ "drug": ..., ... }` | the object itself (legacy single result) |

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::{
    AnalysisResult, ClinicalRecommendation, Explanation, LogEntry, PharmacogenomicProfile,
    QualityMetrics, RiskAssessment,
};

/// Keys that may hold the per-drug results array.
pub const RESULTS_KEYS: &[&str] = &["results", "reports", "data"];
/// Keys that may hold a result's patient identifier.
pub const PATIENT_KEYS: &[&str] = &["patient_id", "patientId", "patient"];
/// Keys that may hold a result's drug name.
pub const DRUG_KEYS: &[&str] = &["drug", "drug_name", "drugName"];
/// Keys that may hold a result's timestamp.
pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "generated_at", "created_at"];
/// Keys that may hold a structural validator's success flag.
pub const VALIDATION_SUCCESS_KEYS: &[&str] = &["vcf_parsing_success", "success", "valid"];

/// Label used when a result carries no patient identifier.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";

/// Returns the value of the first key in `keys` that is present and not null.
pub fn first_present<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

/// Like [`first_present`], rendered as a non-empty string.
///
/// Numbers are accepted and formatted; empty or whitespace-only strings
/// are skipped so that a later key in the list can still win.
pub fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    let map = obj.as_object()?;
    keys.iter().filter_map(|k| map.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Returns the per-drug result objects contained in an envelope.
///
/// Non-object array elements are skipped. A scalar envelope yields nothing.
pub fn result_values(envelope: &Value) -> Vec<&Value> {
    match envelope {
        Value::Array(items) => items.iter().filter(|v| v.is_object()).collect(),
        Value::Object(_) => match first_present(envelope, RESULTS_KEYS) {
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
            _ => vec![envelope],
        },
        _ => Vec::new(),
    }
}

/// Deserializes one section.
///
/// Field types are tolerated by the models themselves. A section that is
/// not an object at all is wrapped as `{ wrap_key: value }` so the raw
/// value still lands in the section (in its `extra` map unless
/// `wrap_key` is a typed field).
fn section<T: DeserializeOwned + Default>(raw: &Value, key: &str, wrap_key: &str) -> Option<T> {
    let value = raw.get(key).filter(|v| !v.is_null())?;
    let value = if value.is_object() {
        value.clone()
    } else {
        let mut wrapped = Map::new();
        wrapped.insert(wrap_key.to_string(), value.clone());
        Value::Object(wrapped)
    };
    Some(serde_json::from_value(value).unwrap_or_default())
}

const CANONICAL_KEYS: &[&str] = &[
    "risk_assessment",
    "pharmacogenomic_profile",
    "clinical_recommendation",
    "llm_generated_explanation",
    "quality_metrics",
];

/// Maps one raw result object onto the canonical [`AnalysisResult`].
///
/// `envelope` supplies the request-level timestamp when the result has
/// none of its own.
pub fn to_analysis_result(raw: &Value, envelope: &Value) -> AnalysisResult {
    let patient_id = first_string(raw, PATIENT_KEYS);
    let drug = first_string(raw, DRUG_KEYS).unwrap_or_default();
    let timestamp =
        first_string(raw, TIMESTAMP_KEYS).or_else(|| first_string(envelope, TIMESTAMP_KEYS));

    let clinical_recommendation = raw
        .get("clinical_recommendation")
        .filter(|v| !v.is_null())
        .map(|v| {
            serde_json::from_value(v.clone())
                .unwrap_or_else(|_| ClinicalRecommendation::Other(v.clone()))
        });
    let llm_generated_explanation =
        section::<Explanation>(raw, "llm_generated_explanation", "summary");

    let consumed = |k: &str| {
        PATIENT_KEYS.contains(&k)
            || DRUG_KEYS.contains(&k)
            || TIMESTAMP_KEYS.contains(&k)
            || CANONICAL_KEYS.contains(&k)
    };
    let extra: Map<String, Value> = raw
        .as_object()
        .map(|m| {
            m.iter()
                .filter(|(k, _)| !consumed(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    AnalysisResult {
        patient_id,
        drug,
        timestamp,
        risk_assessment: section::<RiskAssessment>(raw, "risk_assessment", "risk_label")
            .unwrap_or_default(),
        pharmacogenomic_profile: section::<PharmacogenomicProfile>(
            raw,
            "pharmacogenomic_profile",
            "value",
        )
        .unwrap_or_default(),
        clinical_recommendation,
        llm_generated_explanation,
        quality_metrics: section::<QualityMetrics>(raw, "quality_metrics", "value")
            .unwrap_or_default(),
        extra,
    }
}

/// Display label for a result: its patient identifier or [`UNKNOWN_PATIENT`].
pub fn patient_label(result: &AnalysisResult) -> String {
    result
        .patient_id
        .clone()
        .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
}

/// Generates a log identifier that sorts by creation time.
pub fn new_log_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &suffix[..8])
}

/// Generates a request patient identifier: `PATIENT_<millis>_<4 hex>`.
pub fn new_patient_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("PATIENT_{}_{}", now.timestamp_millis(), &suffix[..4])
}

/// Flattens a response envelope into one [`LogEntry`] per drug result.
pub fn log_entries(envelope: &Value, now: DateTime<Utc>) -> Vec<LogEntry> {
    let logged_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    result_values(envelope)
        .into_iter()
        .map(|raw| {
            let result = to_analysis_result(raw, envelope);
            LogEntry {
                id: new_log_id(now),
                patient_label: patient_label(&result),
                logged_at: logged_at.clone(),
                result,
            }
        })
        .collect()
}

/// True only when the validator's success flag is boolean `true`.
pub fn validation_succeeded(body: &Value) -> bool {
    matches!(first_present(body, VALIDATION_SUCCESS_KEYS), Some(Value::Bool(true)))
}
