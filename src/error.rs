//! Error taxonomy for the analyze pipeline.
//!
//! Three terminal error kinds reach a caller. A fourth outcome, the
//! degraded answer produced when the analysis engine is unreachable, is
//! not an error at all and never passes through this type.
//!
//! | Variant | `error_type` | Status |
//! |---------|--------------|--------|
//! | [`AnalyzeError::VcfValidation`] | `VCF_VALIDATION_ERROR` | 400 |
//! | [`AnalyzeError::InputValidation`] | `INPUT_VALIDATION` | 400 |
//! | [`AnalyzeError::Internal`] | `INTERNAL` | 500 |

use axum::http::StatusCode;

/// Message returned for every internal fault. The cause is only logged.
pub const INTERNAL_MESSAGE: &str = "An unexpected error occurred while processing the analysis.";

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Missing, mistyped, oversized, unreadable, or structurally rejected file.
    #[error("{0}")]
    VcfValidation(String),
    /// Missing or empty drug list.
    #[error("{0}")]
    InputValidation(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AnalyzeError {
    pub fn vcf(message: impl Into<String>) -> Self {
        Self::VcfValidation(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::VcfValidation(_) => "VCF_VALIDATION_ERROR",
            Self::InputValidation(_) => "INPUT_VALIDATION",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::VcfValidation(_) | Self::InputValidation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            Self::VcfValidation(m) | Self::InputValidation(m) => m.clone(),
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types_and_statuses() {
        let e = AnalyzeError::vcf("No VCF file uploaded.");
        assert_eq!(e.error_type(), "VCF_VALIDATION_ERROR");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e = AnalyzeError::input("No drugs specified.");
        assert_eq!(e.error_type(), "INPUT_VALIDATION");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e = AnalyzeError::from(anyhow::anyhow!("disk full"));
        assert_eq!(e.error_type(), "INTERNAL");
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_message_is_sanitized() {
        let e = AnalyzeError::from(anyhow::anyhow!("open /secret/path: permission denied"));
        assert!(!e.public_message().contains("/secret/path"));
        assert_eq!(e.public_message(), INTERNAL_MESSAGE);
        assert!(e.to_string().contains("/secret/path"));
    }
}
