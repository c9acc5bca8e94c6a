use std::path::PathBuf;

use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for svalinn.
///
/// Evaluation itself is infallible: rule violations are first-class results,
/// never errors. Errors exist only at the boundaries, when loading and
/// structurally validating documents or configuration.
#[derive(Debug, Error)]
pub enum GateError {
    // ── Policy store / documents ────────────────────────────────────────
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GateError {
    /// Stable machine-readable identifier for the CLI error envelope.
    pub fn error_id(&self) -> &'static str {
        match self {
            Self::Policy(err) => err.error_id(),
            Self::Config(_) => "ERR_CONFIG",
            Self::Other(_) => "ERR_INTERNAL",
        }
    }
}

// ─── Policy store errors ────────────────────────────────────────────────────

/// Failures loading or structurally validating policy and bundle documents.
/// All of these are fail-closed: a malformed document never produces a
/// default-allow result.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("policy not found: {0}")]
    NotFound(String),

    #[error("malformed bundle: {field}: {message}")]
    MalformedBundle { field: String, message: String },

    #[error("subject digest mismatch: expected {expected}, observed {observed}")]
    DigestMismatch { expected: String, observed: String },
}

impl PolicyError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    fn error_id(&self) -> &'static str {
        match self {
            Self::Io { .. } => "ERR_IO",
            Self::Parse { .. } | Self::Validation { .. } | Self::MalformedBundle { .. } => {
                "ERR_POLICY_MALFORMED"
            }
            Self::NotFound(_) => "ERR_POLICY_NOT_FOUND",
            Self::DigestMismatch { .. } => "ERR_POLICY_DENIED",
        }
    }
}

// ─── Config errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_field_and_message() {
        let err = GateError::Policy(PolicyError::validation(
            "verification.provenanceLevel",
            "must be between 1 and 4",
        ));
        assert!(err.to_string().contains("verification.provenanceLevel"));
        assert!(err.to_string().contains("between 1 and 4"));
    }

    #[test]
    fn error_ids_are_stable() {
        assert_eq!(
            GateError::Policy(PolicyError::NotFound("strict".into())).error_id(),
            "ERR_POLICY_NOT_FOUND"
        );
        assert_eq!(
            GateError::Policy(PolicyError::validation("x", "y")).error_id(),
            "ERR_POLICY_MALFORMED"
        );
        assert_eq!(
            GateError::Policy(PolicyError::DigestMismatch {
                expected: "sha256:aa".into(),
                observed: "sha256:bb".into(),
            })
            .error_id(),
            "ERR_POLICY_DENIED"
        );
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let gate_err: GateError = anyhow_err.into();
        assert!(gate_err.to_string().contains("something went wrong"));
        assert_eq!(gate_err.error_id(), "ERR_INTERNAL");
    }
}
