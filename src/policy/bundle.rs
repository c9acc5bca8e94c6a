use serde::{Deserialize, Serialize};
use tracing::debug;

/// Media type a verified-container bundle must declare.
pub const BUNDLE_MEDIA_TYPE: &str = "application/vnd.verified-container.bundle+json";

/// Bundle format version this gate understands.
pub const BUNDLE_VERSION: &str = "0.1.0";

/// Evaluation mode for bundle verification. Unlike the container evaluator's
/// severity model, this is a single blocking/non-blocking axis; callers key
/// behavior off the mode, so the two are deliberately not unified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Strict,
    Permissive,
}

/// The simplified predicate/signer/quorum policy used when verifying a
/// signed bundle directly, as opposed to the richer per-request `Policy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatekeeperPolicy {
    pub version: String,
    #[serde(default)]
    pub required_predicates: Vec<String>,
    #[serde(default)]
    pub allowed_signers: Vec<String>,
    #[serde(default = "default_log_quorum")]
    pub log_quorum: usize,
    #[serde(default)]
    pub mode: Mode,
}

fn default_log_quorum() -> usize {
    1
}

/// One attestation record inside a bundle: a signed claim about subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attestation {
    pub predicate_type: String,
    #[serde(default)]
    pub subject: Vec<String>,
    pub signer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_entry: Option<String>,
}

/// A pre-assembled bundle of attestations for one artifact. Structural
/// sanity (media type, version, non-empty sections) is checked by the store
/// at load time, before the attestation set reaches the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Bundle {
    pub media_type: String,
    pub version: String,
    pub attestations: Vec<Attestation>,
    pub log_entries: Vec<BundleLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleLogEntry {
    pub log_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
}

/// Outcome of verifying an attestation set against a gatekeeper policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub allowed: bool,
    pub mode: Mode,
    pub predicates_found: Vec<String>,
    pub missing_predicates: Vec<String>,
    pub signers_verified: Vec<String>,
    pub invalid_signers: Vec<String>,
    pub log_count: usize,
    pub log_quorum_met: bool,
    pub violations: Vec<String>,
    /// In permissive mode, a mirror of `violations`; empty otherwise.
    pub warnings: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Verify an attestation set against a gatekeeper policy.
///
/// Never fails: every input combination maps to a result. In strict mode the
/// verdict is "no violations"; in permissive mode the verdict is always
/// allow and the violations are surfaced as warnings instead.
pub fn evaluate_bundle(policy: &GatekeeperPolicy, attestations: &[Attestation]) -> EvaluationResult {
    let mut predicates_found = Vec::new();
    let mut signers_verified = Vec::new();
    let mut invalid_signers = Vec::new();
    let mut log_count = 0usize;

    for attestation in attestations {
        if policy
            .required_predicates
            .iter()
            .any(|p| *p == attestation.predicate_type)
        {
            push_unique(&mut predicates_found, &attestation.predicate_type);
        }
        if policy.allowed_signers.iter().any(|s| *s == attestation.signer) {
            push_unique(&mut signers_verified, &attestation.signer);
        } else {
            push_unique(&mut invalid_signers, &attestation.signer);
        }
        if attestation.log_entry.as_deref().is_some_and(|e| !e.is_empty()) {
            log_count += 1;
        }
    }

    let missing_predicates: Vec<String> = policy
        .required_predicates
        .iter()
        .filter(|p| !predicates_found.contains(*p))
        .cloned()
        .collect();
    let log_quorum_met = log_count >= policy.log_quorum;

    let mut violations = Vec::new();
    for predicate in &missing_predicates {
        violations.push(format!("Missing required predicate: {predicate}"));
    }
    for signer in &invalid_signers {
        violations.push(format!("Signer not allowed: {signer}"));
    }
    if !log_quorum_met {
        violations.push(format!(
            "Log quorum not met: {} < {}",
            log_count, policy.log_quorum
        ));
    }

    let (allowed, warnings) = match policy.mode {
        Mode::Strict => (violations.is_empty(), Vec::new()),
        Mode::Permissive => (true, violations.clone()),
    };

    debug!(
        mode = %policy.mode,
        allowed,
        violations = violations.len(),
        "bundle verification"
    );

    EvaluationResult {
        allowed,
        mode: policy.mode,
        predicates_found,
        missing_predicates,
        signers_verified,
        invalid_signers,
        log_count,
        log_quorum_met,
        violations,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer_fingerprint(fill: char) -> String {
        format!("sha256:{}", fill.to_string().repeat(64))
    }

    fn policy(mode: Mode) -> GatekeeperPolicy {
        GatekeeperPolicy {
            version: "1".to_string(),
            required_predicates: vec![
                "https://slsa.dev/provenance/v1".to_string(),
                "https://spdx.dev/Document".to_string(),
            ],
            allowed_signers: vec![signer_fingerprint('a')],
            log_quorum: 1,
            mode,
        }
    }

    fn attestation(predicate: &str, signer: &str, log_entry: Option<&str>) -> Attestation {
        Attestation {
            predicate_type: predicate.to_string(),
            subject: vec![],
            signer: signer.to_string(),
            log_entry: log_entry.map(ToString::to_string),
        }
    }

    #[test]
    fn complete_bundle_passes_strict() {
        let good = signer_fingerprint('a');
        let result = evaluate_bundle(
            &policy(Mode::Strict),
            &[
                attestation("https://slsa.dev/provenance/v1", &good, Some("rekor-123")),
                attestation("https://spdx.dev/Document", &good, None),
            ],
        );
        assert!(result.allowed);
        assert!(result.violations.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.log_count, 1);
        assert!(result.log_quorum_met);
    }

    #[test]
    fn missing_predicate_blocks_strict() {
        let good = signer_fingerprint('a');
        let result = evaluate_bundle(
            &policy(Mode::Strict),
            &[attestation(
                "https://slsa.dev/provenance/v1",
                &good,
                Some("rekor-123"),
            )],
        );
        assert!(!result.allowed);
        assert_eq!(
            result.missing_predicates,
            vec!["https://spdx.dev/Document".to_string()]
        );
        assert_eq!(
            result.violations,
            vec!["Missing required predicate: https://spdx.dev/Document".to_string()]
        );
    }

    #[test]
    fn unknown_signer_is_invalid() {
        let good = signer_fingerprint('a');
        let bad = signer_fingerprint('b');
        let result = evaluate_bundle(
            &policy(Mode::Strict),
            &[
                attestation("https://slsa.dev/provenance/v1", &good, Some("rekor-123")),
                attestation("https://spdx.dev/Document", &bad, None),
            ],
        );
        assert!(!result.allowed);
        assert_eq!(result.signers_verified, vec![good]);
        assert_eq!(result.invalid_signers, vec![bad.clone()]);
        assert!(
            result
                .violations
                .contains(&format!("Signer not allowed: {bad}"))
        );
    }

    #[test]
    fn quorum_failure_message_shape() {
        let mut p = policy(Mode::Strict);
        p.log_quorum = 2;
        let good = signer_fingerprint('a');
        let result = evaluate_bundle(
            &p,
            &[
                attestation("https://slsa.dev/provenance/v1", &good, Some("rekor-123")),
                attestation("https://spdx.dev/Document", &good, None),
            ],
        );
        assert!(!result.allowed);
        assert!(!result.log_quorum_met);
        assert!(result.violations.contains(&"Log quorum not met: 1 < 2".to_string()));
    }

    #[test]
    fn empty_log_entry_does_not_count() {
        let good = signer_fingerprint('a');
        let result = evaluate_bundle(
            &policy(Mode::Strict),
            &[
                attestation("https://slsa.dev/provenance/v1", &good, Some("")),
                attestation("https://spdx.dev/Document", &good, None),
            ],
        );
        assert_eq!(result.log_count, 0);
        assert!(!result.log_quorum_met);
    }

    #[test]
    fn duplicates_are_collapsed_preserving_order() {
        let good = signer_fingerprint('a');
        let bad = signer_fingerprint('b');
        let result = evaluate_bundle(
            &policy(Mode::Strict),
            &[
                attestation("https://spdx.dev/Document", &bad, None),
                attestation("https://spdx.dev/Document", &bad, None),
                attestation("https://slsa.dev/provenance/v1", &good, Some("rekor-1")),
                attestation("https://slsa.dev/provenance/v1", &good, Some("rekor-2")),
            ],
        );
        assert_eq!(
            result.predicates_found,
            vec![
                "https://spdx.dev/Document".to_string(),
                "https://slsa.dev/provenance/v1".to_string(),
            ]
        );
        assert_eq!(result.signers_verified, vec![good]);
        assert_eq!(result.invalid_signers, vec![bad]);
        // Per-attestation log entries still count individually.
        assert_eq!(result.log_count, 2);
    }

    #[test]
    fn permissive_mode_never_blocks_and_mirrors_warnings() {
        let bad = signer_fingerprint('b');
        let result = evaluate_bundle(
            &policy(Mode::Permissive),
            &[attestation("https://example.com/other", &bad, None)],
        );
        assert!(result.allowed);
        assert!(!result.violations.is_empty());
        assert_eq!(result.warnings, result.violations);
    }

    #[test]
    fn empty_attestation_set_in_strict_mode_is_denied() {
        let result = evaluate_bundle(&policy(Mode::Strict), &[]);
        assert!(!result.allowed);
        assert_eq!(result.missing_predicates.len(), 2);
        assert!(!result.log_quorum_met);
    }

    #[test]
    fn mode_defaults_to_strict_in_json() {
        let json = r#"{"version": "1", "requiredPredicates": [], "allowedSigners": []}"#;
        let p: GatekeeperPolicy = serde_json::from_str(json).expect("gatekeeper policy");
        assert_eq!(p.mode, Mode::Strict);
        assert_eq!(p.log_quorum, 1);
    }
}
