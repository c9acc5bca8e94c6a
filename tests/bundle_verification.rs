//! Bundle verification scenarios: gatekeeper policy + attestation sets,
//! including the fail-closed load path through the policy store.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

use svalinn::error::PolicyError;
use svalinn::policy::{
    Attestation, BUNDLE_MEDIA_TYPE, BUNDLE_VERSION, GatekeeperPolicy, Mode, evaluate_bundle,
    load_bundle, load_gatekeeper_policy,
};

const SLSA_PREDICATE: &str = "https://slsa.dev/provenance/v1";
const SPDX_PREDICATE: &str = "https://spdx.dev/Document";

fn fingerprint(fill: char) -> String {
    format!("sha256:{}", fill.to_string().repeat(64))
}

fn gatekeeper(mode: Mode, quorum: usize) -> GatekeeperPolicy {
    GatekeeperPolicy {
        version: "1".to_string(),
        required_predicates: vec![SLSA_PREDICATE.to_string(), SPDX_PREDICATE.to_string()],
        allowed_signers: vec![fingerprint('a')],
        log_quorum: quorum,
        mode,
    }
}

fn attestation(predicate: &str, signer: &str, log_entry: Option<&str>) -> Attestation {
    Attestation {
        predicate_type: predicate.to_string(),
        subject: vec![fingerprint('d')],
        signer: signer.to_string(),
        log_entry: log_entry.map(ToString::to_string),
    }
}

fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).expect("create fixture");
    file.write_all(contents.as_bytes()).expect("write fixture");
    path
}

#[test]
fn complete_attestation_set_passes_strict() {
    let signer = fingerprint('a');
    let result = evaluate_bundle(
        &gatekeeper(Mode::Strict, 1),
        &[
            attestation(SLSA_PREDICATE, &signer, Some("rekor-1")),
            attestation(SPDX_PREDICATE, &signer, Some("sigstore-1")),
        ],
    );
    assert!(result.allowed);
    assert_eq!(result.predicates_found.len(), 2);
    assert!(result.missing_predicates.is_empty());
    assert_eq!(result.log_count, 2);
}

#[test]
fn permissive_mode_never_blocks() {
    let bad_signer = fingerprint('b');
    // Missing predicate, invalid signer, and quorum failure all at once.
    let result = evaluate_bundle(
        &gatekeeper(Mode::Permissive, 2),
        &[attestation(SLSA_PREDICATE, &bad_signer, None)],
    );
    assert!(result.allowed);
    assert!(!result.violations.is_empty());
    assert_eq!(result.warnings, result.violations);
    assert!(!result.log_quorum_met);
}

#[test]
fn strict_mode_blocks_on_the_same_input() {
    let bad_signer = fingerprint('b');
    let result = evaluate_bundle(
        &gatekeeper(Mode::Strict, 2),
        &[attestation(SLSA_PREDICATE, &bad_signer, None)],
    );
    assert!(!result.allowed);
    assert!(result.warnings.is_empty());
    assert!(
        result
            .violations
            .contains(&format!("Missing required predicate: {SPDX_PREDICATE}"))
    );
    assert!(
        result
            .violations
            .contains(&format!("Signer not allowed: {bad_signer}"))
    );
    assert!(result.violations.contains(&"Log quorum not met: 0 < 2".to_string()));
}

#[test]
fn gatekeeper_policy_loads_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(
        &dir,
        "gatekeeper.json",
        &format!(
            r#"{{
                "version": "1",
                "requiredPredicates": ["{SLSA_PREDICATE}"],
                "allowedSigners": ["{signer}"],
                "logQuorum": 1,
                "mode": "permissive"
            }}"#,
            signer = fingerprint('a'),
        ),
    );
    let policy = load_gatekeeper_policy(&path).expect("load gatekeeper policy");
    assert_eq!(policy.mode, Mode::Permissive);
    assert_eq!(policy.required_predicates, vec![SLSA_PREDICATE.to_string()]);
}

#[test]
fn gatekeeper_policy_with_bad_signer_fails_closed() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(
        &dir,
        "gatekeeper.json",
        r#"{"version": "1", "allowedSigners": ["release-key"]}"#,
    );
    assert!(matches!(
        load_gatekeeper_policy(&path),
        Err(PolicyError::Validation { .. })
    ));
}

fn bundle_document(subject: &str) -> String {
    format!(
        r#"{{
            "mediaType": "{BUNDLE_MEDIA_TYPE}",
            "version": "{BUNDLE_VERSION}",
            "attestations": [
                {{
                    "predicateType": "{SLSA_PREDICATE}",
                    "subject": ["{subject}"],
                    "signer": "{signer}",
                    "logEntry": "rekor-1"
                }},
                {{
                    "predicateType": "{SPDX_PREDICATE}",
                    "subject": ["{subject}"],
                    "signer": "{signer}"
                }}
            ],
            "logEntries": [{{"logId": "rekor", "index": 24296}}]
        }}"#,
        signer = fingerprint('a'),
    )
}

#[test]
fn bundle_verifies_end_to_end() {
    let dir = TempDir::new().expect("tempdir");
    let digest = fingerprint('d');
    let bundle_path = write_fixture(&dir, "bundle.json", &bundle_document(&digest));

    let bundle = load_bundle(&bundle_path, Some(&digest)).expect("load bundle");
    let result = evaluate_bundle(&gatekeeper(Mode::Strict, 1), &bundle.attestations);
    assert!(result.allowed, "violations: {:?}", result.violations);
    assert_eq!(result.signers_verified, vec![fingerprint('a')]);
}

#[test]
fn bundle_for_a_different_artifact_is_rejected_before_evaluation() {
    let dir = TempDir::new().expect("tempdir");
    let bundle_path = write_fixture(&dir, "bundle.json", &bundle_document(&fingerprint('d')));

    let err = load_bundle(&bundle_path, Some(&fingerprint('e'))).expect_err("digest mismatch");
    assert!(matches!(err, PolicyError::DigestMismatch { .. }));
}

#[test]
fn truncated_bundle_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(
        &dir,
        "empty.json",
        &format!(
            r#"{{
                "mediaType": "{BUNDLE_MEDIA_TYPE}",
                "version": "{BUNDLE_VERSION}",
                "attestations": [],
                "logEntries": []
            }}"#,
        ),
    );
    assert!(matches!(
        load_bundle(&path, None),
        Err(PolicyError::MalformedBundle { .. })
    ));
}
