use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};
use url::Url;

use super::bundle::{BUNDLE_MEDIA_TYPE, BUNDLE_VERSION, Bundle, GatekeeperPolicy};
use super::defaults;
use super::model::{ContainerRequest, Policy};
use crate::error::PolicyError;

/// Check a content-addressed fingerprint: `sha256:` followed by exactly
/// 64 lowercase hex characters.
pub fn is_sha256_fingerprint(value: &str) -> bool {
    let Some(hex) = value.strip_prefix("sha256:") else {
        return false;
    };
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

fn validate_fingerprints(field: &str, ids: &[String]) -> Result<(), PolicyError> {
    for id in ids {
        if !is_sha256_fingerprint(id) {
            return Err(PolicyError::validation(
                field,
                format!("'{id}' is not a sha256 fingerprint"),
            ));
        }
    }
    Ok(())
}

fn validate_predicates(field: &str, predicates: &[String]) -> Result<(), PolicyError> {
    for predicate in predicates {
        if Url::parse(predicate).is_err() {
            return Err(PolicyError::validation(
                field,
                format!("'{predicate}' is not a well-formed URI"),
            ));
        }
    }
    Ok(())
}

/// Structural validation for an admission policy. The evaluator assumes it
/// only ever sees a policy that passed this check.
pub fn validate_policy(policy: &Policy) -> Result<(), PolicyError> {
    if policy.name.is_empty() {
        return Err(PolicyError::validation("name", "must not be empty"));
    }
    if let Some(signers) = &policy.registries.allowed_signers {
        validate_fingerprints("registries.allowedSigners", signers)?;
    }
    if let Some(verification) = &policy.verification {
        if let Some(quorum) = verification.transparency_logs.quorum {
            if quorum < 1 {
                return Err(PolicyError::validation(
                    "verification.transparencyLogs.quorum",
                    "must be at least 1",
                ));
            }
        }
        if let Some(level) = verification.provenance_level {
            if !(1..=4).contains(&level) {
                return Err(PolicyError::validation(
                    "verification.provenanceLevel",
                    format!("must be between 1 and 4, got {level}"),
                ));
            }
        }
        if let Some(age) = verification.max_signature_age_days {
            if age < 1 {
                return Err(PolicyError::validation(
                    "verification.maxSignatureAgeDays",
                    "must be at least 1",
                ));
            }
        }
        validate_fingerprints("verification.allowedKeyIds", &verification.allowed_key_ids)?;
        validate_predicates(
            "verification.requiredPredicates",
            &verification.required_predicates,
        )?;
    }
    Ok(())
}

/// Structural validation for a gatekeeper (bundle-verification) policy.
pub fn validate_gatekeeper_policy(policy: &GatekeeperPolicy) -> Result<(), PolicyError> {
    if policy.log_quorum < 1 {
        return Err(PolicyError::validation("logQuorum", "must be at least 1"));
    }
    validate_fingerprints("allowedSigners", &policy.allowed_signers)?;
    validate_predicates("requiredPredicates", &policy.required_predicates)
}

/// Structural validation for an admission request.
pub fn validate_request(request: &ContainerRequest) -> Result<(), PolicyError> {
    if request.image.is_empty() {
        return Err(PolicyError::validation("image", "must not be empty"));
    }
    if let Some(key_id) = request
        .attestation
        .as_ref()
        .and_then(|a| a.key_id.as_deref())
    {
        if !is_sha256_fingerprint(key_id) {
            return Err(PolicyError::validation(
                "attestation.keyId",
                format!("'{key_id}' is not a sha256 fingerprint"),
            ));
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PolicyError> {
    let raw = fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|err| PolicyError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Load and validate an admission policy document.
pub fn load_policy(path: &Path) -> Result<Policy, PolicyError> {
    let policy: Policy = read_json(path)?;
    validate_policy(&policy)?;
    debug!(policy = %policy.name, path = %path.display(), "loaded policy");
    Ok(policy)
}

/// Load and validate a gatekeeper policy document.
pub fn load_gatekeeper_policy(path: &Path) -> Result<GatekeeperPolicy, PolicyError> {
    let policy: GatekeeperPolicy = read_json(path)?;
    validate_gatekeeper_policy(&policy)?;
    Ok(policy)
}

/// Load and validate an admission request document.
pub fn load_request(path: &Path) -> Result<ContainerRequest, PolicyError> {
    let request: ContainerRequest = read_json(path)?;
    validate_request(&request)?;
    Ok(request)
}

fn sanity_check_bundle(bundle: &Bundle) -> Result<(), PolicyError> {
    if bundle.media_type != BUNDLE_MEDIA_TYPE {
        return Err(PolicyError::MalformedBundle {
            field: "mediaType".to_string(),
            message: format!("expected {BUNDLE_MEDIA_TYPE}, got '{}'", bundle.media_type),
        });
    }
    if bundle.version != BUNDLE_VERSION {
        return Err(PolicyError::MalformedBundle {
            field: "version".to_string(),
            message: format!("unsupported bundle version '{}'", bundle.version),
        });
    }
    if bundle.attestations.is_empty() {
        return Err(PolicyError::MalformedBundle {
            field: "attestations".to_string(),
            message: "at least one attestation is required".to_string(),
        });
    }
    if bundle.log_entries.is_empty() {
        return Err(PolicyError::MalformedBundle {
            field: "logEntries".to_string(),
            message: "at least one log entry is required".to_string(),
        });
    }
    Ok(())
}

/// Every attestation subject that carries a digest must name the artifact
/// being admitted; a bundle for some other artifact is rejected outright.
fn check_subject_digests(bundle: &Bundle, expected: &str) -> Result<(), PolicyError> {
    if !is_sha256_fingerprint(expected) {
        return Err(PolicyError::validation(
            "imageDigest",
            format!("'{expected}' is not a sha256 fingerprint"),
        ));
    }
    let mismatched: Vec<&str> = bundle
        .attestations
        .iter()
        .flat_map(|a| a.subject.iter())
        .filter(|subject| subject.starts_with("sha256:") && *subject != expected)
        .map(String::as_str)
        .collect();
    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(PolicyError::DigestMismatch {
            expected: expected.to_string(),
            observed: mismatched.join(", "),
        })
    }
}

/// Load a bundle document, sanity-check its structure, and (when an expected
/// image digest is given) reject it if any attestation names a different
/// artifact. Only a bundle that passes reaches `evaluate_bundle`.
pub fn load_bundle(path: &Path, expected_digest: Option<&str>) -> Result<Bundle, PolicyError> {
    let bundle: Bundle = read_json(path)?;
    sanity_check_bundle(&bundle)?;
    if let Some(expected) = expected_digest {
        check_subject_digests(&bundle, expected)?;
    }
    Ok(bundle)
}

/// Named admission policies, immutable after construction. Holds the three
/// built-in policies plus any loaded from a policy directory.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    policies: BTreeMap<String, Policy>,
}

impl PolicyStore {
    /// A store holding only the built-in strict/standard/permissive policies.
    pub fn with_defaults() -> Self {
        let mut policies = BTreeMap::new();
        for policy in [
            defaults::strict(),
            defaults::standard(),
            defaults::permissive(),
        ] {
            policies.insert(policy.name.clone(), policy);
        }
        Self { policies }
    }

    /// Built-ins plus every `*.json` policy in `dir`. A file policy with the
    /// same name as a built-in replaces it.
    pub fn open(dir: &Path) -> Result<Self, PolicyError> {
        let mut store = Self::with_defaults();
        let entries = fs::read_dir(dir).map_err(|source| PolicyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| PolicyError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let policy = load_policy(&path)?;
                store.policies.insert(policy.name.clone(), policy);
            }
        }
        info!(dir = %dir.display(), policies = store.policies.len(), "policy store opened");
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Result<&Policy, PolicyError> {
        self.policies
            .get(name)
            .ok_or_else(|| PolicyError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }
}
