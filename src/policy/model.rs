use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trust::KeyTrustLevel;

// ─── Closed vocabularies ─────────────────────────────────────────────────────

/// Signature algorithms a policy may require.
///
/// The vocabulary is closed: anything else fails deserialization at the
/// policy-store boundary and never reaches evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ed25519")]
    #[strum(serialize = "ed25519")]
    Ed25519,
    #[serde(rename = "ecdsa-p256")]
    #[strum(serialize = "ecdsa-p256")]
    EcdsaP256,
    #[serde(rename = "rsa-pss")]
    #[strum(serialize = "rsa-pss")]
    RsaPss,
    #[serde(rename = "ml-dsa-87")]
    #[strum(serialize = "ml-dsa-87")]
    MlDsa87,
}

/// SBOM document formats accepted by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SbomFormat {
    #[serde(rename = "spdx")]
    #[strum(serialize = "spdx")]
    Spdx,
    #[serde(rename = "cyclonedx")]
    #[strum(serialize = "cyclonedx")]
    CycloneDx,
    #[serde(rename = "syft-json")]
    #[strum(serialize = "syft-json")]
    SyftJson,
}

/// Transparency logs a signature may be recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum TransparencyLog {
    #[serde(rename = "rekor")]
    #[strum(serialize = "rekor")]
    Rekor,
    #[serde(rename = "sigstore")]
    #[strum(serialize = "sigstore")]
    Sigstore,
    #[serde(rename = "internal")]
    #[strum(serialize = "internal")]
    Internal,
}

// ─── Policy document ─────────────────────────────────────────────────────────

/// A named, versioned admission policy. Immutable once loaded; the policy
/// store constructs it, the evaluator only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Policy {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub registries: RegistryRules,
    #[serde(default)]
    pub images: ImageRules,
    #[serde(default)]
    pub resources: ResourceRules,
    #[serde(default)]
    pub security: SecurityRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRules>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryRules {
    /// Glob patterns for permitted registries. Empty means the allow list is
    /// not in effect (everything not denied passes).
    #[serde(default)]
    pub allow: Vec<String>,
    /// Glob patterns for blocked registries. Empty matches nothing.
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub require_signature: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_signers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageRules {
    #[serde(default)]
    pub allow_patterns: Vec<String>,
    #[serde(default)]
    pub deny_patterns: Vec<String>,
    #[serde(default)]
    pub require_sbom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability_ceilings: Option<VulnerabilityCeilings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VulnerabilityCeilings {
    pub critical: u32,
    pub high: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceRules {
    pub max_memory_mb: u64,
    pub max_cpu_cores: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_containers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_storage_gb: Option<u64>,
}

impl Default for ResourceRules {
    fn default() -> Self {
        Self {
            max_memory_mb: 4096,
            max_cpu_cores: 2.0,
            max_containers: None,
            max_storage_gb: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityRules {
    #[serde(default)]
    pub allow_privileged: bool,
    #[serde(default)]
    pub allow_host_network: bool,
    #[serde(default)]
    pub allow_host_pid: bool,
    #[serde(default)]
    pub allow_host_ipc: bool,
    #[serde(default)]
    pub read_only_root: bool,
    #[serde(default)]
    pub drop_capabilities: Vec<String>,
    #[serde(default)]
    pub add_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apparmor_profile: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkRules {
    #[serde(default)]
    pub allow_egress: bool,
    #[serde(default)]
    pub allow_ingress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerificationRules {
    /// Allow-list of acceptable signature algorithms. Non-empty makes a
    /// signature mandatory.
    #[serde(default)]
    pub signature_algorithms: Vec<SignatureAlgorithm>,
    #[serde(default)]
    pub transparency_logs: TransparencyLogRules,
    #[serde(default)]
    pub sbom_required: bool,
    #[serde(default)]
    pub sbom_formats: Vec<SbomFormat>,
    /// Minimum SLSA provenance level (1-4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_signature_age_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_trust_level: Option<KeyTrustLevel>,
    /// Content-addressed key fingerprints (`sha256:<64 hex>`).
    #[serde(default)]
    pub allowed_key_ids: Vec<String>,
    /// Attestation predicate URIs that must all be present.
    #[serde(default)]
    pub required_predicates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransparencyLogRules {
    #[serde(default)]
    pub required: Vec<TransparencyLog>,
    /// Minimum number of required logs that must carry the signature.
    /// Absent means all required logs must be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<usize>,
}

// ─── Admission request ───────────────────────────────────────────────────────

/// One container admission request. Ephemeral; constructed per decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerRequest {
    pub image: String,
    /// Registry override; derived from `image` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub host_network: bool,
    #[serde(default)]
    pub host_pid: bool,
    #[serde(default)]
    pub host_ipc: bool,
    /// Tri-state: only an explicit `false` can violate a read-only-root
    /// requirement; absence does not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_root: Option<bool>,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub cpu_cores: f64,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CapabilitySet {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub drop: Vec<String>,
}

/// Supply-chain evidence attached to a request. Every field is optional;
/// whether absence matters is decided by the policy's verification rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttestationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<SignatureAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency_log_entries: Option<Vec<TransparencyLogEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_sbom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbom_format: Option<SbomFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slsa_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_trust_level: Option<KeyTrustLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransparencyLogEntry {
    pub log: TransparencyLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

// ─── Verdict ────────────────────────────────────────────────────────────────

/// Violation severity. Only `Critical` and `High` block admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// A single rule violation, attributable to exactly one dotted rule path.
/// Messages are deterministic for identical inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyViolation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl PolicyViolation {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            field: None,
            actual: None,
            expected: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// Outcome of evaluating one request against one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResult {
    pub allowed: bool,
    pub violations: Vec<PolicyViolation>,
    pub applied_policy: String,
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyResult {
    /// Derive the verdict from a collected violation set. `allowed` is
    /// definitionally the absence of blocking violations.
    pub fn from_violations(
        applied_policy: impl Into<String>,
        violations: Vec<PolicyViolation>,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let allowed = !violations.iter().any(|v| v.severity.is_blocking());
        Self {
            allowed,
            violations,
            applied_policy: applied_policy.into(),
            evaluated_at,
        }
    }
}
