//! Admission policy engine.
//!
//! Pure decision logic: given a declarative policy and a concrete request
//! (run this container, or verify this attestation bundle), produce an
//! allow/deny verdict plus an auditable violation list. The engine performs
//! no I/O and holds no state between calls; every evaluation is a pure
//! function of its inputs plus a single clock read.

mod bundle;
mod defaults;
mod evaluate;
mod model;
mod pattern;
mod store;
mod trust;

pub use bundle::{
    Attestation, BUNDLE_MEDIA_TYPE, BUNDLE_VERSION, Bundle, BundleLogEntry, EvaluationResult,
    GatekeeperPolicy, Mode, evaluate_bundle,
};
pub use defaults::{permissive, standard, strict};
pub use evaluate::{evaluate, evaluate_at, evaluate_multiple, extract_registry};
pub use model::{
    AttestationContext, CapabilitySet, ContainerRequest, ImageRules, NetworkRules, Policy,
    PolicyResult, PolicyViolation, RegistryRules, ResourceRules, SbomFormat, SecurityRules,
    Severity, SignatureAlgorithm, TransparencyLog, TransparencyLogEntry, TransparencyLogRules,
    VerificationRules, VulnerabilityCeilings,
};
pub use pattern::{matches, matches_any};
pub use store::{
    PolicyStore, is_sha256_fingerprint, load_bundle, load_gatekeeper_policy, load_policy,
    load_request, validate_gatekeeper_policy, validate_policy, validate_request,
};
pub use trust::KeyTrustLevel;
