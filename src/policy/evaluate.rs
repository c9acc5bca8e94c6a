use chrono::{DateTime, Utc};
use tracing::debug;

use super::model::{
    AttestationContext, ContainerRequest, Policy, PolicyResult, PolicyViolation, Severity,
    VerificationRules,
};
use super::pattern;

/// Derive the registry from an image reference when the request does not
/// name one explicitly: a bare name maps to Docker Hub, a first path segment
/// with a `.` or `:` is a registry host, anything else is a Hub namespace.
pub fn extract_registry(image: &str) -> String {
    let Some((first, _)) = image.split_once('/') else {
        return "docker.io".to_string();
    };
    if first.contains('.') || first.contains(':') {
        first.to_string()
    } else {
        "docker.io".to_string()
    }
}

/// Evaluate one request against one policy.
///
/// Pure except for a single clock read, taken once so signature-age math and
/// the result timestamp agree. Every applicable rule runs; evaluation never
/// short-circuits, so the violation list is always complete.
pub fn evaluate(policy: &Policy, request: &ContainerRequest) -> PolicyResult {
    evaluate_at(policy, request, Utc::now())
}

/// `evaluate` with an injected clock, for reproducible tests.
pub fn evaluate_at(
    policy: &Policy,
    request: &ContainerRequest,
    now: DateTime<Utc>,
) -> PolicyResult {
    let mut violations = Vec::new();

    let registry = request
        .registry
        .clone()
        .unwrap_or_else(|| extract_registry(&request.image));

    check_registries(policy, &registry, &mut violations);
    check_images(policy, &request.image, &mut violations);
    check_security(policy, request, &mut violations);
    check_resources(policy, request, &mut violations);
    check_network(policy, request, &mut violations);
    if let Some(verification) = &policy.verification {
        check_verification(
            verification,
            request.attestation.as_ref(),
            now,
            &mut violations,
        );
    }

    let result = PolicyResult::from_violations(&policy.name, violations, now);
    debug!(
        policy = %policy.name,
        image = %request.image,
        allowed = result.allowed,
        violations = result.violations.len(),
        "admission decision"
    );
    result
}

/// Evaluate an ordered policy list: the first policy that allows wins. If
/// none allow, the first policy's result is returned unchanged so callers see
/// one concrete, explainable decision. An empty list is a fail-closed deny.
pub fn evaluate_multiple(policies: &[Policy], request: &ContainerRequest) -> PolicyResult {
    let now = Utc::now();
    let mut first: Option<PolicyResult> = None;
    for policy in policies {
        let result = evaluate_at(policy, request, now);
        if result.allowed {
            return result;
        }
        if first.is_none() {
            first = Some(result);
        }
    }
    first.unwrap_or_else(|| {
        PolicyResult::from_violations(
            "none",
            vec![PolicyViolation::new(
                "default",
                Severity::Critical,
                "No policy configured - default deny",
            )],
            now,
        )
    })
}

fn check_registries(policy: &Policy, registry: &str, violations: &mut Vec<PolicyViolation>) {
    // Deny is evaluated independently of allow; both can fire for the same
    // registry.
    if pattern::matches_any(&policy.registries.deny, registry) {
        violations.push(
            PolicyViolation::new(
                "registries.deny",
                Severity::Critical,
                format!("Registry '{registry}' is denied by policy"),
            )
            .with_field("registry")
            .with_actual(registry),
        );
    }
    if !policy.registries.allow.is_empty()
        && !pattern::matches_any(&policy.registries.allow, registry)
    {
        violations.push(
            PolicyViolation::new(
                "registries.allow",
                Severity::Critical,
                format!("Registry '{registry}' is not in the allow list"),
            )
            .with_field("registry")
            .with_actual(registry)
            .with_expected(policy.registries.allow.join(", ")),
        );
    }
}

fn check_images(policy: &Policy, image: &str, violations: &mut Vec<PolicyViolation>) {
    if pattern::matches_any(&policy.images.deny_patterns, image) {
        violations.push(
            PolicyViolation::new(
                "images.denyPatterns",
                Severity::High,
                format!("Image '{image}' matches a deny pattern"),
            )
            .with_field("image")
            .with_actual(image),
        );
    }
    if !policy.images.allow_patterns.is_empty()
        && !pattern::matches_any(&policy.images.allow_patterns, image)
    {
        violations.push(
            PolicyViolation::new(
                "images.allowPatterns",
                Severity::High,
                format!("Image '{image}' matches no allow pattern"),
            )
            .with_field("image")
            .with_actual(image)
            .with_expected(policy.images.allow_patterns.join(", ")),
        );
    }
}

fn check_security(
    policy: &Policy,
    request: &ContainerRequest,
    violations: &mut Vec<PolicyViolation>,
) {
    let rules = &policy.security;
    let flags = [
        (
            request.privileged,
            rules.allow_privileged,
            "security.privileged",
            "Privileged mode is not allowed",
        ),
        (
            request.host_network,
            rules.allow_host_network,
            "security.hostNetwork",
            "Host network access is not allowed",
        ),
        (
            request.host_pid,
            rules.allow_host_pid,
            "security.hostPid",
            "Host PID namespace access is not allowed",
        ),
        (
            request.host_ipc,
            rules.allow_host_ipc,
            "security.hostIpc",
            "Host IPC namespace access is not allowed",
        ),
    ];
    for (requested, allowed, rule, message) in flags {
        if requested && !allowed {
            violations.push(PolicyViolation::new(rule, Severity::Critical, message));
        }
    }

    // Only an explicit opt-out violates; an unset field does not.
    if rules.read_only_root && request.read_only_root == Some(false) {
        violations.push(
            PolicyViolation::new(
                "security.readOnlyRoot",
                Severity::High,
                "Policy requires a read-only root filesystem",
            )
            .with_field("readOnlyRoot")
            .with_actual("false")
            .with_expected("true"),
        );
    }

    let undeclared: Vec<&str> = request
        .capabilities
        .add
        .iter()
        .filter(|cap| !rules.add_capabilities.contains(*cap))
        .map(String::as_str)
        .collect();
    if !undeclared.is_empty() {
        violations.push(
            PolicyViolation::new(
                "security.addCapabilities",
                Severity::High,
                format!(
                    "Capabilities not permitted by policy: {}",
                    undeclared.join(", ")
                ),
            )
            .with_field("capabilities.add")
            .with_actual(undeclared.join(", "))
            .with_expected(rules.add_capabilities.join(", ")),
        );
    }
}

fn check_resources(
    policy: &Policy,
    request: &ContainerRequest,
    violations: &mut Vec<PolicyViolation>,
) {
    if request.memory_mb > policy.resources.max_memory_mb {
        violations.push(
            PolicyViolation::new(
                "resources.maxMemoryMb",
                Severity::High,
                format!(
                    "Requested memory {} MB exceeds limit {} MB",
                    request.memory_mb, policy.resources.max_memory_mb
                ),
            )
            .with_field("memoryMb")
            .with_actual(request.memory_mb.to_string())
            .with_expected(policy.resources.max_memory_mb.to_string()),
        );
    }
    if request.cpu_cores > policy.resources.max_cpu_cores {
        violations.push(
            PolicyViolation::new(
                "resources.maxCpuCores",
                Severity::High,
                format!(
                    "Requested {} CPU cores exceeds limit {}",
                    request.cpu_cores, policy.resources.max_cpu_cores
                ),
            )
            .with_field("cpuCores")
            .with_actual(request.cpu_cores.to_string())
            .with_expected(policy.resources.max_cpu_cores.to_string()),
        );
    }
}

fn check_network(
    policy: &Policy,
    request: &ContainerRequest,
    violations: &mut Vec<PolicyViolation>,
) {
    let Some(network) = &policy.network else {
        return;
    };
    let Some(denied_ports) = &network.denied_ports else {
        return;
    };
    let offending: Vec<String> = request
        .ports
        .iter()
        .filter(|port| denied_ports.contains(*port))
        .map(ToString::to_string)
        .collect();
    if !offending.is_empty() {
        violations.push(
            PolicyViolation::new(
                "network.deniedPorts",
                Severity::High,
                format!("Ports denied by policy: {}", offending.join(", ")),
            )
            .with_field("ports")
            .with_actual(offending.join(", ")),
        );
    }
}

fn check_verification(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    now: DateTime<Utc>,
    violations: &mut Vec<PolicyViolation>,
) {
    check_signature_algorithm(rules, attestation, violations);
    check_transparency_logs(rules, attestation, violations);
    check_sbom(rules, attestation, violations);
    check_provenance_level(rules, attestation, violations);
    check_signature_age(rules, attestation, now, violations);
    check_key_trust(rules, attestation, violations);
    check_key_ids(rules, attestation, violations);
    check_predicates(rules, attestation, violations);
}

fn check_signature_algorithm(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    if rules.signature_algorithms.is_empty() {
        return;
    }
    let expected = rules
        .signature_algorithms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match attestation.and_then(|a| a.signature_algorithm) {
        None => violations.push(
            PolicyViolation::new(
                "verification.signatureAlgorithms",
                Severity::Critical,
                "Signature algorithm required but not provided",
            )
            .with_field("signatureAlgorithm")
            .with_expected(expected),
        ),
        Some(algorithm) if !rules.signature_algorithms.contains(&algorithm) => violations.push(
            PolicyViolation::new(
                "verification.signatureAlgorithms",
                Severity::Critical,
                format!("Signature algorithm '{algorithm}' is not allowed"),
            )
            .with_field("signatureAlgorithm")
            .with_actual(algorithm.to_string())
            .with_expected(expected),
        ),
        Some(_) => {}
    }
}

fn check_transparency_logs(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    let required = &rules.transparency_logs.required;
    if required.is_empty() {
        return;
    }
    let quorum = rules.transparency_logs.quorum.unwrap_or(required.len());
    let expected = format!(
        "{} of [{}]",
        quorum,
        required
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let entries = attestation.and_then(|a| a.transparency_log_entries.as_deref());
    let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        violations.push(
            PolicyViolation::new(
                "verification.transparencyLogs",
                Severity::Critical,
                "Transparency log entries required but not provided",
            )
            .with_field("transparencyLogEntries")
            .with_expected(expected),
        );
        return;
    };

    // A log counts once toward the quorum no matter how many entries it has.
    let matching: Vec<String> = required
        .iter()
        .filter(|log| entries.iter().any(|entry| entry.log == **log))
        .map(ToString::to_string)
        .collect();
    if matching.len() < quorum {
        let mut present: Vec<String> = Vec::new();
        for entry in entries {
            let name = entry.log.to_string();
            if !present.contains(&name) {
                present.push(name);
            }
        }
        violations.push(
            PolicyViolation::new(
                "verification.transparencyLogs",
                Severity::Critical,
                format!(
                    "Transparency log quorum not met: {} of {} required logs present",
                    matching.len(),
                    quorum
                ),
            )
            .with_field("transparencyLogEntries")
            .with_actual(present.join(", "))
            .with_expected(expected),
        );
    }
}

fn check_sbom(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    let has_sbom = attestation.and_then(|a| a.has_sbom).unwrap_or(false);
    if rules.sbom_required && !has_sbom {
        violations.push(
            PolicyViolation::new(
                "verification.sbomRequired",
                Severity::High,
                "SBOM required but not provided",
            )
            .with_field("hasSbom"),
        );
    }
    if has_sbom && !rules.sbom_formats.is_empty() {
        let expected = rules
            .sbom_formats
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let format = attestation.and_then(|a| a.sbom_format);
        if format.is_none_or(|f| !rules.sbom_formats.contains(&f)) {
            let actual = format.map_or_else(|| "none".to_string(), |f| f.to_string());
            violations.push(
                PolicyViolation::new(
                    "verification.sbomFormats",
                    Severity::High,
                    format!("SBOM format '{actual}' is not accepted"),
                )
                .with_field("sbomFormat")
                .with_actual(actual)
                .with_expected(expected),
            );
        }
    }
}

fn check_provenance_level(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    let Some(required) = rules.provenance_level else {
        return;
    };
    match attestation.and_then(|a| a.slsa_level) {
        None => violations.push(
            PolicyViolation::new(
                "verification.provenanceLevel",
                Severity::Critical,
                "SLSA provenance level required but not provided",
            )
            .with_field("slsaLevel")
            .with_expected(format!("{required}")),
        ),
        // A higher level always satisfies a lower requirement.
        Some(level) if level < required => violations.push(
            PolicyViolation::new(
                "verification.provenanceLevel",
                Severity::Critical,
                format!("SLSA level {level} is below required level {required}"),
            )
            .with_field("slsaLevel")
            .with_actual(level.to_string())
            .with_expected(required.to_string()),
        ),
        Some(_) => {}
    }
}

fn check_signature_age(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    now: DateTime<Utc>,
    violations: &mut Vec<PolicyViolation>,
) {
    let Some(max_age_days) = rules.max_signature_age_days else {
        return;
    };
    match attestation.and_then(|a| a.signed_at) {
        None => violations.push(
            PolicyViolation::new(
                "verification.maxSignatureAgeDays",
                Severity::High,
                "Signature timestamp required but not provided",
            )
            .with_field("signedAt"),
        ),
        Some(signed_at) => {
            // Whole days; a signature becomes stale only once a full day
            // past the limit has elapsed.
            let age_days = (now - signed_at).num_days();
            if age_days > max_age_days {
                violations.push(
                    PolicyViolation::new(
                        "verification.maxSignatureAgeDays",
                        Severity::High,
                        format!(
                            "Signature is {age_days} days old, older than limit {max_age_days}"
                        ),
                    )
                    .with_field("signedAt")
                    .with_actual(age_days.to_string())
                    .with_expected(max_age_days.to_string()),
                );
            }
        }
    }
}

fn check_key_trust(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    let Some(required) = rules.key_trust_level else {
        return;
    };
    match attestation.and_then(|a| a.key_trust_level) {
        None => violations.push(
            PolicyViolation::new(
                "verification.keyTrustLevel",
                Severity::Critical,
                "Key trust level required but not provided",
            )
            .with_field("keyTrustLevel")
            .with_expected(required.to_string()),
        ),
        Some(actual) if !actual.meets(required) => violations.push(
            PolicyViolation::new(
                "verification.keyTrustLevel",
                Severity::Critical,
                format!("Key trust level '{actual}' does not meet required '{required}'"),
            )
            .with_field("keyTrustLevel")
            .with_actual(actual.to_string())
            .with_expected(required.to_string()),
        ),
        Some(_) => {}
    }
}

fn check_key_ids(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    if rules.allowed_key_ids.is_empty() {
        return;
    }
    match attestation.and_then(|a| a.key_id.as_deref()) {
        None => violations.push(
            PolicyViolation::new(
                "verification.allowedKeyIds",
                Severity::Critical,
                "Signing key ID required but not provided",
            )
            .with_field("keyId"),
        ),
        Some(key_id) if !rules.allowed_key_ids.iter().any(|k| k == key_id) => violations.push(
            PolicyViolation::new(
                "verification.allowedKeyIds",
                Severity::Critical,
                format!("Signing key '{key_id}' is not in the allowed set"),
            )
            .with_field("keyId")
            .with_actual(key_id),
        ),
        Some(_) => {}
    }
}

fn check_predicates(
    rules: &VerificationRules,
    attestation: Option<&AttestationContext>,
    violations: &mut Vec<PolicyViolation>,
) {
    if rules.required_predicates.is_empty() {
        return;
    }
    let expected = rules.required_predicates.join(", ");
    let Some(predicates) = attestation.and_then(|a| a.predicate_types.as_deref()) else {
        violations.push(
            PolicyViolation::new(
                "verification.requiredPredicates",
                Severity::Critical,
                "Attestation predicates required but not provided",
            )
            .with_field("predicateTypes")
            .with_expected(expected),
        );
        return;
    };
    let missing: Vec<&str> = rules
        .required_predicates
        .iter()
        .filter(|required| !predicates.iter().any(|p| p == *required))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        violations.push(
            PolicyViolation::new(
                "verification.requiredPredicates",
                Severity::Critical,
                format!("Missing required predicates: {}", missing.join(", ")),
            )
            .with_field("predicateTypes")
            .with_actual(predicates.join(", "))
            .with_expected(expected),
        );
    }
}
