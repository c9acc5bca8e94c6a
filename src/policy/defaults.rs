//! Built-in admission policies.
//!
//! These are fixtures, not engine logic, but their thresholds are part of
//! the gate's contract: `strict` for production admission, `standard` for
//! everyday workloads, `permissive` for development only.

use super::model::{
    ImageRules, NetworkRules, Policy, RegistryRules, ResourceRules, SbomFormat, SecurityRules,
    SignatureAlgorithm, TransparencyLog, TransparencyLogRules, VerificationRules,
};
use super::trust::KeyTrustLevel;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Deny-by-default production policy: pinned registries, no mutable or
/// development tags, locked-down sandbox, full supply-chain attestation.
pub fn strict() -> Policy {
    Policy {
        name: "strict".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Production admission: pinned registries and full attestation".into()),
        registries: RegistryRules {
            allow: strings(&["registry.internal", "ghcr.io"]),
            deny: vec![],
            require_signature: true,
            allowed_signers: None,
        },
        images: ImageRules {
            allow_patterns: vec![],
            deny_patterns: strings(&["*:latest", "*:dev*", "*:test*"]),
            require_sbom: true,
            max_age_days: Some(180),
            vulnerability_ceilings: None,
        },
        resources: ResourceRules {
            max_memory_mb: 4096,
            max_cpu_cores: 2.0,
            max_containers: Some(10),
            max_storage_gb: Some(20),
        },
        security: SecurityRules {
            allow_privileged: false,
            allow_host_network: false,
            allow_host_pid: false,
            allow_host_ipc: false,
            read_only_root: true,
            drop_capabilities: strings(&["ALL"]),
            add_capabilities: vec![],
            seccomp_profile: Some("runtime/default".to_string()),
            apparmor_profile: None,
        },
        network: Some(NetworkRules {
            allow_egress: false,
            allow_ingress: true,
            allowed_ports: None,
            denied_ports: Some(vec![22, 2375, 2376]),
            allowed_hosts: None,
            denied_hosts: None,
        }),
        verification: Some(VerificationRules {
            signature_algorithms: vec![SignatureAlgorithm::Ed25519, SignatureAlgorithm::MlDsa87],
            transparency_logs: TransparencyLogRules {
                required: vec![TransparencyLog::Rekor, TransparencyLog::Sigstore],
                quorum: Some(1),
            },
            sbom_required: true,
            sbom_formats: vec![SbomFormat::Spdx, SbomFormat::CycloneDx],
            provenance_level: Some(3),
            max_signature_age_days: Some(90),
            key_trust_level: Some(KeyTrustLevel::TrustedKeyring),
            allowed_key_ids: vec![],
            required_predicates: strings(&[
                "https://slsa.dev/provenance/v1",
                "https://spdx.dev/Document",
            ]),
        }),
    }
}

/// Everyday workload policy: open registries apart from a deny list, looser
/// resources, SLSA-2 with organization-level key trust.
pub fn standard() -> Policy {
    Policy {
        name: "standard".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Default admission for everyday workloads".into()),
        registries: RegistryRules {
            allow: vec![],
            deny: strings(&["*.untrusted.example"]),
            require_signature: false,
            allowed_signers: None,
        },
        images: ImageRules {
            allow_patterns: vec![],
            deny_patterns: vec![],
            require_sbom: false,
            max_age_days: None,
            vulnerability_ceilings: None,
        },
        resources: ResourceRules {
            max_memory_mb: 8192,
            max_cpu_cores: 4.0,
            max_containers: Some(25),
            max_storage_gb: Some(100),
        },
        security: SecurityRules {
            allow_privileged: false,
            allow_host_network: false,
            allow_host_pid: false,
            allow_host_ipc: false,
            read_only_root: false,
            drop_capabilities: strings(&["ALL"]),
            add_capabilities: strings(&["CHOWN", "NET_BIND_SERVICE", "SETUID", "SETGID"]),
            seccomp_profile: Some("runtime/default".to_string()),
            apparmor_profile: None,
        },
        network: Some(NetworkRules {
            allow_egress: true,
            allow_ingress: true,
            allowed_ports: None,
            denied_ports: Some(vec![2375, 2376]),
            allowed_hosts: None,
            denied_hosts: None,
        }),
        verification: Some(VerificationRules {
            signature_algorithms: vec![
                SignatureAlgorithm::Ed25519,
                SignatureAlgorithm::EcdsaP256,
                SignatureAlgorithm::RsaPss,
                SignatureAlgorithm::MlDsa87,
            ],
            transparency_logs: TransparencyLogRules {
                required: vec![TransparencyLog::Rekor],
                quorum: Some(1),
            },
            sbom_required: false,
            sbom_formats: vec![],
            provenance_level: Some(2),
            max_signature_age_days: Some(365),
            key_trust_level: Some(KeyTrustLevel::Organization),
            allowed_key_ids: vec![],
            required_predicates: vec![],
        }),
    }
}

/// Development-only policy: no registry or image restrictions, privileged
/// and host-namespace access permitted, no verification block at all.
pub fn permissive() -> Policy {
    Policy {
        name: "permissive".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Development only: unrestricted admission".into()),
        registries: RegistryRules::default(),
        images: ImageRules::default(),
        resources: ResourceRules {
            max_memory_mb: 16384,
            max_cpu_cores: 8.0,
            max_containers: None,
            max_storage_gb: None,
        },
        security: SecurityRules {
            allow_privileged: true,
            allow_host_network: true,
            allow_host_pid: true,
            allow_host_ipc: true,
            read_only_root: false,
            drop_capabilities: vec![],
            add_capabilities: strings(&[
                "CHOWN",
                "NET_ADMIN",
                "NET_BIND_SERVICE",
                "SETGID",
                "SETUID",
                "SYS_ADMIN",
                "SYS_PTRACE",
            ]),
            seccomp_profile: None,
            apparmor_profile: None,
        },
        network: None,
        verification: None,
    }
}
