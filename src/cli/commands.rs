use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `svalinn` - admission policy gate for the vordr container runtime.
#[derive(Parser, Debug)]
#[command(name = "svalinn")]
#[command(version = "0.1.0")]
#[command(about = "Policy-based admission control for container workloads.", long_about = None)]
pub struct Cli {
    /// Path to a svalinn.toml config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a container admission request against a policy
    Evaluate {
        /// Name of a stored policy (default: the configured active policy)
        #[arg(long)]
        policy: Option<String>,

        /// Evaluate against a policy file instead of a stored policy
        #[arg(long, conflicts_with = "policy")]
        policy_file: Option<PathBuf>,

        /// Admission request document (JSON)
        #[arg(long)]
        request: PathBuf,
    },

    /// Verify a signed attestation bundle against a gatekeeper policy
    Verify {
        /// Gatekeeper policy document (JSON)
        #[arg(long)]
        policy: PathBuf,

        /// Attestation bundle document (JSON)
        #[arg(long)]
        bundle: PathBuf,

        /// Expected artifact digest (sha256:<64 hex>); attestation subjects
        /// naming a different digest reject the bundle
        #[arg(long)]
        image_digest: Option<String>,
    },

    /// Inspect and validate stored policies
    Policy {
        #[command(subcommand)]
        policy_command: PolicyCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// List available policies
    List,

    /// Print a policy as JSON
    Show { name: String },

    /// Structurally validate a policy file
    Validate { path: PathBuf },
}
