pub mod commands;

pub use commands::{Cli, Commands, PolicyCommands};

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use tracing::info;

use svalinn::policy::{
    self, EvaluationResult, Policy, PolicyResult, PolicyStore, evaluate, evaluate_bundle,
};
use svalinn::{GateConfig, Result};

/// Dispatch a parsed command line. Deny verdicts are not errors; they map to
/// a failure exit code with the decision printed, mirroring an HTTP 403 at
/// the gateway.
pub fn run(cli: &Cli, config: &GateConfig) -> Result<ExitCode> {
    match &cli.command {
        Commands::Evaluate {
            policy,
            policy_file,
            request,
        } => run_evaluate(
            cli,
            config,
            policy.as_deref(),
            policy_file.as_deref(),
            request,
        ),
        Commands::Verify {
            policy,
            bundle,
            image_digest,
        } => run_verify(cli, policy, bundle, image_digest.as_deref()),
        Commands::Policy { policy_command } => run_policy(cli, config, policy_command),
    }
}

fn open_store(config: &GateConfig) -> Result<PolicyStore> {
    Ok(match &config.policy_dir {
        Some(dir) => PolicyStore::open(dir)?,
        None => PolicyStore::with_defaults(),
    })
}

fn run_evaluate(
    cli: &Cli,
    config: &GateConfig,
    policy_name: Option<&str>,
    policy_file: Option<&Path>,
    request_path: &Path,
) -> Result<ExitCode> {
    let request = policy::load_request(request_path)?;
    let policy: Policy = match policy_file {
        Some(path) => policy::load_policy(path)?,
        None => {
            let store = open_store(config)?;
            let name = policy_name.unwrap_or(&config.active_policy);
            store.get(name)?.clone()
        }
    };

    let result = evaluate(&policy, &request);
    print_policy_result(cli, &result)?;
    Ok(exit_code(result.allowed))
}

fn run_verify(
    cli: &Cli,
    policy_path: &Path,
    bundle_path: &Path,
    image_digest: Option<&str>,
) -> Result<ExitCode> {
    let policy = policy::load_gatekeeper_policy(policy_path)?;
    let bundle = policy::load_bundle(bundle_path, image_digest)?;
    let result = evaluate_bundle(&policy, &bundle.attestations);
    print_evaluation_result(cli, &result)?;
    Ok(exit_code(result.allowed))
}

fn run_policy(cli: &Cli, config: &GateConfig, command: &PolicyCommands) -> Result<ExitCode> {
    match command {
        PolicyCommands::List => {
            let store = open_store(config)?;
            for name in store.names() {
                println!("{name}");
            }
        }
        PolicyCommands::Show { name } => {
            let store = open_store(config)?;
            let policy = store.get(name)?;
            println!("{}", to_pretty_json(policy)?);
        }
        PolicyCommands::Validate { path } => {
            let policy = policy::load_policy(path)?;
            info!(policy = %policy.name, "policy is structurally valid");
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"ok": true, "policy": policy.name})
                );
            } else {
                println!("ok: {}", policy.name);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_policy_result(cli: &Cli, result: &PolicyResult) -> Result<()> {
    if cli.json {
        println!("{}", to_pretty_json(result)?);
        return Ok(());
    }
    if result.allowed {
        println!("allowed by policy '{}'", result.applied_policy);
    } else {
        println!("denied by policy '{}'", result.applied_policy);
    }
    for violation in &result.violations {
        println!(
            "  [{}] {}: {}",
            violation.severity, violation.rule, violation.message
        );
    }
    Ok(())
}

fn print_evaluation_result(cli: &Cli, result: &EvaluationResult) -> Result<()> {
    if cli.json {
        let payload = serde_json::json!({"ok": result.allowed, "report": result});
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("serializing report")?
        );
        return Ok(());
    }
    if result.allowed {
        println!("ok");
    } else {
        println!("denied");
    }
    for violation in &result.violations {
        println!("  {violation}");
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value).context("serializing output")?)
}

fn exit_code(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Format a load/validation failure the way the gateway surfaces errors:
/// a JSON envelope with a stable error id, or plain text on stderr.
pub fn report_error(json: bool, err: &svalinn::GateError) {
    if json {
        let payload = serde_json::json!({
            "ok": false,
            "error": {"id": err.error_id(), "message": err.to_string()},
        });
        println!("{payload:#}");
    } else {
        eprintln!("{err}");
    }
}
