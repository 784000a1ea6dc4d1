//! Tribunal CLI.
//!
//! Usage:
//!   tribunal evaluate --file answer.txt --context-file notes.txt --profile strict
//!   tribunal batch submissions.jsonl --json
//!   tribunal status
//!   tribunal policy validate my_policy.yaml
//!   tribunal --offline evaluate --text "..."

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{BufRead, Read};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, PolicyAction};
use tribunal_core::policy::{policy_schema, validate_policy_schema};
use tribunal_core::{FinalEvaluation, GradingPolicy};
use tribunal_runtime::{Engine, RuntimeConfig, Submission};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match &cli.command {
        Commands::Evaluate {
            text,
            file,
            context_file,
            profile,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => read_input(path)?,
                (None, None) => bail!("either --text or --file is required"),
            };
            let context = context_file
                .as_deref()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read context file {}", path.display()))
                })
                .transpose()?;

            let engine = build_engine(&cli)?;
            let result = engine
                .evaluate(&text, context.as_deref(), profile.as_deref())
                .await
                .context("Evaluation failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_evaluation(&result);
            }
        }

        Commands::Batch { input } => {
            let submissions = read_submissions(input)?;
            tracing::info!(count = submissions.len(), "Loaded batch");

            let engine = build_engine(&cli)?;
            let results = engine.evaluate_batch(submissions).await;

            let mut failures = 0usize;
            for (line, result) in results.iter().enumerate() {
                match result {
                    Ok(evaluation) if cli.json => {
                        println!("{}", serde_json::to_string(evaluation)?);
                    }
                    Ok(evaluation) => {
                        println!(
                            "#{:<4} {:>5.1}  {}  {:?}",
                            line + 1,
                            evaluation.final_grade,
                            evaluation.letter_grade,
                            evaluation.consensus_method
                        );
                    }
                    Err(e) => {
                        failures += 1;
                        if cli.json {
                            println!("{}", serde_json::json!({ "error": e.to_string() }));
                        } else {
                            println!("#{:<4} error: {}", line + 1, e);
                        }
                    }
                }
            }

            if failures > 0 {
                bail!("{} of {} submissions failed", failures, results.len());
            }
        }

        Commands::Status => {
            let engine = build_engine(&cli)?;
            let status = engine.status().await;
            let health = engine.health_check().await;

            if cli.json {
                let output = serde_json::json!({
                    "status": status,
                    "health": health,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Evaluators:");
                for agent in &status.evaluators {
                    let preferred = agent
                        .preferred_provider
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {:<24} {:<20} prefers {:<16} backend {:?}",
                        agent.name, agent.label, preferred, agent.backend
                    );
                }

                println!("Providers:");
                for circuit in &status.circuits {
                    let backend = status
                        .backends
                        .get(&circuit.provider)
                        .map(String::as_str)
                        .unwrap_or("(not configured)");
                    let healthy = match health.get(&circuit.provider) {
                        Some(true) => "healthy",
                        Some(false) => "unhealthy",
                        None => "-",
                    };
                    println!(
                        "  {:<16} {:<18} {:<10} circuit {:?} ({}/{})",
                        circuit.provider.to_string(),
                        backend,
                        healthy,
                        circuit.state,
                        circuit.failure_count,
                        circuit.threshold
                    );
                }
            }
        }

        Commands::Policy { action } => match action {
            PolicyAction::Validate { file } => validate_policy_file(file, cli.json)?,
            PolicyAction::Show { schema } => {
                if *schema {
                    println!("{}", policy_schema());
                } else {
                    let config = load_config(&cli)?;
                    let policy = load_policy(&cli, &config)?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&policy)?);
                    } else {
                        print!("{}", serde_yaml::to_string(&policy)?);
                    }
                }
            }
        },
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    if cli.offline {
        config.providers = RuntimeConfig::offline().providers;
    } else if config.providers.is_empty() {
        tracing::warn!("No providers configured; only the integrity seat will vote. Use --offline or --config.");
    }

    Ok(config)
}

/// `--policy` first, then the config's `policy_path`, then the built-in policy.
fn load_policy(cli: &Cli, config: &RuntimeConfig) -> Result<GradingPolicy> {
    match cli.policy.as_ref().or(config.policy_path.as_ref()) {
        Some(path) => GradingPolicy::from_file(path)
            .with_context(|| format!("Failed to load policy {}", path.display())),
        None => GradingPolicy::builtin().context("Built-in policy is invalid"),
    }
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let config = load_config(cli)?;
    let policy = load_policy(cli, &config)?;
    Engine::from_config(&config, policy).context("Failed to build engine")
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_submissions(path: &Path) -> Result<Vec<Submission>> {
    let content = read_input(path)?;
    parse_submissions(content.as_bytes())
}

/// One JSON object per line; blank lines are skipped.
fn parse_submissions(reader: impl BufRead) -> Result<Vec<Submission>> {
    let mut submissions = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let submission: Submission = serde_json::from_str(&line)
            .with_context(|| format!("Invalid submission on line {}", index + 1))?;
        submissions.push(submission);
    }
    Ok(submissions)
}

fn validate_policy_file(path: &Path, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).context("Policy is not valid JSON")?,
        _ => serde_yaml::from_str(&content).context("Policy is not valid YAML")?,
    };

    let errors = match validate_policy_schema(&value) {
        Err(errors) => errors,
        Ok(()) => match GradingPolicy::from_file(path) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_string()],
        },
    };

    if json {
        let output = serde_json::json!({
            "file": path.display().to_string(),
            "valid": errors.is_empty(),
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if errors.is_empty() {
        println!("{}: valid", path.display());
    } else {
        println!("{}: invalid", path.display());
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !errors.is_empty() {
        bail!("{} policy error(s)", errors.len());
    }
    Ok(())
}

fn print_evaluation(result: &FinalEvaluation) {
    println!(
        "Grade: {:.1} ({}){}",
        result.final_grade,
        result.letter_grade,
        if result.passed { "" } else { "  NOT PASSED" }
    );
    println!("Profile: {}  Method: {:?}", result.profile_id, result.consensus_method);
    if result.integrity_flag {
        println!("Integrity flag raised");
    }
    if result.automated_content_flag {
        println!("Automated content suspected");
    }
    println!();

    for vote in &result.votes {
        println!(
            "  {:<24} {:>5.1}  conf {:.2}  {}ms",
            vote.evaluator_name,
            vote.score,
            vote.confidence,
            vote.latency.as_millis()
        );
    }
    if !result.low_confidence_roles.is_empty() {
        let roles: Vec<String> = result.low_confidence_roles.iter().map(|r| r.to_string()).collect();
        println!("  low confidence: {}", roles.join(", "));
    }

    println!();
    println!("{}", result.feedback);
}
