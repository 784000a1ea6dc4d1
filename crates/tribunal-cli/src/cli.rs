//! Command-line definitions.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tribunal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade text with a council of evaluators and a weighted consensus", long_about = None)]
pub struct Cli {
    /// Runtime configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Grading policy file (YAML or JSON); overrides the config's policy_path
    #[arg(short, long, global = true)]
    pub policy: Option<PathBuf>,

    /// Use fixed offline responses in every provider slot
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one submission
    #[command(group(ArgGroup::new("input").required(true).args(["text", "file"])))]
    Evaluate {
        /// Submission text
        #[arg(short, long)]
        text: Option<String>,

        /// Read the submission from a file ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Reference material to check facts against
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Weighting profile or grading mode
        #[arg(long)]
        profile: Option<String>,
    },

    /// Evaluate every submission in a JSON Lines file
    ///
    /// Each line: {"text": "...", "context": "...", "profile_id": "..."}
    Batch {
        /// Input file ("-" for stdin)
        input: PathBuf,
    },

    /// Show evaluators, provider health and circuit state
    Status,

    /// Work with grading policy documents
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    /// Validate a policy document against the schema and semantic rules
    Validate {
        /// Policy file (YAML or JSON)
        file: PathBuf,
    },

    /// Print the effective policy
    Show {
        /// Print the JSON Schema instead
        #[arg(long)]
        schema: bool,
    },
}

impl Cli {
    /// Default log filter for the verbosity level. `RUST_LOG` wins when set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_evaluate_with_text_and_profile() {
        let cli = Cli::parse_from([
            "tribunal", "--offline", "evaluate", "--text", "An answer.", "--profile", "strict",
        ]);

        assert!(cli.offline);
        match cli.command {
            Commands::Evaluate { text, profile, file, .. } => {
                assert_eq!(text.as_deref(), Some("An answer."));
                assert_eq!(profile.as_deref(), Some("strict"));
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_requires_input() {
        assert!(Cli::try_parse_from(["tribunal", "evaluate"]).is_err());
        assert!(Cli::try_parse_from(["tribunal", "evaluate", "-t", "a", "-f", "b.txt"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tribunal", "status", "-vv", "--json"]);
        assert_eq!(cli.log_level(), "trace");
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_policy_subcommands() {
        let cli = Cli::parse_from(["tribunal", "policy", "validate", "custom.yaml"]);
        assert!(matches!(
            cli.command,
            Commands::Policy { action: PolicyAction::Validate { ref file } } if file == &PathBuf::from("custom.yaml")
        ));

        let cli = Cli::parse_from(["tribunal", "policy", "show", "--schema"]);
        assert!(matches!(
            cli.command,
            Commands::Policy { action: PolicyAction::Show { schema: true } }
        ));
    }
}
