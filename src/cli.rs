use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackpilot")]
#[command(version)]
#[command(about = "Plan, execute and validate component deployments", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ~/.config/stackpilot/config.toml)
    #[arg(long, global = true, env = "STACKPILOT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a deployment plan and print it
    Plan(PlanArgs),

    /// Build a deployment plan and execute it
    Apply(ApplyArgs),

    /// Check that a deployed service is reachable
    Probe(ProbeArgs),

    /// Show the detected host environment
    Env {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a URL is mapped and resolved from this environment
    Diagnose {
        /// URL to diagnose
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Inputs shared by `plan` and `apply`
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Client identifier (falls back to [defaults] client_id)
    pub client_id: Option<String>,

    /// Components to deploy (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub components: Vec<String>,

    /// Read the plan request from a JSON file ("-" for stdin)
    #[arg(long, conflicts_with_all = ["client_id", "components"])]
    pub request: Option<PathBuf>,

    /// Skip the per-component test tasks
    #[arg(long)]
    pub no_tdd: bool,

    /// Skip the integration phase
    #[arg(long)]
    pub no_integration: bool,

    /// Skip service reachability validation tasks
    #[arg(long)]
    pub no_web_validation: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Record what would run without running it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep going after a failed task
    #[arg(long)]
    pub continue_on_error: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Write the executed plan as JSON
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Service name (from [services] or built in)
    pub service: String,

    /// Candidate URL to try instead of the configured ones (repeatable)
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Keep the candidate host when following redirects
    #[arg(long)]
    pub ignore_redirects: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn components_split_on_commas() {
        let cli = Cli::parse_from(["stackpilot", "plan", "acme", "-c", "wordpress,keycloak"]);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.client_id.as_deref(), Some("acme"));
        assert_eq!(args.components, ["wordpress", "keycloak"]);
    }

    #[test]
    fn apply_flags() {
        let cli = Cli::parse_from([
            "stackpilot", "-vv", "apply", "acme", "-c", "traefik", "--dry-run", "-y",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert!(args.yes);
        assert!(!args.continue_on_error);
    }

    #[test]
    fn request_conflicts_with_positional_inputs() {
        let parsed = Cli::try_parse_from(["stackpilot", "plan", "acme", "--request", "r.json"]);
        assert!(parsed.is_err());
    }
}
