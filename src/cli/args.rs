//! CLI argument definitions using clap derive

use crate::access::{ApprovalStatus, Role};
use crate::config::UpdatePolicy;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::convert::Infallible;
use std::path::PathBuf;

/// swgate - offline cache lifecycle and update handshake for web apps
///
/// Resolves approval-gated routes, simulates the worker update handshake
/// across tabs, and checks precache manifests against a live origin.
#[derive(Parser, Debug)]
#[command(name = "swgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SWGATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a navigation path to the view a user may see
    Resolve(ResolveArgs),

    /// List the route table
    Routes(RoutesArgs),

    /// Run the update handshake across simulated tabs
    Simulate(SimulateArgs),

    /// Inspect or check the precache bucket
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Requested path (e.g. jobs/42 or /notices?x=1)
    pub path: String,

    /// User role
    #[arg(short, long, default_value = "contractor", value_parser = parse_role)]
    pub role: Role,

    /// Approval status (omit for a user without one)
    #[arg(short, long, value_parser = parse_status)]
    pub status: Option<ApprovalStatus>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the routes command
#[derive(Parser, Debug)]
pub struct RoutesArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of open tabs
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub tabs: u16,

    /// Update policy (defaults to the configured one)
    #[arg(short, long)]
    pub policy: Option<UpdatePolicy>,

    /// Make a manifest resource unreachable while the new version installs
    #[arg(long, value_name = "RESOURCE")]
    pub fail: Option<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show the bucket name, manifest and digest for the configured version
    Plan {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Precache the manifest from the configured origin
    Check {
        /// Origin to fetch from instead of the configured one
        #[arg(long)]
        origin: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

fn parse_role(s: &str) -> Result<Role, Infallible> {
    s.parse()
}

fn parse_status(s: &str) -> Result<ApprovalStatus, Infallible> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_resolve() {
        let cli = Cli::parse_from(["swgate", "resolve", "jobs", "--status", "approved"]);
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.path, "jobs");
                assert_eq!(args.role, Role::Contractor);
                assert_eq!(args.status, Some(ApprovalStatus::Approved));
                assert_eq!(args.format, OutputFormat::Table);
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn cli_resolve_accepts_unknown_values() {
        let cli = Cli::parse_from([
            "swgate", "resolve", "chat", "--role", "auditor", "--status", "frozen",
        ]);
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.role, Role::Unknown);
                assert_eq!(args.status, Some(ApprovalStatus::Unknown));
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn cli_resolve_status_optional() {
        let cli = Cli::parse_from(["swgate", "resolve", "notices"]);
        match cli.command {
            Commands::Resolve(args) => assert_eq!(args.status, None),
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::parse_from([
            "swgate",
            "simulate",
            "--tabs",
            "5",
            "--policy",
            "immediate",
            "--fail",
            "/manifest.json",
        ]);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.tabs, 5);
                assert_eq!(args.policy, Some(UpdatePolicy::Immediate));
                assert_eq!(args.fail.as_deref(), Some("/manifest.json"));
            }
            _ => panic!("expected Simulate command"),
        }
    }

    #[test]
    fn cli_rejects_zero_tabs() {
        assert!(Cli::try_parse_from(["swgate", "simulate", "--tabs", "0"]).is_err());
    }

    #[test]
    fn cli_parses_cache_check() {
        let cli = Cli::parse_from(["swgate", "cache", "check", "--timeout", "3"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Check { origin, timeout },
            }) => {
                assert_eq!(origin, None);
                assert_eq!(timeout, 3);
            }
            _ => panic!("expected Cache Check command"),
        }
    }

    #[test]
    fn cli_parses_config_init() {
        let cli = Cli::parse_from(["swgate", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force }),
            }) => assert!(force),
            _ => panic!("expected Config Init command"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from(["swgate", "-vv", "routes", "--config", "/tmp/swgate.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/swgate.toml")));
    }
}
