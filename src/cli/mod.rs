//! CLI routing and command dispatch.

use crate::constants;
use crate::core::audit_log::{self, AuditContext, AuditResult};
use crate::core::config::{self, ConnectionOverrides};
use crate::core::outcome::Outcome;
use crate::core::paths::StatePaths;
use crate::models::config::ConfigFile;
use crate::remote::netbox::{ConnectOptions, NetboxClient};
use crate::util::journald;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub mod audit;
pub mod doctor;
pub mod plan;
pub mod report;
pub mod secret;

use report::OutputFormat;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: StatePaths,
    pub config_path: PathBuf,
    pub config: ConfigFile,
    pub config_load_warning: Option<String>,
    pub overrides: ConnectionOverrides,
    pub format: OutputFormat,
    pub non_interactive: bool,
}

impl CliContext {
    /// Connection settings after merging flags and environment over the config file.
    pub fn connect_options(&self) -> Result<ConnectOptions> {
        config::connect_options(&self.overrides, &self.config.connection)
    }

    pub fn connect(&self) -> Result<NetboxClient> {
        let opts = self.connect_options()?;
        Ok(NetboxClient::connect(&opts)?)
    }

    /// Record a mutating invocation. Failures to write the log only warn.
    pub fn audit(&self, ctx: &AuditContext, result: &Result<Outcome>) {
        if !self.config.policy.audit {
            return;
        }

        let (actions, status) = match result {
            Ok(outcome) => (
                outcome.actions.iter().map(ToString::to_string).collect::<Vec<_>>(),
                AuditResult {
                    success: true,
                    error: None,
                },
            ),
            Err(e) => (
                Vec::new(),
                AuditResult {
                    success: false,
                    error: Some(format!("{:#}", e)),
                },
            ),
        };

        let line = match audit_log::record(&self.paths, ctx, &actions, status) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "audit log failed");
                return;
            }
        };

        if self.config.policy.journald_audit {
            journald::forward_line(constants::APP_NAME, &line);
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "netbox-secret", version, about = "Reconcile NetBox device secrets to a desired state")]
pub struct Cli {
    /// State directory (config, audit log)
    #[arg(long, global = true, value_name = "PATH", env = "NETBOX_SECRET_HOME")]
    pub state_dir: Option<PathBuf>,

    /// Config file (default: <state-dir>/config.toml)
    #[arg(long, global = true, value_name = "PATH", env = "NETBOX_SECRET_CONFIG")]
    pub config: Option<PathBuf>,

    /// NetBox base URL
    #[arg(long, global = true, env = "NETBOX_URL")]
    pub url: Option<String>,

    /// NetBox API token
    #[arg(long, global = true, env = "NETBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// PEM private key used to obtain a session key
    #[arg(long, global = true, value_name = "PATH", env = "NETBOX_PRIVATE_KEY")]
    pub private_key: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "NETBOX_SECRET_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Log remote calls to stderr (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = StatePaths::resolve(self.state_dir)?;
        let config_path = self.config.unwrap_or_else(|| paths.config_toml.clone());

        let (config, config_load_warning) =
            match load_config(&config_path, self.command.tolerates_bad_config()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    report::emit_failure(self.format, &e)?;
                    return Err(e);
                }
            };

        let ctx = CliContext {
            paths,
            config_path,
            config,
            config_load_warning,
            overrides: ConnectionOverrides {
                url: self.url,
                token: self.token,
                private_key: self.private_key,
            },
            format: self.format,
            non_interactive: self.non_interactive,
        };

        match self.command {
            Commands::Present(args) => secret::run_present(&ctx, args),
            Commands::Absent(args) => secret::run_absent(&ctx, args),
            Commands::Show(args) => secret::run_show(&ctx, args),
            Commands::Plan { command } => plan::run(&ctx, command),
            Commands::Audit { command } => audit::run(&ctx, command),
            Commands::Doctor => doctor::run(&ctx),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure a secret exists with the given payload (creates the role if needed)
    Present(secret::PresentArgs),
    /// Ensure a secret does not exist
    Absent(secret::AbsentArgs),
    /// List secrets matching the given filters
    Show(secret::ShowArgs),
    /// Dry-run preview of present/absent
    Plan {
        #[command(subcommand)]
        command: plan::PlanCommand,
    },
    /// View or verify the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
    /// Diagnose configuration and connectivity (safe, read-only)
    Doctor,
}

impl Commands {
    /// Read-only diagnostics may run on defaults when the config file is broken.
    pub fn tolerates_bad_config(&self) -> bool {
        matches!(self, Commands::Doctor | Commands::Audit { .. })
    }
}

/// Load the config file. A load failure is fatal unless `lenient`, in which
/// case defaults are used and the failure is returned as a warning.
pub fn load_config(path: &Path, lenient: bool) -> Result<(ConfigFile, Option<String>)> {
    match config::load(path) {
        Ok(config) => Ok((config, None)),
        Err(e) if lenient => {
            let warning = format!("{:#}", e);
            tracing::warn!(config = %path.display(), "{}", warning);
            Ok((ConfigFile::default(), Some(warning)))
        }
        Err(e) => Err(e),
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let default = if verbose == 0 { "warn" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
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
    fn test_parse_present_with_globals() {
        let cli = Cli::try_parse_from([
            "netbox-secret",
            "--url",
            "https://netbox.example.com",
            "--format",
            "text",
            "present",
            "--device",
            "router1",
            "--name",
            "admin-pw",
            "--role",
            "ops",
            "--generate",
            "24",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.url.as_deref(), Some("https://netbox.example.com"));
        match cli.command {
            Commands::Present(args) => {
                assert_eq!(args.key.device.as_deref(), Some("router1"));
                assert_eq!(args.payload.generate, Some(24));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_plan_absent() {
        let cli = Cli::try_parse_from([
            "netbox-secret",
            "plan",
            "absent",
            "--device",
            "router1",
            "--name",
            "admin-pw",
            "--role",
            "ops",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plan {
                command: plan::PlanCommand::Absent(_)
            }
        ));
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["netbox-secret", "-vv", "doctor"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    const BROKEN_POLICY: &str = "[policy]\nduplicate_match = \"first\"\naudit = maybe\n";

    #[test]
    fn test_broken_config_is_fatal_for_mutating_commands() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, BROKEN_POLICY).unwrap();

        let err = load_config(&path, false).unwrap_err();
        assert!(format!("{:#}", err).contains("parse config"));
    }

    #[test]
    fn test_broken_config_falls_back_for_diagnostics() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, BROKEN_POLICY).unwrap();

        let (config, warning) = load_config(&path, true).unwrap();
        assert!(warning.is_some());
        assert!(config.policy.audit);
    }

    #[test]
    fn test_valid_config_loads_policy() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[policy]\nduplicate_match = \"first\"\naudit = false\n").unwrap();

        let (config, warning) = load_config(&path, false).unwrap();
        assert!(warning.is_none());
        assert!(!config.policy.audit);
    }

    #[test]
    fn test_only_diagnostics_tolerate_bad_config() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["netbox-secret"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap().command
        };
        assert!(parse(&["doctor"]).tolerates_bad_config());
        assert!(parse(&["audit", "verify"]).tolerates_bad_config());
        assert!(!parse(&["absent", "--device", "r", "--name", "n", "--role", "o"]).tolerates_bad_config());
        assert!(!parse(&["show", "--role", "ops"]).tolerates_bad_config());
        assert!(!parse(&["plan", "absent", "--device", "r", "--name", "n", "--role", "o"]).tolerates_bad_config());
    }
}
