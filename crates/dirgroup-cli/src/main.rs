//! Dirgroup - directory-backed group membership resolution
//!
//! Operator CLI over the LDAP membership resolver.

mod commands;

use clap::{Parser, Subcommand};
use commands::CommandContext;
use dirgroup_core::config::DirgroupConfig;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirgroup")]
#[command(author = "Dirgroup Team")]
#[command(version = dirgroup_core::VERSION)]
#[command(about = "Directory-backed group membership resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRGROUP_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRGROUP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a user is a direct or nested member of a group
    IsMember {
        /// User distinguished name
        user: String,
        /// Group distinguished name
        group: String,
    },

    /// List groups, optionally filtered by a name pattern (`Eng%`) or filter
    ListGroups {
        pattern: Option<String>,
    },

    /// List the groups a user belongs to, looked up by naming attribute
    UserGroups {
        name: String,
    },

    /// Flatten groups into their member principals
    Members {
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Check whether a name lies under a configured group location
    Supported {
        dn: String,
    },

    /// Query the directory server's root DSE
    Probe,

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("dirgroup {}", dirgroup_core::VERSION);
        return Ok(());
    }

    let config = if let Some(config_path) = &cli.config {
        DirgroupConfig::from_file(config_path)?
    } else {
        DirgroupConfig::from_env()
    };

    init_logging(&config, cli.log_level.as_deref());
    debug!(
        "Using directory {} ({} group locations)",
        config.directory.server_url,
        config.groups.locations.len()
    );

    let ctx = CommandContext::new(config, cli.json);

    match cli.command {
        Commands::IsMember { user, group } => commands::membership::is_member(&ctx, &user, &group),
        Commands::ListGroups { pattern } => commands::groups::list(&ctx, pattern.as_deref()),
        Commands::UserGroups { name } => commands::groups::user_groups(&ctx, &name),
        Commands::Members { groups } => commands::membership::members(&ctx, groups),
        Commands::Supported { dn } => commands::membership::supported(&ctx, &dn),
        Commands::Probe => commands::probe::execute(&ctx),
        Commands::Version => Ok(()),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`, which
/// wins over the configured level. Logs go to stderr so stdout stays
/// parseable.
fn init_logging(config: &DirgroupConfig, log_level: Option<&str>) {
    let level = log_level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
