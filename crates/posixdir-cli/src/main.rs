//! posixdir command-line tool.
//!
//! Creates POSIX users and groups in an LDAP directory and lists existing accounts.

mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::Password;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use posixdir_core::ProvisionConfig;
use posixdir_ldap::{DirectoryClient, DirectorySession, LdapConfig};
use posixdir_provision::{generate_password, EncodedPassword, Provisioner, UserSpec};

/// Page size used when listing accounts.
const LIST_PAGE_SIZE: u32 = 10;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Provision POSIX users and groups in an LDAP directory.
#[derive(Parser, Debug)]
#[command(name = "posixdir", version, about = "Provision POSIX users and groups in LDAP")]
struct Cli {
    /// Configuration file layered over ~/.config/posixdir.yaml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a user together with its primary group.
    AddUser {
        /// Generate a random password instead of prompting for one.
        #[arg(short = 'r', long = "random-password")]
        random_password: bool,

        /// Login name.
        user_name: String,

        /// Given name.
        given_name: String,

        /// Family name.
        family_name: String,
    },

    /// Create a group.
    AddGroup {
        /// Group name.
        group_name: String,
    },

    /// List POSIX accounts under the configured root DN.
    ListUsers {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let password = match &cli.command {
        Commands::AddUser {
            random_password, ..
        } => Some(read_password(*random_password)?),
        _ => None,
    };

    let config = config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let mut session = connect(&config).await?;

    let result = match cli.command {
        Commands::AddUser {
            user_name,
            given_name,
            family_name,
            ..
        } => {
            let (plaintext, generated) = password.context("password not read")?;
            let spec = UserSpec {
                user_name,
                given_name,
                family_name,
                password: EncodedPassword::ssha(&plaintext),
            };
            cmd_add_user(&mut session, &config, &spec, generated.then_some(&plaintext)).await
        }
        Commands::AddGroup { group_name } => {
            cmd_add_group(&mut session, &config, &group_name).await
        }
        Commands::ListUsers { json } => cmd_list_users(&mut session, &config, json).await,
    };

    if let Err(err) = session.unbind().await {
        warn!(error = %err, "failed to unbind from directory");
    }
    result
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn connect(config: &ProvisionConfig) -> Result<DirectorySession> {
    let ldap = LdapConfig::from_provision(config).context("invalid directory settings")?;
    let client = DirectoryClient::new(ldap);
    client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.ldap_uri))
}

/// Returns the plaintext password and whether it was generated.
fn read_password(random: bool) -> Result<(SecretString, bool)> {
    if random {
        return Ok((generate_password(), true));
    }

    let first = Password::new()
        .with_prompt("Password")
        .interact()
        .context("failed to read password")?;
    let second = Password::new()
        .with_prompt("Repeat password")
        .interact()
        .context("failed to read password")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok((SecretString::from(first), false))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_add_user(
    session: &mut DirectorySession,
    config: &ProvisionConfig,
    spec: &UserSpec,
    generated: Option<&SecretString>,
) -> Result<()> {
    let mut provisioner = Provisioner::from_config(session, config)?;
    match provisioner.create_user(spec).await {
        Ok(created) => {
            println!("Created user {} (uid/gid {})", created.name, created.id);
            println!("  user:  {}", created.user_dn);
            println!("  group: {}", created.group_dn);
            if let Some(password) = generated {
                println!("  password: {}", password.expose_secret());
            }
            Ok(())
        }
        Err(err) => {
            if let Some(group) = provisioner.orphaned_group() {
                eprintln!("Warning: group {group} was created but the account was not");
            }
            Err(err).with_context(|| format!("failed to create user `{}`", spec.user_name))
        }
    }
}

async fn cmd_add_group(
    session: &mut DirectorySession,
    config: &ProvisionConfig,
    group_name: &str,
) -> Result<()> {
    let created = Provisioner::from_config(session, config)?
        .create_group(group_name, None)
        .await
        .with_context(|| format!("failed to create group `{group_name}`"))?;
    println!("Created group {} (gid {})", created.name, created.gid);
    println!("  group: {}", created.dn);
    Ok(())
}

async fn cmd_list_users(
    session: &mut DirectorySession,
    config: &ProvisionConfig,
    json: bool,
) -> Result<()> {
    let accounts = session
        .list_accounts(&config.ldap_root_dn, LIST_PAGE_SIZE)
        .await
        .context("failed to list accounts")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
    } else {
        print!("{}", output::render_accounts(&accounts));
    }
    Ok(())
}
