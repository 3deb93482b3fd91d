//! Rollcall CLI - identity verification for attendance from the terminal.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod host;
mod platform;
mod store;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(author, version, about = "Fingerprint and face check-in for attendance", long_about = None)]
#[command(after_help = "Exit codes:
  0   Success
  1   General error
  64  Usage or configuration error
  65  Verification failed or cancelled
  66  No enrollment on this device
  69  Biometric authentication or camera unavailable
  74  Store read/write error
  75  Flow busy or session closed
  77  E-mail not authorized")]
struct Cli {
    #[command(flatten)]
    host: HostArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options describing the simulated device and page.
#[derive(clap::Args, Debug, Clone)]
pub struct HostArgs {
    /// JSON file standing in for the page's local storage
    #[arg(long, global = true, env = "ROLLCALL_STORE", default_value = ".rollcall.json")]
    pub store: PathBuf,

    /// Page origin the flow runs on
    #[arg(long, global = true, env = "ROLLCALL_ORIGIN", default_value = "http://localhost")]
    pub origin: String,

    /// Pretend the page is open in a mobile browser
    #[arg(long, global = true)]
    pub mobile: bool,

    /// Simulate a device without a fingerprint sensor
    #[arg(long, global = true)]
    pub no_sensor: bool,

    /// Skip the on-screen pauses between steps
    #[arg(long, global = true)]
    pub no_pacing: bool,

    /// Suppress decorative output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show enrollment, capability and sign-in state
    Status,

    /// Report whether fingerprint verification can be offered
    Capability,

    /// Enroll this device's fingerprint
    Enroll {
        /// Dismiss the fingerprint prompt instead of touching the sensor
        #[arg(long)]
        decline: bool,
    },

    /// Verify identity with the enrolled fingerprint
    Verify {
        /// Dismiss the fingerprint prompt instead of touching the sensor
        #[arg(long)]
        decline: bool,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify with the camera fallback (simulated face check)
    Face {
        /// Deny camera permission
        #[arg(long)]
        deny_camera: bool,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget the enrolled fingerprint
    Reset,

    /// Sign in with an authorized e-mail
    Login {
        /// E-mail address to sign in with
        #[arg(value_name = "EMAIL")]
        email: String,

        /// Roster of authorized e-mails ({"teachers": [...], "students": [...]})
        #[arg(long, env = "ROLLCALL_ROSTER")]
        roster: PathBuf,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Roster of authorized e-mails
        #[arg(long, env = "ROLLCALL_ROSTER")]
        roster: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rollcall=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let host = cli.host;
    match cli.command {
        Commands::Status => commands::status::execute(&host).await,
        Commands::Capability => commands::status::capability(&host).await,
        Commands::Enroll { decline } => commands::enroll::execute(&host, decline).await,
        Commands::Verify { decline, json } => commands::verify::execute(&host, decline, json).await,
        Commands::Face { deny_camera, json } => {
            commands::face::execute(&host, deny_camera, json).await
        }
        Commands::Reset => commands::reset::execute(&host),
        Commands::Login { email, roster } => commands::session::login(&host, &email, roster),
        Commands::Logout => commands::session::logout(&host),
        Commands::Whoami { roster } => commands::session::whoami(&host, roster),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
