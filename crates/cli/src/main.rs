//! Clinic Portal CLI - exercise the portal core against YAML fixtures.
//!
//! # Usage
//!
//! ```bash
//! # Admin dashboard counts and revenue
//! portal-cli -f clinic.yaml snapshot -e admin@clinic.test -p secret1
//!
//! # A user's bookings, split into upcoming and past
//! portal-cli -f clinic.yaml bookings list -e mia@clinic.test -p secret1
//!
//! # Cancel a booking
//! portal-cli -f clinic.yaml bookings cancel -e mia@clinic.test -p secret1 bk-1
//!
//! # What an admin-only view does for a signed-out visitor
//! portal-cli -f clinic.yaml guard --role admin
//!
//! # Register a new account
//! portal-cli -f clinic.yaml register -e new@clinic.test -p secret1 -n "New Patient"
//! ```
//!
//! # Commands
//!
//! - `snapshot` - Reporting snapshot (admin only)
//! - `bookings list` / `bookings cancel` - Booking lifecycle
//! - `guard` - Route admission decision
//! - `register` - Account registration

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_portal::{Portal, PortalConfig};
use clinic_portal_core::{BookingId, Role};

mod commands;
mod fixture;

use commands::Credentials;
use fixture::Fixture;

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(author, version, about = "Clinic Portal CLI tools")]
struct Cli {
    /// Fixture file with accounts, bookings and content
    #[arg(short, long, global = true, default_value = "fixture.yaml")]
    fixture: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the admin reporting snapshot
    Snapshot {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Manage a user's bookings
    Bookings {
        #[command(subcommand)]
        action: BookingAction,
    },
    /// Evaluate a route guard
    Guard {
        /// Role the view requires (`user` or `admin`); omit for any signed-in identity
        #[arg(short, long)]
        role: Option<Role>,

        /// Sign in as this account first
        #[arg(short, long, requires = "password")]
        email: Option<String>,

        /// Password for `--email`
        #[arg(short, long, requires = "email")]
        password: Option<String>,
    },
    /// Register a new account
    Register {
        #[command(flatten)]
        credentials: Credentials,

        /// Display name
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum BookingAction {
    /// List bookings as upcoming and past
    List {
        #[command(flatten)]
        credentials: Credentials,

        /// Classify at this instant instead of now (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Cancel a booking
    Cancel {
        #[command(flatten)]
        credentials: Credentials,

        /// Booking ID
        id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &PortalConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.sentry_environment.clone().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter` and Sentry integration.
///
/// Logs go to stderr so stdout carries only command output.
fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clinic_portal=info,portal_cli=info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.log_json);
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(cli.log_json);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: PortalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let world = Fixture::load(&cli.fixture).await?.into_world()?;
    tracing::debug!(fixture = %cli.fixture.display(), "Fixture loaded");
    if let Some((endpoint, _)) = config.provider.remote() {
        tracing::warn!(%endpoint, "Remote identity provider configured; portal-cli uses fixture accounts");
    }

    let portal = Portal::start(config, world.provider.clone(), world.store.clone());

    let result = match cli.command {
        Commands::Snapshot { credentials } => commands::snapshot::run(&portal, &credentials).await,
        Commands::Bookings { action } => match action {
            BookingAction::List { credentials, at } => {
                commands::bookings::list(&portal, &credentials, at).await
            }
            BookingAction::Cancel { credentials, id } => {
                commands::bookings::cancel(&portal, &credentials, &BookingId::new(id)).await
            }
        },
        Commands::Guard {
            role,
            email,
            password,
        } => {
            let credentials = email
                .zip(password)
                .map(|(email, password)| Credentials { email, password });
            commands::guard::check(&portal, credentials.as_ref(), role).await
        }
        Commands::Register { credentials, name } => {
            commands::register::run(
                &portal,
                &world,
                &credentials.email,
                &credentials.password,
                &name,
            )
            .await
        }
    };

    portal.shutdown();
    result
}
