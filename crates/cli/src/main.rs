//! Lustre CLI - drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with totals
//! lustre cart show
//!
//! # Add two units of product 42
//! lustre cart add 42 --quantity 2
//!
//! # Check a coupon against the current cart
//! lustre coupon check GOLD10
//!
//! # Pay for the cart, shipping to address 3
//! lustre checkout --address 3 --coupon GOLD10
//! ```
//!
//! # Environment Variables
//!
//! - `LUSTRE_EMAIL` / `LUSTRE_PASSWORD` - Sign in with a password, or
//! - `LUSTRE_ACCESS_TOKEN` / `LUSTRE_REFRESH_TOKEN` - Reuse issued tokens
//! - `LUSTRE_ENV`, `LUSTRE_API_BASE_URL` - Backend selection
//! - `SENTRY_DSN` - Error reporting
//! - `RUST_LOG` - Log filter (default: `lustre_storefront=info,lustre_cli=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lustre_storefront::Storefront;
use lustre_storefront::config::StorefrontConfig;
use lustre_storefront::navigation::LoggingNavigator;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod widget;

use error::CliError;

#[derive(Parser)]
#[command(name = "lustre")]
#[command(author, version, about = "Lustre storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Evaluate coupon codes
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Manage shipping addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Place an order for the cart and pay for it
    Checkout {
        /// Shipping address id (default: the address flagged default)
        #[arg(short, long)]
        address: Option<i64>,

        /// Coupon code to apply
        #[arg(short, long)]
        coupon: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show lines and totals
    Show,
    /// Add a product
    Add {
        /// Product id
        product: i64,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity
    Set {
        /// Cart line id
        line: i64,

        /// New quantity (at least 1)
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Cart line id
        line: i64,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Evaluate a code against the current cart subtotal
    Check {
        /// Coupon code
        code: String,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add(commands::address::NewAddress),
    /// Delete an address
    Delete {
        /// Address id
        id: i64,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.api.environment.as_str().into()),
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

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lustre_storefront=info,lustre_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Drive `future` to completion on a new runtime.
///
/// Shutdown does not wait for blocking tasks: a payment prompt abandoned by
/// the timeout is still parked on stdin.
fn block_on_detached<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before Sentry, which must precede tracing
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => block_on_detached(run(cli, config)).unwrap_or_else(|err| Err(err.into())),
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.is_unexpected() {
                let event_id = sentry::capture_error(&err);
                tracing::error!(error = %err, sentry_event_id = %event_id, "Command failed");
            } else {
                tracing::error!("{err}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::connect(config, Arc::new(LoggingNavigator)).await?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&storefront, product, quantity).await?;
            }
            CartAction::Set { line, quantity } => {
                commands::cart::set(&storefront, line, quantity).await?;
            }
            CartAction::Remove { line } => commands::cart::remove(&storefront, line).await?,
        },
        Commands::Coupon { action } => match action {
            CouponAction::Check { code } => commands::coupon::check(&storefront, &code).await?,
        },
        Commands::Address { action } => match action {
            AddressAction::List => commands::address::list(&storefront).await?,
            AddressAction::Add(address) => commands::address::add(&storefront, address).await?,
            AddressAction::Delete { id } => commands::address::delete(&storefront, id).await?,
        },
        Commands::Checkout { address, coupon } => {
            commands::checkout::run(&storefront, address, coupon.as_deref()).await?;
        }
    }
    Ok(())
}
