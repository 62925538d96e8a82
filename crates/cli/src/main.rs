//! Krushi Sarthi CLI - the storefront from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add a product variant from a catalog export to the cart
//! ks-cli cart add --catalog products.json urea-45 "45kg"
//!
//! # Look up a pincode and fill in city, district and state
//! ks-cli address autofill 413512
//!
//! # Save the delivery address to the customer's profile
//! ks-cli address set --name "Sunil Patil" --phone 9876543210 --flat 12 \
//!     --street "Station Road" --city Latur --district Latur \
//!     --state Maharashtra --pincode 413512
//!
//! # Review totals and place a cash-on-delivery order
//! ks-cli checkout --confirm
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, update, remove and list cart lines
//! - `address` - Show, save and auto-fill the delivery address
//! - `shipping estimate` - Estimate shipping for the current cart
//! - `checkout` - Show totals and place the order
//! - `orders` - List past orders
//! - `otp` - Verify a phone number and load its saved address

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use krushi_sarthi_storefront::StorefrontConfig;
use krushi_sarthi_storefront::config::OtpProviderKind;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ks-cli")]
#[command(author, version, about = "Krushi Sarthi storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the delivery address
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Shipping estimates
    Shipping {
        #[command(subcommand)]
        action: ShippingAction,
    },
    /// Show checkout totals and place the order
    Checkout {
        /// Payment method (`cod` or `online`)
        #[arg(short, long, default_value = "cod")]
        payment: String,

        /// Place the order instead of only showing totals
        #[arg(long)]
        confirm: bool,
    },
    /// List past orders for the saved address
    Orders,
    /// Verify a phone number
    Otp {
        #[command(subcommand)]
        action: OtpAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add one unit of a variant
    Add {
        /// Catalog export (JSON array of products)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Product id
        product: String,

        /// Variant title (English)
        variant: String,
    },
    /// Set a line's quantity; zero or less removes it
    Set {
        product: String,
        variant: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { product: String, variant: String },
    /// Show the cart and its totals
    Show,
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum AddressAction {
    /// Show the delivery address
    Show,
    /// Save the delivery address to the customer's profile
    Set(commands::address::AddressArgs),
    /// Look up a pincode and merge city, district and state into the address
    Autofill {
        /// Six-digit pincode
        pincode: String,
    },
}

#[derive(Subcommand)]
enum ShippingAction {
    /// Estimate shipping for the current cart and address
    Estimate,
}

#[derive(Subcommand)]
enum OtpAction {
    /// Send a code, then read it from stdin and verify it
    Send {
        /// Mobile number
        phone: String,

        /// Provider to send through (`lambda` or `firebase`)
        #[arg(short, long)]
        via: Option<OtpProviderKind>,
    },
    /// Verify a code sent earlier by the SMS gateway
    Verify {
        /// Mobile number
        phone: String,

        /// The code received
        code: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
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
        .unwrap_or_else(|_| "krushi_sarthi=info,ks_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = commands::open_state(config).await;
    let mut notices = commands::NoticePrinter::new(&state);

    let result = match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Add {
                catalog,
                product,
                variant,
            } => commands::cart::add(&state, &catalog, &product, &variant).await,
            CartAction::Set {
                product,
                variant,
                quantity,
            } => commands::cart::set(&state, &product, &variant, quantity).await,
            CartAction::Remove { product, variant } => {
                commands::cart::remove(&state, &product, &variant).await
            }
            CartAction::Show => commands::cart::show(&state).await,
            CartAction::Clear => commands::cart::clear(&state).await,
        },
        Commands::Address { action } => match action {
            AddressAction::Show => commands::address::show(&state).await,
            AddressAction::Set(args) => commands::address::set(&state, args).await,
            AddressAction::Autofill { pincode } => {
                commands::address::autofill(&state, &pincode).await
            }
        },
        Commands::Shipping { action } => match action {
            ShippingAction::Estimate => commands::shipping::estimate(&state).await,
        },
        Commands::Checkout { payment, confirm } => {
            commands::checkout::run(&state, &payment, confirm).await
        }
        Commands::Orders => commands::orders::list(&state).await,
        Commands::Otp { action } => match action {
            OtpAction::Send { phone, via } => {
                commands::otp::send(&state, &mut notices, &phone, via).await
            }
            OtpAction::Verify { phone, code } => {
                commands::otp::verify(&state, &phone, &code).await
            }
        },
    };

    notices.drain();
    state.flush().await;
    result
}
