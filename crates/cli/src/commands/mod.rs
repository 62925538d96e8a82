//! Command implementations.

use krushi_sarthi_core::{Price, ShippingQuote};
use krushi_sarthi_storefront::notice::{Notice, NoticeKind};
use krushi_sarthi_storefront::{AppState, Services, StorefrontConfig};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

pub mod address;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod otp;
pub mod shipping;

/// Result type shared by all commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Build app state from the saved device snapshot.
pub async fn open_state(config: StorefrontConfig) -> AppState {
    let services = Services::from_config(&config);
    AppState::restore(config, services).await
}

/// Prints notices published by the storefront.
pub struct NoticePrinter {
    rx: broadcast::Receiver<Notice>,
}

impl NoticePrinter {
    pub fn new(state: &AppState) -> Self {
        Self {
            rx: state.subscribe_notices(),
        }
    }

    /// Print every notice published so far.
    pub fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(notice) => print_notice(&notice),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notices dropped");
                }
                Err(_) => break,
            }
        }
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn print_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Error => eprintln!("{notice}"),
        NoticeKind::Success | NoticeKind::Info => println!("{notice}"),
    }
}

pub fn rupees(amount: Decimal) -> String {
    Price::inr(amount).display()
}

/// Whether a refreshed estimate carries a fee that will be charged.
///
/// `None` means a newer request superseded this one.
pub fn shipping_available(quote: Option<ShippingQuote>) -> bool {
    quote.is_some_and(|quote| quote.is_valid())
}
