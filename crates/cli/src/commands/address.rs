//! Delivery address commands.

use clap::Args;
use krushi_sarthi_core::{Address, Pincode};
use krushi_sarthi_storefront::pincode::{self, CHECKING_HINT};
use krushi_sarthi_storefront::{AppState, profile};

use super::CommandResult;

/// Address fields; omitted fields keep their saved value.
#[derive(Debug, Args)]
pub struct AddressArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    flat: Option<String>,
    #[arg(long)]
    street: Option<String>,
    #[arg(long)]
    landmark: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    pincode: Option<String>,
}

impl AddressArgs {
    fn apply(self, address: &mut Address) {
        let fields = [
            (self.name, &mut address.name),
            (self.phone, &mut address.phone),
            (self.flat, &mut address.flat),
            (self.street, &mut address.street),
            (self.landmark, &mut address.landmark),
            (self.city, &mut address.city),
            (self.district, &mut address.district),
            (self.state, &mut address.state),
            (self.pincode, &mut address.pincode),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState) -> CommandResult {
    match state.address().await {
        Some(address) => {
            for line in address.display_lines() {
                println!("{line}");
            }
            if !address.is_complete() {
                println!("(incomplete)");
            }
        }
        None => println!("No delivery address. Use `ks-cli address set` or `ks-cli otp send`."),
    }
    Ok(())
}

pub async fn set(state: &AppState, args: AddressArgs) -> CommandResult {
    let mut address = state.address().await.unwrap_or_default();
    args.apply(&mut address);
    profile::save_address(state, &address).await?;
    show(state).await
}

/// Merge the postal details for `raw_pincode` into the local address draft.
///
/// The draft is kept on the device only; `address set` saves it remotely.
#[allow(clippy::print_stdout)]
pub async fn autofill(state: &AppState, raw_pincode: &str) -> CommandResult {
    let pincode = Pincode::parse(raw_pincode)?;
    println!("{CHECKING_HINT}");

    let draft = state.address().await.unwrap_or_default();
    let outcome = pincode::autofill(state.postal(), &draft, &pincode).await;
    println!("{}", outcome.hint);

    state.set_address(outcome.address).await;
    show(state).await
}
