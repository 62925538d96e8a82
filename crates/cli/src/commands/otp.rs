//! Phone verification commands.

use krushi_sarthi_core::PhoneNumber;
use krushi_sarthi_storefront::AppState;
use krushi_sarthi_storefront::config::OtpProviderKind;
use krushi_sarthi_storefront::error::set_sentry_user;
use krushi_sarthi_storefront::otp::{
    LambdaOtpProvider, OtpError, OtpProvider, OtpSession, PhoneVerification, SENT_HINT, Verified,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CommandResult, NoticePrinter};

const RESEND_COMMAND: &str = "r";

/// Send a code, then verify codes typed on stdin until one is accepted.
///
/// Typing `r` resends through the provider that sent the first code.
#[allow(clippy::print_stdout)]
pub async fn send(
    state: &AppState,
    notices: &mut NoticePrinter,
    phone: &str,
    via: Option<OtpProviderKind>,
) -> CommandResult {
    let verification = PhoneVerification::from_config(state.clone());
    if let Some(kind) = via {
        verification.select(kind);
    }

    let sent = verification.send(phone).await;
    notices.drain();
    sent?;
    println!("{SENT_HINT}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("Enter OTP (or `{RESEND_COMMAND}` to resend):");
        let Some(line) = lines.next_line().await? else {
            return Err(OtpError::NotSent.into());
        };
        let input = line.trim();

        if input.eq_ignore_ascii_case(RESEND_COMMAND) {
            let _ = verification.resend().await;
            notices.drain();
            continue;
        }

        let verified = verification.verify(input).await;
        notices.drain();
        match verified {
            Ok(outcome) => {
                print_outcome(&outcome);
                return Ok(());
            }
            Err(OtpError::InvalidCode | OtpError::Rejected(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Verify a code the SMS gateway sent in an earlier run.
///
/// The gateway verifies by phone number alone, so no session is needed.
#[allow(clippy::print_stdout)]
pub async fn verify(state: &AppState, phone: &str, code: &str) -> CommandResult {
    let phone = PhoneNumber::parse(phone).map_err(OtpError::from)?;
    let config = state.config();
    let provider = LambdaOtpProvider::new(&config.otp, config.request_timeout);

    let session = OtpSession {
        phone: phone.clone(),
        handle: None,
    };
    provider.verify(&session, code.trim()).await?;
    set_sentry_user(phone.profile_key());

    match state.load_remote_address(&phone).await {
        Ok(Some(address)) => print_outcome(&Verified::AddressLoaded(address)),
        Ok(None) => println!("Verified. Please add your delivery address (`ks-cli address set`)"),
        Err(e) => {
            e.report();
            println!("Verified. Please add your delivery address (`ks-cli address set`)");
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_outcome(outcome: &Verified) {
    match outcome {
        Verified::AddressLoaded(address) => {
            for line in address.display_lines() {
                println!("  {line}");
            }
        }
        Verified::NeedsAddress(draft) => {
            println!(
                "No saved address for {}. Use `ks-cli address set --phone {}` to add one.",
                draft.phone, draft.phone
            );
        }
    }
}
