use lnd_rest::utils::base64_field_to_hex;
use lnd_rest::{EventKind, LndClient, PaymentHashInput, ReconnectPolicy, StreamEvent, SubscriptionKind};
use tracing::info;

const USAGE: &str = "usage: watch <invoices|payments|invoice hex:HASH|b64:HASH|payment hex:HASH|b64:HASH>";

pub async fn execute(client: &LndClient, args: &[&str]) -> Result<(), String> {
    let kind = parse_target(args)?;

    let handlers = [
        EventKind::Open,
        EventKind::Close,
        EventKind::Error,
        EventKind::Invoice,
        EventKind::PaymentUpdate,
    ]
    .map(|kind| client.on(kind, print_event));

    let url = client
        .subscribe(kind, ReconnectPolicy::default())
        .map_err(|e| e.to_string())?;
    info!("watching {} (Ctrl-C to stop)", url);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl-C: {}", e))?;

    client.close_all();
    for id in handlers {
        client.off(id);
    }
    Ok(())
}

fn parse_target(args: &[&str]) -> Result<SubscriptionKind, String> {
    match args {
        ["invoices"] => Ok(SubscriptionKind::Invoices),
        ["payments"] => Ok(SubscriptionKind::InFlightPayments),
        ["invoice", hash] => Ok(SubscriptionKind::Invoice(hash_input(hash)?)),
        ["payment", hash] => Ok(SubscriptionKind::Payment(hash_input(hash)?)),
        _ => Err(USAGE.to_string()),
    }
}

/// `hex:<hash>` or `b64:<hash>`; the encoding is never guessed
fn hash_input(hash: &str) -> Result<PaymentHashInput, String> {
    if let Some(hex) = hash.strip_prefix("hex:") {
        Ok(PaymentHashInput::Hex(hex.to_string()))
    } else if let Some(b64) = hash.strip_prefix("b64:") {
        Ok(PaymentHashInput::Base64(b64.to_string()))
    } else {
        Err(format!("hash `{}` needs a hex: or b64: prefix\n{}", hash, USAGE))
    }
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Open { url, reconnected } => {
            let verb = if *reconnected { "reconnected" } else { "connected" };
            println!("🟢 {}: {}", verb, url);
        }
        StreamEvent::Close { reconnecting, reason, .. } => {
            let reason = reason.as_deref().unwrap_or("connection closed");
            if *reconnecting {
                println!("🟡 {}, reconnecting…", reason);
            } else {
                println!("🔴 {}", reason);
            }
        }
        StreamEvent::Error { error, reconnecting, .. } => {
            let suffix = if *reconnecting { ", reconnecting…" } else { "" };
            println!("❌ {}{}", error, suffix);
        }
        StreamEvent::Invoice { invoice, .. } => {
            println!(
                "🧾 invoice {} {} sat [{}] {}",
                base64_field_to_hex(&invoice.r_hash),
                invoice.value,
                invoice.state,
                invoice.memo
            );
        }
        StreamEvent::PaymentUpdate { payment, .. } => {
            println!(
                "💸 payment {} {} sat (fee {}) [{}]",
                payment.payment_hash, payment.value_sat, payment.fee_sat, payment.status
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(parse_target(&["invoices"]).unwrap(), SubscriptionKind::Invoices);
        assert_eq!(parse_target(&["payments"]).unwrap(), SubscriptionKind::InFlightPayments);

        let hex = "ab".repeat(32);
        assert_eq!(
            parse_target(&["payment", &format!("hex:{}", hex)]).unwrap(),
            SubscriptionKind::Payment(PaymentHashInput::Hex(hex.clone()))
        );
        assert_eq!(
            parse_target(&["invoice", "b64:q80="]).unwrap(),
            SubscriptionKind::Invoice(PaymentHashInput::Base64("q80=".into()))
        );
        // a hex-looking value is still taken as written when marked base64
        assert_eq!(
            parse_target(&["invoice", &format!("b64:{}", hex)]).unwrap(),
            SubscriptionKind::Invoice(PaymentHashInput::Base64(hex))
        );
    }

    #[test]
    fn test_bad_targets() {
        assert!(parse_target(&[]).is_err());
        assert!(parse_target(&["invoice"]).is_err());
        assert!(parse_target(&["channels"]).is_err());
        assert!(parse_target(&["payment", &"ab".repeat(32)]).is_err());
    }
}
