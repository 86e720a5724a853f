use serde_json::{json, Value};

use super::events::{StreamError, StreamEvent};
use crate::api::models::{Invoice, Payment};
use crate::utils::{extract_clean_error, EncodingError, PaymentHashInput};

/// Push channels the node offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Every invoice add/settle
    Invoices,
    /// One invoice by payment hash
    Invoice(PaymentHashInput),
    /// One outbound payment by payment hash
    Payment(PaymentHashInput),
    /// All in-flight outbound payments
    InFlightPayments,
}

/// Record shape carried by a channel's frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Invoice,
    Payment,
}

impl SubscriptionKind {
    pub fn payload(&self) -> PayloadKind {
        match self {
            SubscriptionKind::Invoices | SubscriptionKind::Invoice(_) => PayloadKind::Invoice,
            SubscriptionKind::Payment(_) | SubscriptionKind::InFlightPayments => PayloadKind::Payment,
        }
    }

    fn path(&self) -> Result<String, EncodingError> {
        Ok(match self {
            SubscriptionKind::Invoices => "/v1/invoices/subscribe".to_string(),
            SubscriptionKind::Invoice(hash) => {
                format!("/v2/invoices/subscribe/{}", hash.to_url_safe_base64()?)
            }
            SubscriptionKind::Payment(hash) => {
                format!("/v2/router/track/{}", hash.to_url_safe_base64()?)
            }
            SubscriptionKind::InFlightPayments => "/v2/router/payments".to_string(),
        })
    }

    /// Canonical URL, also the connection's identity in the registry
    pub fn url(&self, ws_base: &str) -> Result<String, EncodingError> {
        Ok(format!(
            "{}{}?method=GET",
            ws_base.trim_end_matches('/'),
            self.path()?
        ))
    }

    /// Request body sent right after the handshake
    pub fn initial_frame(&self) -> Result<String, EncodingError> {
        let body = match self {
            SubscriptionKind::Invoices => json!({}),
            SubscriptionKind::Invoice(hash) => json!({ "r_hash": hash.to_url_safe_base64()? }),
            SubscriptionKind::Payment(hash) => json!({
                "payment_hash": hash.to_url_safe_base64()?,
                "no_inflight_updates": false,
            }),
            SubscriptionKind::InFlightPayments => json!({ "no_inflight_updates": false }),
        };
        Ok(body.to_string())
    }
}

/// Decode one text frame into a domain event.
///
/// Frames come wrapped as `{"result": {...}}` or bare; `{"error": {...}}`
/// frames decode to [`StreamError::Upstream`].
pub fn decode_frame(payload: PayloadKind, url: &str, text: &str) -> Result<StreamEvent, StreamError> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| StreamError::Malformed(e.to_string()))?;

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(extract_clean_error)
            .unwrap_or_else(|| err.to_string());
        return Err(StreamError::Upstream(message));
    }

    if let Some(result) = value.get_mut("result") {
        value = result.take();
    }
    if !value.is_object() {
        return Err(StreamError::Malformed(format!("expected an object, got {}", value)));
    }

    let url = url.to_string();
    match payload {
        PayloadKind::Invoice => serde_json::from_value::<Invoice>(value)
            .map(|invoice| StreamEvent::Invoice { url, invoice }),
        PayloadKind::Payment => serde_json::from_value::<Payment>(value)
            .map(|payment| StreamEvent::PaymentUpdate { url, payment }),
    }
    .map_err(|e| StreamError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "wss://node:8080";

    fn hash() -> PaymentHashInput {
        PaymentHashInput::Hex("ff".repeat(32))
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            SubscriptionKind::Invoices.url(BASE).unwrap(),
            "wss://node:8080/v1/invoices/subscribe?method=GET"
        );
        assert_eq!(
            SubscriptionKind::InFlightPayments.url("wss://node:8080/").unwrap(),
            "wss://node:8080/v2/router/payments?method=GET"
        );

        let b64 = hash().to_url_safe_base64().unwrap();
        assert!(b64.contains('_'));
        assert_eq!(
            SubscriptionKind::Payment(hash()).url(BASE).unwrap(),
            format!("wss://node:8080/v2/router/track/{}?method=GET", b64)
        );
        assert_eq!(
            SubscriptionKind::Invoice(hash()).url(BASE).unwrap(),
            format!("wss://node:8080/v2/invoices/subscribe/{}?method=GET", b64)
        );
    }

    #[test]
    fn test_bad_hash_rejected() {
        let kind = SubscriptionKind::Invoice(PaymentHashInput::Hex("xyz".into()));
        assert!(kind.url(BASE).is_err());
        assert!(kind.initial_frame().is_err());
    }

    #[test]
    fn test_payload_kinds() {
        assert_eq!(SubscriptionKind::Invoices.payload(), PayloadKind::Invoice);
        assert_eq!(SubscriptionKind::Invoice(hash()).payload(), PayloadKind::Invoice);
        assert_eq!(SubscriptionKind::Payment(hash()).payload(), PayloadKind::Payment);
        assert_eq!(SubscriptionKind::InFlightPayments.payload(), PayloadKind::Payment);
    }

    #[test]
    fn test_decode_wrapped_invoice() {
        let frame = r#"{"result": {"memo": "tea", "r_hash": "q80=", "state": "SETTLED", "value": "21"}}"#;
        match decode_frame(PayloadKind::Invoice, "u", frame).unwrap() {
            StreamEvent::Invoice { url, invoice } => {
                assert_eq!(url, "u");
                assert_eq!(invoice.memo, "tea");
                assert_eq!(invoice.value, 21);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_bare_payment() {
        let frame = r#"{"payment_hash": "ab", "status": "IN_FLIGHT"}"#;
        match decode_frame(PayloadKind::Payment, "u", frame).unwrap() {
            StreamEvent::PaymentUpdate { payment, .. } => assert_eq!(payment.status, "IN_FLIGHT"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_frame() {
        let frame = r#"{"error": {"code": 2, "message": "rpc error: code = Unknown desc = payment isn't initiated"}}"#;
        assert_eq!(
            decode_frame(PayloadKind::Payment, "u", frame).unwrap_err(),
            StreamError::Upstream("payment isn't initiated".to_string())
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode_frame(PayloadKind::Invoice, "u", "not json"),
            Err(StreamError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame(PayloadKind::Invoice, "u", "[1, 2]"),
            Err(StreamError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame(PayloadKind::Invoice, "u", r#"{"value": "abc"}"#),
            Err(StreamError::Malformed(_))
        ));
    }
}
