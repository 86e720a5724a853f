//! Transaction models

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::api::models::{Invoice, Payment};
use crate::utils::base64_field_to_hex;

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sent,
    Received,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Sent => write!(f, "sent"),
            TransactionType::Received => write!(f, "received"),
        }
    }
}

/// Status unified across payments and invoices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    Failed,
    InFlight,
    Pending,
    Settled,
    Canceled,
    Accepted,
    /// Unrecognised invoice state, lower-cased
    #[serde(untagged)]
    Other(String),
}

impl TransactionStatus {
    /// Map a payment `status` field
    pub fn from_payment_status(status: &str) -> Self {
        match status {
            "SUCCEEDED" => TransactionStatus::Succeeded,
            "FAILED" => TransactionStatus::Failed,
            "IN_FLIGHT" => TransactionStatus::InFlight,
            _ => TransactionStatus::Pending,
        }
    }

    /// Map an invoice `state` field
    pub fn from_invoice_state(state: &str) -> Self {
        match state {
            "SETTLED" => TransactionStatus::Settled,
            "CANCELED" => TransactionStatus::Canceled,
            "ACCEPTED" => TransactionStatus::Accepted,
            "OPEN" => TransactionStatus::Pending,
            other => TransactionStatus::Other(other.to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Succeeded => "succeeded",
            TransactionStatus::Failed => "failed",
            TransactionStatus::InFlight => "in_flight",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Accepted => "accepted",
            TransactionStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized view of an outbound payment or an inbound invoice.
///
/// Built only through [`Transaction::from_payment`] and
/// [`Transaction::from_invoice`], so exactly one raw record is present and it
/// matches `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// Hex payment hash
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Satoshis
    pub amount: i64,
    /// Satoshis, 0 for received
    pub fee: i64,
    /// Creation time, seconds since epoch
    pub timestamp: i64,
    pub status: TransactionStatus,
    pub description: String,
    pub destination: String,
    raw_payment: Option<Payment>,
    raw_invoice: Option<Invoice>,
}

impl Transaction {
    pub fn from_payment(payment: Payment) -> Self {
        Self {
            id: payment.payment_hash.clone(),
            kind: TransactionType::Sent,
            amount: payment.value_sat,
            fee: payment.fee_sat.max(0),
            timestamp: payment.creation_date,
            status: TransactionStatus::from_payment_status(&payment.status),
            description: String::new(),
            destination: payment.destination().unwrap_or_default().to_string(),
            raw_payment: Some(payment),
            raw_invoice: None,
        }
    }

    pub fn from_invoice(invoice: Invoice) -> Self {
        // Settled invoices report what was actually paid
        let amount = if invoice.amt_paid_sat > 0 {
            invoice.amt_paid_sat
        } else {
            invoice.value
        };

        Self {
            id: base64_field_to_hex(&invoice.r_hash),
            kind: TransactionType::Received,
            amount,
            fee: 0,
            timestamp: invoice.creation_date,
            status: TransactionStatus::from_invoice_state(&invoice.state),
            description: invoice.memo.clone(),
            destination: String::new(),
            raw_payment: None,
            raw_invoice: Some(invoice),
        }
    }

    pub fn raw_payment(&self) -> Option<&Payment> {
        self.raw_payment.as_ref()
    }

    pub fn raw_invoice(&self) -> Option<&Invoice> {
        self.raw_invoice.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_mapping() {
        assert_eq!(TransactionStatus::from_payment_status("SUCCEEDED"), TransactionStatus::Succeeded);
        assert_eq!(TransactionStatus::from_payment_status("FAILED"), TransactionStatus::Failed);
        assert_eq!(TransactionStatus::from_payment_status("IN_FLIGHT"), TransactionStatus::InFlight);
        assert_eq!(TransactionStatus::from_payment_status("UNKNOWN"), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::from_payment_status(""), TransactionStatus::Pending);
    }

    #[test]
    fn test_invoice_state_mapping() {
        assert_eq!(TransactionStatus::from_invoice_state("SETTLED"), TransactionStatus::Settled);
        assert_eq!(TransactionStatus::from_invoice_state("CANCELED"), TransactionStatus::Canceled);
        assert_eq!(TransactionStatus::from_invoice_state("ACCEPTED"), TransactionStatus::Accepted);
        assert_eq!(TransactionStatus::from_invoice_state("OPEN"), TransactionStatus::Pending);
        assert_eq!(
            TransactionStatus::from_invoice_state("EXPIRED"),
            TransactionStatus::Other("expired".to_string())
        );
    }

    #[test]
    fn test_from_invoice_normalizes_hash_and_amount() {
        let invoice = Invoice {
            r_hash: "q80=".to_string(),
            memo: "coffee".to_string(),
            value: 1000,
            amt_paid_sat: 1200,
            creation_date: 1_617_926_400,
            state: "SETTLED".to_string(),
            ..Default::default()
        };
        let tx = Transaction::from_invoice(invoice);

        assert_eq!(tx.id, "abcd");
        assert_eq!(tx.kind, TransactionType::Received);
        assert_eq!(tx.amount, 1200);
        assert_eq!(tx.fee, 0);
        assert_eq!(tx.description, "coffee");
        assert!(tx.raw_invoice().is_some());
        assert!(tx.raw_payment().is_none());
    }

    #[test]
    fn test_from_payment() {
        let payment = Payment {
            payment_hash: "ff00".to_string(),
            value_sat: 500,
            fee_sat: 2,
            creation_date: 1_617_753_600,
            status: "IN_FLIGHT".to_string(),
            ..Default::default()
        };
        let tx = Transaction::from_payment(payment);

        assert_eq!(tx.kind, TransactionType::Sent);
        assert_eq!(tx.status, TransactionStatus::InFlight);
        assert_eq!(tx.fee, 2);
        assert_eq!(tx.destination, "");
        assert!(tx.raw_payment().is_some());
        assert!(tx.raw_invoice().is_none());
        assert_eq!(tx.created_at().unwrap().to_rfc3339(), "2021-04-07T00:00:00+00:00");
    }

    #[test]
    fn test_serialized_shape() {
        let tx = Transaction::from_payment(Payment::default());
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "sent");
        assert_eq!(json["status"], "pending");
        assert!(json["raw_invoice"].is_null());
        assert_eq!(
            serde_json::to_value(TransactionStatus::Other("expired".into())).unwrap(),
            "expired"
        );
    }
}
