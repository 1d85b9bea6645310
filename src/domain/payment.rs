use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// The gateway's payment id.
    pub external_id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    InProcess,
    Failed,
}

impl PaymentStatus {
    /// Normalizes a gateway status string.
    pub fn from_gateway(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" => PaymentStatus::Pending,
            "approved" => PaymentStatus::Approved,
            "authorized" | "in_process" | "in_mediation" => PaymentStatus::InProcess,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" | "canceled" | "refunded" | "charged_back" => PaymentStatus::Failed,
            other => {
                tracing::warn!("Unknown gateway payment status '{}', treating as in process", other);
                PaymentStatus::InProcess
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Approved => "APPROVED",
            PaymentStatus::Rejected => "REJECTED",
            PaymentStatus::InProcess => "IN_PROCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "APPROVED" => Some(PaymentStatus::Approved),
            "REJECTED" => Some(PaymentStatus::Rejected),
            "IN_PROCESS" => Some(PaymentStatus::InProcess),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum PaymentMethod {
    /// PIX instant transfer settled through a scannable code.
    #[serde(rename = "pix")]
    InstantTransfer,
    #[serde(rename = "card")]
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::InstantTransfer => "pix",
            PaymentMethod::Card => "card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pix" => Some(PaymentMethod::InstantTransfer),
            "card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

/// Method-specific data the gateway needs, already checked for presence.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodDetails {
    InstantTransfer,
    Card {
        token: String,
        payment_method_id: String,
        installments: u32,
        issuer_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Payer {
    #[serde(default)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identification: Option<Identification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Identification {
    #[serde(rename = "type")]
    pub id_type: String,
    pub number: String,
}

/// A validated checkout attempt, consumed once by the payment service.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub description: String,
    pub payer: Payer,
    pub method_details: MethodDetails,
}

impl PaymentRequest {
    pub fn method(&self) -> PaymentMethod {
        match self.method_details {
            MethodDetails::InstantTransfer => PaymentMethod::InstantTransfer,
            MethodDetails::Card { .. } => PaymentMethod::Card,
        }
    }
}

/// Converts a decimal BRL amount to cents, rounding half away from zero.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_gateway_statuses() {
        assert_eq!(PaymentStatus::from_gateway("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from_gateway("in_process"), PaymentStatus::InProcess);
        assert_eq!(PaymentStatus::from_gateway("rejected"), PaymentStatus::Rejected);
        assert_eq!(PaymentStatus::from_gateway("cancelled"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("PENDING"), PaymentStatus::Pending);
    }

    #[test]
    fn status_string_round_trips() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Approved,
            PaymentStatus::Rejected,
            PaymentStatus::InProcess,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn cents_conversion_rounds() {
        assert_eq!(to_cents(100.0), 10000);
        assert_eq!(to_cents(19.99), 1999);
        assert_eq!(to_cents(0.1 + 0.2), 30);
        assert_eq!(from_cents(12345), 123.45);
    }

    #[test]
    fn method_serializes_as_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::InstantTransfer).unwrap(), "\"pix\"");
        let card: PaymentMethod = serde_json::from_str("\"card\"").unwrap();
        assert_eq!(card, PaymentMethod::Card);
    }
}
