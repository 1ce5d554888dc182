//! Request and response payloads of the Roadie API.
//!
//! # Design
//! Plain value records mirroring the API's `snake_case` JSON. Field limits
//! (maximum lengths, required fields) are enforced by the API, not here.
//! Optional fields are skipped when serializing so partial updates only send
//! what the caller set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical good in a shipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Length in inches.
    pub length: f32,
    /// Width in inches.
    pub width: f32,
    /// Height in inches.
    pub height: f32,
    /// Weight in pounds.
    pub weight: f32,
    pub quantity: u32,
    /// Monetary value of a single item.
    pub value: f32,
    /// Max 200 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller-supplied item identifier. Max 100 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Business or place name, helpful to the driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Store identifier for retail locations. Max 20 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_number: Option<String>,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    /// Two letter state code.
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

/// A pickup or delivery location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: Address,
    /// Required by the API for shipments, optional for estimates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    /// Instructions for the driver. Max 500 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    #[serde(default)]
    pub signature_required: bool,
    #[serde(default)]
    pub notifications_enabled: bool,
    /// Driver must be over 21, typically for alcohol deliveries.
    #[serde(default)]
    pub over_21_required: bool,
    /// Additional driver compensation offered before assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_compensation: Option<f32>,
    #[serde(default)]
    pub trailer_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    /// Event type, e.g. `at_pickup`.
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Lifecycle state of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    Scheduled,
    Assigned,
    EnRouteToPickup,
    AtPickup,
    PickupConfirmed,
    EnRouteToDelivery,
    AtDelivery,
    DeliveryConfirmed,
    DeliveryAttempted,
    Returned,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ShipmentState {
    /// True once the shipment can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentState::DeliveryConfirmed | ShipmentState::Returned | ShipmentState::Canceled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEstimateRequest {
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEstimateResponse {
    pub price: f32,
    /// Size category, e.g. `small`.
    pub size: String,
    /// Miles between pickup and delivery.
    pub estimated_distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: ShipmentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_2: Option<String>,
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
    #[serde(default)]
    pub options: DeliveryOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_distance: Option<f32>,
    #[serde(default)]
    pub events: Vec<ShipmentEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    /// Caller-supplied identifier. Max 100 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_2: Option<String>,
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
    pub options: DeliveryOptions,
}

/// Partial shipment update. Only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateShipmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_between: Option<TimeWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<DeliveryOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationCode {
    CustomerCanceled,
    ItemUnavailable,
    AddressIssue,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelShipmentRequest {
    pub cancellation_code: CancellationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_comment: Option<String>,
}

/// Structured error payload returned by the API on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Request field the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    /// Wraps a body that is not a structured payload as a single message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorDetail {
                code: None,
                parameter: None,
                message: message.into(),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("no error details");
        }
        for (i, detail) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&detail.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_address_fields_are_omitted() {
        let address = Address {
            street1: "123 Main St".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            zip: "30305".to_string(),
            ..Address::default()
        };
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "street1": "123 Main St",
                "city": "Atlanta",
                "state": "GA",
                "zip": "30305",
            })
        );
    }

    #[test]
    fn time_window_uses_rfc3339() {
        let window: TimeWindow = serde_json::from_str(
            r#"{"start":"2024-05-01T14:00:00Z","end":"2024-05-01T18:00:00-04:00"}"#,
        )
        .unwrap();
        assert_eq!(window.start.to_rfc3339(), "2024-05-01T14:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2024-05-01T22:00:00+00:00");
    }

    #[test]
    fn unknown_shipment_state_decodes_as_unknown() {
        let state: ShipmentState = serde_json::from_str(r#""teleported""#).unwrap();
        assert_eq!(state, ShipmentState::Unknown);
        let state: ShipmentState = serde_json::from_str(r#""en_route_to_pickup""#).unwrap();
        assert_eq!(state, ShipmentState::EnRouteToPickup);
    }

    #[test]
    fn terminal_states() {
        assert!(ShipmentState::Canceled.is_terminal());
        assert!(ShipmentState::DeliveryConfirmed.is_terminal());
        assert!(!ShipmentState::AtPickup.is_terminal());
    }

    #[test]
    fn empty_update_serializes_to_empty_object() {
        let json = serde_json::to_string(&UpdateShipmentRequest::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn update_sends_only_set_fields() {
        let update = UpdateShipmentRequest {
            description: Some("Fragile".to_string()),
            ..UpdateShipmentRequest::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"description": "Fragile"}));
    }

    #[test]
    fn cancellation_code_is_snake_case() {
        let req = CancelShipmentRequest {
            cancellation_code: CancellationCode::CustomerCanceled,
            cancellation_comment: None,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"cancellation_code":"customer_canceled"}"#
        );
    }

    #[test]
    fn error_response_display_joins_messages() {
        let payload: ErrorResponse = serde_json::from_str(
            r#"{"errors":[{"code":"invalid","parameter":"zip","message":"zip is invalid"},{"message":"phone is required"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.to_string(), "zip is invalid; phone is required");
        assert_eq!(payload.errors[0].parameter.as_deref(), Some("zip"));
    }

    #[test]
    fn estimate_response_without_errors_field() {
        let resp: CreateEstimateResponse =
            serde_json::from_str(r#"{"price":18.5,"size":"small","estimated_distance":5.6}"#)
                .unwrap();
        assert_eq!(resp.size, "small");
        assert!(resp.errors.is_none());
    }
}
