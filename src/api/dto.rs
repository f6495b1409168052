use serde::{Deserialize, Serialize};

use crate::engine::AdmissionError;
use crate::model::Booking;

pub const MISSING_DATA: &str = "Missing data";
pub const CLASH_DETECTED: &str = "Clash detected";
pub const INVALID_DATA: &str = "Invalid data";
pub const INVALID_JSON: &str = "Invalid JSON";
pub const STORAGE_UNAVAILABLE: &str = "Storage unavailable";

/// Envelope for `/book` and `/cancel`: a flag plus either the booking or a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            booking: None,
            error: None,
        }
    }

    pub fn booked(booking: Booking) -> Self {
        Self {
            success: true,
            booking: Some(booking),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            booking: None,
            error: Some(message.into()),
        }
    }
}

/// Client-facing reason for a failed admission.
pub fn admission_message(e: &AdmissionError) -> &'static str {
    match e {
        AdmissionError::MissingField(_) => MISSING_DATA,
        AdmissionError::Clash(_) => CLASH_DETECTED,
        AdmissionError::InvalidField { .. } | AdmissionError::InvalidWindow { .. } => INVALID_DATA,
        AdmissionError::StorageFailure(_) => STORAGE_UNAVAILABLE,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookings: Option<usize>,
}
