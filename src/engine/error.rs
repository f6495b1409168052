use crate::model::{BookingId, RequestError};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    MissingField(&'static str),
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    InvalidWindow {
        start: String,
        end: String,
    },
    Clash(BookingId),
    StorageFailure(StoreError),
}

impl AdmissionError {
    /// Rejections are the caller's fault; storage failures are ours.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AdmissionError::StorageFailure(_))
    }
}

impl std::fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionError::MissingField(field) => write!(f, "missing field: {field}"),
            AdmissionError::InvalidField { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            AdmissionError::InvalidWindow { start, end } => {
                write!(f, "window [{start}, {end}) is empty or inverted")
            }
            AdmissionError::Clash(id) => write!(f, "clash with booking: {id}"),
            AdmissionError::StorageFailure(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for AdmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdmissionError::StorageFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RequestError> for AdmissionError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::MissingField(field) => AdmissionError::MissingField(field),
            RequestError::InvalidField { field, reason } => {
                AdmissionError::InvalidField { field, reason }
            }
            RequestError::InvalidWindow { start, end } => {
                AdmissionError::InvalidWindow { start, end }
            }
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        AdmissionError::StorageFailure(e)
    }
}
