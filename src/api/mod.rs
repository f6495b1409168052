//! HTTP/JSON binding for listing, booking and cancelling.

pub mod dto;
mod handlers;
mod router;

pub use handlers::AppState;
pub use router::router;
