//! Meeting-room reservations with clash-free admission.
//!
//! A booking is admitted only if no live booking for the same room and date
//! overlaps its half-open `[start, end)` window. Admission is serialized per
//! `(room, date)`; the store behind it is injected.

pub mod api;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;
