//! Async client for Oelo multi-zone lighting controllers.
//!
//! The controller is a stateless, unauthenticated HTTP device with two
//! endpoints: `GET /getController` reports every zone in one JSON array and
//! `GET /setPattern` writes a pattern to a zone. This crate owns the wire
//! models, the [`ControllerTransport`] seam, the reqwest-backed
//! [`ControllerClient`] and an in-memory [`MockTransport`].

pub mod client;
pub mod error;
pub mod mock;
pub mod models;
pub mod transport;

pub use client::ControllerClient;
pub use error::{Error, ErrorKind};
pub use mock::{MockFailure, MockTransport};
pub use models::{MAX_REPORTED_COLORS, PatternCommand, Rgb, ZoneStatus};
pub use transport::{ControllerTransport, TransportConfig};
