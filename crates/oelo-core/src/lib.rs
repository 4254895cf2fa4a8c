//! Synchronization engine for Oelo multi-zone lighting controllers.
//!
//! The controller is polled, never pushed. This crate keeps a last-known
//! [`ZoneState`] per zone from single-request polls, coalesces bursts of
//! writes into one verified command per zone, stores captured effects
//! under content-derived ids and rebuilds full LED buffers for spotlight
//! zones from the controller's truncated reports.
//!
//! Everything is reached through a [`Controller`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), oelo_core::CoreError> {
//! use oelo_core::{Controller, ControllerConfig, ZoneId, ZoneRequest};
//! use oelo_api::Rgb;
//!
//! let controller = Controller::connect(ControllerConfig::default()).await?;
//! let zone = ZoneId::new(1)?;
//! controller.set_zone(zone, ZoneRequest::color(Rgb::new(255, 92, 0))).await?;
//! let effect = controller.capture_effect(zone, Some("Amber".into())).await?;
//! controller.apply_effect(ZoneId::new(2)?, &effect.id).await?;
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod poll;
pub mod spotlight;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, MAX_EFFECTS, ZoneConfig};
pub use controller::Controller;
pub use dispatch::{CommandOutcome, ZoneRequest};
pub use error::CoreError;
pub use poll::PollStatus;
pub use spotlight::SpotlightPlanMap;
pub use store::ZoneSnapshot;

pub use model::{
    Availability, Color, Effect, EffectId, EffectParams, EffectRef, Hsv, PlanType, ZoneId,
    ZoneState,
};
