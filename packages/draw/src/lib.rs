#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Draw interaction controller.
//!
//! Owns the point drawing tool and the overlay layer on a host map,
//! turns completed draw gestures into buffer searches and writes their
//! outcomes to the feature store. The host map is reached only through
//! the traits in [`map`], so any map library (or the in-memory
//! [`headless::HeadlessMap`]) can drive it.

pub mod controller;
pub mod headless;
pub mod map;
pub mod notify;

pub use controller::{DrawController, DrawPhase, DrawResult, DrawSettings};
pub use map::{DrawTool, MapCollaborator, OverlayFeature, OverlayLayer, OverlayStyle};
pub use notify::{LogNotifier, Notifier, Severity};
