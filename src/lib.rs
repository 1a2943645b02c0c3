//! Lootcamp spawns temporary lootable camps near live anchors.
//!
//! A periodic scan walks the anchors, searches a valid spot near each one,
//! builds a structure, furnishes it with filled containers and optional
//! hazards and defense, then hands it to the [`lifecycle::LifecycleStore`],
//! which removes it once its lifetime runs out, across restarts too.
//!
//! Every engine interaction goes through the host traits in [`geometry`],
//! [`entity`], [`anchor`], [`notify`] and [`hooks`]. [`sandbox::Sandbox`] is
//! an in-memory host used by the binary and the tests.

pub mod anchor;
pub mod clock;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod hooks;
pub mod lifecycle;
pub mod loot;
pub mod notify;
pub mod persistence;
pub mod placement;
pub mod runtime;
pub mod sandbox;
pub mod scanner;
pub mod structures;

pub use error::{Error, Result};
