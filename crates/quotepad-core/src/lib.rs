//! Board-agnostic quote device engine.
//!
//! Everything in this crate is driven by explicit `now_ms` timestamps and
//! trait-based collaborators so it can be exercised on the host.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod clock;
pub mod connectivity;
pub mod credentials;
pub mod error;
pub mod fortune;
pub mod gesture;
pub mod payload;
pub mod persist;
pub mod pipeline;
pub mod rate_gate;
pub mod render;
pub mod settings;
pub mod wire;
