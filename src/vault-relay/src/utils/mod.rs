//! Shared helpers for the engine.

pub mod crypto;
