//! webm-remux - Rebuild browser-recorded WebM files into seekable WebM
//!
//! This library crate exposes the application layer for integration testing.
//! The container work lives in `webm-remux-media`.

pub mod config;
pub mod pipeline;
pub mod probe;
