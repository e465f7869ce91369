// src/core/mod.rs — Dialogue and step-progression core

pub mod classifier;
pub mod controller;
pub mod envelope;
pub mod extract;
pub mod ports;
pub mod types;

/// Literal the model is told to lead its answer with, and the extractor looks for.
pub const FINAL_MARKER: &str = "FINAL:";
