//! # Wakil Support
//!
//! Shared helpers for the Wakil container crates.
//!
//! This crate provides:
//! - Text rendering for error messages (dependency chains, short type names)
//! - "Did you mean?" suggestions for unregistered services

pub mod rendering;
