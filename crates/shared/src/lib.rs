//! Shared utilities and common types for the duty roster backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Token utilities (generation, hashing, comparison)
//! - Common validation logic

pub mod crypto;
pub mod validation;
