//! core
//!
//! Domain records, the comment engine and configuration.
//!
//! # Modules
//!
//! - [`types`] - Pull request and comment records, status enumeration
//! - [`comments`] - Pattern matching over comment threads
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Records are plain values, never live-updated
//! - The comment engine is pure and performs no I/O
//! - Schemas are strict and self-describing

pub mod comments;
pub mod config;
pub mod types;
