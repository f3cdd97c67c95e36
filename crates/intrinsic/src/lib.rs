#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/intrinsic/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fundamentals normalization and intrinsic value estimation.
//!
//! This crate re-exports the core types and the engine, and adds the async
//! boundary around them: a [`ProviderRegistry`] with ordered fallback, an
//! [`Analyzer`] that fetches under a bounded timeout, and a [`Session`] that
//! keeps the per-entity floor/target calibration.
//!
//! # Features
//!
//! - `yahoo` - Yahoo Finance provider for prices, statements and reference data

// Core types and traits
pub use intrinsic_core::*;

// Engine
pub use intrinsic_engine::*;

// Providers
#[cfg(feature = "yahoo")]
pub use intrinsic_yahoo::YahooProvider;

mod analyzer;
mod config;
mod memory;
mod registry;
mod session;

pub use analyzer::Analyzer;
pub use config::AnalyzerConfig;
pub use memory::{EntityData, InMemoryProvider};
pub use registry::ProviderRegistry;
pub use session::Session;
