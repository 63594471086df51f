//! Core types for cross-chain payment routing.
//!
//! This crate holds the records shared by every part of the paybridge workspace:
//! chain and token metadata, bridge routing configuration, fee schedules and the
//! payment audit trail. It also defines the two store interfaces the routing core
//! consumes, so that persistence can live anywhere (SQL, key-value, in memory).
//!
//! # Modules
//!
//! - [`amount`] - Decimal token amounts with validation
//! - [`chain`] - CAIP-2 chain identifiers and chain families
//! - [`config`] - Configuration helpers, including environment variable resolution
//! - [`model`] - Config Store and Payment Store records
//! - [`store`] - Traits for reading routing config and persisting payments
//! - [`timestamp`] - Unix timestamps used for record ordering and expiry

pub mod amount;
pub mod chain;
pub mod config;
pub mod model;
pub mod store;
pub mod timestamp;
