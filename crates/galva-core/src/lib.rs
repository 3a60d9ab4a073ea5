//! Core types and engine components for galvanized-wire product
//! configuration and bill-of-process derivation.
//!
//! This crate is free of database and CLI dependencies. Storage backends
//! implement the traits in [`store`]; the binary wires them to a
//! [`RelationshipIntegrityManager`].

// Store traits use native `async fn` in their implementations.
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calculator;
pub mod codegen;
pub mod config;
pub mod error;
pub mod manager;
pub mod normalize;
pub mod product;
pub mod recipe;
pub mod selector;
pub mod sequencer;
pub mod spec;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use error::{Error, FieldError, Result};
pub use manager::{Derivation, RelationshipIntegrityManager};
pub use spec::{CoatingType, ProductSpec, RawSpec};
