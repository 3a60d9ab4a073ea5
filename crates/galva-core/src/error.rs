//! Error types for `galva-core`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  product::ProductState,
  recipe::OwnerKind,
  sequencer::SequenceKey,
  store::{GraphStep, GraphWriteError},
};

/// A single field-level validation failure produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

impl FieldError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self { field: field.into(), message: message.into() }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

/// Renders a list of field errors as `a: msg; b: msg`.
pub struct FieldErrors<'a>(pub &'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{e}")?;
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid product spec: {}", FieldErrors(.0))]
  Validation(Vec<FieldError>),

  #[error("sequence for {key} still collides after {attempts} attempts")]
  SequenceConflict { key: SequenceKey, attempts: u32 },

  #[error("sequence counter for {key} is unreachable")]
  SequenceUnavailable { key: SequenceKey },

  #[error("graph write failed at step {step}: {source}")]
  IntegrityViolation {
    step:   GraphStep,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("{owner} recipe has {actual} lines, expected {expected}")]
  CardinalityMismatch {
    owner:    OwnerKind,
    expected: usize,
    actual:   usize,
  },

  #[error("finished product not found: {0}")]
  ProductNotFound(Uuid),

  #[error("invalid lifecycle transition {from} -> {to}")]
  InvalidTransition { from: ProductState, to: ProductState },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a collaborator error that carries no step information.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Convenience constructor for a single-field validation failure.
  pub fn invalid(field: &str, message: impl Into<String>) -> Self {
    Self::Validation(vec![FieldError::new(field, message)])
  }
}

impl<E> From<GraphWriteError<E>> for Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(e: GraphWriteError<E>) -> Self {
    Self::IntegrityViolation { step: e.step, source: Box::new(e.source) }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
