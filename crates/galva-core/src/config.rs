//! Engine tuning knobs. Every field has a default so a partial config file
//! deserializes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codegen::{CodeGenerator, DEFAULT_FAMILY_TOKEN, DEFAULT_INTERMEDIATE_TOKEN};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub family_token:              String,
  pub intermediate_token:        String,
  /// Upper bound on raw materials returned by a catalog tier.
  pub max_raw_materials:         usize,
  /// Sequence commits attempted before giving up.
  pub sequence_retries:          u32,
  /// Linear backoff step between commit attempts.
  pub sequence_retry_backoff_ms: u64,
  /// Furthest a nearest-diameter match may sit from its target. An infinite
  /// value (`inf` in TOML) lifts the bound and considers the whole catalog.
  pub nearest_max_deviation_mm:  f64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      family_token:              DEFAULT_FAMILY_TOKEN.to_owned(),
      intermediate_token:        DEFAULT_INTERMEDIATE_TOKEN.to_owned(),
      max_raw_materials:         3,
      sequence_retries:          5,
      sequence_retry_backoff_ms: 50,
      nearest_max_deviation_mm:  0.5,
    }
  }
}

impl EngineConfig {
  pub fn code_generator(&self) -> CodeGenerator {
    CodeGenerator::new(&self.family_token, &self.intermediate_token)
  }

  pub fn backoff(&self, attempt: u32) -> Duration {
    Duration::from_millis(self.sequence_retry_backoff_ms.saturating_mul(u64::from(attempt)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_config_keeps_defaults() {
    let cfg: EngineConfig =
      serde_json::from_value(serde_json::json!({ "sequence_retries": 2 })).unwrap();
    assert_eq!(cfg.sequence_retries, 2);
    assert_eq!(cfg.family_token, "GT");
    assert_eq!(cfg.max_raw_materials, 3);
  }

  #[test]
  fn backoff_is_linear() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.backoff(1), Duration::from_millis(50));
    assert_eq!(cfg.backoff(3), Duration::from_millis(150));
  }
}
