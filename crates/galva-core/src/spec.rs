//! Product specification, the canonical input to every derivation.
//!
//! A [`ProductSpec`] is only ever produced by [`crate::normalize::normalize`];
//! holding one means the spec passed every field and cross-field rule.

use std::{collections::BTreeMap, fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

// ─── Coating ─────────────────────────────────────────────────────────────────

/// The surface-treatment process. Each has its own diameter range and its own
/// raw-material reduction ratios.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoatingType {
  /// Type A; standard galvanizing.
  Nit,
  /// Type B; heavy-coat galvanizing.
  Pad,
}

impl CoatingType {
  /// The business code used in stock codes and ERP records.
  pub fn code(self) -> &'static str {
    match self {
      Self::Nit => "NIT",
      Self::Pad => "PAD",
    }
  }
}

impl fmt::Display for CoatingType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for CoatingType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "NIT" | "A" => Ok(Self::Nit),
      "PAD" | "B" => Ok(Self::Pad),
      other => Err(format!("unknown coating type {other:?}")),
    }
  }
}

// ─── Coil geometry ───────────────────────────────────────────────────────────

/// Coil inner/outer diameter pairs (cm) accepted without the custom flag.
pub const VALID_COIL_PAIRS: [(u16, u16); 3] = [(45, 75), (50, 90), (55, 105)];

/// Inner and outer coil diameters in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoilGeometry {
  pub inner_cm: u16,
  pub outer_cm: u16,
  /// Set when the pair is not one of [`VALID_COIL_PAIRS`].
  #[serde(default)]
  pub custom:   bool,
}

// ─── Packaging ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingFlags {
  pub shrink:     bool,
  pub palletized: bool,
}

impl Default for PackagingFlags {
  fn default() -> Self { Self { shrink: true, palletized: false } }
}

// ─── ProductSpec ─────────────────────────────────────────────────────────────

/// A validated, canonical galvanized-wire specification.
///
/// Decimal fields are held at a fixed scale of two so that two specs that
/// compare equal also render identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
  /// Wire diameter in mm.
  pub diameter:        Decimal,
  pub coating_type:    CoatingType,
  /// Zinc coating in g/m².
  pub coating_amount:  Decimal,
  /// MPa.
  pub min_tensile:     u32,
  /// MPa.
  pub max_tensile:     u32,
  /// mm, always ≥ 0.
  pub tolerance_lower: Decimal,
  /// mm, always ≥ 0.
  pub tolerance_upper: Decimal,
  pub coil:            CoilGeometry,
  /// Coil weight in kg.
  pub weight:          Decimal,
  pub packaging:       PackagingFlags,
}

impl ProductSpec {
  pub fn diameter_mm(&self) -> f64 { self.diameter.to_f64().unwrap_or_default() }

  pub fn coating_g_m2(&self) -> f64 {
    self.coating_amount.to_f64().unwrap_or_default()
  }

  pub fn weight_kg(&self) -> f64 { self.weight.to_f64().unwrap_or_default() }

  /// Diameter × 100 as an integer, e.g. 2.50 mm → 250.
  pub fn diameter_hundredths(&self) -> u32 {
    diameter_hundredths(self.diameter)
  }

  /// Render this spec back into the raw field map accepted by the normalizer.
  pub fn to_raw(&self) -> RawSpec {
    RawSpec::default()
      .with(fields::DIAMETER, self.diameter.to_string())
      .with(fields::COATING_TYPE, self.coating_type.code())
      .with(fields::COATING_AMOUNT, self.coating_amount.to_string())
      .with(fields::MIN_TENSILE, self.min_tensile)
      .with(fields::MAX_TENSILE, self.max_tensile)
      .with(fields::TOLERANCE_LOWER, self.tolerance_lower.to_string())
      .with(fields::TOLERANCE_UPPER, self.tolerance_upper.to_string())
      .with(fields::COIL_INNER, self.coil.inner_cm)
      .with(fields::COIL_OUTER, self.coil.outer_cm)
      .with(fields::COIL_CUSTOM, self.coil.custom)
      .with(fields::WEIGHT, self.weight.to_string())
      .with(fields::SHRINK, self.packaging.shrink)
      .with(fields::PALLETIZED, self.packaging.palletized)
  }
}

/// Diameter × 100 rounded to an integer.
pub fn diameter_hundredths(diameter: Decimal) -> u32 {
  (diameter * Decimal::ONE_HUNDRED).round().to_u32().unwrap_or_default()
}

/// Zero-padded four-digit diameter token, e.g. 2.50 → `"0250"`.
pub fn diameter_code(diameter: Decimal) -> String {
  format!("{:04}", diameter_hundredths(diameter))
}

// ─── RawSpec ─────────────────────────────────────────────────────────────────

/// Field keys understood by the normalizer.
pub mod fields {
  pub const DIAMETER: &str = "diameter";
  pub const COATING_TYPE: &str = "coating_type";
  pub const COATING_AMOUNT: &str = "coating_amount";
  pub const MIN_TENSILE: &str = "min_tensile";
  pub const MAX_TENSILE: &str = "max_tensile";
  pub const TOLERANCE_LOWER: &str = "tolerance_lower";
  pub const TOLERANCE_UPPER: &str = "tolerance_upper";
  pub const COIL_INNER: &str = "coil_inner";
  pub const COIL_OUTER: &str = "coil_outer";
  pub const COIL_CUSTOM: &str = "coil_custom";
  pub const WEIGHT: &str = "weight";
  pub const SHRINK: &str = "shrink";
  pub const PALLETIZED: &str = "palletized";
}

/// An unvalidated field map as submitted by a sales form or import.
///
/// Values may be JSON numbers, booleans, or strings using either `.` or `,`
/// as the decimal separator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSpec(pub BTreeMap<String, serde_json::Value>);

impl RawSpec {
  /// Builder-style insert.
  pub fn with(
    mut self,
    key: &str,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.0.insert(key.to_owned(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
    self.0.get(key).filter(|v| !v.is_null())
  }
}
