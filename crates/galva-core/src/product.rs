//! The three tiers of the manufacturing hierarchy and the join between them.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  codegen::raw_material_code,
  error::FieldError,
  normalize::DIAMETER_RANGE,
  spec::{CoatingType, ProductSpec},
};

/// Largest filament class and quality that fit a four-digit code segment.
const MAX_FILAMENT_MM: f64 = 99.99;
const MAX_QUALITY: u16 = 9999;

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Lifecycle of a finished product: `Draft → Persisted → Updated → Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductState {
  Draft,
  Persisted,
  Updated,
  Deleted,
}

impl ProductState {
  pub fn can_transition_to(self, next: Self) -> bool {
    use ProductState::*;
    matches!(
      (self, next),
      (Draft, Persisted)
        | (Persisted | Updated, Updated)
        | (Draft | Persisted | Updated, Deleted)
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Persisted => "persisted",
      Self::Updated => "updated",
      Self::Deleted => "deleted",
    }
  }
}

impl fmt::Display for ProductState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Finished product ────────────────────────────────────────────────────────

/// A sellable coated wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedProduct {
  pub id:                      Uuid,
  /// Hierarchical stock code; never changes after creation.
  pub code:                    String,
  pub name_tr:                 String,
  pub name_en:                 String,
  pub tariff_bracket:          String,
  pub packaging_material_code: String,
  pub spec:                    ProductSpec,
  pub state:                   ProductState,
  pub created_at:              DateTime<Utc>,
  pub updated_at:              DateTime<Utc>,
}

// ─── Intermediate product ────────────────────────────────────────────────────

/// The same wire before coating; exactly one per finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateProduct {
  pub id:              Uuid,
  pub finished_id:     Uuid,
  pub code:            String,
  pub name_tr:         String,
  pub name_en:         String,
  pub diameter:        Decimal,
  pub coating_type:    CoatingType,
  pub coating_amount:  Decimal,
  pub min_tensile:     u32,
  pub max_tensile:     u32,
  pub tolerance_lower: Decimal,
  pub tolerance_upper: Decimal,
}

impl IntermediateProduct {
  /// Copy every non-packaging attribute of `spec`.
  pub fn from_spec(
    id: Uuid,
    finished_id: Uuid,
    code: String,
    names: (String, String),
    spec: &ProductSpec,
  ) -> Self {
    Self {
      id,
      finished_id,
      code,
      name_tr: names.0,
      name_en: names.1,
      diameter: spec.diameter,
      coating_type: spec.coating_type,
      coating_amount: spec.coating_amount,
      min_tensile: spec.min_tensile,
      max_tensile: spec.max_tensile,
      tolerance_lower: spec.tolerance_lower,
      tolerance_upper: spec.tolerance_upper,
    }
  }
}

// ─── Raw material ────────────────────────────────────────────────────────────

/// Whether a variant already exists in the catalog or was computed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantOrigin {
  Catalog,
  /// Not yet persisted; becomes `Catalog` once its product graph is saved.
  Synthesized,
}

/// A wire-rod input, shared across any number of finished products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterialVariant {
  pub code:           String,
  /// Drawn diameter in mm.
  pub diameter:       Decimal,
  /// Wire-rod (filament) diameter class in mm, e.g. 6.00.
  pub filament_class: Decimal,
  /// Steel quality grade, e.g. 1006.
  pub quality:        u16,
  /// 1mm-wide diameter band index, 1..=8.
  pub special_bucket: u8,
  pub origin:         VariantOrigin,
}

impl RawMaterialVariant {
  /// A catalog entry with its code and bucket derived from its fields.
  pub fn catalog(diameter: Decimal, filament_class: Decimal, quality: u16) -> Self {
    let diameter = diameter.round_dp(2);
    let filament_class = filament_class.round_dp(2);
    Self {
      code: raw_material_code(diameter, filament_class, quality),
      diameter,
      filament_class,
      quality,
      special_bucket: special_bucket(diameter.to_f64().unwrap_or_default()),
      origin: VariantOrigin::Catalog,
    }
  }

  /// [`Self::catalog`] for operator input. Rejects diameters outside the
  /// product range and grades that do not fit the code format.
  pub fn checked_catalog(diameter: Decimal, filament_class: Decimal, quality: u16) -> Result<Self> {
    let mut errors = Vec::new();
    let d = diameter.to_f64().unwrap_or(f64::NAN);
    if !(DIAMETER_RANGE.0..=DIAMETER_RANGE.1).contains(&d) {
      errors.push(FieldError::new(
        "diameter",
        format!("{diameter} mm outside [{}, {}]", DIAMETER_RANGE.0, DIAMETER_RANGE.1),
      ));
    }
    let f = filament_class.to_f64().unwrap_or(f64::NAN);
    if !(f > 0.0 && f <= MAX_FILAMENT_MM) {
      errors.push(FieldError::new(
        "filament_class",
        format!("{filament_class} mm outside (0, {MAX_FILAMENT_MM}]"),
      ));
    }
    if quality > MAX_QUALITY {
      errors.push(FieldError::new("quality", format!("{quality} exceeds {MAX_QUALITY}")));
    }
    if errors.is_empty() {
      Ok(Self::catalog(diameter, filament_class, quality))
    } else {
      Err(Error::Validation(errors))
    }
  }

  pub fn diameter_mm(&self) -> f64 { self.diameter.to_f64().unwrap_or_default() }

  pub fn is_synthesized(&self) -> bool {
    self.origin == VariantOrigin::Synthesized
  }
}

/// The 1mm band a diameter falls into, clamped to 1..=8.
pub fn special_bucket(diameter_mm: f64) -> u8 {
  (diameter_mm.max(0.0).floor() as u8).saturating_add(1).clamp(1, 8)
}

// ─── Relation ────────────────────────────────────────────────────────────────

/// Declares that a finished product may be made from a raw-material variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRelation {
  pub finished_id:       Uuid,
  pub raw_material_code: String,
  /// 0 is the primary source; higher values are fallbacks.
  pub priority:          u8,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifecycle_transitions() {
    use ProductState::*;
    assert!(Draft.can_transition_to(Persisted));
    assert!(Persisted.can_transition_to(Updated));
    assert!(Updated.can_transition_to(Updated));
    assert!(Updated.can_transition_to(Deleted));
    assert!(!Deleted.can_transition_to(Updated));
    assert!(!Draft.can_transition_to(Updated));
    assert!(!Persisted.can_transition_to(Persisted));
  }

  #[test]
  fn checked_catalog_rejects_out_of_range_input() {
    let ok = RawMaterialVariant::checked_catalog(Decimal::new(240, 2), Decimal::new(600, 2), 1008)
      .unwrap();
    assert_eq!(ok.code, "YM.ST.0240.0600.1008");

    for diameter in [Decimal::MAX, Decimal::ZERO, Decimal::new(-240, 2), Decimal::new(801, 2)] {
      let err = RawMaterialVariant::checked_catalog(diameter, Decimal::new(600, 2), 1008)
        .unwrap_err();
      assert!(
        matches!(&err, Error::Validation(fields) if fields[0].field == "diameter"),
        "{diameter}: {err}"
      );
    }

    let err = RawMaterialVariant::checked_catalog(Decimal::new(240, 2), Decimal::MAX, 10_000)
      .unwrap_err();
    assert!(matches!(&err, Error::Validation(fields) if fields.len() == 2));
  }

  #[test]
  fn special_bucket_bands() {
    assert_eq!(special_bucket(0.77), 1);
    assert_eq!(special_bucket(2.40), 3);
    assert_eq!(special_bucket(7.60), 8);
    assert_eq!(special_bucket(9.10), 8);
  }
}
