//! Recipe (bill-of-process) types and the ERP export shape.
//!
//! A recipe set is always replaced as a whole; individual lines are never
//! patched in place.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Owner ───────────────────────────────────────────────────────────────────

/// Which tier of the hierarchy a recipe set belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
  Finished,
  Intermediate,
  RawMaterial,
}

impl OwnerKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Finished => "finished",
      Self::Intermediate => "intermediate",
      Self::RawMaterial => "raw_material",
    }
  }
}

impl fmt::Display for OwnerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Lines ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
  /// Material consumed per unit of the owner.
  Component,
  /// Machine time per unit of the owner.
  Operation,
}

impl LineKind {
  /// ERP single-letter line type.
  pub fn erp_code(self) -> &'static str {
    match self {
      Self::Component => "M",
      Self::Operation => "O",
    }
  }
}

/// One row of a bill-of-process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
  pub sequence_number: u16,
  pub kind:            LineKind,
  pub component_code:  String,
  /// Consumption (kg/kg, pcs/kg) or duration (min/kg), rounded to 6 decimals.
  pub quantity:        f64,
  pub unit:            String,
  pub description:     String,
  /// The component is itself a product with its own recipe.
  #[serde(default)]
  pub links_owner:     bool,
}

/// Round to the six decimals the ERP stores.
pub fn round6(value: f64) -> f64 { (value * 1_000_000.0).round() / 1_000_000.0 }

// ─── Sets ────────────────────────────────────────────────────────────────────

/// All recipe lines of a single owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSet {
  pub owner_kind: OwnerKind,
  pub owner_code: String,
  pub lines:      Vec<RecipeLine>,
}

impl RecipeSet {
  pub fn len(&self) -> usize { self.lines.len() }

  pub fn is_empty(&self) -> bool { self.lines.is_empty() }

  pub fn line(&self, component_code: &str) -> Option<&RecipeLine> {
    self.lines.iter().find(|l| l.component_code == component_code)
  }

  /// Flatten into the record shape the ERP importer expects.
  pub fn to_records(&self) -> Vec<RecipeRecord> {
    self
      .lines
      .iter()
      .map(|line| RecipeRecord {
        owner_code:        self.owner_code.clone(),
        total_recipe_flag: line.links_owner,
        scrap_rate:        0.0,
        unit:              OWNER_UNIT.to_owned(),
        sequence_number:   line.sequence_number,
        kind:              line.kind,
        component_code:    line.component_code.clone(),
        component_unit:    line.unit.clone(),
        quantity:          line.quantity,
        description:       line.description.clone(),
      })
      .collect()
  }
}

/// Every recipe owner is stocked by weight.
pub const OWNER_UNIT: &str = "KG";

/// The three recipe tiers of one finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSets {
  pub finished:      RecipeSet,
  pub intermediate:  RecipeSet,
  pub raw_materials: Vec<RecipeSet>,
}

impl RecipeSets {
  pub fn iter(&self) -> impl Iterator<Item = &RecipeSet> {
    [&self.finished, &self.intermediate]
      .into_iter()
      .chain(self.raw_materials.iter())
  }

  pub fn to_records(&self) -> Vec<RecipeRecord> {
    self.iter().flat_map(RecipeSet::to_records).collect()
  }
}

/// ERP import row. Field order matches the importer's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
  pub owner_code:        String,
  pub total_recipe_flag: bool,
  pub scrap_rate:        f64,
  pub unit:              String,
  pub sequence_number:   u16,
  pub kind:              LineKind,
  pub component_code:    String,
  pub component_unit:    String,
  pub quantity:          f64,
  pub description:       String,
}

// ─── Overrides ───────────────────────────────────────────────────────────────

/// A caller-supplied value that replaces one computed quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeOverride {
  pub owner:          OwnerKind,
  pub component_code: String,
  pub quantity:       f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round6_truncates_noise() {
    assert_eq!(round6(0.001_333_333_3), 0.001_333);
    assert_eq!(round6(1.000_000_49), 1.0);
    assert_eq!(round6(0.0), 0.0);
  }

  #[test]
  fn records_carry_owner_and_link_flag() {
    let set = RecipeSet {
      owner_kind: OwnerKind::Finished,
      owner_code: "GT.NIT.0250.00".into(),
      lines:      vec![RecipeLine {
        sequence_number: 1,
        kind:            LineKind::Component,
        component_code:  "YM.GT.NIT.0250.00".into(),
        quantity:        1.0,
        unit:            "KG".into(),
        description:     "intermediate".into(),
        links_owner:     true,
      }],
    };
    let records = set.to_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].owner_code, "GT.NIT.0250.00");
    assert!(records[0].total_recipe_flag);
    assert_eq!(records[0].unit, OWNER_UNIT);
    assert_eq!(records[0].kind.erp_code(), "M");
  }
}
