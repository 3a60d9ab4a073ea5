//! Closed-form consumption and machine-time quantities for every recipe tier.
//!
//! All quantities are per kilogram of the owner and rounded to six decimals.

use std::f64::consts::PI;

use crate::{
  Error, Result,
  codegen::{ProductCodes, packaging_material_code},
  error::FieldError,
  product::RawMaterialVariant,
  recipe::{LineKind, OwnerKind, RecipeLine, RecipeOverride, RecipeSet, RecipeSets, round6},
  selector::{RodGrade, rod_band},
  spec::ProductSpec,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Steel density, g/cm³.
const STEEL_DENSITY: f64 = 7.85;
/// Zinc lost to ash per tonne, kg.
const ASH: f64 = 5.54;
/// Zinc lost to dross (lapa) per tonne, kg.
const LAPA: f64 = 2.73;
/// Acid consumed per m² of pickled surface, kg/1000.
const ACID_PER_SURFACE: f64 = 0.0647625;
const GALVANIZING_FACTOR: f64 = 1.159;

const STRAPPING_PER_COIL: f64 = 1.2;
const BUCKLES_PER_COIL: f64 = 4.0;
const RINGS_PER_COIL: f64 = 4.0;
const CARTON_PER_COIL: f64 = 8.0;
const SHRINK_PER_COIL: f64 = 1.0;
const PALLET_PER_COIL: f64 = 1.0;

/// Desiccant by exact coil weight; `(min kg, max kg, quantity)`.
const DESICCANT_BY_WEIGHT: &[(f64, f64, f64)] = &[
  (500.0, 500.0, 0.0020),
  (600.0, 600.0, 0.0017),
  (650.0, 650.0, 0.0015),
  (750.0, 800.0, 0.0013),
  (850.0, 850.0, 0.0012),
  (900.0, 900.0, 0.0011),
  (1100.0, 1100.0, 0.0009),
];

// ─── Component codes ─────────────────────────────────────────────────────────

pub mod components {
  pub const PACKAGING_OP: &str = "GTPKT01";
  pub const STRAPPING: &str = "AMB.CELIK.CEMBER";
  pub const BUCKLES: &str = "AMB.TOKA.SIGNODE";
  pub const LIFTING_RINGS: &str = "SM.7MMHALKA";
  pub const CARTON: &str = "AMB.KARTON.GAL";
  pub const DESICCANT: &str = "SM.DESI.PAK";
  pub const PALLET: &str = "AMB.PALET";
  /// Shrink film when the coil size has no mapped SKU.
  pub const FALLBACK_SHRINK: &str = "AMB.SHRINK.200*160CM";

  pub const GALVANIZING_OP: &str = "GLV01";
  pub const ZINC: &str = "150 03";
  pub const ACID: &str = "SM.HIDROLIK.ASIT";

  pub const WIRE_DRAWING_OP: &str = "TLC01";
}

pub mod units {
  pub const KG: &str = "KG";
  pub const PIECE: &str = "AD";
  pub const MINUTE: &str = "DK";
}

// ─── Formulas ────────────────────────────────────────────────────────────────

/// Wire surface per tonne, m².
pub fn surface_area(diameter_mm: f64) -> f64 {
  1000.0 * 4000.0 / PI / diameter_mm.powi(2) / STEEL_DENSITY * diameter_mm * PI / 1000.0
}

/// Zinc, kg per kg of coated wire.
pub fn zinc_consumption(diameter_mm: f64, coating_g_m2: f64) -> f64 {
  let coating = surface_area(diameter_mm) * coating_g_m2 / 1000.0;
  round6((coating + ASH * 0.6 + LAPA * 0.7) / 1000.0)
}

/// Pickling acid, kg per kg.
pub fn acid_consumption(diameter_mm: f64) -> f64 {
  round6(surface_area(diameter_mm) * ACID_PER_SURFACE / 1000.0)
}

/// Desiccant packs per kg; exact weight buckets first, then by diameter.
pub fn desiccant_consumption(diameter_mm: f64, weight_kg: f64) -> f64 {
  DESICCANT_BY_WEIGHT
    .iter()
    .find(|(lo, hi, _)| weight_kg >= *lo && weight_kg <= *hi)
    .map(|(_, _, q)| *q)
    .unwrap_or(if diameter_mm < 2.0 {
      0.0020
    } else if diameter_mm <= 4.0 {
      0.0013
    } else {
      0.0011
    })
}

/// Packaging line time, min per kg.
pub fn packaging_time(weight_kg: f64) -> f64 { round6(1000.0 / weight_kg * 10.0 / 1000.0) }

/// Galvanizing line time, min per kg.
pub fn galvanizing_time(diameter_mm: f64) -> f64 { round6(GALVANIZING_FACTOR / diameter_mm) }

/// Drawing time for a raw-material diameter, min per kg.
pub fn wire_drawing_time(diameter_mm: f64) -> f64 {
  round6(0.2 / diameter_mm.powf(1.7) + 0.02)
}

fn per_coil(coefficient: f64, weight_kg: f64) -> f64 {
  round6(coefficient * (1000.0 / weight_kg) / 1000.0)
}

/// Rod grades a variant may alternatively be drawn from: every grade of its
/// diameter band other than its own.
pub fn alternative_grades(variant: &RawMaterialVariant) -> Vec<RodGrade> {
  let own = RodGrade::of(variant);
  let band = rod_band(variant.diameter_mm());
  std::iter::once(band.primary)
    .chain(band.alternatives.iter().copied())
    .filter(|g| *g != own)
    .collect()
}

// ─── Cardinality ─────────────────────────────────────────────────────────────

pub const FINISHED_LINES: usize = 9;
pub const INTERMEDIATE_LINES: usize = 4;
pub const RAW_MATERIAL_BASE_LINES: usize = 2;

pub fn expected_raw_material_lines(variant: &RawMaterialVariant) -> usize {
  RAW_MATERIAL_BASE_LINES + alternative_grades(variant).len()
}

/// Fail with [`Error::CardinalityMismatch`] unless every set has exactly the
/// expected number of lines.
pub fn verify_cardinality(sets: &RecipeSets, variants: &[RawMaterialVariant]) -> Result<()> {
  let check = |owner, expected, actual| {
    if expected == actual {
      Ok(())
    } else {
      Err(Error::CardinalityMismatch { owner, expected, actual })
    }
  };
  check(OwnerKind::Finished, FINISHED_LINES, sets.finished.len())?;
  check(OwnerKind::Intermediate, INTERMEDIATE_LINES, sets.intermediate.len())?;
  check(OwnerKind::RawMaterial, variants.len(), sets.raw_materials.len())?;
  for (set, variant) in sets.raw_materials.iter().zip(variants) {
    check(OwnerKind::RawMaterial, expected_raw_material_lines(variant), set.len())?;
  }
  Ok(())
}

// ─── Calculation ─────────────────────────────────────────────────────────────

/// Compute all three recipe tiers. `variants` is the ordered selection; the
/// first entry feeds the intermediate product.
pub fn calculate(
  spec: &ProductSpec,
  codes: &ProductCodes,
  variants: &[RawMaterialVariant],
  overrides: &[RecipeOverride],
) -> Result<RecipeSets> {
  let primary = variants
    .first()
    .ok_or_else(|| Error::invalid("raw_materials", "at least one raw material is required"))?;

  let mut sets = RecipeSets {
    finished:      finished_recipe(spec, codes),
    intermediate:  intermediate_recipe(spec, codes, primary),
    raw_materials: variants.iter().map(raw_material_recipe).collect(),
  };
  apply_overrides(&mut sets, overrides)?;
  verify_cardinality(&sets, variants)?;
  Ok(sets)
}

fn finished_recipe(spec: &ProductSpec, codes: &ProductCodes) -> RecipeSet {
  let w = spec.weight_kg();
  let shrink_code = match packaging_material_code(spec.coil.inner_cm) {
    "" => components::FALLBACK_SHRINK,
    code => code,
  };
  let shrink = if spec.packaging.shrink { per_coil(SHRINK_PER_COIL, w) } else { 0.0 };
  let pallet = if spec.packaging.palletized { per_coil(PALLET_PER_COIL, w) } else { 0.0 };

  let mut b = SetBuilder::new(OwnerKind::Finished, &codes.finished_code);
  b.link(&codes.intermediate_code, "Ara mamul");
  b.operation(components::PACKAGING_OP, packaging_time(w), "Paketleme");
  b.component(components::STRAPPING, units::KG, per_coil(STRAPPING_PER_COIL, w), "Çelik çember");
  b.component(components::BUCKLES, units::PIECE, per_coil(BUCKLES_PER_COIL, w), "Çember tokası");
  b.component(components::LIFTING_RINGS, units::PIECE, per_coil(RINGS_PER_COIL, w), "Kaldırma halkası");
  b.component(components::CARTON, units::PIECE, per_coil(CARTON_PER_COIL, w), "Karton");
  b.component(shrink_code, units::PIECE, shrink, "Shrink");
  b.component(
    components::DESICCANT,
    units::PIECE,
    desiccant_consumption(spec.diameter_mm(), w),
    "Silika jel",
  );
  b.component(components::PALLET, units::PIECE, pallet, "Palet");
  b.finish()
}

fn intermediate_recipe(
  spec: &ProductSpec,
  codes: &ProductCodes,
  primary: &RawMaterialVariant,
) -> RecipeSet {
  let d = spec.diameter_mm();
  let mut b = SetBuilder::new(OwnerKind::Intermediate, &codes.intermediate_code);
  b.link(&primary.code, "Hammadde");
  b.operation(components::GALVANIZING_OP, galvanizing_time(d), "Galvanizleme");
  b.component(
    components::ZINC,
    units::KG,
    zinc_consumption(d, spec.coating_g_m2()),
    "Çinko",
  );
  b.component(components::ACID, units::KG, acid_consumption(d), "Asit");
  b.finish()
}

fn raw_material_recipe(variant: &RawMaterialVariant) -> RecipeSet {
  let mut b = SetBuilder::new(OwnerKind::RawMaterial, &variant.code);
  b.component(&RodGrade::of(variant).stock_code(), units::KG, 1.0, "Filmaşin");
  b.operation(
    components::WIRE_DRAWING_OP,
    wire_drawing_time(variant.diameter_mm()),
    "Tel çekme",
  );
  for grade in alternative_grades(variant) {
    b.component(&grade.stock_code(), units::KG, 1.0, "Alternatif filmaşin");
  }
  b.finish()
}

fn apply_overrides(sets: &mut RecipeSets, overrides: &[RecipeOverride]) -> Result<()> {
  let mut errors = Vec::new();
  for o in overrides {
    if !o.quantity.is_finite() || o.quantity < 0.0 {
      errors.push(FieldError::new(
        "overrides",
        format!("{} {}: quantity must be a non-negative number", o.owner, o.component_code),
      ));
      continue;
    }
    let targets: Vec<&mut RecipeSet> = match o.owner {
      OwnerKind::Finished => vec![&mut sets.finished],
      OwnerKind::Intermediate => vec![&mut sets.intermediate],
      OwnerKind::RawMaterial => sets.raw_materials.iter_mut().collect(),
    };
    let mut hit = false;
    for set in targets {
      for line in set.lines.iter_mut().filter(|l| l.component_code == o.component_code) {
        line.quantity = round6(o.quantity);
        hit = true;
      }
    }
    if !hit {
      errors.push(FieldError::new(
        "overrides",
        format!("{} recipe has no line {}", o.owner, o.component_code),
      ));
    }
  }
  if errors.is_empty() { Ok(()) } else { Err(Error::Validation(errors)) }
}

struct SetBuilder {
  set: RecipeSet,
}

impl SetBuilder {
  fn new(owner_kind: OwnerKind, owner_code: &str) -> Self {
    Self {
      set: RecipeSet { owner_kind, owner_code: owner_code.to_owned(), lines: Vec::new() },
    }
  }

  fn push(
    &mut self,
    kind: LineKind,
    code: &str,
    unit: &str,
    quantity: f64,
    description: &str,
    links_owner: bool,
  ) {
    let sequence_number = self.set.lines.len() as u16 + 1;
    self.set.lines.push(RecipeLine {
      sequence_number,
      kind,
      component_code: code.to_owned(),
      quantity: round6(quantity),
      unit: unit.to_owned(),
      description: description.to_owned(),
      links_owner,
    });
  }

  fn link(&mut self, code: &str, desc: &str) {
    self.push(LineKind::Component, code, units::KG, 1.0, desc, true);
  }

  fn component(&mut self, code: &str, unit: &str, quantity: f64, desc: &str) {
    self.push(LineKind::Component, code, unit, quantity, desc, false);
  }

  fn operation(&mut self, code: &str, minutes: f64, desc: &str) {
    self.push(LineKind::Operation, code, units::MINUTE, minutes, desc, false);
  }

  fn finish(self) -> RecipeSet { self.set }
}

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;
  use crate::{
    codegen::generate,
    normalize::normalize,
    selector::synthesize,
    spec::fields,
    testing::{catalog_variant, scenario_raw, scenario_spec, spec_with},
  };

  fn scenario_sets() -> (RecipeSets, Vec<RawMaterialVariant>) {
    let spec = scenario_spec();
    let variants = vec![catalog_variant(dec!(2.40), 600, 1008)];
    let sets = calculate(&spec, &generate(&spec, 0), &variants, &[]).unwrap();
    (sets, variants)
  }

  #[test]
  fn scenario_desiccant_comes_from_weight_bucket() {
    let (sets, _) = scenario_sets();
    assert_eq!(sets.finished.line(components::DESICCANT).unwrap().quantity, 0.0013);
  }

  #[test]
  fn desiccant_falls_back_to_diameter() {
    assert_eq!(desiccant_consumption(1.2, 700.0), 0.0020);
    assert_eq!(desiccant_consumption(2.0, 700.0), 0.0013);
    assert_eq!(desiccant_consumption(4.0, 700.0), 0.0013);
    assert_eq!(desiccant_consumption(4.5, 700.0), 0.0011);
    assert_eq!(desiccant_consumption(4.5, 800.0), 0.0013);
    assert_eq!(desiccant_consumption(4.5, 1100.0), 0.0009);
  }

  #[test]
  fn scenario_cardinalities() {
    let (sets, variants) = scenario_sets();
    assert_eq!(sets.finished.len(), 9);
    assert_eq!(sets.intermediate.len(), 4);
    // 2.40 mm sits in the 1.5..2.5 band: 6.00/1006 primary, 5.50/1006 and
    // 6.00/1008 alternatives; the variant's own 6.00/1008 is excluded.
    assert_eq!(sets.raw_materials[0].len(), 4);
    assert_eq!(expected_raw_material_lines(&variants[0]), 4);
    assert!(sets.raw_materials[0].line("FLM.0600.1008").is_some());
    assert!(sets.raw_materials[0].line("FLM.0600.1006").is_some());
  }

  #[test]
  fn top_band_has_no_alternatives() {
    let spec = spec_with("7.50", "PAD");
    let v = synthesize(&spec);
    let sets = calculate(&spec, &generate(&spec, 0), &[v], &[]).unwrap();
    assert_eq!(sets.raw_materials[0].len(), RAW_MATERIAL_BASE_LINES);
  }

  #[test]
  fn lines_are_linked_and_numbered() {
    let (sets, _) = scenario_sets();
    let first = &sets.finished.lines[0];
    assert_eq!(first.component_code, "YM.GT.NIT.0250.00");
    assert!(first.links_owner);
    assert_eq!(sets.intermediate.lines[0].component_code, "YM.ST.0240.0600.1008");
    let numbers: Vec<_> = sets.finished.lines.iter().map(|l| l.sequence_number).collect();
    assert_eq!(numbers, (1..=9).collect::<Vec<u16>>());
    assert_eq!(sets.finished.lines[1].kind, LineKind::Operation);
  }

  #[test]
  fn packaging_flags_zero_their_lines() {
    let (sets, _) = scenario_sets();
    assert!(sets.finished.line("AMB.SHRINK.200*140CM").unwrap().quantity > 0.0);
    assert_eq!(sets.finished.line(components::PALLET).unwrap().quantity, 0.0);

    let spec = normalize(
      &scenario_raw()
        .with(fields::SHRINK, false)
        .with(fields::PALLETIZED, true),
    )
    .unwrap();
    let v = vec![catalog_variant(dec!(2.40), 600, 1008)];
    let sets = calculate(&spec, &generate(&spec, 0), &v, &[]).unwrap();
    assert_eq!(sets.finished.len(), 9);
    assert_eq!(sets.finished.line("AMB.SHRINK.200*140CM").unwrap().quantity, 0.0);
    assert_eq!(sets.finished.line(components::PALLET).unwrap().quantity, 0.001333);
  }

  #[test]
  fn zinc_is_non_negative_and_monotone_in_coating() {
    for d in [0.8, 1.5, 2.5, 4.0, 8.0] {
      let mut last = 0.0;
      for c in (10..=400).step_by(10) {
        let z = zinc_consumption(d, f64::from(c));
        assert!(z >= 0.0);
        assert!(z >= last, "zinc decreased at d={d} c={c}");
        last = z;
      }
    }
  }

  #[test]
  fn scenario_formulas() {
    assert_eq!(zinc_consumption(2.5, 120.0), 0.029694);
    assert_eq!(galvanizing_time(2.5), 0.4636);
    assert_eq!(packaging_time(750.0), 0.013333);
    assert_eq!(per_coil(STRAPPING_PER_COIL, 750.0), 0.0016);
    assert!((acid_consumption(2.5) - 0.0132).abs() < 1e-4);
  }

  #[test]
  fn override_replaces_value_not_cardinality() {
    let spec = scenario_spec();
    let v = vec![catalog_variant(dec!(2.40), 600, 1008)];
    let overrides = vec![RecipeOverride {
      owner:          OwnerKind::Intermediate,
      component_code: components::ZINC.to_owned(),
      quantity:       0.031,
    }];
    let sets = calculate(&spec, &generate(&spec, 0), &v, &overrides).unwrap();
    assert_eq!(sets.intermediate.len(), 4);
    assert_eq!(sets.intermediate.line(components::ZINC).unwrap().quantity, 0.031);
  }

  #[test]
  fn override_for_missing_line_is_rejected() {
    let spec = scenario_spec();
    let v = vec![catalog_variant(dec!(2.40), 600, 1008)];
    let overrides = vec![RecipeOverride {
      owner:          OwnerKind::Finished,
      component_code: components::ZINC.to_owned(),
      quantity:       0.031,
    }];
    let err = calculate(&spec, &generate(&spec, 0), &v, &overrides).unwrap_err();
    assert!(matches!(err, Error::Validation(ref e) if e[0].field == "overrides"));
  }

  #[test]
  fn tampered_set_fails_cardinality() {
    let (mut sets, variants) = scenario_sets();
    sets.intermediate.lines.pop();
    let err = verify_cardinality(&sets, &variants).unwrap_err();
    assert!(matches!(
      err,
      Error::CardinalityMismatch { owner: OwnerKind::Intermediate, expected: 4, actual: 3 }
    ));
  }
}
