//! Raw-material auto-selection.
//!
//! Tiers are evaluated in order and the first one that yields anything wins:
//!
//! 1. exact lookup of known historical product families,
//! 2. catalog search inside the coating's diameter window, filtered by the
//!    band's filament class and quality,
//! 3. nearest catalog diameters regardless of class and quality,
//! 4. synthesis of a new, not-yet-persisted variant.

use std::{collections::HashSet, fmt, sync::Arc};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Result,
  codegen::{CodeGenerator, raw_material_code},
  product::{RawMaterialVariant, VariantOrigin, special_bucket},
  spec::{CoatingType, ProductSpec, diameter_hundredths},
  store::Catalog,
};

// ─── Rod bands ───────────────────────────────────────────────────────────────

/// A wire-rod filament class and steel quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RodGrade {
  /// Filament diameter × 100.
  pub filament_hundredths: u16,
  pub quality:             u16,
}

impl RodGrade {
  const fn new(filament_hundredths: u16, quality: u16) -> Self {
    Self { filament_hundredths, quality }
  }

  /// The grade a variant was drawn from.
  pub fn of(variant: &RawMaterialVariant) -> Self {
    Self {
      filament_hundredths: diameter_hundredths(variant.filament_class) as u16,
      quality:             variant.quality,
    }
  }

  pub fn filament_class(self) -> Decimal {
    Decimal::new(i64::from(self.filament_hundredths), 2)
  }

  /// Stock code of the rod itself, e.g. `FLM.0600.1006`.
  pub fn stock_code(self) -> String {
    format!("FLM.{:04}.{:04}", self.filament_hundredths, self.quality)
  }

  pub fn matches(self, variant: &RawMaterialVariant) -> bool {
    variant.filament_class == self.filament_class() && variant.quality == self.quality
  }
}

/// Rod grades applicable below a diameter bound.
#[derive(Debug)]
pub struct RodBand {
  /// Exclusive upper bound in mm.
  pub below:        f64,
  pub primary:      RodGrade,
  pub alternatives: &'static [RodGrade],
}

/// Evaluated in order; the first band whose bound exceeds the diameter wins.
pub const ROD_BANDS: &[RodBand] = &[
  RodBand {
    below:        1.5,
    primary:      RodGrade::new(550, 1006),
    alternatives: &[RodGrade::new(550, 1008)],
  },
  RodBand {
    below:        2.5,
    primary:      RodGrade::new(600, 1006),
    alternatives: &[RodGrade::new(550, 1006), RodGrade::new(600, 1008)],
  },
  RodBand {
    below:        4.5,
    primary:      RodGrade::new(600, 1008),
    alternatives: &[RodGrade::new(700, 1008)],
  },
  RodBand {
    below:        6.0,
    primary:      RodGrade::new(700, 1010),
    alternatives: &[RodGrade::new(800, 1010)],
  },
  RodBand {
    below:        f64::INFINITY,
    primary:      RodGrade::new(900, 1010),
    alternatives: &[],
  },
];

pub fn rod_band(diameter_mm: f64) -> &'static RodBand {
  ROD_BANDS
    .iter()
    .find(|band| diameter_mm < band.below)
    .unwrap_or(&ROD_BANDS[ROD_BANDS.len() - 1])
}

// ─── Diameter window ─────────────────────────────────────────────────────────

/// Slack added to float bounds handed to the catalog; results are then
/// re-checked against the exact decimal window.
const QUERY_SLACK_MM: f64 = 1e-6;

/// Acceptable raw-material diameters; coating makes the wire thicker, so the
/// raw material is always thinner than the finished product. Bounds are
/// inclusive and exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiameterWindow {
  pub min: Decimal,
  pub max: Decimal,
}

impl DiameterWindow {
  pub fn contains(&self, diameter: Decimal) -> bool {
    diameter >= self.min && diameter <= self.max
  }

  pub fn midpoint(&self) -> Decimal { (self.min + self.max) / Decimal::TWO }

  pub fn midpoint_mm(&self) -> f64 { self.midpoint().to_f64().unwrap_or_default() }

  /// Float bounds for a catalog query, widened by [`QUERY_SLACK_MM`].
  fn query_bounds(&self) -> (f64, f64) {
    (
      self.min.to_f64().unwrap_or_default() - QUERY_SLACK_MM,
      self.max.to_f64().unwrap_or_default() + QUERY_SLACK_MM,
    )
  }
}

/// Window ratios per coating, in thousandths.
fn window_ratios(coating: CoatingType) -> (Decimal, Decimal) {
  match coating {
    CoatingType::Nit => (Decimal::new(935, 3), Decimal::new(995, 3)),
    CoatingType::Pad => (Decimal::new(950, 3), Decimal::new(980, 3)),
  }
}

pub fn diameter_window(coating: CoatingType, diameter: Decimal) -> DiameterWindow {
  let (lo, hi) = window_ratios(coating);
  DiameterWindow { min: diameter * lo, max: diameter * hi }
}

/// Single target diameter for the nearest-diameter fallback.
pub fn nearest_target(coating: CoatingType, diameter_mm: f64) -> f64 {
  match coating {
    CoatingType::Nit => diameter_mm * 0.96,
    CoatingType::Pad => diameter_mm,
  }
}

/// Whether an existing variant can still feed a product made to `spec`.
pub fn is_compatible(spec: &ProductSpec, variant: &RawMaterialVariant) -> bool {
  diameter_window(spec.coating_type, spec.diameter).contains(variant.diameter)
}

// ─── Historical families ─────────────────────────────────────────────────────

/// Finished-code prefix → raw-material code for product families whose raw
/// material was fixed before automatic selection existed.
const HISTORICAL_RAW_MATERIALS: &[(&str, &str)] = &[
  ("GT.NIT.0180", "YM.ST.0173.0600.1006"),
  ("GT.NIT.0250", "YM.ST.0240.0600.1008"),
  ("GT.NIT.0300", "YM.ST.0288.0600.1008"),
  ("GT.PAD.0400", "YM.ST.0385.0600.1008"),
  ("GT.PAD.0500", "YM.ST.0480.0700.1010"),
];

pub fn historical_raw_material(prefix: &str) -> Option<&'static str> {
  HISTORICAL_RAW_MATERIALS
    .iter()
    .find(|(p, _)| *p == prefix)
    .map(|(_, code)| *code)
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
  ExactTable,
  DiameterWindow,
  NearestDiameter,
  Synthesized,
  /// Existing relations kept on update.
  Reused,
}

impl fmt::Display for SelectionTier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::ExactTable => "exact_table",
      Self::DiameterWindow => "diameter_window",
      Self::NearestDiameter => "nearest_diameter",
      Self::Synthesized => "synthesized",
      Self::Reused => "reused",
    })
  }
}

/// Ordered, de-duplicated, never empty. The first variant is the primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
  pub tier:     SelectionTier,
  pub variants: Vec<RawMaterialVariant>,
}

impl Selection {
  pub fn primary(&self) -> Option<&RawMaterialVariant> { self.variants.first() }
}

pub struct RawMaterialSelector<C> {
  catalog:                  Arc<C>,
  codes:                    CodeGenerator,
  max_results:              usize,
  nearest_max_deviation_mm: f64,
}

impl<C: Catalog> RawMaterialSelector<C> {
  pub fn new(
    catalog: Arc<C>,
    codes: CodeGenerator,
    max_results: usize,
    nearest_max_deviation_mm: f64,
  ) -> Self {
    Self { catalog, codes, max_results: max_results.max(1), nearest_max_deviation_mm }
  }

  pub async fn select(&self, spec: &ProductSpec) -> Result<Selection> {
    let d = spec.diameter_mm();
    let prefix = self.codes.prefix(spec);

    if let Some(code) = historical_raw_material(&prefix) {
      match self.catalog.find_raw_material_by_code(code).await.map_err(Error::store)? {
        Some(variant) => {
          debug!(%prefix, code, "raw material from historical table");
          return Ok(finish(SelectionTier::ExactTable, vec![variant]));
        }
        None => debug!(%prefix, code, "historical raw material missing from catalog"),
      }
    }

    let window = diameter_window(spec.coating_type, spec.diameter);
    let grade = rod_band(d).primary;
    let (min, max) = window.query_bounds();
    let mut in_window = self
      .catalog
      .find_raw_materials_by_diameter_window(
        min,
        max,
        Some(grade.filament_class()),
        Some(grade.quality),
      )
      .await
      .map_err(Error::store)?;
    in_window.retain(|v| window.contains(v.diameter));
    if !in_window.is_empty() {
      sort_by_distance(&mut in_window, window.midpoint_mm());
      in_window.truncate(self.max_results);
      debug!(%prefix, count = in_window.len(), "raw materials from diameter window");
      return Ok(finish(SelectionTier::DiameterWindow, in_window));
    }

    let target = nearest_target(spec.coating_type, d);
    let mut nearest = if self.nearest_max_deviation_mm.is_finite() {
      self
        .catalog
        .find_raw_materials_by_diameter_window(
          (target - self.nearest_max_deviation_mm).max(0.0),
          target + self.nearest_max_deviation_mm,
          None,
          None,
        )
        .await
    } else {
      self.catalog.list_raw_materials().await
    }
    .map_err(Error::store)?;
    if !nearest.is_empty() {
      sort_by_distance(&mut nearest, target);
      nearest.truncate(self.max_results);
      debug!(%prefix, target, count = nearest.len(), "raw materials by nearest diameter");
      return Ok(finish(SelectionTier::NearestDiameter, nearest));
    }

    let variant = synthesize(spec);
    debug!(%prefix, code = %variant.code, "no catalog match; synthesized raw material");
    Ok(finish(SelectionTier::Synthesized, vec![variant]))
  }
}

/// Build an in-memory variant at the centre of the spec's diameter window.
pub fn synthesize(spec: &ProductSpec) -> RawMaterialVariant {
  let window = diameter_window(spec.coating_type, spec.diameter);
  let grade = rod_band(spec.diameter_mm()).primary;

  let mut diameter = window.midpoint().round_dp(2);
  diameter.rescale(2);
  let filament_class = grade.filament_class();

  RawMaterialVariant {
    code: raw_material_code(diameter, filament_class, grade.quality),
    special_bucket: special_bucket(window.midpoint_mm()),
    diameter,
    filament_class,
    quality: grade.quality,
    origin: VariantOrigin::Synthesized,
  }
}

fn sort_by_distance(variants: &mut [RawMaterialVariant], target: f64) {
  variants.sort_by(|a, b| {
    (a.diameter_mm() - target)
      .abs()
      .total_cmp(&(b.diameter_mm() - target).abs())
      .then_with(|| a.code.cmp(&b.code))
  });
}

fn finish(tier: SelectionTier, variants: Vec<RawMaterialVariant>) -> Selection {
  let mut seen = HashSet::new();
  let variants = variants
    .into_iter()
    .filter(|v| seen.insert(v.code.clone()))
    .collect();
  Selection { tier, variants }
}

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;
  use crate::testing::{MemoryCatalog, catalog_variant, scenario_spec, spec_with};

  fn selector(catalog: MemoryCatalog) -> RawMaterialSelector<MemoryCatalog> {
    RawMaterialSelector::new(Arc::new(catalog), CodeGenerator::default(), 3, 0.5)
  }

  #[test]
  fn windows_match_business_constants() {
    let a = diameter_window(CoatingType::Nit, dec!(2.00));
    assert_eq!((a.min, a.max), (dec!(1.87), dec!(1.99)));
    let b = diameter_window(CoatingType::Pad, dec!(2.00));
    assert_eq!((b.min, b.max), (dec!(1.90), dec!(1.96)));
  }

  #[test]
  fn window_bounds_are_inclusive_and_exact() {
    let w = diameter_window(CoatingType::Pad, dec!(3.50));
    assert_eq!(w.max, dec!(3.43));
    assert!(w.contains(dec!(3.43)));
    assert!(!w.contains(dec!(3.44)));
    assert!(diameter_window(CoatingType::Pad, dec!(7.00)).contains(dec!(6.86)));
  }

  #[tokio::test]
  async fn tier2_accepts_variant_on_window_bound() {
    for (d, on_bound, filament, quality) in
      [("3.50", dec!(3.43), 600, 1008), ("7.00", dec!(6.86), 900, 1010)]
    {
      let spec = spec_with(d, "PAD");
      let variant = catalog_variant(on_bound, filament, quality);
      assert!(is_compatible(&spec, &variant), "{d}: {on_bound} should be compatible");
      let sel = selector(MemoryCatalog::with(vec![variant.clone()]))
        .select(&spec)
        .await
        .unwrap();
      assert_eq!(sel.tier, SelectionTier::DiameterWindow, "{d}");
      assert_eq!(sel.variants, vec![variant]);
    }
  }

  #[test]
  fn band_table_is_ordered() {
    assert_eq!(rod_band(1.2).primary.stock_code(), "FLM.0550.1006");
    assert_eq!(rod_band(1.5).primary.stock_code(), "FLM.0600.1006");
    assert_eq!(rod_band(2.5).primary.stock_code(), "FLM.0600.1008");
    assert_eq!(rod_band(5.0).primary.stock_code(), "FLM.0700.1010");
    assert_eq!(rod_band(7.9).primary.stock_code(), "FLM.0900.1010");
    assert!(rod_band(7.9).alternatives.is_empty());
  }

  #[tokio::test]
  async fn tier1_uses_historical_code_when_present() {
    let historical = catalog_variant(dec!(2.40), 600, 1008);
    assert_eq!(historical.code, "YM.ST.0240.0600.1008");
    let sel = selector(MemoryCatalog::with(vec![
      historical.clone(),
      catalog_variant(dec!(2.42), 600, 1008),
    ]))
    .select(&scenario_spec())
    .await
    .unwrap();
    assert_eq!(sel.tier, SelectionTier::ExactTable);
    assert_eq!(sel.variants, vec![historical]);
  }

  #[tokio::test]
  async fn tier2_filters_by_window_and_grade_closest_first() {
    // 3.00 NIT: window [2.805, 2.985], midpoint 2.895, grade 6.00/1008.
    let sel = selector(MemoryCatalog::with(vec![
      catalog_variant(dec!(2.81), 600, 1008),
      catalog_variant(dec!(2.90), 600, 1008),
      catalog_variant(dec!(2.95), 600, 1008),
      catalog_variant(dec!(2.89), 600, 1008),
      catalog_variant(dec!(2.90), 700, 1008),
      catalog_variant(dec!(3.10), 600, 1008),
    ]))
    .select(&spec_with("3.10", "NIT"))
    .await
    .unwrap();
    // 3.10 NIT: window [2.8985, 3.0845], midpoint 2.9915.
    assert_eq!(sel.tier, SelectionTier::DiameterWindow);
    let codes: Vec<_> = sel.variants.iter().map(|v| v.code.as_str()).collect();
    assert_eq!(codes, vec!["YM.ST.0295.0600.1008", "YM.ST.0290.0600.1008"]);
  }

  #[tokio::test]
  async fn tier2_caps_results() {
    // 3.00 PAD: window [2.85, 2.94], midpoint 2.895.
    let sel = selector(MemoryCatalog::with(vec![
      catalog_variant(dec!(2.82), 600, 1008),
      catalog_variant(dec!(2.87), 600, 1008),
      catalog_variant(dec!(2.89), 600, 1008),
      catalog_variant(dec!(2.91), 600, 1008),
      catalog_variant(dec!(2.93), 600, 1008),
    ]))
    .select(&spec_with("3.00", "PAD"))
    .await
    .unwrap();
    assert_eq!(sel.tier, SelectionTier::DiameterWindow);
    let diameters: Vec<_> = sel.variants.iter().map(|v| v.diameter).collect();
    assert_eq!(diameters, vec![dec!(2.89), dec!(2.91), dec!(2.87)]);
  }

  #[tokio::test]
  async fn tier3_ignores_grade() {
    let sel = selector(MemoryCatalog::with(vec![
      catalog_variant(dec!(3.30), 550, 1006),
      catalog_variant(dec!(3.00), 700, 1010),
      catalog_variant(dec!(3.60), 700, 1010),
      catalog_variant(dec!(3.40), 550, 1006),
    ]))
    .select(&spec_with("3.50", "NIT"))
    .await
    .unwrap();
    // target 3.36; window [3.2725, 3.4825] holds only wrong-grade variants.
    assert_eq!(sel.tier, SelectionTier::NearestDiameter);
    let diameters: Vec<_> = sel.variants.iter().map(|v| v.diameter).collect();
    assert_eq!(diameters, vec![dec!(3.40), dec!(3.30), dec!(3.60)]);
  }

  #[tokio::test]
  async fn empty_catalog_synthesizes_inside_window() {
    for (d, coating) in [("0.80", "NIT"), ("2.50", "NIT"), ("4.00", "NIT"), ("0.80", "PAD"), ("7.95", "PAD")] {
      let spec = spec_with(d, coating);
      let sel = selector(MemoryCatalog::default()).select(&spec).await.unwrap();
      assert_eq!(sel.tier, SelectionTier::Synthesized);
      assert_eq!(sel.variants.len(), 1);
      let v = sel.primary().unwrap();
      assert!(v.is_synthesized());
      assert!(is_compatible(&spec, v), "{d} {coating}: {} outside window", v.diameter);
      assert!((1..=8).contains(&v.special_bucket));
    }
  }

  #[tokio::test]
  async fn synthesized_code_is_derived_from_grade() {
    let v = synthesize(&spec_with("2.00", "NIT"));
    // window [1.87, 1.99], band 6.00/1006.
    assert_eq!(v.code, "YM.ST.0193.0600.1006");
    assert_eq!(v.special_bucket, 2);
    assert_eq!(RodGrade::of(&v), rod_band(2.0).primary);
  }

  #[tokio::test]
  async fn unbounded_tier3_reaches_far_variants() {
    let far = catalog_variant(dec!(1.20), 550, 1006);
    let catalog = MemoryCatalog::with(vec![far.clone()]);
    let spec = spec_with("3.50", "NIT");

    let bounded = selector(catalog).select(&spec).await.unwrap();
    assert_eq!(bounded.tier, SelectionTier::Synthesized);

    let unbounded = RawMaterialSelector::new(
      Arc::new(MemoryCatalog::with(vec![far.clone()])),
      CodeGenerator::default(),
      3,
      f64::INFINITY,
    )
    .select(&spec)
    .await
    .unwrap();
    assert_eq!(unbounded.tier, SelectionTier::NearestDiameter);
    assert_eq!(unbounded.variants, vec![far]);
  }

  #[test]
  fn empty_selection_has_no_primary() {
    let sel = Selection { tier: SelectionTier::Reused, variants: Vec::new() };
    assert!(sel.primary().is_none());
  }

  #[test]
  fn finish_deduplicates_by_code() {
    let a = catalog_variant(dec!(2.40), 600, 1008);
    let sel = finish(SelectionTier::NearestDiameter, vec![a.clone(), a.clone()]);
    assert_eq!(sel.variants, vec![a]);
  }
}
