//! Hierarchical stock codes and descriptive names.
//!
//! Everything here is a pure function of `(spec, sequence)`. Codes follow the
//! ERP format `{FAMILY}.{COAT}.{DDDD}.{SS}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::spec::{ProductSpec, diameter_code};

pub const DEFAULT_FAMILY_TOKEN: &str = "GT";
pub const DEFAULT_INTERMEDIATE_TOKEN: &str = "YM.GT";

/// Stock code prefix for raw-material variants.
pub const RAW_MATERIAL_TOKEN: &str = "YM.ST";

/// Shape of raw-material codes; the selector fills the placeholders.
pub const RAW_MATERIAL_CODE_TEMPLATE: &str = "YM.ST.{DDDD}.{FFFF}.{QQQQ}";

// ─── Lookup tables ───────────────────────────────────────────────────────────

/// Customs tariff codes by diameter; `(inclusive upper bound, code)`.
const TARIFF_BRACKETS: &[(f64, &str)] = &[
  (1.5, "721720300011"),
  (6.0, "721720300012"),
  (f64::INFINITY, "721720300013"),
];

/// Shrink-film SKU by coil inner diameter (cm).
const PACKAGING_BY_COIL_INNER: &[(u16, &str)] = &[
  (45, "AMB.SHRINK.200*140CM"),
  (50, "AMB.SHRINK.200*160CM"),
  (55, "AMB.SHRINK.200*190CM"),
];

/// A customs tariff band; `band` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TariffBracket {
  pub band: u8,
  pub code: &'static str,
}

pub fn tariff_bracket(diameter_mm: f64) -> TariffBracket {
  let idx = TARIFF_BRACKETS
    .iter()
    .position(|(upper, _)| diameter_mm <= *upper)
    .unwrap_or(TARIFF_BRACKETS.len() - 1);
  TariffBracket { band: idx as u8 + 1, code: TARIFF_BRACKETS[idx].1 }
}

/// Shrink-film SKU for a coil; empty for sizes without a mapping.
pub fn packaging_material_code(coil_inner_cm: u16) -> &'static str {
  PACKAGING_BY_COIL_INNER
    .iter()
    .find(|(inner, _)| *inner == coil_inner_cm)
    .map(|(_, code)| *code)
    .unwrap_or("")
}

/// `YM.ST.{DDDD}.{FFFF}.{QQQQ}` for a concrete variant.
pub fn raw_material_code(diameter: Decimal, filament_class: Decimal, quality: u16) -> String {
  format!(
    "{RAW_MATERIAL_TOKEN}.{}.{}.{quality:04}",
    diameter_code(diameter),
    diameter_code(filament_class)
  )
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Every code and name derived for one finished product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCodes {
  pub finished_code:              String,
  pub intermediate_code:          String,
  pub raw_material_code_template: String,
  pub stock_name_tr:              String,
  pub stock_name_en:              String,
  pub intermediate_name_tr:       String,
  pub intermediate_name_en:       String,
  pub tariff_bracket:             String,
  pub packaging_material_code:    String,
}

#[derive(Debug, Clone)]
pub struct CodeGenerator {
  pub family_token:       String,
  pub intermediate_token: String,
}

impl Default for CodeGenerator {
  fn default() -> Self {
    Self {
      family_token:       DEFAULT_FAMILY_TOKEN.to_owned(),
      intermediate_token: DEFAULT_INTERMEDIATE_TOKEN.to_owned(),
    }
  }
}

impl CodeGenerator {
  pub fn new(family_token: impl Into<String>, intermediate_token: impl Into<String>) -> Self {
    Self {
      family_token:       family_token.into(),
      intermediate_token: intermediate_token.into(),
    }
  }

  /// `{FAMILY}.{COAT}.{DDDD}`, the part of the code shared by every
  /// sequence of the same spec key.
  pub fn prefix(&self, spec: &ProductSpec) -> String {
    format!(
      "{}.{}.{}",
      self.family_token,
      spec.coating_type.code(),
      diameter_code(spec.diameter)
    )
  }

  pub fn finished_code(&self, spec: &ProductSpec, sequence: u32) -> String {
    format!("{}.{sequence:02}", self.prefix(spec))
  }

  /// Swap the family token of a finished code for the intermediate token.
  pub fn intermediate_code(&self, finished_code: &str) -> String {
    match finished_code.strip_prefix(self.family_token.as_str()) {
      Some(rest) => format!("{}{rest}", self.intermediate_token),
      None => format!("{}.{finished_code}", self.intermediate_token),
    }
  }

  pub fn generate(&self, spec: &ProductSpec, sequence: u32) -> ProductCodes {
    let finished_code = self.finished_code(spec, sequence);
    let intermediate_code = self.intermediate_code(&finished_code);
    let (stock_name_tr, stock_name_en) = stock_names(spec);
    let (intermediate_name_tr, intermediate_name_en) = intermediate_names(spec);

    ProductCodes {
      finished_code,
      intermediate_code,
      raw_material_code_template: RAW_MATERIAL_CODE_TEMPLATE.to_owned(),
      stock_name_tr,
      stock_name_en,
      intermediate_name_tr,
      intermediate_name_en,
      tariff_bracket: tariff_bracket(spec.diameter_mm()).code.to_owned(),
      packaging_material_code: packaging_material_code(spec.coil.inner_cm).to_owned(),
    }
  }
}

/// [`CodeGenerator::generate`] with the default family tokens.
pub fn generate(spec: &ProductSpec, sequence: u32) -> ProductCodes {
  CodeGenerator::default().generate(spec, sequence)
}

// ─── Names ───────────────────────────────────────────────────────────────────

fn tr(d: Decimal) -> String { d.to_string().replace('.', ",") }

fn stock_names(spec: &ProductSpec) -> (String, String) {
  let c = spec.coating_amount.normalize();
  let w = spec.weight.normalize();
  let mut name_tr = format!(
    "Galvanizli Tel {} mm -{}/+{} {} gr/m² {}-{} MPa ID:{} cm OD:{} cm {} kg",
    tr(spec.diameter),
    tr(spec.tolerance_lower),
    tr(spec.tolerance_upper),
    tr(c),
    spec.min_tensile,
    spec.max_tensile,
    spec.coil.inner_cm,
    spec.coil.outer_cm,
    tr(w),
  );
  let mut name_en = format!(
    "Galvanized Wire {} mm -{}/+{} {} g/m2 {}-{} MPa ID:{} cm OD:{} cm {} kg",
    spec.diameter,
    spec.tolerance_lower,
    spec.tolerance_upper,
    c,
    spec.min_tensile,
    spec.max_tensile,
    spec.coil.inner_cm,
    spec.coil.outer_cm,
    w,
  );
  if spec.packaging.shrink {
    name_tr.push_str(" Shrink");
    name_en.push_str(" Shrink");
  }
  if spec.packaging.palletized {
    name_tr.push_str(" Paletli");
    name_en.push_str(" Palletized");
  }
  (name_tr, name_en)
}

fn intermediate_names(spec: &ProductSpec) -> (String, String) {
  let c = spec.coating_amount.normalize();
  (
    format!(
      "YM Galvanizli Tel {} mm -{}/+{} {} gr/m² {}-{} MPa",
      tr(spec.diameter),
      tr(spec.tolerance_lower),
      tr(spec.tolerance_upper),
      tr(c),
      spec.min_tensile,
      spec.max_tensile,
    ),
    format!(
      "Intermediate Galvanized Wire {} mm -{}/+{} {} g/m2 {}-{} MPa",
      spec.diameter,
      spec.tolerance_lower,
      spec.tolerance_upper,
      c,
      spec.min_tensile,
      spec.max_tensile,
    ),
  )
}
