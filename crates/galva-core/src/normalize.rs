//! Spec normalization: the single source of truth for "is this spec legal".
//!
//! Every field is parsed and range-checked independently so that a single call
//! reports all problems at once. Cross-field rules run only once the fields
//! they depend on parsed cleanly.

use std::str::FromStr;

use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
  Error, Result,
  error::FieldError,
  spec::{
    CoatingType, CoilGeometry, PackagingFlags, ProductSpec, RawSpec,
    VALID_COIL_PAIRS, fields,
  },
};

// ─── Rule tables ─────────────────────────────────────────────────────────────

/// Global diameter limits in mm.
pub const DIAMETER_RANGE: (f64, f64) = (0.8, 8.0);

/// Per-coating diameter limits in mm.
const COATING_DIAMETER_RANGES: &[(CoatingType, f64, f64)] = &[
  (CoatingType::Nit, 0.8, 4.0),
  (CoatingType::Pad, 0.8, 8.0),
];

/// Type A coating-amount ceilings by diameter sub-range: `(below, ceiling)`.
/// The last row applies to everything above the previous bounds.
const NIT_COATING_CEILINGS: &[(f64, f64)] =
  &[(1.5, 150.0), (2.5, 200.0), (f64::INFINITY, 250.0)];

const NIT_COATING_MIN: f64 = 10.0;
const PAD_COATING_RANGE: (f64, f64) = (50.0, 400.0);

const TENSILE_RANGE: (u32, u32) = (350, 1100);
const TOLERANCE_MAX: f64 = 0.5;
const WEIGHT_RANGE: (f64, f64) = (100.0, 3000.0);
const CUSTOM_COIL_INNER_RANGE: (u16, u16) = (20, 100);

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Validate and coerce `raw` into a [`ProductSpec`].
///
/// Returns [`Error::Validation`] listing every failing field; never returns a
/// partially populated spec.
pub fn normalize(raw: &RawSpec) -> Result<ProductSpec> {
  let mut errors = Vec::new();

  let coating_type = required(raw, fields::COATING_TYPE, &mut errors)
    .and_then(|v| match text(v).parse::<CoatingType>() {
      Ok(c) => Some(c),
      Err(msg) => {
        errors.push(FieldError::new(fields::COATING_TYPE, msg));
        None
      }
    });

  let diameter = decimal_field(raw, fields::DIAMETER, true, &mut errors)
    .and_then(|d| check_diameter(d, coating_type, &mut errors));

  let coating_amount =
    decimal_field(raw, fields::COATING_AMOUNT, true, &mut errors).and_then(|c| {
      check_coating(c, coating_type, diameter, &mut errors)
    });

  let min_tensile = tensile_field(raw, fields::MIN_TENSILE, &mut errors);
  let max_tensile = tensile_field(raw, fields::MAX_TENSILE, &mut errors);
  if let (Some(lo), Some(hi)) = (min_tensile, max_tensile)
    && lo > hi
  {
    errors.push(FieldError::new(
      fields::MIN_TENSILE,
      format!("min tensile {lo} exceeds max tensile {hi}"),
    ));
  }

  let tolerance_lower = tolerance_field(raw, fields::TOLERANCE_LOWER, &mut errors);
  let tolerance_upper = tolerance_field(raw, fields::TOLERANCE_UPPER, &mut errors);

  let coil = coil_field(raw, &mut errors);

  let weight = decimal_field(raw, fields::WEIGHT, true, &mut errors).and_then(|w| {
    let kg = w.to_f64().unwrap_or_default();
    if kg < WEIGHT_RANGE.0 || kg > WEIGHT_RANGE.1 {
      errors.push(FieldError::new(
        fields::WEIGHT,
        format!(
          "{w} kg outside [{}, {}]",
          WEIGHT_RANGE.0, WEIGHT_RANGE.1
        ),
      ));
      None
    } else {
      Some(w)
    }
  });

  let defaults = PackagingFlags::default();
  let shrink = flag_field(raw, fields::SHRINK, defaults.shrink, &mut errors);
  let palletized =
    flag_field(raw, fields::PALLETIZED, defaults.palletized, &mut errors);

  match (
    diameter,
    coating_type,
    coating_amount,
    min_tensile,
    max_tensile,
    tolerance_lower,
    tolerance_upper,
    coil,
    weight,
  ) {
    (
      Some(diameter),
      Some(coating_type),
      Some(coating_amount),
      Some(min_tensile),
      Some(max_tensile),
      Some(tolerance_lower),
      Some(tolerance_upper),
      Some(coil),
      Some(weight),
    ) if errors.is_empty() => Ok(ProductSpec {
      diameter,
      coating_type,
      coating_amount,
      min_tensile,
      max_tensile,
      tolerance_lower,
      tolerance_upper,
      coil,
      weight,
      packaging: PackagingFlags { shrink, palletized },
    }),
    _ => Err(Error::Validation(errors)),
  }
}

// ─── Number parsing ──────────────────────────────────────────────────────────

/// Rewrite a locale-formatted number into the `1234.5` form.
///
/// When both `.` and `,` appear, whichever comes last is the decimal
/// separator and the other is a thousands separator.
pub fn canonical_number(input: &str) -> String {
  let s: String = input
    .trim()
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '_')
    .collect();
  match (s.rfind('.'), s.rfind(',')) {
    (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
    (Some(_), Some(_)) => s.replace(',', ""),
    (None, Some(_)) => s.replace(',', "."),
    _ => s,
  }
}

/// Parse a raw value (JSON number or string) into a decimal.
pub fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
  match value {
    serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
      .or_else(|_| Decimal::from_scientific(&n.to_string()))
      .ok(),
    serde_json::Value::String(s) => Decimal::from_str(&canonical_number(s)).ok(),
    _ => None,
  }
}

/// Round to two decimals and pin the scale so `2.5` renders as `2.50`.
fn fixed2(value: Decimal) -> Decimal {
  let mut v = value.round_dp(2);
  v.rescale(2);
  v
}

fn text(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

// ─── Field helpers ───────────────────────────────────────────────────────────

fn required<'a>(
  raw: &'a RawSpec,
  field: &str,
  errors: &mut Vec<FieldError>,
) -> Option<&'a serde_json::Value> {
  let value = raw.get(field);
  if value.is_none() {
    errors.push(FieldError::new(field, "is required"));
  }
  value
}

fn decimal_field(
  raw: &RawSpec,
  field: &str,
  is_required: bool,
  errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
  let value = if is_required {
    required(raw, field, errors)?
  } else {
    raw.get(field)?
  };
  match parse_decimal(value) {
    Some(d) => Some(fixed2(d)),
    None => {
      errors.push(FieldError::new(field, format!("{} is not a number", text(value))));
      None
    }
  }
}

fn check_diameter(
  d: Decimal,
  coating: Option<CoatingType>,
  errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
  let mm = d.to_f64().unwrap_or_default();
  let (lo, hi) = coating
    .and_then(|c| {
      COATING_DIAMETER_RANGES
        .iter()
        .find(|(ct, ..)| *ct == c)
        .map(|(_, lo, hi)| (*lo, *hi))
    })
    .unwrap_or(DIAMETER_RANGE);
  if mm < lo || mm > hi {
    let scope = coating.map(|c| format!(" for {c}")).unwrap_or_default();
    errors.push(FieldError::new(
      fields::DIAMETER,
      format!("{d} mm outside [{lo}, {hi}]{scope}"),
    ));
    return None;
  }
  Some(d)
}

fn check_coating(
  c: Decimal,
  coating: Option<CoatingType>,
  diameter: Option<Decimal>,
  errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
  let amount = c.to_f64().unwrap_or_default();
  let range = match (coating?, diameter) {
    (CoatingType::Nit, Some(d)) => {
      let mm = d.to_f64().unwrap_or_default();
      let ceiling = NIT_COATING_CEILINGS
        .iter()
        .find(|(below, _)| mm < *below)
        .map(|(_, ceiling)| *ceiling)
        .unwrap_or(250.0);
      (NIT_COATING_MIN, ceiling)
    }
    // Without a valid diameter the sub-range cannot be chosen; the diameter
    // error is already reported.
    (CoatingType::Nit, None) => return None,
    (CoatingType::Pad, _) => PAD_COATING_RANGE,
  };
  if amount < range.0 || amount > range.1 {
    errors.push(FieldError::new(
      fields::COATING_AMOUNT,
      format!("{c} g/m² outside [{}, {}]", range.0, range.1),
    ));
    return None;
  }
  Some(c)
}

fn tensile_field(
  raw: &RawSpec,
  field: &str,
  errors: &mut Vec<FieldError>,
) -> Option<u32> {
  let value = required(raw, field, errors)?;
  let Some(mpa) = parse_decimal(value).filter(|d| d.fract().is_zero()).and_then(|d| d.to_u32())
  else {
    errors.push(FieldError::new(
      field,
      format!("{} is not a whole number of MPa", text(value)),
    ));
    return None;
  };
  if mpa < TENSILE_RANGE.0 || mpa > TENSILE_RANGE.1 {
    errors.push(FieldError::new(
      field,
      format!(
        "{mpa} MPa outside [{}, {}]",
        TENSILE_RANGE.0, TENSILE_RANGE.1
      ),
    ));
    return None;
  }
  Some(mpa)
}

fn tolerance_field(
  raw: &RawSpec,
  field: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
  if raw.get(field).is_none() {
    return Some(fixed2(Decimal::ZERO));
  }
  let t = decimal_field(raw, field, false, errors)?;
  let mm = t.to_f64().unwrap_or_default();
  if !(0.0..=TOLERANCE_MAX).contains(&mm) {
    errors.push(FieldError::new(
      field,
      format!("{t} mm outside [0, {TOLERANCE_MAX}]"),
    ));
    return None;
  }
  Some(t)
}

fn whole_cm(
  raw: &RawSpec,
  field: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Option<u16>> {
  let Some(value) = raw.get(field) else {
    return Some(None);
  };
  match parse_decimal(value)
    .filter(|d| d.fract().is_zero())
    .and_then(|d| d.to_u16())
  {
    Some(cm) => Some(Some(cm)),
    None => {
      errors.push(FieldError::new(
        field,
        format!("{} is not a whole number of cm", text(value)),
      ));
      None
    }
  }
}

fn coil_field(raw: &RawSpec, errors: &mut Vec<FieldError>) -> Option<CoilGeometry> {
  let custom = flag_field(raw, fields::COIL_CUSTOM, false, errors);
  let inner = whole_cm(raw, fields::COIL_INNER, errors)?;
  let outer = whole_cm(raw, fields::COIL_OUTER, errors)?;
  let Some(inner) = inner else {
    errors.push(FieldError::new(fields::COIL_INNER, "is required"));
    return None;
  };

  if custom {
    let Some(outer) = outer else {
      errors.push(FieldError::new(
        fields::COIL_OUTER,
        "is required for a custom coil",
      ));
      return None;
    };
    let (lo, hi) = CUSTOM_COIL_INNER_RANGE;
    if inner < lo || inner > hi {
      errors.push(FieldError::new(
        fields::COIL_INNER,
        format!("{inner} cm outside [{lo}, {hi}]"),
      ));
      return None;
    }
    if outer <= inner {
      errors.push(FieldError::new(
        fields::COIL_OUTER,
        format!("outer {outer} cm must exceed inner {inner} cm"),
      ));
      return None;
    }
    return Some(CoilGeometry { inner_cm: inner, outer_cm: outer, custom });
  }

  let Some(&(_, paired_outer)) = VALID_COIL_PAIRS.iter().find(|(i, _)| *i == inner)
  else {
    errors.push(FieldError::new(
      fields::COIL_INNER,
      format!("{inner} cm is not a standard coil size"),
    ));
    return None;
  };
  match outer {
    Some(o) if o != paired_outer => {
      errors.push(FieldError::new(
        fields::COIL_OUTER,
        format!("{o} cm does not pair with inner {inner} cm (expected {paired_outer})"),
      ));
      None
    }
    _ => Some(CoilGeometry { inner_cm: inner, outer_cm: paired_outer, custom: false }),
  }
}

fn flag_field(
  raw: &RawSpec,
  field: &str,
  default: bool,
  errors: &mut Vec<FieldError>,
) -> bool {
  let Some(value) = raw.get(field) else {
    return default;
  };
  let parsed = match value {
    serde_json::Value::Bool(b) => Some(*b),
    serde_json::Value::Number(n) => n.as_i64().map(|n| n != 0),
    serde_json::Value::String(s) => match s.trim().to_lowercase().as_str() {
      "1" | "true" | "yes" | "evet" | "var" => Some(true),
      "0" | "false" | "no" | "hayir" | "hayır" | "yok" => Some(false),
      _ => None,
    },
    _ => None,
  };
  parsed.unwrap_or_else(|| {
    errors.push(FieldError::new(field, format!("{} is not a yes/no value", text(value))));
    default
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;
  use serde_json::json;

  use super::*;
  use crate::testing::scenario_raw;

  fn field_names(err: Error) -> Vec<String> {
    match err {
      Error::Validation(errs) => errs.into_iter().map(|e| e.field).collect(),
      other => panic!("expected validation error, got {other:?}"),
    }
  }

  #[test]
  fn comma_decimal_is_accepted() {
    let spec = normalize(&scenario_raw()).unwrap();
    assert_eq!(spec.diameter, dec!(2.50));
    assert_eq!(spec.diameter.to_string(), "2.50");
    assert_eq!(spec.coating_type, CoatingType::Nit);
    assert_eq!(spec.coil.outer_cm, 75);
    assert!(spec.packaging.shrink);
  }

  #[test]
  fn canonical_number_handles_thousands_separators() {
    assert_eq!(canonical_number("1.100,5"), "1100.5");
    assert_eq!(canonical_number("1,100.5"), "1100.5");
    assert_eq!(canonical_number(" 3,75 "), "3.75");
    assert_eq!(canonical_number("4.00"), "4.00");
  }

  #[test]
  fn inverted_tensile_is_rejected() {
    let raw = scenario_raw()
      .with(fields::MIN_TENSILE, 600)
      .with(fields::MAX_TENSILE, 500);
    let names = field_names(normalize(&raw).unwrap_err());
    assert_eq!(names, vec![fields::MIN_TENSILE.to_string()]);
  }

  #[test]
  fn diameter_range_depends_on_coating() {
    let nit = scenario_raw()
      .with(fields::DIAMETER, 5.0)
      .with(fields::COATING_AMOUNT, 100);
    assert!(field_names(normalize(&nit).unwrap_err()).contains(&fields::DIAMETER.into()));

    let pad = nit.with(fields::COATING_TYPE, "PAD");
    let spec = normalize(&pad).unwrap();
    assert_eq!(spec.diameter, dec!(5.00));
  }

  #[test]
  fn out_of_range_diameter_rejected_for_both_coatings() {
    for coating in ["NIT", "PAD"] {
      let raw = scenario_raw()
        .with(fields::COATING_TYPE, coating)
        .with(fields::DIAMETER, "0.5");
      assert!(normalize(&raw).is_err(), "{coating}");
    }
  }

  #[test]
  fn nit_coating_ceiling_follows_diameter_sub_range() {
    let thin = scenario_raw()
      .with(fields::DIAMETER, "1.20")
      .with(fields::COATING_AMOUNT, 180);
    assert_eq!(
      field_names(normalize(&thin).unwrap_err()),
      vec![fields::COATING_AMOUNT.to_string()]
    );

    let thick = thin.with(fields::DIAMETER, "3.00");
    assert!(normalize(&thick).is_ok());
  }

  #[test]
  fn all_field_errors_are_reported_together() {
    let raw = RawSpec::default()
      .with(fields::DIAMETER, "abc")
      .with(fields::COATING_TYPE, "NIT")
      .with(fields::MIN_TENSILE, 400.5)
      .with(fields::COIL_INNER, 47);
    let names = field_names(normalize(&raw).unwrap_err());
    for expected in [
      fields::DIAMETER,
      fields::COATING_AMOUNT,
      fields::MIN_TENSILE,
      fields::MAX_TENSILE,
      fields::COIL_INNER,
      fields::WEIGHT,
    ] {
      assert!(names.contains(&expected.to_string()), "missing {expected}: {names:?}");
    }
  }

  #[test]
  fn mismatched_coil_pair_is_rejected_unless_custom() {
    let raw = scenario_raw().with(fields::COIL_OUTER, 90);
    assert_eq!(
      field_names(normalize(&raw).unwrap_err()),
      vec![fields::COIL_OUTER.to_string()]
    );

    let custom = scenario_raw()
      .with(fields::COIL_INNER, 60)
      .with(fields::COIL_OUTER, 95)
      .with(fields::COIL_CUSTOM, true);
    let spec = normalize(&custom).unwrap();
    assert!(spec.coil.custom);
    assert_eq!((spec.coil.inner_cm, spec.coil.outer_cm), (60, 95));
  }

  #[test]
  fn negative_tolerance_is_rejected() {
    let raw = scenario_raw().with(fields::TOLERANCE_LOWER, "-0,02");
    assert_eq!(
      field_names(normalize(&raw).unwrap_err()),
      vec![fields::TOLERANCE_LOWER.to_string()]
    );
  }

  #[test]
  fn packaging_flags_accept_localized_strings() {
    let raw = scenario_raw()
      .with(fields::SHRINK, "hayır")
      .with(fields::PALLETIZED, json!("Evet"));
    let spec = normalize(&raw).unwrap();
    assert!(!spec.packaging.shrink);
    assert!(spec.packaging.palletized);
  }

  #[test]
  fn normalizing_twice_is_idempotent() {
    let once = normalize(&scenario_raw().with(fields::TOLERANCE_UPPER, "0,06")).unwrap();
    let twice = normalize(&once.to_raw()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.to_raw(), once.to_raw());
  }
}
