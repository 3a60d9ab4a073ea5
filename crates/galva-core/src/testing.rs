//! Shared fixtures for unit tests.

use std::{convert::Infallible, sync::Mutex};

use rust_decimal::Decimal;

use crate::{
  normalize::normalize,
  product::{RawMaterialVariant, VariantOrigin},
  spec::{ProductSpec, RawSpec, fields},
  store::Catalog,
};

/// 2.50 mm NIT, 120 g/m², 400–500 MPa, 750 kg on a 45/75 cm coil.
pub fn scenario_raw() -> RawSpec {
  RawSpec::default()
    .with(fields::DIAMETER, "2,50")
    .with(fields::COATING_TYPE, "A")
    .with(fields::COATING_AMOUNT, 120)
    .with(fields::MIN_TENSILE, 400)
    .with(fields::MAX_TENSILE, 500)
    .with(fields::WEIGHT, 750)
    .with(fields::COIL_INNER, 45)
}

pub fn scenario_spec() -> ProductSpec {
  normalize(&scenario_raw()).unwrap()
}

pub fn spec_with(diameter: &str, coating: &str) -> ProductSpec {
  let coating_amount = if coating == "PAD" { 250 } else { 100 };
  normalize(
    &scenario_raw()
      .with(fields::DIAMETER, diameter)
      .with(fields::COATING_TYPE, coating)
      .with(fields::COATING_AMOUNT, coating_amount),
  )
  .unwrap()
}

/// Catalog variant with its code derived from its fields.
pub fn catalog_variant(diameter: Decimal, filament_hundredths: u16, quality: u16) -> RawMaterialVariant {
  RawMaterialVariant::catalog(diameter, Decimal::new(i64::from(filament_hundredths), 2), quality)
}

/// In-memory [`Catalog`].
#[derive(Default)]
pub struct MemoryCatalog {
  variants: Mutex<Vec<RawMaterialVariant>>,
}

impl MemoryCatalog {
  pub fn with(variants: Vec<RawMaterialVariant>) -> Self {
    Self { variants: Mutex::new(variants) }
  }
}

impl Catalog for MemoryCatalog {
  type Error = Infallible;

  async fn find_raw_materials_by_diameter_window(
    &self,
    min: f64,
    max: f64,
    filament_class: Option<Decimal>,
    quality: Option<u16>,
  ) -> Result<Vec<RawMaterialVariant>, Infallible> {
    let variants = self.variants.lock().unwrap();
    Ok(
      variants
        .iter()
        .filter(|v| v.diameter_mm() >= min && v.diameter_mm() <= max)
        .filter(|v| filament_class.is_none_or(|f| v.filament_class == f))
        .filter(|v| quality.is_none_or(|q| v.quality == q))
        .cloned()
        .collect(),
    )
  }

  async fn find_raw_material_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> Result<Option<RawMaterialVariant>, Infallible> {
    Ok(self.variants.lock().unwrap().iter().find(|v| v.code == code).cloned())
  }

  async fn create_raw_material(
    &self,
    mut variant: RawMaterialVariant,
  ) -> Result<RawMaterialVariant, Infallible> {
    variant.origin = VariantOrigin::Catalog;
    self.variants.lock().unwrap().push(variant.clone());
    Ok(variant)
  }

  async fn list_raw_materials(&self) -> Result<Vec<RawMaterialVariant>, Infallible> {
    Ok(self.variants.lock().unwrap().clone())
  }
}
