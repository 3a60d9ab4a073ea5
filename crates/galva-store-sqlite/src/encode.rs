//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Decimals are fixed 2-decimal strings so
//! equality filters work on the text column. The normalized spec is stored as
//! compact JSON. UUIDs are hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use galva_core::{
  product::{
    FinishedProduct, IntermediateProduct, ProductRelation, ProductState, RawMaterialVariant,
    VariantOrigin,
  },
  recipe::{LineKind, OwnerKind, RecipeLine, RecipeSet},
  spec::CoatingType,
  store::ProductGraph,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_decimal(d: Decimal) -> String {
  let mut d = d.round_dp(2);
  d.rescale(2);
  d.to_string()
}

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownValue { column, value: value.to_owned() }
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_coating(s: &str) -> Result<CoatingType> {
  CoatingType::from_str(s).map_err(|_| unknown("coating_type", s))
}

pub fn decode_state(s: &str) -> Result<ProductState> {
  match s {
    "draft" => Ok(ProductState::Draft),
    "persisted" => Ok(ProductState::Persisted),
    "updated" => Ok(ProductState::Updated),
    "deleted" => Ok(ProductState::Deleted),
    other => Err(unknown("state", other)),
  }
}

pub fn encode_line_kind(k: LineKind) -> &'static str {
  match k {
    LineKind::Component => "component",
    LineKind::Operation => "operation",
  }
}

pub fn decode_line_kind(s: &str) -> Result<LineKind> {
  match s {
    "component" => Ok(LineKind::Component),
    "operation" => Ok(LineKind::Operation),
    other => Err(unknown("kind", other)),
  }
}

// ─── Write rows ──────────────────────────────────────────────────────────────

pub struct RawMaterialRow {
  pub code:           String,
  pub diameter:       String,
  pub diameter_mm:    f64,
  pub filament_class: String,
  pub quality:        i64,
  pub special_bucket: i64,
}

impl RawMaterialRow {
  pub fn encode(v: &RawMaterialVariant) -> Self {
    Self {
      code:           v.code.clone(),
      diameter:       encode_decimal(v.diameter),
      diameter_mm:    v.diameter.to_f64().unwrap_or_default(),
      filament_class: encode_decimal(v.filament_class),
      quality:        i64::from(v.quality),
      special_bucket: i64::from(v.special_bucket),
    }
  }
}

pub struct FinishedRow {
  pub finished_id:             String,
  pub code:                    String,
  pub name_tr:                 String,
  pub name_en:                 String,
  pub tariff_bracket:          String,
  pub packaging_material_code: String,
  pub spec_json:               String,
  pub state:                   &'static str,
  pub created_at:              String,
  pub updated_at:              String,
}

impl FinishedRow {
  pub fn encode(p: &FinishedProduct) -> Result<Self> {
    Ok(Self {
      finished_id:             encode_uuid(p.id),
      code:                    p.code.clone(),
      name_tr:                 p.name_tr.clone(),
      name_en:                 p.name_en.clone(),
      tariff_bracket:          p.tariff_bracket.clone(),
      packaging_material_code: p.packaging_material_code.clone(),
      spec_json:               serde_json::to_string(&p.spec)?,
      state:                   p.state.as_str(),
      created_at:              encode_dt(p.created_at),
      updated_at:              encode_dt(p.updated_at),
    })
  }
}

pub struct IntermediateRow {
  pub intermediate_id: String,
  pub finished_id:     String,
  pub code:            String,
  pub name_tr:         String,
  pub name_en:         String,
  pub diameter:        String,
  pub coating_type:    &'static str,
  pub coating_amount:  String,
  pub min_tensile:     i64,
  pub max_tensile:     i64,
  pub tolerance_lower: String,
  pub tolerance_upper: String,
}

impl IntermediateRow {
  pub fn encode(p: &IntermediateProduct) -> Self {
    Self {
      intermediate_id: encode_uuid(p.id),
      finished_id:     encode_uuid(p.finished_id),
      code:            p.code.clone(),
      name_tr:         p.name_tr.clone(),
      name_en:         p.name_en.clone(),
      diameter:        encode_decimal(p.diameter),
      coating_type:    p.coating_type.code(),
      coating_amount:  encode_decimal(p.coating_amount),
      min_tensile:     i64::from(p.min_tensile),
      max_tensile:     i64::from(p.max_tensile),
      tolerance_lower: encode_decimal(p.tolerance_lower),
      tolerance_upper: encode_decimal(p.tolerance_upper),
    }
  }
}

pub struct RecipeLineRow {
  pub sequence_number: i64,
  pub kind:            &'static str,
  pub component_code:  String,
  pub quantity:        f64,
  pub unit:            String,
  pub description:     String,
  pub links_owner:     bool,
}

/// All lines of one owner, ready for `DELETE` + `INSERT`.
pub struct RecipeSetRows {
  pub owner_kind: &'static str,
  pub owner_code: String,
  pub lines:      Vec<RecipeLineRow>,
}

impl RecipeSetRows {
  pub fn encode(set: &RecipeSet) -> Self {
    Self {
      owner_kind: set.owner_kind.as_str(),
      owner_code: set.owner_code.clone(),
      lines:      set
        .lines
        .iter()
        .map(|l| RecipeLineRow {
          sequence_number: i64::from(l.sequence_number),
          kind:            encode_line_kind(l.kind),
          component_code:  l.component_code.clone(),
          quantity:        l.quantity,
          unit:            l.unit.clone(),
          description:     l.description.clone(),
          links_owner:     l.links_owner,
        })
        .collect(),
    }
  }
}

/// A whole [`ProductGraph`] as owned column values, movable into a
/// connection closure.
pub struct GraphRows {
  pub finished:            FinishedRow,
  pub intermediate:        IntermediateRow,
  pub raw_materials:       Vec<RawMaterialRow>,
  /// `(raw_material_code, priority)`.
  pub relations:           Vec<(String, i64)>,
  pub raw_recipes:         Vec<RecipeSetRows>,
  pub intermediate_recipe: RecipeSetRows,
  pub finished_recipe:     RecipeSetRows,
  pub created_at:          String,
}

impl GraphRows {
  pub fn encode(graph: &ProductGraph) -> Result<Self> {
    Ok(Self {
      finished:            FinishedRow::encode(&graph.finished)?,
      intermediate:        IntermediateRow::encode(&graph.intermediate),
      raw_materials:       graph.raw_materials.iter().map(RawMaterialRow::encode).collect(),
      relations:           graph
        .relations
        .iter()
        .map(|r| (r.raw_material_code.clone(), i64::from(r.priority)))
        .collect(),
      raw_recipes:         graph.recipes.raw_materials.iter().map(RecipeSetRows::encode).collect(),
      intermediate_recipe: RecipeSetRows::encode(&graph.recipes.intermediate),
      finished_recipe:     RecipeSetRows::encode(&graph.recipes.finished),
      created_at:          encode_dt(graph.finished.updated_at),
    })
  }
}

// ─── Read rows ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `raw_materials` row.
pub struct RawVariant {
  pub code:           String,
  pub diameter:       String,
  pub filament_class: String,
  pub quality:        i64,
  pub special_bucket: i64,
}

impl RawVariant {
  pub const COLUMNS: &'static str = "code, diameter, filament_class, quality, special_bucket";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:           row.get(0)?,
      diameter:       row.get(1)?,
      filament_class: row.get(2)?,
      quality:        row.get(3)?,
      special_bucket: row.get(4)?,
    })
  }

  pub fn into_variant(self) -> Result<RawMaterialVariant> {
    Ok(RawMaterialVariant {
      diameter:       decode_decimal(&self.diameter)?,
      filament_class: decode_decimal(&self.filament_class)?,
      quality:        u16::try_from(self.quality)
        .map_err(|_| unknown("quality", &self.quality.to_string()))?,
      special_bucket: u8::try_from(self.special_bucket)
        .map_err(|_| unknown("special_bucket", &self.special_bucket.to_string()))?,
      origin:         VariantOrigin::Catalog,
      code:           self.code,
    })
  }
}

/// Raw strings read directly from a `finished_products` row.
pub struct RawFinished {
  pub finished_id:             String,
  pub code:                    String,
  pub name_tr:                 String,
  pub name_en:                 String,
  pub tariff_bracket:          String,
  pub packaging_material_code: String,
  pub spec_json:               String,
  pub state:                   String,
  pub created_at:              String,
  pub updated_at:              String,
}

impl RawFinished {
  pub const COLUMNS: &'static str = "finished_id, code, name_tr, name_en, tariff_bracket, \
                                     packaging_material_code, spec_json, state, created_at, \
                                     updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      finished_id:             row.get(0)?,
      code:                    row.get(1)?,
      name_tr:                 row.get(2)?,
      name_en:                 row.get(3)?,
      tariff_bracket:          row.get(4)?,
      packaging_material_code: row.get(5)?,
      spec_json:               row.get(6)?,
      state:                   row.get(7)?,
      created_at:              row.get(8)?,
      updated_at:              row.get(9)?,
    })
  }

  pub fn into_finished(self) -> Result<FinishedProduct> {
    Ok(FinishedProduct {
      id:                      decode_uuid(&self.finished_id)?,
      code:                    self.code,
      name_tr:                 self.name_tr,
      name_en:                 self.name_en,
      tariff_bracket:          self.tariff_bracket,
      packaging_material_code: self.packaging_material_code,
      spec:                    serde_json::from_str(&self.spec_json)?,
      state:                   decode_state(&self.state)?,
      created_at:              decode_dt(&self.created_at)?,
      updated_at:              decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `intermediate_products` row.
pub struct RawIntermediate {
  pub intermediate_id: String,
  pub finished_id:     String,
  pub code:            String,
  pub name_tr:         String,
  pub name_en:         String,
  pub diameter:        String,
  pub coating_type:    String,
  pub coating_amount:  String,
  pub min_tensile:     i64,
  pub max_tensile:     i64,
  pub tolerance_lower: String,
  pub tolerance_upper: String,
}

impl RawIntermediate {
  pub const COLUMNS: &'static str = "intermediate_id, finished_id, code, name_tr, name_en, \
                                     diameter, coating_type, coating_amount, min_tensile, \
                                     max_tensile, tolerance_lower, tolerance_upper";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      intermediate_id: row.get(0)?,
      finished_id:     row.get(1)?,
      code:            row.get(2)?,
      name_tr:         row.get(3)?,
      name_en:         row.get(4)?,
      diameter:        row.get(5)?,
      coating_type:    row.get(6)?,
      coating_amount:  row.get(7)?,
      min_tensile:     row.get(8)?,
      max_tensile:     row.get(9)?,
      tolerance_lower: row.get(10)?,
      tolerance_upper: row.get(11)?,
    })
  }

  pub fn into_intermediate(self) -> Result<IntermediateProduct> {
    let tensile = |v: i64| u32::try_from(v).map_err(|_| unknown("tensile", &v.to_string()));
    Ok(IntermediateProduct {
      id:              decode_uuid(&self.intermediate_id)?,
      finished_id:     decode_uuid(&self.finished_id)?,
      code:            self.code,
      name_tr:         self.name_tr,
      name_en:         self.name_en,
      diameter:        decode_decimal(&self.diameter)?,
      coating_type:    decode_coating(&self.coating_type)?,
      coating_amount:  decode_decimal(&self.coating_amount)?,
      min_tensile:     tensile(self.min_tensile)?,
      max_tensile:     tensile(self.max_tensile)?,
      tolerance_lower: decode_decimal(&self.tolerance_lower)?,
      tolerance_upper: decode_decimal(&self.tolerance_upper)?,
    })
  }
}

/// Raw values read directly from a `recipe_lines` row.
pub struct RawRecipeLine {
  pub sequence_number: i64,
  pub kind:            String,
  pub component_code:  String,
  pub quantity:        f64,
  pub unit:            String,
  pub description:     String,
  pub links_owner:     bool,
}

impl RawRecipeLine {
  pub const COLUMNS: &'static str =
    "sequence_number, kind, component_code, quantity, unit, description, links_owner";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sequence_number: row.get(0)?,
      kind:            row.get(1)?,
      component_code:  row.get(2)?,
      quantity:        row.get(3)?,
      unit:            row.get(4)?,
      description:     row.get(5)?,
      links_owner:     row.get(6)?,
    })
  }

  pub fn into_line(self) -> Result<RecipeLine> {
    Ok(RecipeLine {
      sequence_number: u16::try_from(self.sequence_number)
        .map_err(|_| unknown("sequence_number", &self.sequence_number.to_string()))?,
      kind:            decode_line_kind(&self.kind)?,
      component_code:  self.component_code,
      quantity:        self.quantity,
      unit:            self.unit,
      description:     self.description,
      links_owner:     self.links_owner,
    })
  }
}

pub fn decode_recipe_set(
  owner_kind: OwnerKind,
  owner_code: String,
  lines: Vec<RawRecipeLine>,
) -> Result<RecipeSet> {
  Ok(RecipeSet {
    owner_kind,
    owner_code,
    lines: lines.into_iter().map(RawRecipeLine::into_line).collect::<Result<_>>()?,
  })
}

pub fn decode_relation(finished_id: Uuid, code: String, priority: i64) -> Result<ProductRelation> {
  Ok(ProductRelation {
    finished_id,
    raw_material_code: code,
    priority: u8::try_from(priority).map_err(|_| unknown("priority", &priority.to_string()))?,
  })
}
