//! [`SqliteStore`]: the SQLite implementation of the catalog, sequence and
//! product-graph collaborators.

use std::path::Path;

use chrono::Utc;
use galva_core::{
  product::{FinishedProduct, RawMaterialVariant, VariantOrigin},
  recipe::{OwnerKind, RecipeSets},
  sequencer::SequenceKey,
  store::{
    Catalog, DeletionReport, GraphStep, GraphStore, GraphWriteError, ProductGraph, ProductIds,
    SequenceService,
  },
};
use rusqlite::{OptionalExtension as _, Transaction};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    GraphRows, RawFinished, RawIntermediate, RawMaterialRow, RawRecipeLine, RawVariant,
    RecipeSetRows, decode_recipe_set, decode_relation, encode_decimal, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A product-graph store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn count(&self, sql: &'static str) -> Result<i64> {
    Ok(self.conn.call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?)).await?)
  }
}

// ─── Transaction steps ───────────────────────────────────────────────────────

/// A statement that failed inside a graph transaction.
struct StepFailure {
  step:   GraphStep,
  source: rusqlite::Error,
}

trait AtStep<T> {
  fn at(self, step: GraphStep) -> std::result::Result<T, StepFailure>;
}

impl<T> AtStep<T> for rusqlite::Result<T> {
  fn at(self, step: GraphStep) -> std::result::Result<T, StepFailure> {
    self.map_err(|source| StepFailure { step, source })
  }
}

type StepResult<T> = std::result::Result<T, StepFailure>;

/// Run `body` in a transaction; commit only if every step succeeded.
/// A commit failure is attributed to `last`.
fn in_transaction<T>(
  conn: &mut rusqlite::Connection,
  last: GraphStep,
  body: impl FnOnce(&Transaction<'_>) -> StepResult<T>,
) -> tokio_rusqlite::Result<StepResult<T>> {
  let tx = conn.transaction()?;
  match body(&tx) {
    Ok(value) => Ok(tx.commit().at(last).map(|()| value)),
    // Dropping `tx` rolls back.
    Err(failure) => Ok(Err(failure)),
  }
}

fn write_error(step: GraphStep, source: impl Into<Error>) -> GraphWriteError<Error> {
  GraphWriteError { step, source: source.into() }
}

fn flatten<T>(
  first: GraphStep,
  outcome: std::result::Result<StepResult<T>, tokio_rusqlite::Error>,
) -> Result<T, GraphWriteError<Error>> {
  match outcome {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(StepFailure { step, source })) => Err(write_error(step, source)),
    Err(e) => Err(write_error(first, e)),
  }
}

fn insert_raw_materials(
  tx: &Transaction<'_>,
  rows: &[RawMaterialRow],
  created_at: &str,
) -> StepResult<()> {
  let mut stmt = tx
    .prepare_cached(
      "INSERT INTO raw_materials
         (code, diameter, diameter_mm, filament_class, quality, special_bucket, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT(code) DO NOTHING",
    )
    .at(GraphStep::RawMaterials)?;
  for r in rows {
    stmt
      .execute(rusqlite::params![
        r.code,
        r.diameter,
        r.diameter_mm,
        r.filament_class,
        r.quality,
        r.special_bucket,
        created_at,
      ])
      .at(GraphStep::RawMaterials)?;
  }
  Ok(())
}

fn insert_relations(
  tx: &Transaction<'_>,
  finished_id: &str,
  relations: &[(String, i64)],
) -> StepResult<()> {
  let mut stmt = tx
    .prepare_cached(
      "INSERT INTO product_relations (finished_id, raw_material_code, priority)
       VALUES (?1, ?2, ?3)",
    )
    .at(GraphStep::Relations)?;
  for (code, priority) in relations {
    stmt
      .execute(rusqlite::params![finished_id, code, priority])
      .at(GraphStep::Relations)?;
  }
  Ok(())
}

fn delete_recipe(tx: &Transaction<'_>, kind: OwnerKind, code: &str) -> rusqlite::Result<usize> {
  tx.execute(
    "DELETE FROM recipe_lines WHERE owner_kind = ?1 AND owner_code = ?2",
    rusqlite::params![kind.as_str(), code],
  )
}

/// Replace every line of one owner.
fn replace_recipe(tx: &Transaction<'_>, set: &RecipeSetRows, step: GraphStep) -> StepResult<()> {
  tx.execute(
    "DELETE FROM recipe_lines WHERE owner_kind = ?1 AND owner_code = ?2",
    rusqlite::params![set.owner_kind, set.owner_code],
  )
  .at(step)?;
  let mut stmt = tx
    .prepare_cached(
      "INSERT INTO recipe_lines
         (owner_kind, owner_code, sequence_number, kind, component_code,
          quantity, unit, description, links_owner)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .at(step)?;
  for l in &set.lines {
    stmt
      .execute(rusqlite::params![
        set.owner_kind,
        set.owner_code,
        l.sequence_number,
        l.kind,
        l.component_code,
        l.quantity,
        l.unit,
        l.description,
        l.links_owner,
      ])
      .at(step)?;
  }
  Ok(())
}

/// `(released, shared)`: the codes related to `finished_id`, split by whether
/// another finished product also relates to them.
fn unshared_raw_materials(
  tx: &Transaction<'_>,
  finished_id: &str,
) -> rusqlite::Result<(Vec<String>, Vec<String>)> {
  let mut stmt = tx.prepare(
    "SELECT r.raw_material_code,
            (SELECT COUNT(*) FROM product_relations o
              WHERE o.raw_material_code = r.raw_material_code
                AND o.finished_id != r.finished_id)
     FROM product_relations r
     WHERE r.finished_id = ?1
     ORDER BY r.priority",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![finished_id], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let (shared, released): (Vec<_>, Vec<_>) = rows.into_iter().partition(|(_, others)| *others > 0);
  Ok((
    released.into_iter().map(|(c, _)| c).collect(),
    shared.into_iter().map(|(c, _)| c).collect(),
  ))
}

// ─── Catalog impl ────────────────────────────────────────────────────────────

impl Catalog for SqliteStore {
  type Error = Error;

  async fn find_raw_materials_by_diameter_window(
    &self,
    min: f64,
    max: f64,
    filament_class: Option<Decimal>,
    quality: Option<u16>,
  ) -> Result<Vec<RawMaterialVariant>> {
    let filament = filament_class.map(encode_decimal);
    let quality = quality.map(i64::from);

    let raws: Vec<RawVariant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM raw_materials
           WHERE diameter_mm >= ?1 AND diameter_mm <= ?2
             AND (?3 IS NULL OR filament_class = ?3)
             AND (?4 IS NULL OR quality = ?4)
           ORDER BY diameter_mm, code",
          RawVariant::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![min, max, filament, quality], RawVariant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVariant::into_variant).collect()
  }

  async fn find_raw_material_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> Result<Option<RawMaterialVariant>> {
    let code = code.to_owned();
    let raw: Option<RawVariant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM raw_materials WHERE code = ?1", RawVariant::COLUMNS),
              rusqlite::params![code],
              RawVariant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVariant::into_variant).transpose()
  }

  async fn create_raw_material(&self, variant: RawMaterialVariant) -> Result<RawMaterialVariant> {
    let row = RawMaterialRow::encode(&variant);
    let at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO raw_materials
             (code, diameter, diameter_mm, filament_class, quality, special_bucket, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            row.code,
            row.diameter,
            row.diameter_mm,
            row.filament_class,
            row.quality,
            row.special_bucket,
            at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(RawMaterialVariant { origin: VariantOrigin::Catalog, ..variant })
  }

  async fn list_raw_materials(&self) -> Result<Vec<RawMaterialVariant>> {
    let raws: Vec<RawVariant> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM raw_materials ORDER BY diameter_mm, code",
          RawVariant::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawVariant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVariant::into_variant).collect()
  }
}

// ─── SequenceService impl ────────────────────────────────────────────────────

impl SequenceService for SqliteStore {
  type Error = Error;

  async fn peek_next<'a>(&'a self, key: &'a SequenceKey) -> Result<u32> {
    let coating = key.coating_type.code();
    let diameter = key.diameter_code.clone();

    let value: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT next_value FROM sequence_counters
               WHERE coating_type = ?1 AND diameter_code = ?2",
              rusqlite::params![coating, diameter],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(value.map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX)))
  }

  async fn commit<'a>(&'a self, key: &'a SequenceKey) -> Result<u32> {
    let coating = key.coating_type.code();
    let diameter = key.diameter_code.clone();

    // Single statement, so concurrent writers cannot observe the same value.
    let value: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO sequence_counters (coating_type, diameter_code, next_value)
           VALUES (?1, ?2, 1)
           ON CONFLICT(coating_type, diameter_code)
             DO UPDATE SET next_value = next_value + 1
           RETURNING next_value - 1",
          rusqlite::params![coating, diameter],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(u32::try_from(value).unwrap_or(u32::MAX))
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

struct RawGraph {
  finished:      RawFinished,
  intermediate:  RawIntermediate,
  relations:     Vec<(String, i64)>,
  raw_materials: Vec<RawVariant>,
  finished_rl:   Vec<RawRecipeLine>,
  interm_rl:     Vec<RawRecipeLine>,
  raw_rl:        Vec<(String, Vec<RawRecipeLine>)>,
}

fn query_lines(
  conn: &rusqlite::Connection,
  kind: OwnerKind,
  code: &str,
) -> rusqlite::Result<Vec<RawRecipeLine>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {} FROM recipe_lines
     WHERE owner_kind = ?1 AND owner_code = ?2
     ORDER BY sequence_number",
    RawRecipeLine::COLUMNS
  ))?;
  stmt
    .query_map(rusqlite::params![kind.as_str(), code], RawRecipeLine::from_row)?
    .collect()
}

impl GraphStore for SqliteStore {
  type Error = Error;

  async fn create_product_graph(
    &self,
    graph: ProductGraph,
  ) -> Result<ProductIds, GraphWriteError<Error>> {
    let ids = ProductIds {
      finished_id:     graph.finished.id,
      intermediate_id: graph.intermediate.id,
    };
    let rows = GraphRows::encode(&graph).map_err(|e| write_error(GraphStep::RawMaterials, e))?;

    let outcome = self
      .conn
      .call(move |conn| {
        in_transaction(conn, GraphStep::FinishedRecipe, |tx| {
          insert_raw_materials(tx, &rows.raw_materials, &rows.created_at)?;

          let f = &rows.finished;
          tx.execute(
            "INSERT INTO finished_products
               (finished_id, code, name_tr, name_en, tariff_bracket,
                packaging_material_code, spec_json, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
              f.finished_id,
              f.code,
              f.name_tr,
              f.name_en,
              f.tariff_bracket,
              f.packaging_material_code,
              f.spec_json,
              f.state,
              f.created_at,
              f.updated_at,
            ],
          )
          .at(GraphStep::FinishedProduct)?;

          let i = &rows.intermediate;
          tx.execute(
            "INSERT INTO intermediate_products
               (intermediate_id, finished_id, code, name_tr, name_en, diameter,
                coating_type, coating_amount, min_tensile, max_tensile,
                tolerance_lower, tolerance_upper)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
              i.intermediate_id,
              i.finished_id,
              i.code,
              i.name_tr,
              i.name_en,
              i.diameter,
              i.coating_type,
              i.coating_amount,
              i.min_tensile,
              i.max_tensile,
              i.tolerance_lower,
              i.tolerance_upper,
            ],
          )
          .at(GraphStep::IntermediateProduct)?;

          insert_relations(tx, &f.finished_id, &rows.relations)?;
          for set in &rows.raw_recipes {
            replace_recipe(tx, set, GraphStep::RawMaterialRecipes)?;
          }
          replace_recipe(tx, &rows.intermediate_recipe, GraphStep::IntermediateRecipe)?;
          replace_recipe(tx, &rows.finished_recipe, GraphStep::FinishedRecipe)?;
          Ok(())
        })
      })
      .await;

    flatten(GraphStep::RawMaterials, outcome)?;
    Ok(ids)
  }

  async fn replace_recipe_sets(
    &self,
    finished_id: Uuid,
    graph: ProductGraph,
  ) -> Result<(), GraphWriteError<Error>> {
    let id = encode_uuid(finished_id);
    let rows = GraphRows::encode(&graph).map_err(|e| write_error(GraphStep::RawMaterials, e))?;

    let outcome = self
      .conn
      .call(move |conn| {
        in_transaction(conn, GraphStep::FinishedRecipe, |tx| {
          insert_raw_materials(tx, &rows.raw_materials, &rows.created_at)?;

          let f = &rows.finished;
          let updated = tx
            .execute(
              "UPDATE finished_products
               SET name_tr = ?2, name_en = ?3, tariff_bracket = ?4,
                   packaging_material_code = ?5, spec_json = ?6, state = ?7,
                   updated_at = ?8
               WHERE finished_id = ?1",
              rusqlite::params![
                id,
                f.name_tr,
                f.name_en,
                f.tariff_bracket,
                f.packaging_material_code,
                f.spec_json,
                f.state,
                f.updated_at,
              ],
            )
            .at(GraphStep::FinishedProduct)?;
          if updated == 0 {
            return Err(StepFailure {
              step:   GraphStep::FinishedProduct,
              source: rusqlite::Error::QueryReturnedNoRows,
            });
          }

          let i = &rows.intermediate;
          tx.execute(
            "UPDATE intermediate_products
             SET name_tr = ?2, name_en = ?3, diameter = ?4, coating_type = ?5,
                 coating_amount = ?6, min_tensile = ?7, max_tensile = ?8,
                 tolerance_lower = ?9, tolerance_upper = ?10
             WHERE finished_id = ?1",
            rusqlite::params![
              id,
              i.name_tr,
              i.name_en,
              i.diameter,
              i.coating_type,
              i.coating_amount,
              i.min_tensile,
              i.max_tensile,
              i.tolerance_lower,
              i.tolerance_upper,
            ],
          )
          .at(GraphStep::IntermediateProduct)?;

          // Variants dropped by this update lose their recipe if nothing else
          // relates to them.
          let (released, _) = unshared_raw_materials(tx, &id).at(GraphStep::Relations)?;
          tx.execute(
            "DELETE FROM product_relations WHERE finished_id = ?1",
            rusqlite::params![id],
          )
          .at(GraphStep::Relations)?;
          insert_relations(tx, &id, &rows.relations)?;

          for code in released.iter().filter(|c| !rows.relations.iter().any(|(r, _)| r == *c)) {
            delete_recipe(tx, OwnerKind::RawMaterial, code).at(GraphStep::RawMaterialRecipes)?;
          }
          for set in &rows.raw_recipes {
            replace_recipe(tx, set, GraphStep::RawMaterialRecipes)?;
          }
          replace_recipe(tx, &rows.intermediate_recipe, GraphStep::IntermediateRecipe)?;
          replace_recipe(tx, &rows.finished_recipe, GraphStep::FinishedRecipe)?;
          Ok(())
        })
      })
      .await;

    flatten(GraphStep::RawMaterials, outcome)
  }

  async fn delete_product_graph(
    &self,
    finished_id: Uuid,
  ) -> Result<DeletionReport, GraphWriteError<Error>> {
    let id = encode_uuid(finished_id);

    let outcome = self
      .conn
      .call(move |conn| {
        in_transaction(conn, GraphStep::FinishedProduct, |tx| {
          let codes: Option<(String, String)> = tx
            .query_row(
              "SELECT f.code, i.code FROM finished_products f
               JOIN intermediate_products i ON i.finished_id = f.finished_id
               WHERE f.finished_id = ?1",
              rusqlite::params![id],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .at(GraphStep::FinishedProduct)?;
          let Some((finished_code, intermediate_code)) = codes else {
            return Ok(None);
          };

          let (released, shared) =
            unshared_raw_materials(tx, &id).at(GraphStep::RawMaterialRecipes)?;
          let mut recipe_lines_removed = 0;

          for code in &released {
            recipe_lines_removed += delete_recipe(tx, OwnerKind::RawMaterial, code)
              .at(GraphStep::RawMaterialRecipes)?;
          }
          let relations_removed = tx
            .execute(
              "DELETE FROM product_relations WHERE finished_id = ?1",
              rusqlite::params![id],
            )
            .at(GraphStep::Relations)?;
          recipe_lines_removed += delete_recipe(tx, OwnerKind::Intermediate, &intermediate_code)
            .at(GraphStep::IntermediateRecipe)?;
          tx.execute(
            "DELETE FROM intermediate_products WHERE finished_id = ?1",
            rusqlite::params![id],
          )
          .at(GraphStep::IntermediateProduct)?;
          recipe_lines_removed += delete_recipe(tx, OwnerKind::Finished, &finished_code)
            .at(GraphStep::FinishedRecipe)?;
          tx.execute(
            "DELETE FROM finished_products WHERE finished_id = ?1",
            rusqlite::params![id],
          )
          .at(GraphStep::FinishedProduct)?;

          Ok(Some(DeletionReport {
            finished_code,
            intermediate_code,
            relations_removed,
            recipe_lines_removed,
            raw_materials_released: released,
            raw_materials_shared: shared,
          }))
        })
      })
      .await;

    flatten(GraphStep::RawMaterialRecipes, outcome)?
      .ok_or_else(|| write_error(GraphStep::FinishedProduct, Error::ProductNotFound(finished_id)))
  }

  async fn load_product_graph(&self, finished_id: Uuid) -> Result<Option<ProductGraph>> {
    let id = encode_uuid(finished_id);

    let raw: Option<RawGraph> = self
      .conn
      .call(move |conn| {
        let finished = conn
          .query_row(
            &format!(
              "SELECT {} FROM finished_products WHERE finished_id = ?1",
              RawFinished::COLUMNS
            ),
            rusqlite::params![id],
            RawFinished::from_row,
          )
          .optional()?;
        let Some(finished) = finished else {
          return Ok(None);
        };

        let intermediate = conn.query_row(
          &format!(
            "SELECT {} FROM intermediate_products WHERE finished_id = ?1",
            RawIntermediate::COLUMNS
          ),
          rusqlite::params![id],
          RawIntermediate::from_row,
        )?;

        let relations = conn
          .prepare(
            "SELECT raw_material_code, priority FROM product_relations
             WHERE finished_id = ?1 ORDER BY priority",
          )?
          .query_map(rusqlite::params![id], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        let raw_materials = conn
          .prepare(
            "SELECT m.code, m.diameter, m.filament_class, m.quality, m.special_bucket
             FROM raw_materials m
             JOIN product_relations r ON r.raw_material_code = m.code
             WHERE r.finished_id = ?1 ORDER BY r.priority",
          )?
          .query_map(rusqlite::params![id], RawVariant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let finished_rl = query_lines(conn, OwnerKind::Finished, &finished.code)?;
        let interm_rl = query_lines(conn, OwnerKind::Intermediate, &intermediate.code)?;
        let raw_rl = relations
          .iter()
          .map(|(code, _)| Ok((code.clone(), query_lines(conn, OwnerKind::RawMaterial, code)?)))
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(RawGraph {
          finished,
          intermediate,
          relations,
          raw_materials,
          finished_rl,
          interm_rl,
          raw_rl,
        }))
      })
      .await?;

    let Some(raw) = raw else {
      return Ok(None);
    };

    let finished = raw.finished.into_finished()?;
    let intermediate = raw.intermediate.into_intermediate()?;
    let recipes = RecipeSets {
      finished:      decode_recipe_set(OwnerKind::Finished, finished.code.clone(), raw.finished_rl)?,
      intermediate:  decode_recipe_set(
        OwnerKind::Intermediate,
        intermediate.code.clone(),
        raw.interm_rl,
      )?,
      raw_materials: raw
        .raw_rl
        .into_iter()
        .map(|(code, lines)| decode_recipe_set(OwnerKind::RawMaterial, code, lines))
        .collect::<Result<_>>()?,
    };

    Ok(Some(ProductGraph {
      relations: raw
        .relations
        .into_iter()
        .map(|(code, priority)| decode_relation(finished.id, code, priority))
        .collect::<Result<_>>()?,
      raw_materials: raw
        .raw_materials
        .into_iter()
        .map(RawVariant::into_variant)
        .collect::<Result<_>>()?,
      finished,
      intermediate,
      recipes,
    }))
  }

  async fn finished_code_exists<'a>(&'a self, code: &'a str) -> Result<bool> {
    let code = code.to_owned();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM finished_products WHERE code = ?1",
              rusqlite::params![code],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn list_finished_products(&self) -> Result<Vec<FinishedProduct>> {
    let raws: Vec<RawFinished> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM finished_products ORDER BY code",
          RawFinished::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawFinished::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFinished::into_finished).collect()
  }
}
