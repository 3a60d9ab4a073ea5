//! Orchestrates normalization, coding, selection and recipe calculation
//! against a store, keeping the finished → intermediate → raw-material →
//! recipe graph consistent across create, update and delete.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  calculator,
  codegen::{CodeGenerator, ProductCodes},
  config::EngineConfig,
  normalize::normalize,
  product::{
    FinishedProduct, IntermediateProduct, ProductRelation, ProductState, RawMaterialVariant,
    VariantOrigin,
  },
  recipe::{RecipeOverride, RecipeRecord, RecipeSets},
  selector::{RawMaterialSelector, Selection, SelectionTier, is_compatible},
  sequencer::{CodeSequencer, SequenceKey, SequenceTicket},
  spec::{ProductSpec, RawSpec},
  store::{Catalog, DeletionReport, GraphStore, ProductGraph, SequenceService},
};

/// A full derivation that has not been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
  pub spec:      ProductSpec,
  /// Peeked, never committed.
  pub sequence:  SequenceTicket,
  pub codes:     ProductCodes,
  pub selection: Selection,
  pub recipes:   RecipeSets,
  pub state:     ProductState,
}

pub struct RelationshipIntegrityManager<S> {
  store:     Arc<S>,
  config:    EngineConfig,
  codes:     CodeGenerator,
  sequencer: CodeSequencer<S>,
  selector:  RawMaterialSelector<S>,
  locks:     Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S> RelationshipIntegrityManager<S>
where
  S: Catalog + SequenceService + GraphStore,
{
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    let codes = config.code_generator();
    Self {
      sequencer: CodeSequencer::new(store.clone()),
      selector: RawMaterialSelector::new(
        store.clone(),
        codes.clone(),
        config.max_raw_materials,
        config.nearest_max_deviation_mm,
      ),
      store,
      codes,
      config,
      locks: Mutex::new(HashMap::new()),
    }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ─── Derive ────────────────────────────────────────────────────────────────

  /// Everything `create` would persist, computed against a peeked sequence.
  pub async fn derive(
    &self,
    raw: &RawSpec,
    overrides: &[RecipeOverride],
  ) -> Result<Derivation> {
    let spec = normalize(raw)?;
    let sequence = self.sequencer.peek_next(spec.coating_type, spec.diameter).await;
    let codes = self.codes.generate(&spec, sequence.value);
    let selection = self.selector.select(&spec).await?;
    let recipes = calculator::calculate(&spec, &codes, &selection.variants, overrides)?;
    Ok(Derivation {
      spec,
      sequence,
      codes,
      selection,
      recipes,
      state: ProductState::Draft,
    })
  }

  // ─── Create ────────────────────────────────────────────────────────────────

  pub async fn create(
    &self,
    raw: &RawSpec,
    overrides: &[RecipeOverride],
  ) -> Result<ProductGraph> {
    let spec = normalize(raw)?;
    let selection = self.selector.select(&spec).await?;

    // Overrides are checked against a peeked code; a rejected request must
    // leave the counter untouched.
    let peeked = self.sequencer.peek_next(spec.coating_type, spec.diameter).await;
    calculator::calculate(
      &spec,
      &self.codes.generate(&spec, peeked.value),
      &selection.variants,
      overrides,
    )?;

    let sequence = self.commit_sequence(&spec).await?;
    let codes = self.codes.generate(&spec, sequence);
    let recipes = calculator::calculate(&spec, &codes, &selection.variants, overrides)?;

    let finished_id = Uuid::new_v4();
    let now = Utc::now();
    let graph = build_graph(
      FinishedProduct {
        id: finished_id,
        code: codes.finished_code.clone(),
        name_tr: codes.stock_name_tr.clone(),
        name_en: codes.stock_name_en.clone(),
        tariff_bracket: codes.tariff_bracket.clone(),
        packaging_material_code: codes.packaging_material_code.clone(),
        spec,
        state: ProductState::Persisted,
        created_at: now,
        updated_at: now,
      },
      Uuid::new_v4(),
      &codes,
      selection.variants,
      recipes,
    );

    let ids = self.store.create_product_graph(graph.clone()).await?;
    info!(
      code = %graph.finished.code,
      id = %ids.finished_id,
      tier = %selection.tier,
      raw_materials = graph.raw_materials.len(),
      "product created"
    );
    Ok(persisted(graph))
  }

  /// Consume sequence values until one yields an unused code.
  async fn commit_sequence(&self, spec: &ProductSpec) -> Result<u32> {
    let key = SequenceKey::new(spec.coating_type, spec.diameter);
    let attempts = self.config.sequence_retries.max(1);
    let mut unavailable = false;

    for attempt in 1..=attempts {
      let ticket = self.sequencer.commit(spec.coating_type, spec.diameter).await;
      if !ticket.confirmed {
        unavailable = true;
        warn!(%key, attempt, "sequence counter unavailable; backing off");
        tokio::time::sleep(self.config.backoff(attempt)).await;
        continue;
      }
      unavailable = false;

      let code = self.codes.finished_code(spec, ticket.value);
      if !self.store.finished_code_exists(&code).await.map_err(Error::store)? {
        return Ok(ticket.value);
      }
      warn!(%key, %code, attempt, "sequence collides with an existing product; retrying");
      tokio::time::sleep(self.config.backoff(attempt)).await;
    }

    Err(if unavailable {
      Error::SequenceUnavailable { key }
    } else {
      Error::SequenceConflict { key, attempts }
    })
  }

  // ─── Update ────────────────────────────────────────────────────────────────

  /// Recompute every derived field except the codes and replace all three
  /// recipe tiers.
  pub async fn update(
    &self,
    finished_id: Uuid,
    raw: &RawSpec,
    overrides: &[RecipeOverride],
  ) -> Result<ProductGraph> {
    let spec = normalize(raw)?;

    let lock = self.product_lock(finished_id);
    let _guard = lock.lock().await;

    let existing = self.load(finished_id).await?;
    check_transition(existing.finished.state, ProductState::Updated)?;

    let reused = related_variants(&existing)
      .into_iter()
      .filter(|v| is_compatible(&spec, v))
      .collect::<Vec<_>>();
    let selection = if reused.is_empty() {
      self.selector.select(&spec).await?
    } else {
      Selection { tier: SelectionTier::Reused, variants: reused }
    };

    let mut codes = self.codes.generate(&spec, 0);
    codes.finished_code = existing.finished.code.clone();
    codes.intermediate_code = existing.intermediate.code.clone();
    let recipes = calculator::calculate(&spec, &codes, &selection.variants, overrides)?;

    let graph = build_graph(
      FinishedProduct {
        id: finished_id,
        code: codes.finished_code.clone(),
        name_tr: codes.stock_name_tr.clone(),
        name_en: codes.stock_name_en.clone(),
        tariff_bracket: codes.tariff_bracket.clone(),
        packaging_material_code: codes.packaging_material_code.clone(),
        spec,
        state: ProductState::Updated,
        created_at: existing.finished.created_at,
        updated_at: Utc::now(),
      },
      existing.intermediate.id,
      &codes,
      selection.variants,
      recipes,
    );

    self.store.replace_recipe_sets(finished_id, graph.clone()).await?;
    info!(
      code = %graph.finished.code,
      id = %finished_id,
      tier = %selection.tier,
      "product updated"
    );
    Ok(persisted(graph))
  }

  // ─── Delete ────────────────────────────────────────────────────────────────

  pub async fn delete(&self, finished_id: Uuid) -> Result<DeletionReport> {
    let lock = self.product_lock(finished_id);
    let guard = lock.lock().await;

    let existing = self.load(finished_id).await?;
    check_transition(existing.finished.state, ProductState::Deleted)?;

    let report = self.store.delete_product_graph(finished_id).await?;
    info!(
      code = %report.finished_code,
      id = %finished_id,
      relations = report.relations_removed,
      recipe_lines = report.recipe_lines_removed,
      shared = report.raw_materials_shared.len(),
      "product deleted"
    );

    drop(guard);
    self
      .locks
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .remove(&finished_id);
    Ok(report)
  }

  // ─── Reads ─────────────────────────────────────────────────────────────────

  pub async fn show(&self, finished_id: Uuid) -> Result<ProductGraph> {
    self.load(finished_id).await
  }

  pub async fn list(&self) -> Result<Vec<FinishedProduct>> {
    self.store.list_finished_products().await.map_err(Error::store)
  }

  /// The product's recipes flattened into ERP import rows.
  pub async fn recipe_records(&self, finished_id: Uuid) -> Result<Vec<RecipeRecord>> {
    Ok(self.load(finished_id).await?.recipes.to_records())
  }

  // ─── Catalog ───────────────────────────────────────────────────────────────

  pub async fn add_raw_material(&self, variant: RawMaterialVariant) -> Result<RawMaterialVariant> {
    let variant = self.store.create_raw_material(variant).await.map_err(Error::store)?;
    info!(code = %variant.code, "raw material added");
    Ok(variant)
  }

  pub async fn raw_materials(&self) -> Result<Vec<RawMaterialVariant>> {
    self.store.list_raw_materials().await.map_err(Error::store)
  }

  async fn load(&self, finished_id: Uuid) -> Result<ProductGraph> {
    self
      .store
      .load_product_graph(finished_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProductNotFound(finished_id))
  }

  fn product_lock(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
    locks.entry(id).or_default().clone()
  }
}

fn check_transition(from: ProductState, to: ProductState) -> Result<()> {
  if from.can_transition_to(to) {
    Ok(())
  } else {
    Err(Error::InvalidTransition { from, to })
  }
}

/// Existing raw materials in relation priority order.
fn related_variants(graph: &ProductGraph) -> Vec<RawMaterialVariant> {
  let mut relations = graph.relations.clone();
  relations.sort_by_key(|r| r.priority);
  relations
    .iter()
    .filter_map(|r| graph.raw_materials.iter().find(|v| v.code == r.raw_material_code))
    .cloned()
    .collect()
}

fn build_graph(
  finished: FinishedProduct,
  intermediate_id: Uuid,
  codes: &ProductCodes,
  raw_materials: Vec<RawMaterialVariant>,
  recipes: RecipeSets,
) -> ProductGraph {
  let intermediate = IntermediateProduct::from_spec(
    intermediate_id,
    finished.id,
    codes.intermediate_code.clone(),
    (codes.intermediate_name_tr.clone(), codes.intermediate_name_en.clone()),
    &finished.spec,
  );
  let relations = raw_materials
    .iter()
    .enumerate()
    .map(|(i, v)| ProductRelation {
      finished_id:       finished.id,
      raw_material_code: v.code.clone(),
      priority:          u8::try_from(i).unwrap_or(u8::MAX),
    })
    .collect();
  ProductGraph { finished, intermediate, raw_materials, relations, recipes }
}

/// Synthesized variants are catalog entries once their graph is stored.
fn persisted(mut graph: ProductGraph) -> ProductGraph {
  for v in &mut graph.raw_materials {
    v.origin = VariantOrigin::Catalog;
  }
  graph
}
