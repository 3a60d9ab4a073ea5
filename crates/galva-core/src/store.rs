//! Storage collaborator traits and the graph types they exchange.
//!
//! The traits are implemented by storage backends (e.g. `galva-store-sqlite`).
//! The engine depends on these abstractions only; every graph write is
//! expected to be atomic from the caller's point of view.

use std::{fmt, future::Future};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  product::{FinishedProduct, IntermediateProduct, ProductRelation, RawMaterialVariant},
  recipe::RecipeSets,
  sequencer::SequenceKey,
};

// ─── Graph ───────────────────────────────────────────────────────────────────

/// Everything persisted for one finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGraph {
  pub finished:      FinishedProduct,
  pub intermediate:  IntermediateProduct,
  /// Every variant the product is related to, catalog and synthesized alike.
  /// Synthesized variants are inserted into the catalog by the same write.
  pub raw_materials: Vec<RawMaterialVariant>,
  pub relations:     Vec<ProductRelation>,
  pub recipes:       RecipeSets,
}

/// The individual writes a graph operation is made of, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStep {
  RawMaterials,
  FinishedProduct,
  IntermediateProduct,
  Relations,
  RawMaterialRecipes,
  IntermediateRecipe,
  FinishedRecipe,
}

impl GraphStep {
  /// Order of a cascading delete.
  pub const DELETE_ORDER: [GraphStep; 6] = [
    GraphStep::RawMaterialRecipes,
    GraphStep::Relations,
    GraphStep::IntermediateRecipe,
    GraphStep::IntermediateProduct,
    GraphStep::FinishedRecipe,
    GraphStep::FinishedProduct,
  ];

  /// Order of a create or replace.
  pub const WRITE_ORDER: [GraphStep; 7] = [
    GraphStep::RawMaterials,
    GraphStep::FinishedProduct,
    GraphStep::IntermediateProduct,
    GraphStep::Relations,
    GraphStep::RawMaterialRecipes,
    GraphStep::IntermediateRecipe,
    GraphStep::FinishedRecipe,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::RawMaterials => "raw_materials",
      Self::FinishedProduct => "finished_product",
      Self::IntermediateProduct => "intermediate_product",
      Self::Relations => "relations",
      Self::RawMaterialRecipes => "raw_material_recipes",
      Self::IntermediateRecipe => "intermediate_recipe",
      Self::FinishedRecipe => "finished_recipe",
    }
  }
}

impl fmt::Display for GraphStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A failed graph write. The backend has rolled back every step that ran
/// before `step`.
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct GraphWriteError<E: std::error::Error + 'static> {
  pub step:   GraphStep,
  #[source]
  pub source: E,
}

/// Identifiers assigned by [`GraphStore::create_product_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIds {
  pub finished_id:     Uuid,
  pub intermediate_id: Uuid,
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
  pub finished_code:          String,
  pub intermediate_code:      String,
  pub relations_removed:      usize,
  pub recipe_lines_removed:   usize,
  /// Variants whose recipe lines were removed because nothing else uses them.
  pub raw_materials_released: Vec<String>,
  /// Variants still related to other finished products; left untouched.
  pub raw_materials_shared:   Vec<String>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Raw-material catalog reads and writes.
pub trait Catalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Variants with `min <= diameter <= max`, optionally restricted to a
  /// filament class and quality grade.
  fn find_raw_materials_by_diameter_window(
    &self,
    min: f64,
    max: f64,
    filament_class: Option<Decimal>,
    quality: Option<u16>,
  ) -> impl Future<Output = Result<Vec<RawMaterialVariant>, Self::Error>> + Send + '_;

  fn find_raw_material_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<RawMaterialVariant>, Self::Error>> + Send + 'a;

  /// Persist a variant. The returned variant has origin `Catalog`.
  fn create_raw_material(
    &self,
    variant: RawMaterialVariant,
  ) -> impl Future<Output = Result<RawMaterialVariant, Self::Error>> + Send + '_;

  fn list_raw_materials(
    &self,
  ) -> impl Future<Output = Result<Vec<RawMaterialVariant>, Self::Error>> + Send + '_;
}

/// Backing counter for [`crate::sequencer::CodeSequencer`].
pub trait SequenceService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The value the next `commit` would return; does not mutate.
  fn peek_next<'a>(
    &'a self,
    key: &'a SequenceKey,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  /// Atomically consume and return the current value.
  fn commit<'a>(
    &'a self,
    key: &'a SequenceKey,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;
}

/// Persistence of the finished → intermediate → raw-material → recipe graph.
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert the whole graph in one transaction.
  fn create_product_graph(
    &self,
    graph: ProductGraph,
  ) -> impl Future<Output = Result<ProductIds, GraphWriteError<Self::Error>>> + Send + '_;

  /// Overwrite the derived fields of an existing product and replace its
  /// relations and all three recipe tiers in one transaction.
  fn replace_recipe_sets(
    &self,
    finished_id: Uuid,
    graph: ProductGraph,
  ) -> impl Future<Output = Result<(), GraphWriteError<Self::Error>>> + Send + '_;

  /// Cascading delete in [`GraphStep::DELETE_ORDER`].
  fn delete_product_graph(
    &self,
    finished_id: Uuid,
  ) -> impl Future<Output = Result<DeletionReport, GraphWriteError<Self::Error>>> + Send + '_;

  /// Load a product graph; `None` if the finished product does not exist.
  fn load_product_graph(
    &self,
    finished_id: Uuid,
  ) -> impl Future<Output = Result<Option<ProductGraph>, Self::Error>> + Send + '_;

  fn finished_code_exists<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn list_finished_products(
    &self,
  ) -> impl Future<Output = Result<Vec<FinishedProduct>, Self::Error>> + Send + '_;
}
