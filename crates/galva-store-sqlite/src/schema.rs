//! SQL schema for the galva SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Raw-material catalog. Rows are never deleted by product operations.
CREATE TABLE IF NOT EXISTS raw_materials (
    code            TEXT PRIMARY KEY,     -- YM.ST.DDDD.FFFF.QQQQ
    diameter        TEXT NOT NULL,        -- fixed 2-decimal string
    diameter_mm     REAL NOT NULL,        -- same value, for range queries
    filament_class  TEXT NOT NULL,        -- fixed 2-decimal string
    quality         INTEGER NOT NULL,
    special_bucket  INTEGER NOT NULL CHECK (special_bucket BETWEEN 1 AND 8),
    created_at      TEXT NOT NULL
);

-- One counter per (coating, diameter). next_value only ever grows.
CREATE TABLE IF NOT EXISTS sequence_counters (
    coating_type   TEXT NOT NULL,
    diameter_code  TEXT NOT NULL,
    next_value     INTEGER NOT NULL DEFAULT 0 CHECK (next_value >= 0),
    PRIMARY KEY (coating_type, diameter_code)
);

CREATE TABLE IF NOT EXISTS finished_products (
    finished_id              TEXT PRIMARY KEY,
    code                     TEXT NOT NULL UNIQUE,
    name_tr                  TEXT NOT NULL,
    name_en                  TEXT NOT NULL,
    tariff_bracket           TEXT NOT NULL,
    packaging_material_code  TEXT NOT NULL,
    spec_json                TEXT NOT NULL,
    state                    TEXT NOT NULL,   -- 'persisted' | 'updated'
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS intermediate_products (
    intermediate_id  TEXT PRIMARY KEY,
    finished_id      TEXT NOT NULL UNIQUE REFERENCES finished_products(finished_id),
    code             TEXT NOT NULL UNIQUE,
    name_tr          TEXT NOT NULL,
    name_en          TEXT NOT NULL,
    diameter         TEXT NOT NULL,
    coating_type     TEXT NOT NULL,
    coating_amount   TEXT NOT NULL,
    min_tensile      INTEGER NOT NULL,
    max_tensile      INTEGER NOT NULL,
    tolerance_lower  TEXT NOT NULL,
    tolerance_upper  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS product_relations (
    finished_id        TEXT NOT NULL REFERENCES finished_products(finished_id),
    raw_material_code  TEXT NOT NULL REFERENCES raw_materials(code),
    priority           INTEGER NOT NULL,
    PRIMARY KEY (finished_id, raw_material_code)
);

-- Recipe lines of every tier, keyed by owner stock code.
CREATE TABLE IF NOT EXISTS recipe_lines (
    owner_kind       TEXT NOT NULL,   -- 'finished' | 'intermediate' | 'raw_material'
    owner_code       TEXT NOT NULL,
    sequence_number  INTEGER NOT NULL,
    kind             TEXT NOT NULL,   -- 'component' | 'operation'
    component_code   TEXT NOT NULL,
    quantity         REAL NOT NULL,
    unit             TEXT NOT NULL,
    description      TEXT NOT NULL,
    links_owner      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner_kind, owner_code, sequence_number)
);

CREATE INDEX IF NOT EXISTS raw_materials_diameter_idx ON raw_materials(diameter_mm);
CREATE INDEX IF NOT EXISTS relations_raw_material_idx ON product_relations(raw_material_code);

PRAGMA user_version = 1;
";
