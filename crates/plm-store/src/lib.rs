//! # PLM Store
//!
//! SQLite-backed product lifecycle store for release orchestration.
//!
//! This crate provides:
//! - Items, workcenters, routings with operations, MBOMs with lines and
//!   baselines with members
//! - Release diagnostics for every rule id the orchestrator understands
//! - Release and reopen transitions that reject double releases
//! - E-sign manifests, signatures and revocation
//!
//! Every collaborator contract of the `orchestration` crate is
//! implemented here, so one store drives plan and execute end to end.
//!
//! ## Example
//!
//! ```no_run
//! use orchestration::{ExecuteOptions, ReleaseOrchestrator};
//! use plm_store::PlmStore;
//! use std::path::Path;
//!
//! let store = PlmStore::open(Path::new("/tmp/plm.db"))?;
//! let orchestrator = ReleaseOrchestrator::default();
//! let report = orchestrator
//!     .execute(&store.collaborators(), "part-100", &ExecuteOptions::default())
//!     .map_err(|e| plm_store::Error::Conflict(e.to_string()))?;
//! println!("{} results", report.results.len());
//! # Ok::<(), plm_store::Error>(())
//! ```

mod catalog;
mod error;
mod esign;
mod fixture;
mod lifecycle;
mod rules;

pub use catalog::{ItemRecord, NewBaseline, NewMbom, NewRouting};
pub use error::{Error, Result};
pub use esign::{SignatureRecord, Verification};
pub use fixture::{
    Fixture, FixtureBaseline, FixtureItem, FixtureLine, FixtureManifest, FixtureMbom,
    FixtureMember, FixtureOperation, FixtureRouting, FixtureWorkcenter, ImportSummary,
};

use lifecycle::{BaselineLifecycle, MbomLifecycle, RoutingLifecycle};
use orchestration::Collaborators;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        generation INTEGER NOT NULL DEFAULT 1,
        state TEXT NOT NULL DEFAULT 'draft'
    );

    CREATE TABLE IF NOT EXISTS workcenters (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS routings (
        id TEXT PRIMARY KEY,
        item_id TEXT,
        mbom_id TEXT,
        name TEXT,
        state TEXT NOT NULL DEFAULT 'draft',
        is_primary INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS routing_operations (
        id INTEGER PRIMARY KEY,
        routing_id TEXT NOT NULL,
        operation_number TEXT NOT NULL,
        workcenter_id TEXT
    );

    CREATE TABLE IF NOT EXISTS mboms (
        id TEXT PRIMARY KEY,
        source_item_id TEXT NOT NULL,
        name TEXT,
        plant_code TEXT,
        state TEXT NOT NULL DEFAULT 'draft'
    );

    CREATE TABLE IF NOT EXISTS mbom_lines (
        id INTEGER PRIMARY KEY,
        mbom_id TEXT NOT NULL,
        child_item_id TEXT NOT NULL,
        quantity REAL NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS baselines (
        id TEXT PRIMARY KEY,
        root_item_id TEXT NOT NULL,
        name TEXT,
        state TEXT NOT NULL DEFAULT 'draft',
        is_validated INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS baseline_members (
        id INTEGER PRIMARY KEY,
        baseline_id TEXT NOT NULL,
        item_id TEXT NOT NULL,
        item_generation INTEGER
    );

    CREATE TABLE IF NOT EXISTS esign_manifests (
        id INTEGER PRIMARY KEY,
        item_id TEXT NOT NULL,
        generation INTEGER NOT NULL,
        required_signatures TEXT NOT NULL,
        UNIQUE(item_id, generation)
    );

    CREATE TABLE IF NOT EXISTS signatures (
        id INTEGER PRIMARY KEY,
        item_id TEXT NOT NULL,
        generation INTEGER NOT NULL,
        meaning TEXT NOT NULL,
        signer TEXT NOT NULL,
        reason TEXT,
        content_hash TEXT NOT NULL,
        signature_hash TEXT NOT NULL,
        signed_at TEXT NOT NULL,
        revoked_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_routings_item ON routings(item_id);
    CREATE INDEX IF NOT EXISTS idx_routings_mbom ON routings(mbom_id);
    CREATE INDEX IF NOT EXISTS idx_mboms_source ON mboms(source_item_id);
    CREATE INDEX IF NOT EXISTS idx_baselines_root ON baselines(root_item_id);
    CREATE INDEX IF NOT EXISTS idx_signatures_item ON signatures(item_id, generation);
";

/// A PLM database
pub struct PlmStore {
    conn: Connection,
}

impl PlmStore {
    /// Open or create a store at the given path
    ///
    /// Creates the database file and necessary tables if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::Open {
                path: db_path.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        log::debug!("Opening PLM store at {}", db_path.display());
        Self::init(Connection::open(db_path)?)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Collaborators for one orchestrator call
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            items: self,
            candidates: self,
            diagnostics: self,
            manifests: self,
            routings: Box::new(RoutingLifecycle { store: self }),
            mboms: Box::new(MbomLifecycle { store: self }),
            baselines: Box::new(BaselineLifecycle { store: self }),
        }
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}
