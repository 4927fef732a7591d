//! Catalog diff engine: compare then generate

use livedb_core::Catalog;

use crate::compare::{CatalogComparator, CompareConfig, DiffResult};
use crate::migration::{AlterScript, AlterScriptGenerator, DiffOptions};

/// Produces the DDL that turns a server catalog into a client catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogDiffEngine {
    comparator: CatalogComparator,
    generator: AlterScriptGenerator,
}

impl CatalogDiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self {
            comparator: CatalogComparator::new(),
            generator: AlterScriptGenerator::new(options),
        }
    }

    pub fn with_compare_config(mut self, config: CompareConfig) -> Self {
        self.comparator = CatalogComparator::with_config(config);
        self
    }

    pub fn options(&self) -> &DiffOptions {
        self.generator.options()
    }

    /// Diff `server` against `client`.
    ///
    /// Objects are paired by id first, then by their recorded previous
    /// name, then by name. An empty or `USE`-only result means there is
    /// nothing to apply.
    pub fn diff(&self, server: &Catalog, client: &Catalog) -> DiffResult<AlterScript> {
        let changes = self.comparator.compare(server, client)?;
        tracing::debug!(changes = changes.change_count(), "catalog comparison finished");
        self.generator.generate(&changes)
    }
}
