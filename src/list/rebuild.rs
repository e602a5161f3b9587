//! Transactional rebuild of list membership and unions.

use serde::Serialize;

use super::{resolve_order, ListDefinition, Predicate, QueryBuilder};
use crate::addr::CidrBlock;
use crate::range::CoverWriter;
use crate::store::{FetchMode, ListId, ListStore, SqlAddress};
use crate::Result;

/// Per-family counts of one list rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FamilyStats {
    /// Raw netblocks selected into membership.
    pub members: u64,
    /// Disjoint merged runs.
    pub runs: u64,
    /// CIDR blocks written to the union.
    pub blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListStats {
    pub list_id: ListId,
    pub v4: FamilyStats,
    pub v6: FamilyStats,
}

/// What happened to one list during a rebuild pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ListOutcome {
    Committed(ListStats),
    RolledBack { error: String },
    /// The list selects nothing; stored data was left untouched.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ListOutcome,
}

/// Outcome of [`ListRebuilder::rebuild_all`], in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub lists: Vec<ListReport>,
    /// Lists built without their includes being built first.
    pub unresolved: Vec<String>,
}

impl RebuildReport {
    pub fn committed(&self) -> usize {
        self.count(|o| matches!(o, ListOutcome::Committed(_)))
    }

    pub fn rolled_back(&self) -> usize {
        self.count(|o| matches!(o, ListOutcome::RolledBack { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ListOutcome::Skipped))
    }

    pub fn get(&self, name: &str) -> Option<&ListOutcome> {
        self.lists
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }

    fn count(&self, f: impl Fn(&ListOutcome) -> bool) -> usize {
        self.lists.iter().filter(|r| f(&r.outcome)).count()
    }
}

/// Rebuilds persisted lists from their definitions.
///
/// Lists are built one at a time in dependency order, each in its own
/// transaction. A failing list is rolled back and the pass moves on.
pub struct ListRebuilder<'a, S> {
    store: &'a S,
    lists: &'a [ListDefinition],
    mode: FetchMode,
}

impl<'a, S: ListStore> ListRebuilder<'a, S> {
    pub fn new(store: &'a S, lists: &'a [ListDefinition]) -> Self {
        Self {
            store,
            lists,
            mode: FetchMode::default(),
        }
    }

    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn rebuild_all(&self) -> RebuildReport {
        let resolution = resolve_order(self.lists);
        let builder = QueryBuilder::new(self.lists);
        log::info!("rebuilding {} lists", resolution.order.len());

        let mut report = RebuildReport {
            lists: Vec::with_capacity(resolution.order.len()),
            unresolved: resolution.unresolved.iter().map(|s| s.to_string()).collect(),
        };

        for def in &resolution.order {
            let outcome = match builder.compile(&def.name) {
                Some(predicate) => self.rebuild_list(&def.name, &predicate),
                None => {
                    log::info!("  skipping {}: selects nothing", def.name);
                    ListOutcome::Skipped
                }
            };
            report.lists.push(ListReport {
                name: def.name.clone(),
                outcome,
            });
        }

        log::info!(
            "rebuild done: {} committed, {} rolled back, {} skipped",
            report.committed(),
            report.rolled_back(),
            report.skipped()
        );
        report
    }

    /// Rebuild one list from a compiled predicate inside a transaction.
    pub fn rebuild_list(&self, name: &str, predicate: &Predicate) -> ListOutcome {
        log::info!("  building {}", name);
        log::debug!("  {}: {}", name, predicate);

        if let Err(e) = self.store.begin() {
            log::error!("  {}: failed to start transaction: {}", name, e);
            return ListOutcome::RolledBack {
                error: e.to_string(),
            };
        }

        let result = self
            .build(name, predicate)
            .and_then(|stats| self.store.commit().map(|()| stats));

        match result {
            Ok(stats) => {
                log::info!(
                    "  {}: {} v4 / {} v6 members, {} v4 / {} v6 blocks",
                    name,
                    stats.v4.members,
                    stats.v6.members,
                    stats.v4.blocks,
                    stats.v6.blocks
                );
                ListOutcome::Committed(stats)
            }
            Err(e) => {
                log::error!("  {}: rebuild failed, rolling back: {}", name, e);
                if let Err(rollback) = self.store.rollback() {
                    log::error!("  {}: rollback failed: {}", name, rollback);
                }
                ListOutcome::RolledBack {
                    error: e.to_string(),
                }
            }
        }
    }

    fn build(&self, name: &str, predicate: &Predicate) -> Result<ListStats> {
        let list_id = self.store.ensure_list(name)?;
        self.store.clear_list::<u32>(list_id)?;
        self.store.clear_list::<u128>(list_id)?;
        Ok(ListStats {
            list_id,
            v4: self.build_family::<u32>(list_id, predicate)?,
            v6: self.build_family::<u128>(list_id, predicate)?,
        })
    }

    fn build_family<A: SqlAddress>(
        &self,
        list: ListId,
        predicate: &Predicate,
    ) -> Result<FamilyStats> {
        let members = self.store.populate_membership::<A>(list, predicate)?;

        let store = self.store;
        let mut writer =
            CoverWriter::new(|block: CidrBlock<A>| store.insert_union_block::<A>(list, block));
        store.scan_membership::<A>(list, self.mode, &mut |range| writer.push(range))?;
        let counts = writer.finish()?;

        Ok(FamilyStats {
            members,
            runs: counts.runs,
            blocks: counts.blocks,
        })
    }
}
