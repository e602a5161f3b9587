//! Registry-wide coverage union and the post-import refresh.

use serde::Serialize;

use crate::addr::CidrBlock;
use crate::list::{ListDefinition, ListRebuilder, RebuildReport};
use crate::range::{CoverCounts, CoverWriter};
use crate::store::{FetchMode, ListStore, SqlAddress};
use crate::Result;

/// Counts of one coverage rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageStats {
    pub v4_netblocks: u64,
    pub v4: CoverCounts,
    pub v6_netblocks: u64,
    pub v6: CoverCounts,
}

/// Replace the coverage union of both families in one transaction.
pub fn rebuild_coverage<S: ListStore>(store: &S) -> Result<CoverageStats> {
    log::info!("rebuilding coverage union");
    store.begin()?;
    match build_coverage(store).and_then(|stats| store.commit().map(|()| stats)) {
        Ok(stats) => {
            log::info!(
                "coverage: {} v4 netblocks -> {} blocks, {} v6 netblocks -> {} blocks",
                stats.v4_netblocks,
                stats.v4.blocks,
                stats.v6_netblocks,
                stats.v6.blocks
            );
            Ok(stats)
        }
        Err(e) => {
            log::error!("coverage rebuild failed, rolling back: {}", e);
            if let Err(rollback) = store.rollback() {
                log::error!("coverage rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

fn build_coverage<S: ListStore>(store: &S) -> Result<CoverageStats> {
    let (v4_netblocks, v4) = build_family::<S, u32>(store)?;
    let (v6_netblocks, v6) = build_family::<S, u128>(store)?;
    Ok(CoverageStats {
        v4_netblocks,
        v4,
        v6_netblocks,
        v6,
    })
}

fn build_family<S: ListStore, A: SqlAddress>(store: &S) -> Result<(u64, CoverCounts)> {
    store.clear_coverage::<A>()?;
    let mut writer = CoverWriter::new(|block: CidrBlock<A>| store.insert_coverage_block(block));
    let scanned = store.scan_netblocks::<A>(&mut |range| writer.push(range))?;
    Ok((scanned, writer.finish()?))
}

/// Result of [`rebuild_after_import`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// `None` when the coverage rebuild failed; lists are rebuilt regardless.
    pub coverage: Option<CoverageStats>,
    pub lists: RebuildReport,
}

/// Refresh everything derived from raw netblocks: the coverage union, then
/// every configured list.
pub fn rebuild_after_import<S: ListStore>(
    store: &S,
    lists: &[ListDefinition],
    mode: FetchMode,
) -> RefreshReport {
    let coverage = rebuild_coverage(store).ok();
    let lists = ListRebuilder::new(store, lists).fetch_mode(mode).rebuild_all();
    RefreshReport { coverage, lists }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::parse_cidr;
    use crate::import::Importer;
    use crate::list::Field;
    use crate::model::NetBlock;
    use crate::store::SqliteStore;

    fn import(store: &SqliteStore, registrar: &str, nets: &[&str]) {
        let mut import = Importer::begin(store, registrar).unwrap();
        for net in nets {
            if net.contains(':') {
                import
                    .insert_netblock(NetBlock::new(parse_cidr::<u128>(net).unwrap()).name("NET"))
                    .unwrap();
            } else {
                import
                    .insert_netblock(NetBlock::new(parse_cidr::<u32>(net).unwrap()).name("NET"))
                    .unwrap();
            }
        }
        import.finish().unwrap();
    }

    fn strings<A: SqlAddress>(blocks: Vec<CidrBlock<A>>) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_coverage_spans_registrars() {
        let store = SqliteStore::open_in_memory().unwrap();
        import(&store, "A", &["10.0.0.0/24", "10.0.0.128/25", "2001:db8::/33"]);
        import(&store, "B", &["10.0.1.0/24", "192.0.2.0/24", "2001:db8:8000::/33"]);

        let stats = rebuild_coverage(&store).unwrap();
        assert_eq!(stats.v4_netblocks, 4);
        assert_eq!(stats.v4, CoverCounts { runs: 2, blocks: 2 });
        assert_eq!(
            strings(store.coverage::<u32>().unwrap()),
            vec!["10.0.0.0/23", "192.0.2.0/24"]
        );
        assert_eq!(strings(store.coverage::<u128>().unwrap()), vec!["2001:db8::/32"]);
    }

    #[test]
    fn test_coverage_replaces_previous_union() {
        let store = SqliteStore::open_in_memory().unwrap();
        import(&store, "A", &["10.0.0.0/24"]);
        rebuild_coverage(&store).unwrap();
        import(&store, "A", &["172.16.0.0/12"]);
        rebuild_coverage(&store).unwrap();
        assert_eq!(strings(store.coverage::<u32>().unwrap()), vec!["172.16.0.0/12"]);
    }

    #[test]
    fn test_rebuild_after_import() {
        let store = SqliteStore::open_in_memory().unwrap();
        import(&store, "A", &["10.0.0.0/24"]);
        let lists = vec![ListDefinition::new("net").matching(Field::IpNetname, "NET")];
        let report = rebuild_after_import(&store, &lists, FetchMode::Stream);
        assert!(report.coverage.is_some());
        assert_eq!(report.lists.committed(), 1);
    }
}
