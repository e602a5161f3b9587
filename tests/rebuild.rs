//! End-to-end tests: import, rebuild, query.

use rackradar::addr::{AddrRange, CidrBlock};
use rackradar::export::export_list;
use rackradar::list::{ListOutcome, Predicate};
use rackradar::store::{FetchMode, ListId, SqlAddress};
use rackradar::{
    parse_cidr, rebuild_after_import, Config, Field, Importer, ListDefinition, ListRebuilder,
    ListStore, NetBlock, NetBlockInfo, Org, SqliteStore,
};

fn v4(net: &str, name: &str) -> NetBlock<u32> {
    NetBlock::new(parse_cidr(net).unwrap()).name(name)
}

fn v6(net: &str, name: &str) -> NetBlock<u128> {
    NetBlock::new(parse_cidr(net).unwrap()).name(name)
}

fn union<A: SqlAddress>(store: &SqliteStore, list: &str) -> Vec<String> {
    let id = store.list_by_name(list).unwrap().expect("list exists");
    store
        .list_union::<A>(id)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Two registrars with a handful of v4 and v6 netblocks.
fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();

    let mut ripe = Importer::begin(&store, "RIPE").unwrap();
    ripe.insert_org(Org::new("ORG-EX1").name("Example Hosting"))
        .unwrap();
    ripe.insert_org(Org::new("ORG-TST").name("Test Lab")).unwrap();
    ripe.insert_netblock(v4("10.0.0.0/24", "EXAMPLE-A").org("ORG-EX1"))
        .unwrap();
    ripe.insert_netblock(v4("10.0.1.0/24", "EXAMPLE-B").org("ORG-EX1"))
        .unwrap();
    ripe.insert_netblock(v4("10.0.4.0/24", "EXAMPLE-C").org("ORG-TST"))
        .unwrap();
    ripe.insert_netblock(v6("2001:db8::/33", "EXAMPLE-V6").org("ORG-EX1"))
        .unwrap();
    ripe.insert_netblock(v6("2001:db8:8000::/33", "EXAMPLE-V6B"))
        .unwrap();
    ripe.finish().unwrap();

    let mut arin = Importer::begin(&store, "ARIN").unwrap();
    arin.insert_netblock(v4("192.0.2.0/24", "EXAMPLE-ARIN"))
        .unwrap();
    arin.insert_netblock(v4("198.51.100.0/24", "DOC-NET"))
        .unwrap();
    arin.finish().unwrap();

    store
}

#[test]
fn test_like_match_builds_minimal_union() {
    let store = seeded_store();
    let lists = vec![ListDefinition::new("example").matching(Field::IpNetname, "EXAMPLE-%")];
    let report = ListRebuilder::new(&store, &lists).rebuild_all();
    assert_eq!(report.committed(), 1);

    let id = store.list_by_name("example").unwrap().unwrap();
    assert_eq!(store.membership_count::<u32>(id).unwrap(), 4);
    assert_eq!(store.membership_count::<u128>(id).unwrap(), 2);
    assert_eq!(
        union::<u32>(&store, "example"),
        vec!["10.0.0.0/23", "10.0.4.0/24", "192.0.2.0/24"]
    );
    assert_eq!(union::<u128>(&store, "example"), vec!["2001:db8::/32"]);
}

#[test]
fn test_registrar_ignore_and_org_filters() {
    let store = seeded_store();
    let lists = vec![
        ListDefinition::new("ripe-example")
            .in_registrar("RIPE")
            .matching(Field::IpNetname, "EXAMPLE-%")
            .ignoring(Field::OrgName, "Test%"),
        ListDefinition::new("hosting").matching(Field::OrgName, "%Hosting%"),
        ListDefinition::new("arin").in_registrar("ARIN"),
    ];
    ListRebuilder::new(&store, &lists).rebuild_all();

    assert_eq!(union::<u32>(&store, "ripe-example"), vec!["10.0.0.0/23"]);
    assert_eq!(union::<u128>(&store, "ripe-example"), vec!["2001:db8::/32"]);
    assert_eq!(union::<u32>(&store, "hosting"), vec!["10.0.0.0/23"]);
    assert_eq!(union::<u128>(&store, "hosting"), vec!["2001:db8::/33"]);
    assert_eq!(
        union::<u32>(&store, "arin"),
        vec!["192.0.2.0/24", "198.51.100.0/24"]
    );
}

#[test]
fn test_include_and_exclude() {
    let store = seeded_store();
    let lists = vec![
        ListDefinition::new("all")
            .including("example")
            .including("doc")
            .excluding("lab"),
        ListDefinition::new("example").matching(Field::IpNetname, "EXAMPLE-%"),
        ListDefinition::new("doc").matching(Field::IpNetname, "DOC-%"),
        ListDefinition::new("lab").matching(Field::OrgHandle, "ORG-TST"),
    ];
    let report = ListRebuilder::new(&store, &lists).rebuild_all();

    let order: Vec<&str> = report.lists.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["example", "doc", "lab", "all"]);
    assert_eq!(
        union::<u32>(&store, "all"),
        vec!["10.0.0.0/23", "192.0.2.0/24", "198.51.100.0/24"]
    );
    assert_eq!(union::<u32>(&store, "lab"), vec!["10.0.4.0/24"]);
}

#[test]
fn test_rebuild_twice_is_identical() {
    let store = seeded_store();
    let lists = vec![ListDefinition::new("example").matching(Field::IpNetname, "EXAMPLE-%")];

    ListRebuilder::new(&store, &lists).rebuild_all();
    let first = (union::<u32>(&store, "example"), union::<u128>(&store, "example"));
    ListRebuilder::new(&store, &lists)
        .fetch_mode(FetchMode::Buffered)
        .rebuild_all();
    let second = (union::<u32>(&store, "example"), union::<u128>(&store, "example"));
    assert_eq!(first, second);
}

#[test]
fn test_cyclic_lists_are_built_best_effort() {
    let store = seeded_store();
    let lists = vec![
        ListDefinition::new("a")
            .matching(Field::IpNetname, "EXAMPLE-A")
            .including("b"),
        ListDefinition::new("b")
            .matching(Field::IpNetname, "EXAMPLE-B")
            .including("a"),
    ];
    let report = ListRebuilder::new(&store, &lists).rebuild_all();
    assert_eq!(report.unresolved, vec!["a", "b"]);
    assert_eq!(report.committed(), 2);
    assert_eq!(union::<u32>(&store, "a"), vec!["10.0.0.0/23"]);
    assert_eq!(union::<u32>(&store, "b"), vec!["10.0.0.0/23"]);
}

#[test]
fn test_import_gc_shrinks_lists_after_refresh() {
    let store = seeded_store();
    let lists = vec![ListDefinition::new("example").matching(Field::IpNetname, "EXAMPLE-%")];
    rebuild_after_import(&store, &lists, FetchMode::Stream);

    // RIPE drops 10.0.1.0/24 and 10.0.4.0/24 in its next dump
    let mut ripe = Importer::begin(&store, "RIPE").unwrap();
    ripe.insert_org(Org::new("ORG-EX1").name("Example Hosting"))
        .unwrap();
    ripe.insert_netblock(v4("10.0.0.0/24", "EXAMPLE-A").org("ORG-EX1"))
        .unwrap();
    let stats = ripe.finish().unwrap();
    assert_eq!(stats.serial, 2);
    assert_eq!(stats.v4.deleted, 2);
    assert_eq!(stats.v6.deleted, 2);
    assert_eq!(stats.orgs.deleted, 1);

    let refresh = rebuild_after_import(&store, &lists, FetchMode::Stream);
    assert_eq!(refresh.lists.committed(), 1);
    assert_eq!(
        union::<u32>(&store, "example"),
        vec!["10.0.0.0/24", "192.0.2.0/24"]
    );
    assert!(union::<u128>(&store, "example").is_empty());

    let coverage: Vec<String> = store
        .coverage::<u32>()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        coverage,
        vec!["10.0.0.0/24", "192.0.2.0/24", "198.51.100.0/24"]
    );
}

#[test]
fn test_lookup_and_export() {
    let store = seeded_store();
    let lists = vec![ListDefinition::new("example").matching(Field::IpNetname, "EXAMPLE-%")];
    ListRebuilder::new(&store, &lists).rebuild_all();

    let hit: NetBlockInfo = store
        .lookup(u32::from_be_bytes([10, 0, 1, 77]))
        .unwrap()
        .unwrap();
    assert_eq!(hit.netname, "EXAMPLE-B");
    assert_eq!(hit.registrar, "RIPE");
    assert_eq!(hit.org_handle.as_deref(), Some("ORG-EX1"));
    assert_eq!(hit.org_name.as_deref(), Some("Example Hosting"));

    let id = store.list_by_name("example").unwrap().unwrap();
    let inside = store
        .list_union_lookup(id, u32::from_be_bytes([10, 0, 1, 77]))
        .unwrap();
    assert_eq!(inside.map(|b| b.to_string()).as_deref(), Some("10.0.0.0/23"));

    let mut out = Vec::new();
    export_list(&store, "example", &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "10.0.0.0/23\n10.0.4.0/24\n192.0.2.0/24\n2001:db8::/32\n"
    );
}

#[test]
fn test_config_driven_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rr.db");
    let yaml = format!(
        r#"
database:
  path: {}
lists:
  - name: docs
    match:
      netname: ["DOC-%", "EXAMPLE-ARIN"]
"#,
        db.display()
    );
    let config_path = dir.path().join("rackradar.yaml");
    std::fs::write(&config_path, yaml).unwrap();
    let config = Config::load(&config_path).unwrap();

    let store = SqliteStore::open(&config.database.path).unwrap();
    let mut arin = Importer::begin(&store, "ARIN").unwrap();
    arin.insert_netblock(v4("198.51.100.0/25", "DOC-1")).unwrap();
    arin.insert_netblock(v4("198.51.100.128/25", "DOC-2")).unwrap();
    arin.finish().unwrap();

    let report = ListRebuilder::new(&store, &config.lists)
        .fetch_mode(config.rebuild.fetch_mode())
        .rebuild_all();
    assert_eq!(report.committed(), 1);
    drop(store);

    // reopened from disk
    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(union::<u32>(&store, "docs"), vec!["198.51.100.0/24"]);
}

/// Store whose union inserts fail for one list.
struct FailingStore {
    inner: SqliteStore,
    broken: ListId,
}

impl ListStore for FailingStore {
    fn begin(&self) -> rackradar::Result<()> {
        self.inner.begin()
    }

    fn commit(&self) -> rackradar::Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> rackradar::Result<()> {
        self.inner.rollback()
    }

    fn ensure_list(&self, name: &str) -> rackradar::Result<ListId> {
        self.inner.ensure_list(name)
    }

    fn clear_list<A: SqlAddress>(&self, list: ListId) -> rackradar::Result<()> {
        self.inner.clear_list::<A>(list)
    }

    fn populate_membership<A: SqlAddress>(
        &self,
        list: ListId,
        predicate: &Predicate,
    ) -> rackradar::Result<u64> {
        self.inner.populate_membership::<A>(list, predicate)
    }

    fn scan_membership<A: SqlAddress>(
        &self,
        list: ListId,
        mode: FetchMode,
        sink: &mut dyn FnMut(AddrRange<A>) -> rackradar::Result<()>,
    ) -> rackradar::Result<u64> {
        self.inner.scan_membership(list, mode, sink)
    }

    fn insert_union_block<A: SqlAddress>(
        &self,
        list: ListId,
        block: CidrBlock<A>,
    ) -> rackradar::Result<()> {
        if list == self.broken {
            return Err(rackradar::Error::Import("simulated write failure".into()));
        }
        self.inner.insert_union_block(list, block)
    }

    fn clear_coverage<A: SqlAddress>(&self) -> rackradar::Result<()> {
        self.inner.clear_coverage::<A>()
    }

    fn scan_netblocks<A: SqlAddress>(
        &self,
        sink: &mut dyn FnMut(AddrRange<A>) -> rackradar::Result<()>,
    ) -> rackradar::Result<u64> {
        self.inner.scan_netblocks(sink)
    }

    fn insert_coverage_block<A: SqlAddress>(&self, block: CidrBlock<A>) -> rackradar::Result<()> {
        self.inner.insert_coverage_block(block)
    }

    fn list_by_name(&self, name: &str) -> rackradar::Result<Option<ListId>> {
        self.inner.list_by_name(name)
    }

    fn scan_list_union<A: SqlAddress>(
        &self,
        list: ListId,
        sink: &mut dyn FnMut(CidrBlock<A>) -> rackradar::Result<()>,
    ) -> rackradar::Result<u64> {
        self.inner.scan_list_union(list, sink)
    }

    fn lookup<A: SqlAddress>(&self, addr: A) -> rackradar::Result<Option<NetBlockInfo>> {
        self.inner.lookup(addr)
    }
}

#[test]
fn test_failed_list_rolls_back_and_pass_continues() {
    let inner = seeded_store();
    let lists = vec![
        ListDefinition::new("broken").matching(Field::IpNetname, "EXAMPLE-%"),
        ListDefinition::new("fine").matching(Field::IpNetname, "DOC-%"),
    ];

    // first pass leaves a committed union behind for "broken"
    ListRebuilder::new(&inner, &lists).rebuild_all();
    let before = union::<u32>(&inner, "broken");
    let broken = inner.list_by_name("broken").unwrap().unwrap();

    let store = FailingStore { inner, broken };
    let report = ListRebuilder::new(&store, &lists).rebuild_all();

    assert!(matches!(
        report.get("broken"),
        Some(ListOutcome::RolledBack { error }) if error.contains("simulated")
    ));
    assert!(matches!(report.get("fine"), Some(ListOutcome::Committed(_))));
    assert_eq!(report.rolled_back(), 1);

    // the rolled back list still has its previous contents
    assert_eq!(union::<u32>(&store.inner, "broken"), before);
    assert_eq!(union::<u32>(&store.inner, "fine"), vec!["198.51.100.0/24"]);
}
