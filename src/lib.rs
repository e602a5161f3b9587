//! RackRadar - registry netblock lists with minimal CIDR unions.
//!
//! This crate keeps the netblocks published by internet registries in a
//! SQLite database and derives named lists from them. Each list is built from
//! `LIKE` filters over netblock and org attributes plus other lists it
//! includes or excludes, and is materialized as the minimal set of disjoint
//! CIDR blocks covering its members.
//!
//! # Features
//!
//! - **CIDR arithmetic**: IPv4 (`u32`) and IPv6 (`u128`) range/prefix conversions
//! - **Range engine**: streaming coalescing and minimal CIDR decomposition
//! - **List derivation**: dependency ordering, recursive include/exclude
//!   compilation and transactional per-list rebuilds
//! - **Imports**: serial-tagged registry imports with stale row cleanup
//! - **Lookups**: most specific netblock for an address, list containment,
//!   plain-text export
//!
//! # Quick Start
//!
//! ```ignore
//! use rackradar::{Config, Importer, ListRebuilder, NetBlock, SqliteStore, parse_cidr};
//!
//! let config = Config::load("rackradar.yaml")?;
//! let store = SqliteStore::open(&config.database.path)?;
//!
//! // Import a registrar's records
//! let mut import = Importer::begin(&store, "RIPE")?;
//! import.insert_netblock(NetBlock::new(parse_cidr::<u32>("192.0.2.0/24")?).name("EXAMPLE-NET"))?;
//! import.finish()?;
//!
//! // Rebuild every configured list
//! let report = ListRebuilder::new(&store, &config.lists)
//!     .fetch_mode(config.rebuild.fetch_mode())
//!     .rebuild_all();
//! println!("{} lists committed", report.committed());
//! ```
//!
//! # Range Engine
//!
//! ```
//! use rackradar::range::minimal_cover;
//! use rackradar::parse_cidr;
//!
//! let ranges = ["10.0.0.0/24", "10.0.1.0/24", "10.0.3.0/24"]
//!     .iter()
//!     .map(|s| parse_cidr::<u32>(s).unwrap().range());
//! let cover: Vec<String> = minimal_cover(ranges).map(|b| b.to_string()).collect();
//! assert_eq!(cover, vec!["10.0.0.0/23", "10.0.3.0/24"]);
//! ```
//!
//! # List Membership
//!
//! A list's members are the netblocks satisfying
//!
//! ```text
//! ((registrar AND match AND NOT ignore) OR included...) AND NOT (excluded...)
//! ```
//!
//! Includes are rebuilt before the lists using them. Cyclic or dangling
//! references are logged and built best-effort rather than failing the pass.

mod coverage;
mod error;
mod import;
mod model;

pub mod addr;
pub mod config;
pub mod export;
pub mod list;
pub mod range;
pub mod store;

// Re-export core types
pub use error::{Error, RangeError, Result};
pub use model::{NetBlock, NetBlockInfo, Org, Registrar};

// Re-export address types
pub use addr::{parse_cidr, AddrRange, Address, CidrBlock, Family};

// Re-export configuration and list types
pub use config::Config;
pub use list::{
    Field, ListDefinition, ListOutcome, ListRebuilder, Predicate, QueryBuilder, RebuildReport,
};

// Re-export storage
pub use store::{FetchMode, ListStore, SqliteStore};

// Re-export import and refresh entry points
pub use coverage::{rebuild_after_import, rebuild_coverage, CoverageStats, RefreshReport};
pub use import::{Counts, ImportStats, Importer};
