//! Persistence of netblocks, lists and unions.
//!
//! The rebuild pipeline talks to storage only through [`ListStore`];
//! [`SqliteStore`] is the SQLite implementation used by the CLI and tests.

mod schema;
mod sql;
mod sqlite;

pub use schema::SCHEMA;
pub use sql::{render_predicate, Sql, SqlAddress};
pub use sqlite::SqliteStore;

use crate::addr::{AddrRange, CidrBlock};
use crate::list::Predicate;
use crate::model::NetBlockInfo;
use crate::Result;

/// Row id of a persisted list.
pub type ListId = i64;

/// How membership rows are fetched while building a union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Rows are handed to the sink while the cursor is open.
    #[default]
    Stream,
    /// The whole result is read into memory before the sink runs.
    Buffered,
}

impl FetchMode {
    pub fn from_buffered(buffered: bool) -> Self {
        if buffered {
            FetchMode::Buffered
        } else {
            FetchMode::Stream
        }
    }
}

/// Storage operations needed to rebuild and read lists.
///
/// A store is driven by one caller at a time; `begin`/`commit`/`rollback`
/// bracket the work done for a single list.
pub trait ListStore {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;

    /// Id of the named list, creating the row if needed.
    fn ensure_list(&self, name: &str) -> Result<ListId>;

    /// Remove membership and union rows of `list` for family `A`.
    fn clear_list<A: SqlAddress>(&self, list: ListId) -> Result<()>;

    /// Insert every netblock of family `A` matching `predicate` as a member
    /// of `list`. Returns the number of rows inserted.
    fn populate_membership<A: SqlAddress>(&self, list: ListId, predicate: &Predicate)
        -> Result<u64>;

    /// Feed member ranges of `list` to `sink` ordered by start, then end.
    fn scan_membership<A: SqlAddress>(
        &self,
        list: ListId,
        mode: FetchMode,
        sink: &mut dyn FnMut(AddrRange<A>) -> Result<()>,
    ) -> Result<u64>;

    fn insert_union_block<A: SqlAddress>(&self, list: ListId, block: CidrBlock<A>) -> Result<()>;

    /// Remove the registry-wide coverage union of family `A`.
    fn clear_coverage<A: SqlAddress>(&self) -> Result<()>;

    /// Feed every raw netblock range of family `A` to `sink` ordered by start, then end.
    fn scan_netblocks<A: SqlAddress>(
        &self,
        sink: &mut dyn FnMut(AddrRange<A>) -> Result<()>,
    ) -> Result<u64>;

    fn insert_coverage_block<A: SqlAddress>(&self, block: CidrBlock<A>) -> Result<()>;

    fn list_by_name(&self, name: &str) -> Result<Option<ListId>>;

    /// Feed the union blocks of `list` to `sink` in address order.
    fn scan_list_union<A: SqlAddress>(
        &self,
        list: ListId,
        sink: &mut dyn FnMut(CidrBlock<A>) -> Result<()>,
    ) -> Result<u64>;

    /// Most specific raw netblock containing `addr`.
    fn lookup<A: SqlAddress>(&self, addr: A) -> Result<Option<NetBlockInfo>>;
}
