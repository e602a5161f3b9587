//! SQLite-backed [`ListStore`].

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::sql::{render_predicate, Sql, SqlAddress};
use super::{FetchMode, ListId, ListStore, SCHEMA};
use crate::addr::{AddrRange, Address, CidrBlock};
use crate::list::Predicate;
use crate::model::{NetBlock, NetBlockInfo, Org, Registrar};
use crate::Result;

/// One SQLite connection holding the whole registry database.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::init(conn, Some(path))?;
        log::debug!("opened database {:?}", store.path);
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn registrar(&self, name: &str) -> Result<Option<Registrar>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, serial, last_import FROM registrar WHERE name = ?",
                params![name],
                registrar_from_row,
            )
            .optional()?)
    }

    /// The named registrar, created with serial 0 if it does not exist.
    pub fn ensure_registrar(&self, name: &str) -> Result<Registrar> {
        if let Some(registrar) = self.registrar(name)? {
            return Ok(registrar);
        }
        self.conn.execute(
            "INSERT INTO registrar (name, serial, last_import) VALUES (?, 0, 0)",
            params![name],
        )?;
        log::info!("registered new registrar {}", name);
        Ok(Registrar {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            serial: 0,
            last_import: 0,
        })
    }

    pub fn registrars(&self) -> Result<Vec<Registrar>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, serial, last_import FROM registrar ORDER BY name")?;
        let rows = stmt.query_map([], registrar_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert or refresh an org. Returns `true` when the row is new.
    pub(crate) fn upsert_org(&self, org: &Org) -> Result<bool> {
        let updated = self.conn.prepare_cached(
            "UPDATE org SET serial = ?, name = ?, descr = ? WHERE registrar_id = ? AND handle = ?",
        )?
        .execute(params![
            org.serial,
            org.name,
            org.description,
            org.registrar_id,
            org.handle
        ])?;
        if updated > 0 {
            return Ok(false);
        }

        self.conn
            .prepare_cached(
                "INSERT INTO org (registrar_id, serial, handle, name, descr) VALUES (?, ?, ?, ?, ?)",
            )?
            .execute(params![
                org.registrar_id,
                org.serial,
                org.handle,
                org.name,
                org.description
            ])?;
        Ok(true)
    }

    /// Insert or refresh a netblock keyed by registrar and range.
    /// Returns `true` when the row is new.
    pub(crate) fn upsert_netblock<A: SqlAddress>(&self, block: &NetBlock<A>) -> Result<bool> {
        let updated = self
            .conn
            .prepare_cached(&format!(
                "UPDATE {} SET serial = ?, org_id_str = ?, prefix_len = ?, netname = ?, descr = ? \
                 WHERE registrar_id = ? AND start_ip = ? AND end_ip = ?",
                A::NETBLOCK_TABLE
            ))?
            .execute(params![
                block.serial,
                block.org_reference,
                block.prefix_len,
                block.name,
                block.description,
                block.registrar_id,
                Sql(block.start),
                Sql(block.end)
            ])?;
        if updated > 0 {
            return Ok(false);
        }

        self.conn
            .prepare_cached(&format!(
                "INSERT INTO {} (registrar_id, serial, org_id_str, start_ip, end_ip, prefix_len, netname, descr) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                A::NETBLOCK_TABLE
            ))?
            .execute(params![
                block.registrar_id,
                block.serial,
                block.org_reference,
                Sql(block.start),
                Sql(block.end),
                block.prefix_len,
                block.name,
                block.description
            ])?;
        Ok(true)
    }

    pub(crate) fn delete_stale_orgs(&self, registrar_id: i64, serial: u32) -> Result<u64> {
        let n = self.conn.execute(
            "DELETE FROM org WHERE registrar_id = ? AND serial != ?",
            params![registrar_id, serial],
        )?;
        Ok(n as u64)
    }

    pub(crate) fn delete_stale_netblocks<A: SqlAddress>(
        &self,
        registrar_id: i64,
        serial: u32,
    ) -> Result<u64> {
        let n = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE registrar_id = ? AND serial != ?",
                A::NETBLOCK_TABLE
            ),
            params![registrar_id, serial],
        )?;
        Ok(n as u64)
    }

    /// Resolve `org_id_str` handles of the registrar's netblocks to org ids.
    pub(crate) fn link_orgs<A: SqlAddress>(&self, registrar_id: i64) -> Result<u64> {
        let table = A::NETBLOCK_TABLE;
        let n = self.conn.execute(
            &format!(
                "UPDATE {table} SET org_id = ( \
                     SELECT o.id FROM org o \
                     WHERE o.registrar_id = {table}.registrar_id AND o.handle = {table}.org_id_str \
                 ) WHERE registrar_id = ?"
            ),
            params![registrar_id],
        )?;
        Ok(n as u64)
    }

    pub(crate) fn set_registrar_serial(&self, registrar_id: i64, serial: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE registrar SET serial = ?, last_import = CAST(strftime('%s', 'now') AS INTEGER) \
             WHERE id = ?",
            params![serial, registrar_id],
        )?;
        Ok(())
    }

    /// Persisted lists as `(id, name)`, by name.
    pub fn lists(&self) -> Result<Vec<(ListId, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM list ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn membership_count<A: SqlAddress>(&self, list: ListId) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE list_id = ?", A::LIST_TABLE),
            params![list],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn netblock_count<A: SqlAddress>(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", A::NETBLOCK_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Union blocks of `list` in address order.
    pub fn list_union<A: SqlAddress>(&self, list: ListId) -> Result<Vec<CidrBlock<A>>> {
        let mut blocks = Vec::new();
        self.scan_list_union(list, &mut |block| {
            blocks.push(block);
            Ok(())
        })?;
        Ok(blocks)
    }

    /// The union block of `list` containing `addr`, if any.
    pub fn list_union_lookup<A: SqlAddress>(
        &self,
        list: ListId,
        addr: A,
    ) -> Result<Option<CidrBlock<A>>> {
        let candidate = self
            .conn
            .query_row(
                &format!(
                    "SELECT address, prefix_len FROM {} WHERE list_id = ? AND address <= ? \
                     ORDER BY address DESC LIMIT 1",
                    A::LIST_UNION_TABLE
                ),
                params![list, Sql(addr)],
                block_from_row::<A>,
            )
            .optional()?;
        Ok(candidate.filter(|block| block.contains(addr)))
    }

    /// Registry-wide coverage union of family `A` in address order.
    pub fn coverage<A: SqlAddress>(&self) -> Result<Vec<CidrBlock<A>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT address, prefix_len FROM {} ORDER BY address",
            A::UNION_TABLE
        ))?;
        let rows = stmt.query_map([], block_from_row::<A>)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn scan_ranges<A: SqlAddress>(
        &self,
        sql: &str,
        args: &[Value],
        mode: FetchMode,
        sink: &mut dyn FnMut(AddrRange<A>) -> Result<()>,
    ) -> Result<u64> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut count = 0u64;
        match mode {
            FetchMode::Stream => {
                let mut rows = stmt.query(params_from_iter(args))?;
                while let Some(row) = rows.next()? {
                    let (start, end) = bounds_from_row::<A>(row)?;
                    sink(AddrRange::new(start, end)?)?;
                    count += 1;
                }
            }
            FetchMode::Buffered => {
                let rows = stmt
                    .query_map(params_from_iter(args), bounds_from_row::<A>)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                drop(stmt);
                for (start, end) in rows {
                    sink(AddrRange::new(start, end)?)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

impl ListStore for SqliteStore {
    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn ensure_list(&self, name: &str) -> Result<ListId> {
        self.conn
            .prepare_cached("INSERT OR IGNORE INTO list (name) VALUES (?)")?
            .execute(params![name])?;
        Ok(self
            .conn
            .query_row("SELECT id FROM list WHERE name = ?", params![name], |row| {
                row.get(0)
            })?)
    }

    fn clear_list<A: SqlAddress>(&self, list: ListId) -> Result<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE list_id = ?", A::LIST_TABLE),
            params![list],
        )?;
        self.conn.execute(
            &format!("DELETE FROM {} WHERE list_id = ?", A::LIST_UNION_TABLE),
            params![list],
        )?;
        Ok(())
    }

    fn populate_membership<A: SqlAddress>(
        &self,
        list: ListId,
        predicate: &Predicate,
    ) -> Result<u64> {
        let mut sql = format!(
            "INSERT INTO {} (list_id, netblock_id, start_ip, end_ip, prefix_len) \
             SELECT ?, ip.id, ip.start_ip, ip.end_ip, ip.prefix_len \
             FROM {} AS ip \
             JOIN registrar AS reg ON reg.id = ip.registrar_id \
             LEFT JOIN org ON org.id = ip.org_id \
             WHERE ",
            A::LIST_TABLE,
            A::NETBLOCK_TABLE
        );
        let mut args = vec![Value::Integer(list)];
        render_predicate(predicate, &mut sql, &mut args);
        log::trace!("{}", sql);

        let n = self.conn.execute(&sql, params_from_iter(args))?;
        Ok(n as u64)
    }

    fn scan_membership<A: SqlAddress>(
        &self,
        list: ListId,
        mode: FetchMode,
        sink: &mut dyn FnMut(AddrRange<A>) -> Result<()>,
    ) -> Result<u64> {
        self.scan_ranges(
            &format!(
                "SELECT start_ip, end_ip FROM {} WHERE list_id = ? ORDER BY start_ip, end_ip",
                A::LIST_TABLE
            ),
            &[Value::Integer(list)],
            mode,
            sink,
        )
    }

    fn insert_union_block<A: SqlAddress>(&self, list: ListId, block: CidrBlock<A>) -> Result<()> {
        self.conn
            .prepare_cached(&format!(
                "INSERT INTO {} (list_id, address, prefix_len) VALUES (?, ?, ?)",
                A::LIST_UNION_TABLE
            ))?
            .execute(params![list, Sql(block.addr), block.prefix_len])?;
        Ok(())
    }

    fn clear_coverage<A: SqlAddress>(&self) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {}", A::UNION_TABLE), [])?;
        Ok(())
    }

    fn scan_netblocks<A: SqlAddress>(
        &self,
        sink: &mut dyn FnMut(AddrRange<A>) -> Result<()>,
    ) -> Result<u64> {
        self.scan_ranges(
            &format!(
                "SELECT start_ip, end_ip FROM {} ORDER BY start_ip, end_ip",
                A::NETBLOCK_TABLE
            ),
            &[],
            FetchMode::Stream,
            sink,
        )
    }

    fn insert_coverage_block<A: SqlAddress>(&self, block: CidrBlock<A>) -> Result<()> {
        self.conn
            .prepare_cached(&format!(
                "INSERT INTO {} (address, prefix_len) VALUES (?, ?)",
                A::UNION_TABLE
            ))?
            .execute(params![Sql(block.addr), block.prefix_len])?;
        Ok(())
    }

    fn list_by_name(&self, name: &str) -> Result<Option<ListId>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM list WHERE name = ?", params![name], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn scan_list_union<A: SqlAddress>(
        &self,
        list: ListId,
        sink: &mut dyn FnMut(CidrBlock<A>) -> Result<()>,
    ) -> Result<u64> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT address, prefix_len FROM {} WHERE list_id = ? ORDER BY address",
            A::LIST_UNION_TABLE
        ))?;
        let mut rows = stmt.query(params![list])?;
        let mut count = 0u64;
        while let Some(row) = rows.next()? {
            sink(block_from_row::<A>(row)?)?;
            count += 1;
        }
        Ok(count)
    }

    fn lookup<A: SqlAddress>(&self, addr: A) -> Result<Option<NetBlockInfo>> {
        let sql = format!(
            "SELECT ip.id, reg.name, COALESCE(org.handle, ip.org_id_str), org.name, \
                    ip.start_ip, ip.end_ip, ip.prefix_len, ip.netname, ip.descr \
             FROM {} AS ip \
             JOIN registrar AS reg ON reg.id = ip.registrar_id \
             LEFT JOIN org ON org.id = ip.org_id \
             WHERE ip.start_ip <= ?1 AND ip.end_ip >= ?1 \
             ORDER BY ip.prefix_len DESC, ip.id \
             LIMIT 1",
            A::NETBLOCK_TABLE
        );
        Ok(self
            .conn
            .query_row(&sql, params![Sql(addr)], |row| {
                let start: Sql<A> = row.get(4)?;
                let end: Sql<A> = row.get(5)?;
                Ok(NetBlockInfo {
                    id: row.get(0)?,
                    registrar: row.get(1)?,
                    org_handle: row.get(2)?,
                    org_name: row.get(3)?,
                    start: start.0.to_ip(),
                    end: end.0.to_ip(),
                    prefix_len: row.get(6)?,
                    netname: row.get(7)?,
                    descr: row.get(8)?,
                })
            })
            .optional()?)
    }
}

fn registrar_from_row(row: &Row<'_>) -> rusqlite::Result<Registrar> {
    Ok(Registrar {
        id: row.get(0)?,
        name: row.get(1)?,
        serial: row.get(2)?,
        last_import: row.get(3)?,
    })
}

fn bounds_from_row<A: SqlAddress>(row: &Row<'_>) -> rusqlite::Result<(A, A)> {
    let start: Sql<A> = row.get(0)?;
    let end: Sql<A> = row.get(1)?;
    Ok((start.0, end.0))
}

fn block_from_row<A: SqlAddress>(row: &Row<'_>) -> rusqlite::Result<CidrBlock<A>> {
    let addr: Sql<A> = row.get(0)?;
    Ok(CidrBlock {
        addr: addr.0,
        prefix_len: row.get(1)?,
    })
}
