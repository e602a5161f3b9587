//! Registry import sessions.
//!
//! An import writes every record of one registrar under a new serial inside a
//! single transaction. Finishing the session deletes whatever the registrar
//! did not report again, so the database always mirrors the latest complete
//! import.

use serde::Serialize;

use crate::addr::{checked_range_to_prefix, AddrRange, Family};
use crate::model::{NetBlock, Org, Registrar};
use crate::range::decompose;
use crate::store::{ListStore, SqlAddress, SqliteStore};
use crate::{Error, Result};

/// New and deleted row counts of one record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub new: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub serial: u32,
    pub orgs: Counts,
    pub v4: Counts,
    pub v6: Counts,
}

impl ImportStats {
    fn family_mut(&mut self, family: Family) -> &mut Counts {
        match family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        }
    }
}

/// An open import transaction for one registrar.
///
/// Dropping an unfinished importer rolls the transaction back.
pub struct Importer<'a> {
    store: &'a SqliteStore,
    registrar: Registrar,
    stats: ImportStats,
    open: bool,
}

impl<'a> Importer<'a> {
    /// Start importing the named registrar, creating it on first use.
    pub fn begin(store: &'a SqliteStore, registrar: &str) -> Result<Self> {
        store.begin()?;
        let registrar = match store.ensure_registrar(registrar) {
            Ok(r) => r,
            Err(e) => {
                store.rollback()?;
                return Err(e);
            }
        };
        let Some(serial) = registrar.serial.checked_add(1) else {
            store.rollback()?;
            return Err(Error::Import(format!(
                "registrar {} serial is exhausted",
                registrar.name
            )));
        };

        log::info!("importing {} (serial {})", registrar.name, serial);
        Ok(Self {
            store,
            registrar,
            stats: ImportStats {
                serial,
                ..Default::default()
            },
            open: true,
        })
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    /// Serial tagged onto every row written by this session.
    pub fn serial(&self) -> u32 {
        self.stats.serial
    }

    pub fn insert_org(&mut self, mut org: Org) -> Result<()> {
        org.registrar_id = self.registrar.id;
        org.serial = self.stats.serial;
        if self.store.upsert_org(&org)? {
            self.stats.orgs.new += 1;
        }
        Ok(())
    }

    /// Insert a netblock whose range and prefix length must agree.
    pub fn insert_netblock<A: SqlAddress>(&mut self, mut block: NetBlock<A>) -> Result<()> {
        let prefix_len = checked_range_to_prefix(block.start, block.end)?;
        if prefix_len != block.prefix_len {
            return Err(Error::Import(format!(
                "netblock {} is a /{}, not a /{}",
                AddrRange {
                    start: block.start,
                    end: block.end
                },
                prefix_len,
                block.prefix_len
            )));
        }

        block.registrar_id = self.registrar.id;
        block.serial = self.stats.serial;
        if self.store.upsert_netblock(&block)? {
            self.stats.family_mut(A::FAMILY).new += 1;
        }
        Ok(())
    }

    /// Insert an arbitrary range as the CIDR blocks covering it.
    ///
    /// Every block carries the attributes of `template`. Returns the number
    /// of blocks written.
    pub fn insert_range<A: SqlAddress>(
        &mut self,
        range: AddrRange<A>,
        template: &NetBlock<A>,
    ) -> Result<usize> {
        let mut written = 0;
        for cidr in decompose(range) {
            let mut block = template.clone();
            block.start = cidr.addr;
            block.end = cidr.end();
            block.prefix_len = cidr.prefix_len;
            self.insert_netblock(block)?;
            written += 1;
        }
        if written > 1 {
            log::debug!("range {} stored as {} blocks", range, written);
        }
        Ok(written)
    }

    /// Drop records of older serials, link orgs and commit.
    ///
    /// On error the importer is dropped and the transaction rolled back.
    pub fn finish(mut self) -> Result<ImportStats> {
        self.finalize()?;
        self.open = false;

        let s = self.stats;
        log::info!(
            "imported {} serial {}: orgs +{}/-{}, v4 +{}/-{}, v6 +{}/-{}",
            self.registrar.name,
            s.serial,
            s.orgs.new,
            s.orgs.deleted,
            s.v4.new,
            s.v4.deleted,
            s.v6.new,
            s.v6.deleted
        );
        Ok(s)
    }

    fn finalize(&mut self) -> Result<()> {
        let id = self.registrar.id;
        let serial = self.stats.serial;

        self.stats.v4.deleted = self.store.delete_stale_netblocks::<u32>(id, serial)?;
        self.stats.v6.deleted = self.store.delete_stale_netblocks::<u128>(id, serial)?;
        self.stats.orgs.deleted = self.store.delete_stale_orgs(id, serial)?;
        self.store.link_orgs::<u32>(id)?;
        self.store.link_orgs::<u128>(id)?;
        self.store.set_registrar_serial(id, serial)?;
        self.store.commit()
    }

    /// Discard everything written in this session.
    pub fn abort(mut self) -> Result<()> {
        self.open = false;
        log::warn!("import of {} aborted", self.registrar.name);
        self.store.rollback()
    }
}

impl Drop for Importer<'_> {
    fn drop(&mut self) {
        if self.open {
            log::warn!("import of {} dropped unfinished, rolling back", self.registrar.name);
            if let Err(e) = self.store.rollback() {
                log::error!("rollback of {} import failed: {}", self.registrar.name, e);
            }
        }
    }
}
