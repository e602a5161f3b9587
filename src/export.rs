//! Plain-text export of list unions.

use std::io::Write;

use crate::addr::{Address, CidrBlock};
use crate::store::{ListId, ListStore, SqlAddress};
use crate::{Error, Result};

/// Write the family-`A` union of `list` as one `address/prefix_len` per line.
pub fn write_union<S, A, W>(store: &S, list: ListId, out: &mut W) -> Result<u64>
where
    S: ListStore,
    A: SqlAddress,
    W: Write,
{
    store.scan_list_union::<A>(list, &mut |block: CidrBlock<A>| {
        writeln!(out, "{}/{}", block.addr.to_ip(), block.prefix_len)?;
        Ok(())
    })
}

/// Export the named list, IPv4 blocks first. Returns the number of lines.
pub fn export_list<S: ListStore, W: Write>(store: &S, name: &str, out: &mut W) -> Result<u64> {
    let list = store
        .list_by_name(name)?
        .ok_or_else(|| Error::UnknownList(name.to_string()))?;
    let v4 = write_union::<S, u32, W>(store, list, out)?;
    let v6 = write_union::<S, u128, W>(store, list, out)?;
    out.flush()?;
    log::debug!("exported {}: {} v4, {} v6 blocks", name, v4, v6);
    Ok(v4 + v6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::parse_cidr;
    use crate::store::SqliteStore;

    #[test]
    fn test_export_format() {
        let store = SqliteStore::open_in_memory().unwrap();
        let list = store.ensure_list("l").unwrap();
        store
            .insert_union_block(list, parse_cidr::<u128>("2001:db8::/32").unwrap())
            .unwrap();
        store
            .insert_union_block(list, parse_cidr::<u32>("192.0.2.0/24").unwrap())
            .unwrap();
        store
            .insert_union_block(list, parse_cidr::<u32>("10.0.0.0/23").unwrap())
            .unwrap();

        let mut out = Vec::new();
        assert_eq!(export_list(&store, "l", &mut out).unwrap(), 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10.0.0.0/23\n192.0.2.0/24\n2001:db8::/32\n"
        );
    }

    #[test]
    fn test_export_unknown_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            export_list(&store, "missing", &mut out),
            Err(Error::UnknownList(name)) if name == "missing"
        ));
        assert!(out.is_empty());
    }
}
