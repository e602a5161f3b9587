//! Typed SQL bindings for addresses and predicates.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

use crate::addr::Address;
use crate::list::{Field, Predicate};

/// An address family as stored in the relational schema.
///
/// IPv4 is stored as an INTEGER, IPv6 as a 16-byte big-endian BLOB so that
/// byte-wise comparison in the database equals numeric comparison.
pub trait SqlAddress: Address {
    const NETBLOCK_TABLE: &'static str;
    const LIST_TABLE: &'static str;
    const LIST_UNION_TABLE: &'static str;
    const UNION_TABLE: &'static str;

    fn to_sql_value(self) -> Value;
    fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self>;
}

impl SqlAddress for u32 {
    const NETBLOCK_TABLE: &'static str = "netblock_v4";
    const LIST_TABLE: &'static str = "netblock_v4_list";
    const LIST_UNION_TABLE: &'static str = "netblock_v4_list_union";
    const UNION_TABLE: &'static str = "netblock_v4_union";

    fn to_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }

    fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let n = value.as_i64()?;
        u32::try_from(n).map_err(|_| FromSqlError::OutOfRange(n))
    }
}

impl SqlAddress for u128 {
    const NETBLOCK_TABLE: &'static str = "netblock_v6";
    const LIST_TABLE: &'static str = "netblock_v6_list";
    const LIST_UNION_TABLE: &'static str = "netblock_v6_list_union";
    const UNION_TABLE: &'static str = "netblock_v6_union";

    fn to_sql_value(self) -> Value {
        Value::Blob(self.to_be_bytes().to_vec())
    }

    fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        let bytes: [u8; 16] = blob.try_into().map_err(|_| FromSqlError::InvalidBlobSize {
            expected_size: 16,
            blob_size: blob.len(),
        })?;
        Ok(u128::from_be_bytes(bytes))
    }
}

/// Bind/read adapter for a [`SqlAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sql<A>(pub A);

impl<A: SqlAddress> ToSql for Sql<A> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.0.to_sql_value()))
    }
}

impl<A: SqlAddress> FromSql for Sql<A> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        A::from_sql_value(value).map(Sql)
    }
}

/// Column expression for a filter field.
///
/// Rows without a linked org compare as empty strings so that `NOT LIKE`
/// keeps them instead of yielding NULL.
fn column(field: Field) -> &'static str {
    match field {
        Field::OrgHandle => "COALESCE(org.handle, ip.org_id_str, '')",
        Field::OrgName => "COALESCE(org.name, '')",
        Field::OrgDescr => "COALESCE(org.descr, '')",
        Field::IpNetname => "ip.netname",
        Field::IpDescr => "ip.descr",
    }
}

/// Render `predicate` as a WHERE clause over `ip`, `org` and `reg` aliases.
///
/// Patterns and names are appended to `params` in placeholder order.
pub fn render_predicate(predicate: &Predicate, sql: &mut String, params: &mut Vec<Value>) {
    fn join(terms: &[Predicate], op: &str, empty: &str, sql: &mut String, params: &mut Vec<Value>) {
        if terms.is_empty() {
            sql.push_str(empty);
            return;
        }
        sql.push('(');
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                sql.push_str(op);
            }
            render_predicate(term, sql, params);
        }
        sql.push(')');
    }

    match predicate {
        Predicate::Like { field, pattern } => {
            sql.push_str(column(*field));
            sql.push_str(" LIKE ?");
            params.push(Value::Text(pattern.clone()));
        }
        Predicate::Registrar(name) => {
            sql.push_str("reg.name = ?");
            params.push(Value::Text(name.clone()));
        }
        Predicate::And(terms) => join(terms, " AND ", "1", sql, params),
        Predicate::Or(terms) => join(terms, " OR ", "0", sql, params),
        Predicate::Not(inner) => {
            sql.push_str("NOT (");
            render_predicate(inner, sql, params);
            sql.push(')');
        }
    }
}
