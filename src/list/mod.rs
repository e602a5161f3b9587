//! Named netblock lists.
//!
//! Lists are defined in configuration by `LIKE` filters over netblock and org
//! attributes, and by including or excluding other lists. Rebuilding a list
//! materializes its membership and the minimal CIDR union of that membership.

mod definition;
mod predicate;
mod rebuild;
mod resolve;

pub use definition::{Field, Filter, ListDefinition};
pub use predicate::{Predicate, QueryBuilder};
pub use rebuild::{FamilyStats, ListOutcome, ListRebuilder, ListReport, ListStats, RebuildReport};
pub use resolve::{resolve_order, Resolution};
