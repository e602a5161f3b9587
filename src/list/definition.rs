//! List definition types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A netblock or org attribute a filter pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "org.handle")]
    OrgHandle,
    #[serde(rename = "org.name")]
    OrgName,
    #[serde(rename = "org.descr")]
    OrgDescr,
    #[serde(rename = "ip.netname", alias = "netname")]
    IpNetname,
    #[serde(rename = "ip.descr", alias = "descr")]
    IpDescr,
}

impl Field {
    /// Configuration key of this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::OrgHandle => "org.handle",
            Field::OrgName => "org.name",
            Field::OrgDescr => "org.descr",
            Field::IpNetname => "ip.netname",
            Field::IpDescr => "ip.descr",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field -> `LIKE` patterns.
///
/// Patterns of one field are alternatives. How fields combine depends on
/// where the filter is used: all fields must hit for `match`, any field
/// hitting is enough for `ignore`.
pub type Filter = BTreeMap<Field, Vec<String>>;

/// A named list as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDefinition {
    pub name: String,

    /// Only netblocks of this registrar contribute direct matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    #[serde(default, rename = "match", skip_serializing_if = "BTreeMap::is_empty")]
    pub match_filters: Filter,

    #[serde(default, rename = "ignore", skip_serializing_if = "BTreeMap::is_empty")]
    pub ignore_filters: Filter,

    /// Lists whose members are added to this one.
    #[serde(default, rename = "include", skip_serializing_if = "Vec::is_empty")]
    pub include_refs: Vec<String>,

    /// Lists whose members are removed from this one.
    #[serde(default, rename = "exclude", skip_serializing_if = "Vec::is_empty")]
    pub exclude_refs: Vec<String>,
}

impl ListDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a `match` pattern.
    pub fn matching(mut self, field: Field, pattern: impl Into<String>) -> Self {
        self.match_filters
            .entry(field)
            .or_default()
            .push(pattern.into());
        self
    }

    /// Add an `ignore` pattern.
    pub fn ignoring(mut self, field: Field, pattern: impl Into<String>) -> Self {
        self.ignore_filters
            .entry(field)
            .or_default()
            .push(pattern.into());
        self
    }

    pub fn including(mut self, list: impl Into<String>) -> Self {
        self.include_refs.push(list.into());
        self
    }

    pub fn excluding(mut self, list: impl Into<String>) -> Self {
        self.exclude_refs.push(list.into());
        self
    }

    pub fn in_registrar(mut self, registrar: impl Into<String>) -> Self {
        self.registrar = Some(registrar.into());
        self
    }

    /// Whether the list selects netblocks on its own, without includes.
    pub fn has_direct_match(&self) -> bool {
        has_patterns(&self.match_filters) || self.registrar.is_some()
    }

    pub fn has_ignores(&self) -> bool {
        has_patterns(&self.ignore_filters)
    }
}

fn has_patterns(filter: &Filter) -> bool {
    filter.values().any(|patterns| !patterns.is_empty())
}
