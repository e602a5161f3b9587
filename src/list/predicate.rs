//! Compilation of list definitions into membership predicates.

use std::fmt;

use ahash::AHashMap;

use super::{Field, ListDefinition};

/// Boolean condition over a netblock and its org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// SQL `LIKE` match of one attribute.
    Like { field: Field, pattern: String },
    /// Netblock belongs to the named registrar.
    Registrar(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn like(field: Field, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            field,
            pattern: pattern.into(),
        }
    }

    /// Conjunction; a single term is returned as is.
    pub fn all(mut terms: Vec<Predicate>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Predicate::And(terms)
        }
    }

    /// Disjunction; a single term is returned as is.
    pub fn any(mut terms: Vec<Predicate>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Predicate::Or(terms)
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Number of leaf conditions.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::Like { .. } | Predicate::Registrar(_) => 1,
            Predicate::And(terms) | Predicate::Or(terms) => {
                terms.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Not(inner) => inner.leaf_count(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, terms: &[Predicate], op: &str) -> fmt::Result {
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                match term {
                    Predicate::And(_) | Predicate::Or(_) => write!(f, "({})", term)?,
                    _ => write!(f, "{}", term)?,
                }
            }
            Ok(())
        }

        match self {
            Predicate::Like { field, pattern } => write!(f, "{} LIKE '{}'", field, pattern),
            Predicate::Registrar(name) => write!(f, "registrar = '{}'", name),
            Predicate::And(terms) => join(f, terms, "AND"),
            Predicate::Or(terms) => join(f, terms, "OR"),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
        }
    }
}

/// Builds membership predicates from a set of list definitions.
///
/// Membership of a list is
/// `((registrar AND match AND NOT ignore) OR included...) AND NOT (excluded...)`,
/// with included and excluded lists expanded recursively.
pub struct QueryBuilder<'a> {
    lists: AHashMap<&'a str, &'a ListDefinition>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(lists: &'a [ListDefinition]) -> Self {
        Self {
            lists: lists.iter().map(|def| (def.name.as_str(), def)).collect(),
        }
    }

    /// Compile the named list.
    ///
    /// Returns `None` when the list is unknown or selects nothing on its own
    /// or through includes; such a list has no membership to build.
    pub fn compile(&self, name: &str) -> Option<Predicate> {
        let def = self.lists.get(name)?;
        let mut path = vec![def.name.as_str()];
        self.expand(def, &mut path)
    }

    fn expand(&self, def: &'a ListDefinition, path: &mut Vec<&'a str>) -> Option<Predicate> {
        let mut positive = Vec::new();
        if let Some(direct) = direct_predicate(def) {
            positive.push(direct);
        }
        for name in &def.include_refs {
            if let Some(included) = self.expand_ref(def, name, path, "include") {
                positive.push(included);
            }
        }
        if positive.is_empty() {
            return None;
        }

        let mut negative = Vec::new();
        for name in &def.exclude_refs {
            if let Some(excluded) = self.expand_ref(def, name, path, "exclude") {
                negative.push(excluded);
            }
        }

        let positive = Predicate::any(positive);
        if negative.is_empty() {
            Some(positive)
        } else {
            Some(Predicate::And(vec![positive, Predicate::any(negative).negate()]))
        }
    }

    fn expand_ref(
        &self,
        def: &ListDefinition,
        name: &str,
        path: &mut Vec<&'a str>,
        relation: &str,
    ) -> Option<Predicate> {
        let Some(target) = self.lists.get(name).copied() else {
            log::warn!("list {}: {} of unknown list {} skipped", def.name, relation, name);
            return None;
        };
        if path.contains(&target.name.as_str()) {
            log::warn!(
                "list {}: {} of {} skipped, it is already being expanded ({})",
                def.name,
                relation,
                name,
                path.join(" -> ")
            );
            return None;
        }

        path.push(target.name.as_str());
        let expanded = self.expand(target, path);
        path.pop();

        if expanded.is_none() {
            log::debug!("list {}: {}d list {} selects nothing", def.name, relation, name);
        }
        expanded
    }
}

/// `registrar AND match AND NOT ignore` for the list's own filters.
fn direct_predicate(def: &ListDefinition) -> Option<Predicate> {
    if !def.has_direct_match() {
        return None;
    }

    let mut terms = Vec::new();
    if let Some(registrar) = &def.registrar {
        terms.push(Predicate::Registrar(registrar.clone()));
    }
    for (field, patterns) in &def.match_filters {
        if patterns.is_empty() {
            continue;
        }
        terms.push(Predicate::any(
            patterns.iter().map(|p| Predicate::like(*field, p.as_str())).collect(),
        ));
    }

    if def.has_ignores() {
        let ignores = def
            .ignore_filters
            .iter()
            .flat_map(|(field, patterns)| {
                patterns.iter().map(move |p| Predicate::like(*field, p.as_str()))
            })
            .collect();
        terms.push(Predicate::any(ignores).negate());
    }

    Some(Predicate::all(terms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn netname(p: &str) -> Predicate {
        Predicate::like(Field::IpNetname, p)
    }

    #[test]
    fn test_match_only() {
        let lists = vec![ListDefinition::new("ex").matching(Field::IpNetname, "EXAMPLE-%")];
        let qb = QueryBuilder::new(&lists);
        assert_eq!(qb.compile("ex"), Some(netname("EXAMPLE-%")));
    }

    #[test]
    fn test_fields_and_patterns() {
        let lists = vec![ListDefinition::new("ex")
            .matching(Field::IpNetname, "A-%")
            .matching(Field::IpNetname, "B-%")
            .matching(Field::OrgName, "%Corp%")
            .ignoring(Field::IpDescr, "%test%")
            .ignoring(Field::OrgHandle, "TEST-ORG")
            .in_registrar("RIPE")];
        let qb = QueryBuilder::new(&lists);
        let expected = Predicate::And(vec![
            Predicate::Registrar("RIPE".to_string()),
            Predicate::like(Field::OrgName, "%Corp%"),
            Predicate::Or(vec![netname("A-%"), netname("B-%")]),
            Predicate::Or(vec![
                Predicate::like(Field::OrgHandle, "TEST-ORG"),
                Predicate::like(Field::IpDescr, "%test%"),
            ])
            .negate(),
        ]);
        assert_eq!(qb.compile("ex"), Some(expected));
    }

    #[test]
    fn test_include_and_exclude() {
        let lists = vec![
            ListDefinition::new("all").including("a").including("b").excluding("c"),
            ListDefinition::new("a").matching(Field::IpNetname, "A-%"),
            ListDefinition::new("b").matching(Field::IpNetname, "B-%"),
            ListDefinition::new("c").matching(Field::IpNetname, "C-%"),
        ];
        let qb = QueryBuilder::new(&lists);
        let expected = Predicate::And(vec![
            Predicate::Or(vec![netname("A-%"), netname("B-%")]),
            netname("C-%").negate(),
        ]);
        assert_eq!(qb.compile("all"), Some(expected));
    }

    #[test]
    fn test_empty_list_is_none() {
        let lists = vec![
            ListDefinition::new("nothing"),
            ListDefinition::new("ignores_only").ignoring(Field::IpNetname, "X"),
            ListDefinition::new("with_empty_include")
                .matching(Field::IpNetname, "A")
                .including("nothing"),
        ];
        let qb = QueryBuilder::new(&lists);
        assert_eq!(qb.compile("nothing"), None);
        assert_eq!(qb.compile("ignores_only"), None);
        assert_eq!(qb.compile("unknown"), None);
        // an empty include contributes nothing
        assert_eq!(qb.compile("with_empty_include"), Some(netname("A")));
    }

    #[test]
    fn test_exclude_without_positive_is_none() {
        let lists = vec![
            ListDefinition::new("x").excluding("y"),
            ListDefinition::new("y").matching(Field::IpNetname, "Y"),
        ];
        assert_eq!(QueryBuilder::new(&lists).compile("x"), None);
    }

    #[test]
    fn test_cycle_terminates() {
        let lists = vec![
            ListDefinition::new("a").matching(Field::IpNetname, "A").including("b"),
            ListDefinition::new("b").matching(Field::IpNetname, "B").including("a"),
        ];
        let qb = QueryBuilder::new(&lists);
        assert_eq!(
            qb.compile("a"),
            Some(Predicate::Or(vec![netname("A"), netname("B")]))
        );
        assert_eq!(
            qb.compile("b"),
            Some(Predicate::Or(vec![netname("B"), netname("A")]))
        );
    }

    #[test]
    fn test_self_exclusion_skipped() {
        let lists = vec![ListDefinition::new("a")
            .matching(Field::IpNetname, "A")
            .excluding("a")];
        assert_eq!(QueryBuilder::new(&lists).compile("a"), Some(netname("A")));
    }

    #[test]
    fn test_diamond_expands_shared_list_twice() {
        let lists = vec![
            ListDefinition::new("top").including("left").including("right"),
            ListDefinition::new("left").including("base"),
            ListDefinition::new("right").including("base"),
            ListDefinition::new("base").matching(Field::IpNetname, "BASE"),
        ];
        let qb = QueryBuilder::new(&lists);
        assert_eq!(
            qb.compile("top"),
            Some(Predicate::Or(vec![netname("BASE"), netname("BASE")]))
        );
    }

    #[test]
    fn test_display() {
        let p = Predicate::And(vec![
            Predicate::Or(vec![netname("A-%"), netname("B-%")]),
            Predicate::Registrar("ARIN".to_string()).negate(),
        ]);
        assert_eq!(
            p.to_string(),
            "(ip.netname LIKE 'A-%' OR ip.netname LIKE 'B-%') AND NOT (registrar = 'ARIN')"
        );
        assert_eq!(p.leaf_count(), 3);
    }
}
