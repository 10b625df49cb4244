//! Namespace predicates of a cluster store condition.

use regex::Regex;

use crate::errors::{Error, Result};
use crate::resources::{ClusterSecretStoreCondition, LabelSelector, Namespace, Selector, NAMESPACE_NAME_LABEL};

#[derive(Debug, Clone)]
pub enum NamespacePredicate {
    /// Matched against the namespace's labels.
    Selector(Selector),
    /// Matched against the namespace name, unanchored.
    NameRegex(Regex),
}

impl NamespacePredicate {
    pub fn matches(&self, namespace: &Namespace) -> bool {
        match self {
            Self::Selector(selector) => selector.matches(namespace.labels()),
            Self::NameRegex(regex) => regex.is_match(namespace.name()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PredicateSource<'a> {
    Selector(&'a LabelSelector),
    Name(&'a str),
    Regex(&'a str),
}

impl PredicateSource<'_> {
    /// An invalid selector or regex is an internal error: it should have
    /// been rejected when the store was admitted.
    fn compile(self) -> Result<NamespacePredicate> {
        match self {
            Self::Selector(selector) => Ok(NamespacePredicate::Selector(selector.to_selector()?)),
            Self::Name(name) => Ok(NamespacePredicate::Selector(
                LabelSelector::matching_labels([(NAMESPACE_NAME_LABEL, name)]).to_selector()?,
            )),
            Self::Regex(pattern) => Regex::new(pattern).map(NamespacePredicate::NameRegex).map_err(|e| {
                Error::internal_with_source(
                    format!("invalid namespace regex {:?} in store condition", pattern),
                    Box::new(e),
                )
            }),
        }
    }
}

/// Predicates of one condition in evaluation order: the selector, one
/// selector per listed name, then the name regexes. Each is built only when
/// the iterator reaches it.
pub fn predicates(
    condition: &ClusterSecretStoreCondition,
) -> impl Iterator<Item = Result<NamespacePredicate>> + '_ {
    condition
        .namespace_selector
        .iter()
        .map(PredicateSource::Selector)
        .chain(condition.namespaces.iter().map(|name| PredicateSource::Name(name)))
        .chain(condition.namespace_regexes.iter().map(|pattern| PredicateSource::Regex(pattern)))
        .map(PredicateSource::compile)
}

/// Whether any predicate of `condition` admits `namespace`. Stops at the
/// first match, so a malformed predicate after it is never built.
pub fn condition_admits(condition: &ClusterSecretStoreCondition, namespace: &Namespace) -> Result<bool> {
    for predicate in predicates(condition) {
        if predicate?.matches(namespace) {
            return Ok(true);
        }
    }
    Ok(false)
}
