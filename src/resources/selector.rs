//! Label selectors.
//!
//! `matchLabels` and `matchExpressions` are ANDed together. An empty selector
//! matches every label set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl LabelSelector {
    /// Selector requiring every given label.
    pub fn matching_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            match_expressions: Vec::new(),
        }
    }

    /// Validate and compile the selector.
    pub fn to_selector(&self) -> Result<Selector> {
        let mut requirements = Vec::with_capacity(self.match_labels.len() + self.match_expressions.len());

        for (key, value) in &self.match_labels {
            if key.is_empty() {
                return Err(Error::internal("label selector has an empty matchLabels key"));
            }
            requirements.push(LabelSelectorRequirement {
                key: key.clone(),
                operator: SelectorOperator::In,
                values: vec![value.clone()],
            });
        }

        for expr in &self.match_expressions {
            if expr.key.is_empty() {
                return Err(Error::internal("label selector has an empty matchExpressions key"));
            }
            match expr.operator {
                SelectorOperator::In | SelectorOperator::NotIn if expr.values.is_empty() => {
                    return Err(Error::internal(format!(
                        "label selector requirement {:?} {:?} needs at least one value",
                        expr.key, expr.operator
                    )));
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist
                    if !expr.values.is_empty() =>
                {
                    return Err(Error::internal(format!(
                        "label selector requirement {:?} {:?} must not carry values",
                        expr.key, expr.operator
                    )));
                }
                _ => requirements.push(expr.clone()),
            }
        }

        Ok(Selector { requirements })
    }
}

/// A validated selector.
#[derive(Debug, Clone)]
pub struct Selector {
    requirements: Vec<LabelSelectorRequirement>,
}

impl Selector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| {
            let value = labels.get(&req.key);
            match req.operator {
                SelectorOperator::In => value.is_some_and(|v| req.values.contains(v)),
                SelectorOperator::NotIn => value.map_or(true, |v| !req.values.contains(v)),
                SelectorOperator::Exists => value.is_some(),
                SelectorOperator::DoesNotExist => value.is_none(),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::default().to_selector().unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("team", "payments")])));
    }

    #[test]
    fn test_match_labels() {
        let selector = LabelSelector::matching_labels([("team", "payments")]).to_selector().unwrap();
        assert!(selector.matches(&labels(&[("team", "payments"), ("env", "prod")])));
        assert!(!selector.matches(&labels(&[("team", "search")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_match_expressions() {
        let selector = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![
                LabelSelectorRequirement {
                    key: "env".into(),
                    operator: SelectorOperator::In,
                    values: vec!["prod".into(), "staging".into()],
                },
                LabelSelectorRequirement {
                    key: "quarantine".into(),
                    operator: SelectorOperator::DoesNotExist,
                    values: vec![],
                },
                LabelSelectorRequirement {
                    key: "tier".into(),
                    operator: SelectorOperator::NotIn,
                    values: vec!["legacy".into()],
                },
            ],
        }
        .to_selector()
        .unwrap();

        assert!(selector.matches(&labels(&[("env", "prod")])));
        assert!(selector.matches(&labels(&[("env", "staging"), ("tier", "core")])));
        assert!(!selector.matches(&labels(&[("env", "dev")])));
        assert!(!selector.matches(&labels(&[("env", "prod"), ("quarantine", "true")])));
        assert!(!selector.matches(&labels(&[("env", "prod"), ("tier", "legacy")])));
    }

    #[test]
    fn test_invalid_requirements_are_rejected() {
        let in_without_values = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![LabelSelectorRequirement {
                key: "env".into(),
                operator: SelectorOperator::In,
                values: vec![],
            }],
        };
        assert!(matches!(in_without_values.to_selector(), Err(Error::Internal { .. })));

        let exists_with_values = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![LabelSelectorRequirement {
                key: "env".into(),
                operator: SelectorOperator::Exists,
                values: vec!["prod".into()],
            }],
        };
        assert!(exists_with_values.to_selector().is_err());
    }

    #[test]
    fn test_deserialize_manifest_shape() {
        let selector: LabelSelector = serde_yaml::from_str(
            r#"
matchLabels:
  team: payments
matchExpressions:
  - key: env
    operator: In
    values: [prod]
"#,
        )
        .unwrap();
        assert_eq!(selector.match_labels.get("team").map(String::as_str), Some("payments"));
        assert_eq!(selector.match_expressions[0].operator, SelectorOperator::In);
    }
}
