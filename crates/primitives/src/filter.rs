//! Bundle filter configuration: the enumerated AST from spec §9 that
//! replaces dynamic filter expressions (`ANS104_UNBUNDLE_FILTER`,
//! `ANS104_INDEX_FILTER`) with a small evaluable tree.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data_item::{is_bundle_content_type, NormalizedDataItem};
use crate::id::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpr {
    Always,
    Never,
    Not(Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    MatchTag { name: String, value_regex: String },
    MatchHashPartition { start: u32, end: u32 },
    MatchRootTxIdIn(HashSet<Id>),
    IsNestedBundle,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid regex {0:?} in match_tag filter: {1}")]
    InvalidRegex(String, regex::Error),
}

impl FilterExpr {
    /// Validates that every `MatchTag` regex compiles, surfacing malformed
    /// config at startup rather than at first evaluation.
    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Self::Always | Self::Never | Self::IsNestedBundle => Ok(()),
            Self::Not(inner) => inner.validate(),
            Self::And(exprs) | Self::Or(exprs) => exprs.iter().try_for_each(Self::validate),
            Self::MatchTag { value_regex, .. } => Regex::new(value_regex)
                .map(|_| ())
                .map_err(|e| FilterError::InvalidRegex(value_regex.clone(), e)),
            Self::MatchHashPartition { .. } | Self::MatchRootTxIdIn(_) => Ok(()),
        }
    }

    #[must_use]
    pub fn evaluate(&self, item: &NormalizedDataItem) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Not(inner) => !inner.evaluate(item),
            Self::And(exprs) => exprs.iter().all(|e| e.evaluate(item)),
            Self::Or(exprs) => exprs.iter().any(|e| e.evaluate(item)),
            Self::MatchTag { name, value_regex } => {
                let Ok(re) = Regex::new(value_regex) else {
                    return false;
                };
                item.tags
                    .iter()
                    .any(|t| t.name.eq_ignore_ascii_case(name) && re.is_match(&t.value))
            }
            Self::MatchHashPartition { start, end } => {
                let bucket = hash_partition_bucket(&item.id);
                bucket >= *start && bucket < *end
            }
            Self::MatchRootTxIdIn(set) => set.contains(&item.root_transaction_id),
            Self::IsNestedBundle => {
                is_bundle_content_type(item.content_type.as_deref())
                    || item
                        .tags
                        .iter()
                        .any(|t| t.name.eq_ignore_ascii_case("Bundle-Format"))
            }
        }
    }
}

/// Deterministic bucket in `[0, u32::MAX]` derived from an id's leading
/// bytes, used for stable hash-range partitioning across gateway instances.
fn hash_partition_bucket(id: &Id) -> u32 {
    let bytes = id.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_item::Tag;

    fn sample(tags: Vec<Tag>, content_type: Option<&str>) -> NormalizedDataItem {
        NormalizedDataItem {
            id: Id::random(),
            parent_id: Id::random(),
            root_transaction_id: Id::random(),
            height: None,
            signature_type: 1,
            signature_offset: 0,
            signature_size: 512,
            owner_offset: 0,
            owner_size: 512,
            target: None,
            anchor: None,
            tags,
            content_type: content_type.map(str::to_owned),
            data_offset: 1_185,
            size: 500,
            indexed_at: 0,
        }
    }

    #[test]
    fn always_and_never_are_constant() {
        let item = sample(vec![], None);
        assert!(FilterExpr::Always.evaluate(&item));
        assert!(!FilterExpr::Never.evaluate(&item));
    }

    #[test]
    fn match_tag_is_case_insensitive_on_name_and_regex_on_value() {
        let item = sample(
            vec![Tag {
                name: "App-Name".to_owned(),
                value: "ArDrive-v2".to_owned(),
            }],
            None,
        );
        let expr = FilterExpr::MatchTag {
            name: "app-name".to_owned(),
            value_regex: "^ArDrive".to_owned(),
        };
        assert!(expr.validate().is_ok());
        assert!(expr.evaluate(&item));
    }

    #[test]
    fn and_or_not_compose() {
        let item = sample(vec![], Some("application/ans104"));
        let expr = FilterExpr::And(vec![
            FilterExpr::IsNestedBundle,
            FilterExpr::Not(Box::new(FilterExpr::Never)),
        ]);
        assert!(expr.evaluate(&item));
    }

    #[test]
    fn match_root_tx_id_in_checks_membership() {
        let item = sample(vec![], None);
        let mut set = HashSet::new();
        set.insert(item.root_transaction_id);
        assert!(FilterExpr::MatchRootTxIdIn(set).evaluate(&item));
        assert!(!FilterExpr::MatchRootTxIdIn(HashSet::new()).evaluate(&item));
    }

    #[test]
    fn invalid_regex_fails_validation_up_front() {
        let expr = FilterExpr::MatchTag {
            name: "x".to_owned(),
            value_regex: "(".to_owned(),
        };
        assert!(expr.validate().is_err());
    }
}
