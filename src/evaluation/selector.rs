// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Namespace, node and name selection
//!
//! Include lists are strict allow-lists: when one is given, the matching
//! exclude list is not consulted at all. Exclude lists only apply when the
//! include list is empty.

use std::collections::BTreeSet;

use crate::kubernetes::ResourceRecord;

/// Token that selects every resource name
pub const ALL_NAMES: &str = "all";

/// Decide whether a value is filtered out by an include/exclude pair
pub fn should_exclude(
    value: &str,
    include: &BTreeSet<String>,
    exclude: &BTreeSet<String>,
) -> bool {
    if !include.is_empty() {
        return !include.contains(value);
    }
    exclude.contains(value)
}

/// Namespace and node filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub include_namespaces: BTreeSet<String>,
    pub exclude_namespaces: BTreeSet<String>,
    pub include_nodes: BTreeSet<String>,
    pub exclude_nodes: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn excludes_namespace(&self, namespace: &str) -> bool {
        should_exclude(namespace, &self.include_namespaces, &self.exclude_namespaces)
    }

    /// A resource without a node is matched as the empty string
    pub fn excludes_node(&self, node: Option<&str>) -> bool {
        should_exclude(node.unwrap_or(""), &self.include_nodes, &self.exclude_nodes)
    }

    /// True when the record survives both the namespace and the node check
    pub fn admits(&self, record: &ResourceRecord) -> bool {
        !self.excludes_namespace(&record.namespace)
            && !self.excludes_node(record.node_name.as_deref())
    }
}

/// Set of resource names to evaluate
///
/// Parsed from `all`, a single name, or a comma-separated list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    names: BTreeSet<String>,
}

impl NameFilter {
    pub fn parse(list: &str) -> Self {
        let names = if list.contains(',') {
            list.split(',')
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect()
        } else {
            BTreeSet::from([list.to_string()])
        };
        Self { names }
    }

    pub fn all() -> Self {
        Self::parse(ALL_NAMES)
    }

    pub fn is_all(&self) -> bool {
        self.names.contains(ALL_NAMES)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.is_all() || self.names.contains(name)
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_include_is_authoritative() {
        let include = set(&["prod"]);
        let exclude = set(&["prod", "dev"]);

        assert!(!should_exclude("prod", &include, &exclude));
        assert!(should_exclude("dev", &include, &exclude));
        assert!(should_exclude("staging", &include, &exclude));
    }

    #[test]
    fn test_include_ignores_exclude_contents() {
        let include = set(&["a", "b"]);
        for exclude in [set(&[]), set(&["a"]), set(&["a", "b", "c"])] {
            assert!(!should_exclude("a", &include, &exclude));
            assert!(!should_exclude("b", &include, &exclude));
            assert!(should_exclude("c", &include, &exclude));
        }
    }

    #[test]
    fn test_exclude_applies_without_include() {
        let include = set(&[]);
        let exclude = set(&["kube-system"]);

        assert!(should_exclude("kube-system", &include, &exclude));
        assert!(!should_exclude("default", &include, &exclude));
    }

    #[test]
    fn test_empty_lists_admit_everything() {
        let empty = set(&[]);
        assert!(!should_exclude("anything", &empty, &empty));
        assert!(!should_exclude("", &empty, &empty));
    }

    #[test]
    fn test_blank_value_matched_literally() {
        let include = set(&[""]);
        assert!(!should_exclude("", &include, &set(&[])));
        assert!(should_exclude("default", &include, &set(&[])));
    }

    #[test]
    fn test_missing_node_is_empty_string() {
        let criteria = FilterCriteria {
            include_nodes: set(&["node-1"]),
            ..Default::default()
        };
        assert!(criteria.excludes_node(None));
        assert!(!criteria.excludes_node(Some("node-1")));

        let criteria = FilterCriteria {
            exclude_nodes: set(&["node-1"]),
            ..Default::default()
        };
        assert!(!criteria.excludes_node(None));
        assert!(criteria.excludes_node(Some("node-1")));
    }

    #[test]
    fn test_name_filter_all() {
        let filter = NameFilter::parse("all");
        assert!(filter.is_all());
        assert!(filter.matches("backup"));
    }

    #[test]
    fn test_name_filter_single() {
        let filter = NameFilter::parse("backup");
        assert!(!filter.is_all());
        assert!(filter.matches("backup"));
        assert!(!filter.matches("backup-2"));
    }

    #[test]
    fn test_name_filter_list() {
        let filter = NameFilter::parse("backup,report,");
        assert!(filter.matches("backup"));
        assert!(filter.matches("report"));
        assert!(!filter.matches(""));
        assert!(!filter.matches("cleanup"));
    }

    #[test]
    fn test_name_filter_list_containing_all() {
        let filter = NameFilter::parse("backup,all");
        assert!(filter.matches("anything"));
    }
}
