//! Index aggregation lens
//!
//! This module provides the `Aggregator` that turns parser output into the
//! three persisted indices:
//!
//! - **rir**: registry name → CIDRs, in parse order, duplicates kept
//! - **country**: country code → CIDRs, in parse order, duplicates kept
//! - **asn**: ASN → deduplicated CIDRs, attributed through two paths:
//!   1. the opaque-id join: an ASN record and the allocation records sharing
//!      its registry identifier
//!   2. route objects: the `origin:` of each `route:`/`route6:` object
//!
//! One aggregator is used per ingestion run; the opaque-id join spans all
//! registries, so every feed must be ingested into the same instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use rirlists::lens::aggregate::Aggregator;
//!
//! let mut aggregator = Aggregator::new();
//! aggregator.ingest_asn_identity(identity);
//! aggregator.ingest_allocation(allocation);
//! aggregator.ingest_route_fact(fact);
//!
//! let indices = aggregator.finalize();
//! println!("{} ASNs", indices.asn.len());
//! ```

use crate::datasets::{Allocation, AsnIdentity, DelegatedLine, RouteFact};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

// =============================================================================
// Index types
// =============================================================================

/// Insertion-ordered mapping from key to an ordered sequence of values.
///
/// Keys are created on first use with an empty sequence; values are never
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedIndex {
    entries: IndexMap<String, Vec<String>>,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the sequence for `key`, creating an empty one if needed
    pub fn entry(&mut self, key: &str) -> &mut Vec<String> {
        self.entries.entry(key.to_string()).or_default()
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.entry(key).push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of values across all keys
    pub fn value_count(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}

/// ASN → set of prefixes, keyed by the decimal ASN without the `AS` prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnIndex {
    entries: IndexMap<String, IndexSet<String>>,
}

impl AsnIndex {
    pub fn insert(&mut self, asn: &str, prefix: impl Into<String>) {
        self.entries
            .entry(asn.to_string())
            .or_default()
            .insert(prefix.into());
    }

    pub fn get(&self, asn: &str) -> Option<&IndexSet<String>> {
        self.entries.get(asn)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexSet<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value_count(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}

/// The three indices produced by one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indices {
    pub rir: OrderedIndex,
    pub country: OrderedIndex,
    pub asn: AsnIndex,
}

/// Key and value counts of a set of indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexCounts {
    pub rir_keys: usize,
    pub rir_prefixes: usize,
    pub country_keys: usize,
    pub country_prefixes: usize,
    pub asn_keys: usize,
    pub asn_prefixes: usize,
}

impl Indices {
    pub fn counts(&self) -> IndexCounts {
        IndexCounts {
            rir_keys: self.rir.len(),
            rir_prefixes: self.rir.value_count(),
            country_keys: self.country.len(),
            country_prefixes: self.country.value_count(),
            asn_keys: self.asn.len(),
            asn_prefixes: self.asn.value_count(),
        }
    }
}

/// Canonical ASN key: decimal form when numeric, otherwise as written
pub fn asn_key(as_number: &str) -> String {
    match as_number.trim().parse::<u32>() {
        Ok(asn) => asn.to_string(),
        Err(_) => as_number.trim().to_string(),
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Builds the rir, country and asn indices from parser output
#[derive(Debug, Default)]
pub struct Aggregator {
    rir: OrderedIndex,
    country: OrderedIndex,
    /// opaque id → CIDRs of allocations carrying it
    opaque_routes: OrderedIndex,
    /// ASN → opaque id; a repeated ASN keeps its last opaque id
    asn_opaque: IndexMap<String, String>,
    /// route-object facts, collected per ASN
    route_routes: AsnIndex,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_allocation(&mut self, allocation: Allocation) {
        self.rir.push(allocation.registry.name(), allocation.cidr.as_str());
        self.country
            .push(&allocation.country_code, allocation.cidr.as_str());
        self.opaque_routes
            .push(&allocation.opaque_id, allocation.cidr);
    }

    pub fn ingest_asn_identity(&mut self, identity: AsnIdentity) {
        self.asn_opaque
            .insert(asn_key(&identity.as_number), identity.opaque_id);
    }

    pub fn ingest_route_fact(&mut self, fact: RouteFact) {
        self.route_routes.insert(&fact.asn.to_string(), fact.prefix);
    }

    /// Route a parsed extended-stats line to the matching ingest method
    pub fn ingest_delegated_line(&mut self, line: DelegatedLine) {
        match line {
            DelegatedLine::Allocation(allocation) => self.ingest_allocation(allocation),
            DelegatedLine::Asn(identity) => self.ingest_asn_identity(identity),
            DelegatedLine::InvalidCidr(_) | DelegatedLine::Ignored => {}
        }
    }

    /// Perform the opaque-id join, merge route-object facts, and return the indices
    pub fn finalize(self) -> Indices {
        let mut asn = AsnIndex::default();

        for (as_number, opaque_id) in &self.asn_opaque {
            if let Some(cidrs) = self.opaque_routes.get(opaque_id) {
                for cidr in cidrs {
                    asn.insert(as_number, cidr.as_str());
                }
            }
        }

        for (as_number, prefixes) in self.route_routes.iter() {
            for prefix in prefixes {
                asn.insert(as_number, prefix.as_str());
            }
        }

        Indices {
            rir: self.rir,
            country: self.country,
            asn,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Registry;

    fn allocation(registry: Registry, cc: &str, cidr: &str, opaque_id: &str) -> Allocation {
        Allocation {
            cidr: cidr.to_string(),
            registry,
            country_code: cc.to_string(),
            opaque_id: opaque_id.to_string(),
        }
    }

    fn identity(asn: &str, opaque_id: &str) -> AsnIdentity {
        AsnIdentity {
            as_number: asn.to_string(),
            opaque_id: opaque_id.to_string(),
        }
    }

    fn fact(prefix: &str, asn: u32) -> RouteFact {
        RouteFact {
            prefix: prefix.to_string(),
            asn,
        }
    }

    fn sample_aggregator() -> Aggregator {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_asn_identity(identity("64500", "org-a"));
        aggregator.ingest_allocation(allocation(Registry::Arin, "US", "192.0.2.0/24", "org-a"));
        aggregator.ingest_allocation(allocation(Registry::Arin, "US", "198.51.100.0/24", "org-b"));
        aggregator.ingest_allocation(allocation(
            Registry::RipeNcc,
            "NL",
            "2001:db8::/32",
            "org-a",
        ));
        aggregator.ingest_route_fact(fact("192.0.2.0/24", 64500));
        aggregator.ingest_route_fact(fact("203.0.113.0/24", 64500));
        aggregator.ingest_route_fact(fact("203.0.113.0/24", 64501));
        aggregator
    }

    #[test]
    fn test_ordered_index_get_or_create() {
        let mut index = OrderedIndex::new();
        assert!(index.entry("ripencc").is_empty());
        assert_eq!(index.len(), 1);

        index.push("arin", "192.0.2.0/24");
        index.push("ripencc", "193.0.0.0/20");
        let keys: Vec<&String> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ripencc", "arin"]);
    }

    #[test]
    fn test_rir_and_country_keep_duplicates_in_order() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_allocation(allocation(Registry::Apnic, "JP", "192.0.2.0/24", "x"));
        aggregator.ingest_allocation(allocation(Registry::Apnic, "JP", "198.51.100.0/24", "x"));
        aggregator.ingest_allocation(allocation(Registry::Apnic, "JP", "192.0.2.0/24", "x"));

        let indices = aggregator.finalize();
        let expected = ["192.0.2.0/24", "198.51.100.0/24", "192.0.2.0/24"];
        assert_eq!(indices.rir.get("apnic").unwrap(), expected.as_slice());
        assert_eq!(indices.country.get("JP").unwrap(), expected.as_slice());
    }

    #[test]
    fn test_asn_union_of_join_and_route_objects() {
        let indices = sample_aggregator().finalize();

        let routes: Vec<&str> = indices
            .asn
            .get("64500")
            .unwrap()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(
            routes,
            vec!["192.0.2.0/24", "2001:db8::/32", "203.0.113.0/24"]
        );

        let routes = indices.asn.get("64501").unwrap();
        assert_eq!(routes.len(), 1);
        assert!(routes.contains("203.0.113.0/24"));
    }

    #[test]
    fn test_join_ignores_allocation_order() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_allocation(allocation(Registry::Lacnic, "BR", "192.0.2.0/24", "org"));
        aggregator.ingest_asn_identity(identity("64510", "org"));

        let indices = aggregator.finalize();
        assert!(indices.asn.get("64510").unwrap().contains("192.0.2.0/24"));
    }

    #[test]
    fn test_repeated_asn_keeps_last_opaque_id() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_asn_identity(identity("64500", "old"));
        aggregator.ingest_asn_identity(identity("64500", "new"));
        aggregator.ingest_allocation(allocation(Registry::Arin, "US", "192.0.2.0/24", "old"));
        aggregator.ingest_allocation(allocation(Registry::Arin, "US", "198.51.100.0/24", "new"));

        let indices = aggregator.finalize();
        let routes = indices.asn.get("64500").unwrap();
        assert_eq!(routes.len(), 1);
        assert!(routes.contains("198.51.100.0/24"));
    }

    #[test]
    fn test_asn_without_allocations_has_no_entry() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_asn_identity(identity("64999", "nobody"));
        assert!(aggregator.finalize().asn.is_empty());
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let first = sample_aggregator().finalize();
        let second = sample_aggregator().finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ingest_delegated_line() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest_delegated_line(DelegatedLine::Asn(identity("AS", "o")));
        aggregator.ingest_delegated_line(DelegatedLine::InvalidCidr("x/99".to_string()));
        aggregator.ingest_delegated_line(DelegatedLine::Allocation(allocation(
            Registry::Afrinic,
            "ZA",
            "192.0.2.0/24",
            "o",
        )));

        let indices = aggregator.finalize();
        assert_eq!(indices.rir.value_count(), 1);
        assert!(indices.asn.get("AS").is_some());
    }

    #[test]
    fn test_asn_key() {
        assert_eq!(asn_key("64500"), "64500");
        assert_eq!(asn_key(" 064500 "), "64500");
        assert_eq!(asn_key("abc"), "abc");
    }

    #[test]
    fn test_counts() {
        let counts = sample_aggregator().finalize().counts();
        assert_eq!(counts.rir_keys, 2);
        assert_eq!(counts.rir_prefixes, 3);
        assert_eq!(counts.country_keys, 2);
        assert_eq!(counts.asn_keys, 2);
        assert_eq!(counts.asn_prefixes, 4);
    }
}
