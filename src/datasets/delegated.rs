//! RIR extended delegation statistics ("extended-stats") parsing.
//!
//! Each record line has at least eight `|`-separated fields:
//!
//! ```text
//! registry|cc|type|start|value|date|status|opaque-id[|extensions...]
//! ripencc|NL|ipv4|193.0.0.0|4096|19930901|allocated|a3c5c2b7-...
//! ripencc|NL|asn|3333|1|19930901|assigned|a3c5c2b7-...
//! ```
//!
//! Header and summary lines have fewer fields and are skipped. ASN records
//! yield an [`AsnIdentity`]; IPv4/IPv6 records with an `assigned` or
//! `allocated` status yield an [`Allocation`] whose CIDR is derived from the
//! address count (IPv4) or prefix length (IPv6) in the `value` column.

use crate::datasets::registry::Registry;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{info, warn};

/// Minimum number of `|`-separated fields of a record line
const MIN_FIELDS: usize = 8;

/// Record type column of an extended-stats line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Asn,
    Ipv4,
    Ipv6,
    Other(String),
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s {
            "asn" => RecordType::Asn,
            "ipv4" => RecordType::Ipv4,
            "ipv6" => RecordType::Ipv6,
            other => RecordType::Other(other.to_string()),
        }
    }
}

/// One record line of an extended-stats feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    pub registry: Registry,
    /// Country code as given in the feed, possibly empty
    pub country_code: String,
    pub record_type: RecordType,
    /// First address of the block, or the ASN
    pub value: String,
    /// Address count (IPv4) or prefix length (IPv6); `None` if not numeric
    pub extent: Option<i64>,
    pub status: String,
    pub opaque_id: String,
}

impl RegistryRecord {
    /// Split a raw line into a record; `None` for lines with too few fields
    pub fn from_line(registry: Registry, line: &str) -> Option<RegistryRecord> {
        let fields: Vec<&str> = line.trim().split('|').collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }

        Some(RegistryRecord {
            registry,
            country_code: fields[1].to_string(),
            record_type: RecordType::from(fields[2]),
            value: fields[3].trim().to_string(),
            extent: fields[4].trim().parse().ok(),
            status: fields[6].to_string(),
            opaque_id: fields[7].trim().to_string(),
        })
    }

    /// Whether the status column marks the resource as in use
    pub fn is_countable(&self) -> bool {
        self.status.contains("assigned") || self.status.contains("allocated")
    }

    /// Prefix length of an IPv4/IPv6 record, `None` for other types or a non-numeric extent
    pub fn prefix_len(&self) -> Option<i64> {
        let extent = self.extent?;
        match self.record_type {
            RecordType::Ipv4 => Some(32 - ipv4_host_bits(extent)),
            RecordType::Ipv6 => Some(extent),
            _ => None,
        }
    }
}

/// An address block delegated by a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub cidr: String,
    pub registry: Registry,
    pub country_code: String,
    pub opaque_id: String,
}

/// An ASN and the registry identifier of its holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnIdentity {
    /// ASN as written in the feed
    pub as_number: String,
    pub opaque_id: String,
}

/// Outcome of parsing a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegatedLine {
    Asn(AsnIdentity),
    Allocation(Allocation),
    /// An in-use IP record whose derived CIDR failed validation
    InvalidCidr(String),
    /// Short lines, other record types, and unused resources
    Ignored,
}

/// Number of host bits for an IPv4 block of `extent` addresses.
///
/// Halves the count until it drops to 1 or below, counting the divisions.
/// Power-of-two counts give their exact exponent; other counts round up.
pub fn ipv4_host_bits(extent: i64) -> i64 {
    let mut remaining = extent as f64;
    let mut bits = 0;
    while remaining > 1.0 {
        remaining /= 2.0;
        bits += 1;
    }
    bits
}

/// Check the shape of a CIDR string.
///
/// Only the mask is checked: it must be all ASCII digits and at most 32 when
/// the address contains `.`, or at most 128 when it contains `:`. The address
/// part itself is not validated.
pub fn validate_cidr(cidr: &str) -> bool {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return false;
    }

    let (ip, netmask) = (parts[0], parts[1]);
    if netmask.is_empty() || !netmask.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Ok(netmask) = netmask.parse::<u64>() else {
        return false;
    };

    if ip.contains('.') {
        netmask <= 32
    } else if ip.contains(':') {
        netmask <= 128
    } else {
        false
    }
}

/// Classify one line of an extended-stats feed
pub fn parse_line(registry: Registry, line: &str) -> DelegatedLine {
    let Some(record) = RegistryRecord::from_line(registry, line) else {
        return DelegatedLine::Ignored;
    };

    match record.record_type {
        RecordType::Asn => DelegatedLine::Asn(AsnIdentity {
            as_number: record.value,
            opaque_id: record.opaque_id,
        }),
        RecordType::Ipv4 | RecordType::Ipv6 if record.is_countable() => {
            let cidr = match record.prefix_len() {
                Some(bits) => format!("{}/{}", record.value, bits),
                None => format!("{}/", record.value),
            };
            if validate_cidr(&cidr) {
                DelegatedLine::Allocation(Allocation {
                    cidr,
                    registry: record.registry,
                    country_code: record.country_code,
                    opaque_id: record.opaque_id,
                })
            } else {
                DelegatedLine::InvalidCidr(cidr)
            }
        }
        _ => DelegatedLine::Ignored,
    }
}

/// Counters collected while parsing one extended-stats file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DelegatedStats {
    pub lines: usize,
    pub asn_identities: usize,
    pub allocations: usize,
    pub invalid_cidrs: usize,
}

/// Parse an extended-stats feed from a reader, handing every ASN identity and
/// allocation to `on_line` in file order.
///
/// Invalid byte sequences are replaced rather than aborting the parse.
/// `source` names the feed in diagnostics.
pub fn parse_reader<R, F>(
    registry: Registry,
    mut reader: R,
    source: &str,
    mut on_line: F,
) -> Result<DelegatedStats>
where
    R: BufRead,
    F: FnMut(DelegatedLine),
{
    let mut stats = DelegatedStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| anyhow!("Failed to read {}: {}", source, e))?;
        if read == 0 {
            break;
        }
        stats.lines += 1;

        let line = String::from_utf8_lossy(&buf);
        match parse_line(registry, &line) {
            DelegatedLine::Ignored => continue,
            DelegatedLine::InvalidCidr(cidr) => {
                warn!("Address '{}' is not valid in {}, skipping", cidr, source);
                stats.invalid_cidrs += 1;
            }
            entry @ DelegatedLine::Asn(_) => {
                stats.asn_identities += 1;
                on_line(entry);
            }
            entry @ DelegatedLine::Allocation(_) => {
                stats.allocations += 1;
                on_line(entry);
            }
        }
    }

    Ok(stats)
}

/// Parse an extended-stats file on disk
pub fn parse_file<F>(registry: Registry, path: &str, on_line: F) -> Result<DelegatedStats>
where
    F: FnMut(DelegatedLine),
{
    info!("Parsing file {}", path);
    let reader = oneio::get_reader(path)
        .map_err(|e| anyhow!("Failed to open extended-stats file {}: {}", path, e))?;
    parse_reader(registry, std::io::BufReader::new(reader), path, on_line)
}
