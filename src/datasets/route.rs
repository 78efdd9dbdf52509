//! RPSL route-object dump parsing.
//!
//! Routing-registry dumps (`ripe.db.gz`, `apnic.db.route.gz`, ...) hold
//! `route:`/`route6:` objects followed by an `origin:` attribute:
//!
//! ```text
//! route:          193.0.0.0/21
//! descr:          RIPE-NCC
//! origin:         AS3333
//! ```
//!
//! The parser pairs each route line with the next origin line. It does not
//! track object boundaries beyond that ordering.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{info, warn};

/// A prefix announced by an ASN according to a route object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteFact {
    /// Prefix as written on the `route:`/`route6:` line
    pub prefix: String,
    pub asn: u32,
}

/// Parser state between lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteState {
    #[default]
    AwaitingRoute,
    HavePendingPrefix(String),
}

/// What a single line did to the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    /// A route line replaced the pending prefix (if any)
    Pending,
    /// An origin line completed a route object
    Fact(RouteFact),
    /// An origin line arrived with no pending prefix
    Unpaired,
    /// An origin line carried an unparseable ASN; the pending prefix is dropped
    InvalidOrigin(String),
    /// Any other line
    NoChange,
}

/// Two-state machine pairing `route:`/`route6:` lines with `origin:` lines
#[derive(Debug, Default)]
pub struct RouteParser {
    state: RouteState,
}

impl RouteParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RouteState {
        &self.state
    }

    /// Feed one line and return the resulting transition
    pub fn feed(&mut self, line: &str) -> RouteEvent {
        if line.starts_with("route:") || line.starts_with("route6:") {
            return match second_token(line) {
                Some(prefix) => {
                    self.state = RouteState::HavePendingPrefix(prefix.to_string());
                    RouteEvent::Pending
                }
                None => RouteEvent::NoChange,
            };
        }

        if !line.starts_with("origin:") {
            return RouteEvent::NoChange;
        }

        let token = second_token(line).unwrap_or_default();
        let pending = std::mem::take(&mut self.state);
        match parse_origin(token) {
            Some(asn) => match pending {
                RouteState::HavePendingPrefix(prefix) => {
                    RouteEvent::Fact(RouteFact { prefix, asn })
                }
                RouteState::AwaitingRoute => RouteEvent::Unpaired,
            },
            None => RouteEvent::InvalidOrigin(token.to_string()),
        }
    }
}

fn second_token(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}

/// Parse an `origin:` value such as `AS3333`, `as3333` or `3333`
pub fn parse_origin(token: &str) -> Option<u32> {
    let digits = match token.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &token[2..],
        _ => token,
    };
    digits.parse().ok()
}

/// Counters collected while parsing one route-object dump
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub lines: usize,
    pub route_facts: usize,
    pub invalid_origins: usize,
}

/// Parse a route-object dump from a reader, handing every fact to `on_fact`.
///
/// Invalid byte sequences are replaced rather than aborting the parse.
/// `source` names the dump in diagnostics.
pub fn parse_reader<R, F>(mut reader: R, source: &str, mut on_fact: F) -> Result<RouteStats>
where
    R: BufRead,
    F: FnMut(RouteFact),
{
    let mut parser = RouteParser::new();
    let mut stats = RouteStats::default();
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

        match parser.feed(&String::from_utf8_lossy(&buf)) {
            RouteEvent::Fact(fact) => {
                stats.route_facts += 1;
                on_fact(fact);
            }
            RouteEvent::InvalidOrigin(token) => {
                warn!("Invalid ASN '{}' in {}", token, source);
                stats.invalid_origins += 1;
            }
            RouteEvent::Pending | RouteEvent::Unpaired | RouteEvent::NoChange => {}
        }
    }

    Ok(stats)
}

/// Parse a route-object dump on disk; `.gz` files are decompressed transparently
pub fn parse_file<F>(path: &str, on_fact: F) -> Result<RouteStats>
where
    F: FnMut(RouteFact),
{
    info!("Parsing {}", path);
    let reader = oneio::get_reader(path)
        .map_err(|e| anyhow!("Failed to open route-object dump {}: {}", path, e))?;
    parse_reader(std::io::BufReader::new(reader), path, on_fact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const DUMP: &str = "\
route:          193.0.0.0/21
descr:          RIPE-NCC
origin:         AS3333
mnt-by:         RIPE-NCC-MNT

route6:         2001:67c:2e8::/48
origin:         as3333

origin:         AS64501

route:          198.51.100.0/24
route:          203.0.113.0/24
origin:         AS64502
";

    fn collect(input: &str) -> (Vec<RouteFact>, RouteStats) {
        let mut facts = Vec::new();
        let stats = parse_reader(Cursor::new(input.as_bytes()), "test", |f| facts.push(f)).unwrap();
        (facts, stats)
    }

    #[test]
    fn test_route_origin_pair() {
        let (facts, _) = collect("route: 10.0.0.0/8\norigin: AS64500\n");
        assert_eq!(
            facts,
            vec![RouteFact {
                prefix: "10.0.0.0/8".to_string(),
                asn: 64500
            }]
        );
    }

    #[test]
    fn test_unpaired_origin() {
        let mut parser = RouteParser::new();
        assert_eq!(parser.feed("origin: AS64500"), RouteEvent::Unpaired);
        assert_eq!(parser.state(), &RouteState::AwaitingRoute);
    }

    #[test]
    fn test_origin_clears_pending_prefix() {
        let mut parser = RouteParser::new();
        parser.feed("route: 10.0.0.0/8");
        assert!(matches!(parser.feed("origin: AS1"), RouteEvent::Fact(_)));
        assert_eq!(parser.feed("origin: AS2"), RouteEvent::Unpaired);
    }

    #[test]
    fn test_pending_prefix_overwritten() {
        let mut parser = RouteParser::new();
        parser.feed("route: 10.0.0.0/8");
        parser.feed("route6: 2001:db8::/32");
        assert_eq!(
            parser.state(),
            &RouteState::HavePendingPrefix("2001:db8::/32".to_string())
        );
        assert_eq!(
            parser.feed("origin: AS64500"),
            RouteEvent::Fact(RouteFact {
                prefix: "2001:db8::/32".to_string(),
                asn: 64500
            })
        );
    }

    #[test]
    fn test_invalid_origin_drops_pending() {
        let mut parser = RouteParser::new();
        parser.feed("route: 10.0.0.0/8");
        assert_eq!(
            parser.feed("origin: AS-FOO"),
            RouteEvent::InvalidOrigin("AS-FOO".to_string())
        );
        assert_eq!(parser.state(), &RouteState::AwaitingRoute);
        assert_eq!(parser.feed("origin: AS1"), RouteEvent::Unpaired);
    }

    #[test]
    fn test_other_lines_keep_state() {
        let mut parser = RouteParser::new();
        parser.feed("route: 10.0.0.0/8");
        assert_eq!(parser.feed("descr: example"), RouteEvent::NoChange);
        assert_eq!(parser.feed("  origin: AS1"), RouteEvent::NoChange);
        assert_eq!(parser.feed("route:"), RouteEvent::NoChange);
        assert_eq!(
            parser.state(),
            &RouteState::HavePendingPrefix("10.0.0.0/8".to_string())
        );
    }

    #[test]
    fn test_parse_origin() {
        assert_eq!(parse_origin("AS3333"), Some(3333));
        assert_eq!(parse_origin("as3333"), Some(3333));
        assert_eq!(parse_origin("aS3333"), Some(3333));
        assert_eq!(parse_origin("3333"), Some(3333));
        assert_eq!(parse_origin("AS"), None);
        assert_eq!(parse_origin(""), None);
        assert_eq!(parse_origin("AS4294967296"), None);
    }

    #[test]
    fn test_parse_dump() {
        let (facts, stats) = collect(DUMP);
        let pairs: Vec<(&str, u32)> = facts.iter().map(|f| (f.prefix.as_str(), f.asn)).collect();
        assert_eq!(
            pairs,
            vec![
                ("193.0.0.0/21", 3333),
                ("2001:67c:2e8::/48", 3333),
                ("203.0.113.0/24", 64502),
            ]
        );
        assert_eq!(stats.route_facts, 3);
        assert_eq!(stats.invalid_origins, 0);
    }

    #[test]
    fn test_parse_gzip_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ripe.db.gz");
        let path_str = path.to_str().unwrap();
        {
            let mut writer = oneio::get_writer(path_str).unwrap();
            writer.write_all(DUMP.as_bytes()).unwrap();
        }

        let mut facts = Vec::new();
        let stats = parse_file(path_str, |f| facts.push(f)).unwrap();
        assert_eq!(stats.route_facts, 3);
        assert_eq!(facts[0].asn, 3333);
    }

    #[test]
    fn test_parse_replaces_invalid_utf8() {
        let mut data = b"descr: caf\xe9\n".to_vec();
        data.extend_from_slice(b"route: 10.0.0.0/8\norigin: AS1\n");
        let mut facts = Vec::new();
        parse_reader(Cursor::new(data), "test", |f| facts.push(f)).unwrap();
        assert_eq!(facts.len(), 1);
    }
}
