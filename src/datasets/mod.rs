//! Registry feed formats
//!
//! - `registry`: the five Regional Internet Registries
//! - `sources`: URLs and local file names of every feed
//! - `delegated`: extended-stats (delegation) file parser
//! - `route`: RPSL route-object dump parser

pub mod delegated;
pub mod registry;
pub mod route;
pub mod sources;

pub use delegated::{Allocation, AsnIdentity, DelegatedLine, DelegatedStats, RegistryRecord};
pub use registry::Registry;
pub use route::{RouteFact, RouteParser, RouteStats};
pub use sources::FeedSource;
