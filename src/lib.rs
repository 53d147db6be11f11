//! NDR Access: UK well-register client and BGS tops scraper
//!
//! Two independent components for pulling North Sea well data:
//!
//! - **Register client** ([`NdrClient`]): authenticates against the NDR's
//!   Graph-backed SharePoint lists and answers filtered file and well lookups
//! - **Tops scraper** ([`BgsTopsScraper`]): extracts per-well depth models
//!   from the public BGS geological tops pages
//!
//! The [`wellid`] module bridges the two naming conventions involved: the
//! national quadrant/block-well format and the register's internal format.
//!
//! All network calls are blocking, one request per operation, with explicit
//! timeouts. Neither component retries or paginates.

pub mod config;
pub mod register;
pub mod tops;
pub mod wellid;

// Re-export the component entry points
pub use config::{CredentialsError, ListIds, NdrCredentials};
pub use register::{AccessError, AccessToken, ClientOptions, ColumnInfo, NdrClient};
pub use tops::{BgsTopsScraper, TopsError, WellIndex};
pub use wellid::{bgs_to_ndr, ndr_to_bgs, WellIdError};
