//! Thin helpers over common DHIS2 endpoints.
//!
//! Each helper borrows an [`Api`](crate::Api) and is obtained from it, e.g.
//! `client.users().me(None)`. Payloads are passed through as JSON.

pub mod analytics;
pub mod collection;
pub mod data_values;
pub mod organisation_units;
pub mod sharing;
pub mod system;
pub mod users;

// Re-export commonly used types
pub use analytics::Analytics;
pub use collection::Collection;
pub use data_values::{DataValue, DataValues};
pub use organisation_units::OrganisationUnits;
pub use sharing::{AccessEntry, Sharing, SharingDefaults, SharingObject};
pub use system::System;
pub use users::{OrgUnitScopes, Users};
