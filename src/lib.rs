//! A synchronous Rust client for the DHIS2 Web API.
//!
//! Besides raw JSON requests and helpers for common endpoints, the crate
//! knows DHIS2 period identifiers (`202401`, `2024Q1`, `2024W5`, ...) and
//! the calendars servers run on, and can find the most recent period that
//! holds data for a data element.
//!
//! ## Quick start
//! - Configure the server via environment variables (`DHIS2_BASE_URL`,
//!   `DHIS2_USERNAME`/`DHIS2_PASSWORD` or `DHIS2_TOKEN`) or a `.dhis2rc`
//!   file (supported in the current directory and in your home directory).
//! - Bring the [`Api`] trait into scope and call the endpoint helpers.
//!
//! ```no_run
//! use anyhow::Result;
//! use dhis2::{Api, Client, Params};
//!
//! fn main() -> Result<()> {
//!     let client = Client::from_env()?;
//!
//!     let calendar = client.system().calendar()?;
//!     println!("server calendar: {calendar}");
//!
//!     for unit in client.organisation_units().list(Params::from([("level", "2")])) {
//!         println!("{}", unit?["displayName"]);
//!     }
//!
//!     if let Some(found) = client.latest_period_for_level("fbfJHSPpUQD", 3)? {
//!         println!("latest data: {} ({} values)", found.period_id, found.value_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Period arithmetic works without a server:
//!
//! ```
//! use dhis2::{PeriodType, next_period_id, period_start_end};
//!
//! assert_eq!(next_period_id(PeriodType::Monthly, "202412").unwrap(), "202501");
//! let window = period_start_end(PeriodType::Quarterly, "2024Q1").unwrap();
//! assert_eq!(window.end.to_string(), "2024-03-31");
//! ```

#![forbid(unsafe_code)]

mod api;
pub mod calendar;
mod client;
mod config;
mod error;
mod logging;
pub mod paging;
pub mod period;
pub mod resolver;
pub mod resources;
mod util;

pub use api::{Api, ApiRequest, DEFAULT_PAGE_SIZE, Method, Params};
pub use calendar::{
    Calendar, CalendarSystem, LocalDate, calendar_year_bounds, calendar_year_bounds_for,
    calendar_year_of,
};
pub use client::Client;
pub use config::ClientSettings;
pub use error::{Error, Result};
pub use logging::{LogDestination, LogFormat, LogSettings, parse_level};
pub use paging::Pages;
pub use period::{
    PeriodCalculator, PeriodType, PeriodWindow, next_period_id, period_key, period_sort_key,
    period_start_end,
};
pub use resolver::{LatestPeriod, ResolverOptions, latest_period_for_level};
pub use resources::sharing::{DATA_READ, DATA_WRITE, META_READ, META_WRITE, NO_ACCESS};
