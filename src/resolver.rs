//! Finds the most recent period holding data for a data element across
//! every organisation unit at one hierarchy level.
//!
//! The period type comes from the data sets the data element belongs to.
//! The current period is probed first; after that, whole calendar years
//! are walked backwards, newest period first, until a period answers with
//! data or the lookback is exhausted.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::{Api, Params};
use crate::calendar::{Calendar, calendar_year_bounds, calendar_year_of};
use crate::error::{Error, Result};
use crate::period::{PeriodCalculator, PeriodType, PeriodWindow};

pub const DEFAULT_LOOKBACK_YEARS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub calendar: Calendar,
    /// Calendar years searched, counting the current one. `0` probes only
    /// the current period.
    pub lookback_years: u32,
    /// Defaults to the local date.
    pub today: Option<NaiveDate>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::new(Calendar::default())
    }
}

impl ResolverOptions {
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            today: None,
        }
    }

    #[must_use]
    pub fn with_lookback_years(mut self, years: u32) -> Self {
        self.lookback_years = years;
        self
    }

    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

/// A period that has data, with how many values were returned for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPeriod {
    pub period_id: String,
    pub period_type: PeriodType,
    #[serde(flatten)]
    pub window: PeriodWindow,
    pub value_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataElementLinks {
    #[serde(default)]
    data_set_elements: Vec<DataSetElement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSetElement {
    data_set: Option<DataSetRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSetRef {
    period_type: Option<String>,
}

/// The single period type shared by every data set `data_element` is in.
///
/// # Errors
///
/// [`Error::MixedPeriodTypes`] when the data sets disagree,
/// [`Error::MissingPeriodType`] when there are none.
pub fn data_element_period_type<A: Api + ?Sized>(api: &A, data_element: &str) -> Result<PeriodType> {
    let path = format!("/api/dataElements/{data_element}");
    let data = api.get(
        &path,
        Params::new().with("fields", "id,dataSetElements[dataSet[id,periodType]]"),
    )?;
    let links: DataElementLinks =
        serde_json::from_value(data).map_err(|source| Error::Decode { path, source })?;

    let mut types = BTreeSet::new();
    for name in links
        .data_set_elements
        .into_iter()
        .filter_map(|dse| dse.data_set?.period_type)
    {
        let period_type = name
            .parse::<PeriodType>()
            .map_err(|_| Error::UnsupportedPeriodType(name))?;
        types.insert(period_type);
    }

    let mut types = types.into_iter();
    match (types.next(), types.len()) {
        (Some(period_type), 0) => Ok(period_type),
        (Some(first), _) => Err(Error::MixedPeriodTypes {
            data_element: data_element.to_string(),
            period_types: std::iter::once(first).chain(types).collect(),
        }),
        (None, _) => Err(Error::MissingPeriodType {
            data_element: data_element.to_string(),
        }),
    }
}

/// Ids of every organisation unit at hierarchy `level`.
pub fn org_units_at_level<A: Api + ?Sized>(api: &A, level: u32) -> Result<Vec<String>> {
    let params = Params::new().with("level", level).with("fields", "id");
    let mut ids = Vec::new();
    for unit in api.list_paged("/api/organisationUnits", params, None, Some("organisationUnits")) {
        if let Some(id) = unit?.get("id").and_then(Value::as_str) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Latest period with any value for `data_element` across the org units
/// at `level`. `Ok(None)` means nothing was found within the lookback.
///
/// The lookback counts calendar years back from the one the current
/// period starts in.
pub fn latest_period_for_level<A: Api + ?Sized>(
    api: &A,
    data_element: &str,
    level: u32,
    options: &ResolverOptions,
) -> Result<Option<LatestPeriod>> {
    api.scoped(|| search(api, data_element, level, options))
}

fn search<A: Api + ?Sized>(
    api: &A,
    data_element: &str,
    level: u32,
    options: &ResolverOptions,
) -> Result<Option<LatestPeriod>> {
    let period_type = data_element_period_type(api, data_element)?;
    let calc = PeriodCalculator::new(options.calendar)?;

    let org_units = org_units_at_level(api, level)?;
    if org_units.is_empty() {
        debug!(level, "no organisation units at level");
        return Ok(None);
    }

    let today = options.today.unwrap_or_else(|| Local::now().date_naive());
    let current = calc.period_key(period_type, today);
    let current_window = calc.period_start_end(period_type, &current)?;

    let probe = |period_id: &str, window: PeriodWindow| -> Result<Option<LatestPeriod>> {
        debug!(period = period_id, %period_type, "probing period");
        let value_count = count_values(api, data_element, period_id, &org_units)?;
        Ok((value_count > 0).then(|| LatestPeriod {
            period_id: period_id.to_string(),
            period_type,
            window,
            value_count,
        }))
    };

    if let Some(found) = probe(&current, current_window)? {
        return Ok(Some(found));
    }

    let year = calendar_year_of(options.calendar, current_window.start)?;
    for back in 0..options.lookback_years {
        let offset = i32::try_from(back).map_err(|_| Error::DateOutOfRange(options.calendar.to_string()))?;
        let bounds = calendar_year_bounds(options.calendar, year - offset)?;
        let candidates = periods_starting_within(&calc, period_type, bounds, current_window.start)?;
        for (period_id, window) in candidates.into_iter().rev() {
            if let Some(found) = probe(&period_id, window)? {
                return Ok(Some(found));
            }
        }
    }

    debug!(data_element, level, "no data within lookback");
    Ok(None)
}

/// Periods whose start lies inside `bounds` and before `before`, oldest
/// first.
fn periods_starting_within(
    calc: &PeriodCalculator,
    period_type: PeriodType,
    bounds: PeriodWindow,
    before: NaiveDate,
) -> Result<Vec<(String, PeriodWindow)>> {
    let mut id = calc.period_key(period_type, bounds.start);
    let mut window = calc.period_start_end(period_type, &id)?;
    if window.start < bounds.start {
        id = calc.next_period_id(period_type, &id)?;
        window = calc.period_start_end(period_type, &id)?;
    }

    let mut periods = Vec::new();
    while window.start <= bounds.end && window.start < before {
        let next = calc.next_period_id(period_type, &id)?;
        periods.push((id, window));
        window = calc.period_start_end(period_type, &next)?;
        id = next;
    }
    Ok(periods)
}

fn count_values<A: Api + ?Sized>(
    api: &A,
    data_element: &str,
    period_id: &str,
    org_units: &[String],
) -> Result<usize> {
    let mut params = Params::new()
        .with("dataElement", data_element)
        .with("period", period_id);
    for ou in org_units {
        params.push("orgUnit", ou);
    }
    let data = api.get("/api/dataValueSets", params)?;
    Ok(data
        .get("dataValues")
        .and_then(Value::as_array)
        .map_or(0, Vec::len))
}
