use std::path::PathBuf;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::period::PeriodType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {period_type} period identifier `{id}`")]
    InvalidPeriodIdentifier { period_type: PeriodType, id: String },

    #[error("calendar `{0}` has no registered conversion")]
    UnsupportedCalendar(String),

    #[error(
        "data element {data_element} is linked to data sets with different period types: {}",
        join_period_types(.period_types)
    )]
    MixedPeriodTypes {
        data_element: String,
        period_types: Vec<PeriodType>,
    },

    #[error("data element {data_element} is not assigned to any data set with a period type")]
    MissingPeriodType { data_element: String },

    #[error("{message}")]
    Http {
        status: StatusCode,
        path: String,
        payload: Value,
        message: String,
    },

    #[error("could not reach {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse API JSON (path={path})")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize request body (path={path})")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported period type `{0}`")]
    UnsupportedPeriodType(String),

    #[error("date out of range for the {0} calendar")]
    DateOutOfRange(String),

    #[error("could not resolve current user id from /api/me")]
    CurrentUser,

    #[error("missing configuration: {0}")]
    Config(String),

    #[error("failed to read configuration file {}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log destination {}", .path.display())]
    LogDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// HTTP status of a non-2xx response, if this error came from one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn http(status: StatusCode, path: &str, payload: Value) -> Self {
        let message = format_dhis2_error(&payload)
            .unwrap_or_else(|| format!("HTTP {} on {}", status.as_u16(), path));
        Error::Http {
            status,
            path: path.to_string(),
            payload,
            message,
        }
    }
}

fn join_period_types(types: &[PeriodType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds a one-line message from a DHIS2 error envelope.
///
/// DHIS2 nests import summaries under `response`; older endpoints put
/// `status`/`conflicts` at the top level, and some only send `httpStatus`.
fn format_dhis2_error(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    let response = obj.get("response").and_then(Value::as_object);

    let status = response
        .and_then(|r| r.get("status"))
        .or_else(|| obj.get("status"))
        .or_else(|| obj.get("httpStatus"))
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");

    let conflicts = response
        .and_then(|r| r.get("conflicts"))
        .or_else(|| obj.get("conflicts"))
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty());

    if let Some(conflicts) = conflicts {
        let parts = conflicts
            .iter()
            .map(|c| {
                let object = c.get("object").and_then(Value::as_str).unwrap_or("?");
                let value = c
                    .get("value")
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .or_else(|| c.get("message").and_then(Value::as_str))
                    .unwrap_or("?");
                format!("{object}: {value}")
            })
            .collect::<Vec<_>>();
        return Some(format!("{}: {}", status, parts.join("; ")));
    }

    let message = obj
        .get("message")
        .or_else(|| obj.get("responseType"))
        .and_then(Value::as_str);
    match message {
        Some(m) => Some(format!("{status}: {m}")),
        None if status == "UNKNOWN" => None,
        None => Some(status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conflicts_are_joined() {
        let payload = json!({
            "httpStatus": "Conflict",
            "response": {
                "status": "ERROR",
                "conflicts": [
                    {"object": "dataElement", "value": "Invalid UID"},
                    {"object": "period", "message": "Period is locked"}
                ]
            }
        });
        let err = Error::http(StatusCode::CONFLICT, "/api/dataValueSets", payload);
        assert_eq!(
            err.to_string(),
            "ERROR: dataElement: Invalid UID; period: Period is locked"
        );
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[test]
    fn message_uses_top_level_status() {
        let payload = json!({"httpStatus": "Not Found", "message": "DataElement not found"});
        let err = Error::http(StatusCode::NOT_FOUND, "/api/dataElements/x", payload);
        assert_eq!(err.to_string(), "Not Found: DataElement not found");
    }

    #[test]
    fn falls_back_to_status_and_path() {
        let err = Error::http(
            StatusCode::BAD_GATEWAY,
            "/api/system/info",
            json!({"unrelated": true}),
        );
        assert_eq!(err.to_string(), "HTTP 502 on /api/system/info");
    }

    #[test]
    fn mixed_period_types_lists_types() {
        let err = Error::MixedPeriodTypes {
            data_element: "fbfJHSPpUQD".to_string(),
            period_types: vec![PeriodType::Monthly, PeriodType::Yearly],
        };
        assert!(err.to_string().ends_with("Monthly, Yearly"));
    }
}
