use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value};
use tracing::{Dispatch, error, info, warn};

use crate::api::{Api, ApiRequest, Method};
use crate::calendar::Calendar;
use crate::config::ClientSettings;
use crate::error::{Error, Result};
use crate::resolver::{self, LatestPeriod, ResolverOptions};
use crate::util::{backoff, retriable_status, token_header, urljoin};

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";

/// Blocking DHIS2 Web API client.
///
/// Most functionality lives on the [`Api`] trait, which `Client`
/// implements: raw `get`/`post`/`put`/`patch`/`delete`, paging and the
/// resource helpers.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    basic_auth: Option<(String, String)>,

    default_page_size: u32,
    retries: usize,
    retry_backoff: Duration,
    calendar: Calendar,
    logger: Option<Dispatch>,

    http: HttpClient,
}

impl Client {
    /// Creates a client using environment variables and/or `.dhis2rc`.
    ///
    /// This is equivalent to `Client::new(ClientSettings::from_env()?)`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientSettings::from_env()?)
    }

    pub fn new(settings: ClientSettings) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dhis2-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("dhis2-rs")),
        );

        let mut basic_auth = None;
        if let Some(token) = settings.token.as_deref().filter(|t| !t.trim().is_empty()) {
            let mut value = HeaderValue::from_str(&token_header(token))
                .map_err(|_| Error::Config("token contains invalid header characters".into()))?;
            value.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, value);
        } else if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            basic_auth = Some((username.clone(), password.clone()));
        }

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(settings.timeout);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(|source| Error::Transport {
            url: settings.base_url.clone(),
            source,
        })?;

        let logger = settings
            .log
            .as_ref()
            .map(|log| log.build_dispatch())
            .transpose()?;

        Ok(Self {
            base_url: settings.base_url,
            basic_auth,
            default_page_size: settings.default_page_size,
            retries: settings.retries,
            retry_backoff: Duration::from_millis(500),
            calendar: settings.calendar,
            logger,
            http,
        })
    }

    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// First delay between retries; it grows with each attempt.
    pub fn with_retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = delay;
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Latest period with data for `data_element` at org-unit `level`,
    /// searched in this client's calendar.
    pub fn latest_period_for_level(
        &self,
        data_element: &str,
        level: u32,
    ) -> Result<Option<LatestPeriod>> {
        let options = ResolverOptions::new(self.calendar);
        resolver::latest_period_for_level(self, data_element, level, &options)
    }

    /// Same as [`Client::latest_period_for_level`] with "today" pinned.
    pub fn latest_period_for_level_at(
        &self,
        data_element: &str,
        level: u32,
        today: NaiveDate,
    ) -> Result<Option<LatestPeriod>> {
        let options = ResolverOptions::new(self.calendar).with_today(today);
        resolver::latest_period_for_level(self, data_element, level, &options)
    }

    fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let url = urljoin(&self.base_url, &request.path);
        info!(
            method = %request.method,
            path = %request.path,
            params = ?request.params.as_slice(),
            "Request {} {}",
            request.method,
            request.path
        );

        let resp = self.robust_request(request, &url)?;
        let status = resp.status();
        let text = resp.text().map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            let err = Error::http(status, &request.path, payload);
            error!(status = status.as_u16(), path = %request.path, "{err}");
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let data: Value = serde_json::from_str(&text).map_err(|source| Error::Decode {
            path: request.path.clone(),
            source,
        })?;

        if let Some(pager) = data.get("pager") {
            let field = |key: &str| pager.get(key).map(ToString::to_string).unwrap_or_default();
            let (page, page_count, total) = (field("page"), field("pageCount"), field("total"));
            info!(%page, %page_count, %total, "pager");
        }
        Ok(data)
    }

    fn robust_request(&self, request: &ApiRequest, url: &str) -> Result<Response> {
        let mut tries = 0usize;
        let mut delay = self.retry_backoff;
        loop {
            let resp = self
                .build(request, url)
                .send()
                .map_err(|source| Error::Transport {
                    url: url.to_string(),
                    source,
                })?;

            // Only idempotent reads are retried.
            if request.method == Method::Get
                && retriable_status(resp.status())
                && tries < self.retries
            {
                tries += 1;
                warn!(
                    status = resp.status().as_u16(),
                    attempt = tries,
                    path = %request.path,
                    "retrying after server error"
                );
                thread::sleep(delay);
                delay = backoff(delay);
                continue;
            }
            return Ok(resp);
        }
    }

    fn build(&self, request: &ApiRequest, url: &str) -> RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut req = self.apply_auth(self.http.request(method, url));
        if !request.params.is_empty() {
            req = req.query(request.params.as_slice());
        }
        if let Some(body) = &request.body {
            // `json` keeps an explicit content type.
            if request.method == Method::Patch {
                req = req.header(CONTENT_TYPE, JSON_PATCH);
            }
            req = req.json(body);
        }
        req
    }

    fn apply_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.basic_auth {
            Some((u, p)) => req.basic_auth(u, Some(p)),
            None => req,
        }
    }
}

impl Api for Client {
    fn send(&self, request: ApiRequest) -> Result<Value> {
        self.scoped(|| self.execute(&request))
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    fn default_page_size(&self) -> u32 {
        self.default_page_size
    }
}
