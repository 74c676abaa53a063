use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_PAGE_SIZE;
use crate::calendar::Calendar;
use crate::error::{Error, Result};
use crate::logging::{LogDestination, LogSettings, parse_level};

/// Everything needed to build a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Server root, e.g. `https://play.dhis2.org/40`. Paths such as
    /// `/api/me` are joined onto it.
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Personal access token; takes precedence over basic auth.
    pub token: Option<String>,
    pub default_page_size: u32,
    pub timeout: Duration,
    /// How many times a GET answered with a 5xx is retried.
    pub retries: usize,
    pub verify_ssl: bool,
    /// Calendar used by the period resolver when none is given.
    pub calendar: Calendar,
    /// `None` leaves events to the application's own subscriber.
    pub log: Option<LogSettings>,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            token: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(30),
            retries: 3,
            verify_ssl: true,
            calendar: Calendar::default(),
            log: None,
        }
    }

    /// Loads settings from the environment and/or `.dhis2rc`.
    ///
    /// This is equivalent to `ClientSettings::load(None)`.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Resolves settings using (in order of precedence):
    /// - the explicit `base_url` argument
    /// - environment variables `DHIS2_BASE_URL`, `DHIS2_USERNAME`, ...
    /// - config file from `DHIS2_RC` or `.dhis2rc`
    pub fn load(base_url: Option<String>) -> Result<Self> {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let candidates = rc_candidates(env("DHIS2_RC"));
        resolve(base_url, &env, &candidates)
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: LogSettings) -> Self {
        self.log = Some(log);
        self
    }
}

#[derive(Debug, Default)]
struct RcConfig {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    verify_ssl: Option<String>,
    calendar: Option<String>,
    page_size: Option<String>,
    timeout: Option<String>,
    retries: Option<String>,
    log_level: Option<String>,
    log_format: Option<String>,
    log_destination: Option<String>,
}

impl RcConfig {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "base_url" | "url" => &mut self.base_url,
            "username" | "user" => &mut self.username,
            "password" => &mut self.password,
            "token" => &mut self.token,
            "verify_ssl" | "verify" => &mut self.verify_ssl,
            "calendar" => &mut self.calendar,
            "page_size" => &mut self.page_size,
            "timeout" => &mut self.timeout,
            "retries" => &mut self.retries,
            "log_level" => &mut self.log_level,
            "log_format" => &mut self.log_format,
            "log_destination" => &mut self.log_destination,
            _ => return None,
        };
        Some(slot)
    }
}

fn resolve(
    base_url: Option<String>,
    env: &dyn Fn(&str) -> Option<String>,
    candidates: &[PathBuf],
) -> Result<ClientSettings> {
    let rc = match candidates.iter().find(|p| p.exists()) {
        Some(path) => read_rc(path).map_err(|source| Error::ConfigFile {
            path: path.clone(),
            source,
        })?,
        None => RcConfig::default(),
    };
    let pick = |var: &str, file: &Option<String>| env(var).or_else(|| file.clone());

    let Some(base_url) = base_url.or_else(|| pick("DHIS2_BASE_URL", &rc.base_url)) else {
        let searched = if candidates.is_empty() {
            "create .dhis2rc".to_string()
        } else {
            format!(
                "put `base_url:` in one of: {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        return Err(Error::Config(format!(
            "base_url (set DHIS2_BASE_URL or {searched})"
        )));
    };

    let mut settings = ClientSettings::new(base_url);
    settings.username = pick("DHIS2_USERNAME", &rc.username);
    settings.password = pick("DHIS2_PASSWORD", &rc.password);
    settings.token = pick("DHIS2_TOKEN", &rc.token);

    if let Some(v) = pick("DHIS2_VERIFY_SSL", &rc.verify_ssl) {
        settings.verify_ssl = parse_bool(&v)?;
    }
    if let Some(v) = pick("DHIS2_CALENDAR", &rc.calendar) {
        settings.calendar = v.parse()?;
    }
    if let Some(v) = pick("DHIS2_PAGE_SIZE", &rc.page_size) {
        settings.default_page_size = parse_number(&v, "page_size")?;
    }
    if let Some(v) = pick("DHIS2_TIMEOUT", &rc.timeout) {
        let secs: f64 = parse_number(&v, "timeout")?;
        settings.timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| Error::Config(format!("timeout: expected a non-negative number of seconds, got `{v}`")))?;
    }
    if let Some(v) = pick("DHIS2_RETRIES", &rc.retries) {
        settings.retries = parse_number(&v, "retries")?;
    }

    let level = pick("DHIS2_LOG_LEVEL", &rc.log_level);
    let format = pick("DHIS2_LOG_FORMAT", &rc.log_format);
    let destination = pick("DHIS2_LOG_DESTINATION", &rc.log_destination);
    if level.is_some() || format.is_some() || destination.is_some() {
        let mut log = LogSettings::default();
        if let Some(level) = level {
            log.level = parse_level(&level)
                .ok_or_else(|| Error::Config(format!("unknown log level `{level}`")))?;
        }
        if let Some(format) = format {
            log.format = format.parse()?;
        }
        if let Some(destination) = destination {
            log.destination = LogDestination::parse(&destination);
        }
        settings.log = Some(log);
    }

    Ok(settings)
}

fn read_rc(path: &Path) -> std::io::Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // Support formatting where `token:` is on one line and the value is on the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                if let Some(slot) = cfg.slot(pk) {
                    *slot = Some(strip_quotes(line).to_string());
                }
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else if let Some(slot) = cfg.slot(k) {
                *slot = Some(v.to_string());
            }
        }
    }

    Ok(cfg)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("verify_ssl: expected a boolean, got `{other}`"))),
    }
}

fn parse_number<T: std::str::FromStr>(v: &str, name: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name}: expected a number, got `{v}`")))
}

fn rc_candidates(explicit: Option<String>) -> Vec<PathBuf> {
    // 1) DHIS2_RC (explicit)
    // 2) ./.dhis2rc
    // 3) ~/.dhis2rc
    if let Some(p) = explicit {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".dhis2rc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".dhis2rc"));
    }
    v
}
