use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Status codes that count as a received response rather than a failure.
pub const ACCEPTED_STATUS: std::ops::Range<u16> = 200..600;

/// Status codes that count as the site being up.
pub const SUCCESS_STATUS: std::ops::Range<u16> = 200..400;

/// Error recorded when a response arrives with a status outside
/// [`ACCEPTED_STATUS`].
pub const BAD_RESPONSE: &str = "ERR_BAD_RESPONSE";

/// Current time at the millisecond precision the state file stores.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// `time` rounded up to the next whole millisecond, so it never sorts
/// before the instant it was taken from.
pub fn ceil_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = time.trunc_subsecs(3);
    if truncated == time { truncated } else { truncated + TimeDelta::milliseconds(1) }
}

/// ISO-8601 timestamps with exactly three fractional digits
/// (`2024-05-01T10:00:00.000Z`).
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map(|time| Some(time.with_timezone(&Utc)))
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// A monitored site as listed in the sites file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }
}

/// Result of checking one site once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// URL that was requested
    pub url: String,

    /// Display name of the site
    pub name: String,

    /// When the request was dispatched
    #[serde(with = "iso_millis")]
    pub check_time: DateTime<Utc>,

    /// True iff a response arrived with a status in [`SUCCESS_STATUS`]
    pub success: bool,

    /// Milliseconds from dispatch until the response head arrived
    pub response_time: Option<u64>,

    /// HTTP status code, absent when no response was received
    pub status: Option<u16>,

    /// Error code or message, absent when a response was received
    pub error: Option<String>,
}

impl CheckResult {
    /// Result for a received response.
    ///
    /// Statuses outside [`ACCEPTED_STATUS`] are recorded as a failed
    /// response with no status.
    pub fn from_response(
        site: &SiteConfig,
        check_time: DateTime<Utc>,
        status: u16,
        response_time_ms: u64,
    ) -> Self {
        if !ACCEPTED_STATUS.contains(&status) {
            return Self::from_error(site, check_time, BAD_RESPONSE);
        }

        Self {
            url: site.url.clone(),
            name: site.name.clone(),
            check_time,
            success: SUCCESS_STATUS.contains(&status),
            response_time: Some(response_time_ms),
            status: Some(status),
            error: None,
        }
    }

    /// Result for a request that produced no usable response
    pub fn from_error(site: &SiteConfig, check_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            url: site.url.clone(),
            name: site.name.clone(),
            check_time,
            success: false,
            response_time: None,
            status: None,
            error: Some(error.into()),
        }
    }
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.success { "UP  " } else { "DOWN" };
        write!(f, "{mark} {} ({})", self.name, self.url)?;

        match (&self.error, self.status) {
            (Some(error), _) => write!(f, " - Error: {error}"),
            (None, Some(status)) => {
                write!(f, " - {status} - {}ms", self.response_time.unwrap_or_default())
            }
            (None, None) => Ok(()),
        }
    }
}

/// Snapshot of the most recent sweep, persisted as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    /// Completion time of the sweep that produced `sites`
    #[serde(default, with = "iso_millis::option")]
    pub last_check: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sites: Vec<CheckResult>,
}

impl MonitorState {
    pub fn new(sites: Vec<CheckResult>, last_check: DateTime<Utc>) -> Self {
        Self { last_check: Some(last_check), sites }
    }

    /// Number of results that are up and down
    pub fn counts(&self) -> (usize, usize) {
        let up = self.sites.iter().filter(|result| result.success).count();
        (up, self.sites.len() - up)
    }

    /// Previous result for the site at `url`, if any
    pub fn result_for(&self, url: &str) -> Option<&CheckResult> {
        self.sites.iter().find(|result| result.url == url)
    }
}
