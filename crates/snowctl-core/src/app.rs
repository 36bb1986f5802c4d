//! Records describing Streamlit applications on the service

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One application as returned by `SHOW STREAMLITS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamlitApp {
    pub name: String,

    #[serde(default)]
    pub database_name: Option<String>,

    #[serde(default)]
    pub schema_name: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub query_warehouse: Option<String>,

    #[serde(default)]
    pub url_id: Option<String>,

    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

impl StreamlitApp {
    /// Build from a column name → value row
    ///
    /// Column names are matched case-insensitively. Returns `None` when the
    /// row has no `name` column.
    pub fn from_row(row: &IndexMap<String, Option<String>>) -> Option<Self> {
        let get = |key: &str| -> Option<String> {
            row.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .and_then(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        Some(Self {
            name: get("name")?,
            database_name: get("database_name"),
            schema_name: get("schema_name"),
            title: get("title"),
            owner: get("owner"),
            comment: get("comment"),
            query_warehouse: get("query_warehouse"),
            url_id: get("url_id"),
            created_on: get("created_on").as_deref().and_then(parse_timestamp),
        })
    }
}

/// Key/value description of a single application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(IndexMap<String, Option<String>>);

impl Description {
    pub fn new(fields: IndexMap<String, Option<String>>) -> Self {
        Self(fields)
    }

    /// Look up a field case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn fields(&self) -> &IndexMap<String, Option<String>> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse a timestamp as returned by the service
///
/// Accepts RFC 3339 strings and epoch seconds with an optional fraction and
/// an optional trailing timezone offset in minutes (`"1700000000.5 1440"`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let epoch = raw.split_whitespace().next()?;
    let (secs, frac) = match epoch.split_once('.') {
        Some((s, f)) => (s, f),
        None => (epoch, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        let digits: String = frac.chars().take(9).collect();
        let scale = 10u32.pow(9 - digits.len() as u32);
        digits.parse::<u32>().ok()? * scale
    };

    Utc.timestamp_opt(secs, nanos).single()
}
