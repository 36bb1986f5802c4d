//! Object identifiers and stage locations
//!
//! Names typed on the command line are kept verbatim and only quoted when they
//! are rendered into a SQL statement. A name may be qualified
//! (`db.schema.app`); every part is quoted independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A validated, non-empty object name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName(String);

impl ObjectName {
    /// Parse and validate a (possibly qualified) object name
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(raw, "name must not be empty"));
        }

        let parts = split_parts(trimmed)?;
        if parts.len() > 3 {
            return Err(invalid(raw, "at most database.schema.name is allowed"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid(raw, "qualified name contains an empty part"));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The name exactly as it was given
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unqualified object name (last part, unquoted)
    pub fn object(&self) -> String {
        let parts = split_parts(&self.0).unwrap_or_default();
        let last = parts.last().map(String::as_str).unwrap_or(self.0.as_str());
        unquote(last)
    }

    /// Database and schema spelled out in the name, unquoted
    pub fn qualifiers(&self) -> (Option<String>, Option<String>) {
        let parts = split_parts(&self.0).unwrap_or_default();
        match parts.as_slice() {
            [database, schema, _] => (Some(unquote(database)), Some(unquote(schema))),
            [schema, _] => (None, Some(unquote(schema))),
            _ => (None, None),
        }
    }

    /// Render the name for use inside a SQL statement
    pub fn to_sql(&self) -> String {
        split_parts(&self.0)
            .unwrap_or_else(|_| vec![self.0.clone()])
            .iter()
            .map(|p| quote_part(p))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.0
    }
}

/// A stage reference such as `@my_stage/path`
///
/// The leading `@` is optional on input and always present on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageLocation {
    stage: String,
    path: Option<String>,
}

impl StageLocation {
    /// Parse a stage location
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches('@');
        let (stage, path) = match trimmed.split_once('/') {
            Some((stage, path)) => {
                let path = path.trim_matches('/');
                (stage, (!path.is_empty()).then(|| path.to_string()))
            }
            None => (trimmed, None),
        };

        if stage.is_empty() {
            return Err(CoreError::InvalidStage {
                value: raw.to_string(),
                reason: "stage name must not be empty".to_string(),
            });
        }
        if stage.contains(char::is_whitespace) && !stage.starts_with('"') {
            return Err(CoreError::InvalidStage {
                value: raw.to_string(),
                reason: "unquoted stage names cannot contain whitespace".to_string(),
            });
        }

        Ok(Self {
            stage: stage.to_string(),
            path,
        })
    }

    /// Location of an object's files inside a stage
    pub fn for_object(stage: &str, name: &ObjectName) -> Self {
        Self {
            stage: stage.trim_start_matches('@').to_string(),
            path: Some(name.object()),
        }
    }

    /// Stage name without the `@` prefix
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Path inside the stage, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Render as a quoted SQL string literal (`'@stage/path'`)
    pub fn to_sql(&self) -> String {
        sql_string_literal(&self.to_string())
    }
}

impl fmt::Display for StageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "@{}/{}", self.stage, path),
            None => write!(f, "@{}", self.stage),
        }
    }
}

impl FromStr for StageLocation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StageLocation {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StageLocation> for String {
    fn from(location: StageLocation) -> Self {
        location.to_string()
    }
}

/// Quote a value as a single-quoted SQL string literal
pub fn sql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn invalid(value: &str, reason: &str) -> CoreError {
    CoreError::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a qualified name on dots that are outside double quotes
fn split_parts(name: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push_str("\"\"");
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(invalid(name, "unterminated quoted identifier"));
    }
    parts.push(current);
    Ok(parts)
}

fn is_quoted(part: &str) -> bool {
    part.len() >= 2 && part.starts_with('"') && part.ends_with('"')
}

fn is_plain(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quote_part(part: &str) -> String {
    if is_quoted(part) || is_plain(part) {
        part.to_string()
    } else {
        format!("\"{}\"", part.replace('"', "\"\""))
    }
}

fn unquote(part: &str) -> String {
    if is_quoted(part) {
        part[1..part.len() - 1].replace("\"\"", "\"")
    } else {
        part.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_is_not_quoted() {
        let name = ObjectName::parse("my_app").unwrap();
        assert_eq!(name.to_sql(), "my_app");
        assert_eq!(name.as_str(), "my_app");
    }

    #[test]
    fn test_name_with_spaces_is_quoted() {
        let name = ObjectName::parse("my app").unwrap();
        assert_eq!(name.to_sql(), "\"my app\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let name = ObjectName::parse("\"a\"\"b\"").unwrap();
        assert_eq!(name.to_sql(), "\"a\"\"b\"");
        assert_eq!(name.object(), "a\"b");
        assert!(ObjectName::parse("a\"b").is_err());
    }

    #[test]
    fn test_qualified_name_quotes_each_part() {
        let name = ObjectName::parse("db.\"my schema\".app-1").unwrap();
        assert_eq!(name.to_sql(), "db.\"my schema\".\"app-1\"");
        assert_eq!(name.object(), "app-1");
    }

    #[test]
    fn test_quoted_dot_stays_in_one_part() {
        let name = ObjectName::parse("\"a.b\"").unwrap();
        assert_eq!(name.to_sql(), "\"a.b\"");
        assert_eq!(name.object(), "a.b");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ObjectName::parse("").is_err());
        assert!(ObjectName::parse("   ").is_err());
        assert!(ObjectName::parse("db..app").is_err());
        assert!(ObjectName::parse("\"open").is_err());
        assert!(ObjectName::parse("a.b.c.d").is_err());
    }

    #[test]
    fn test_stage_location_parsing() {
        let loc = StageLocation::parse("@apps/dashboards/").unwrap();
        assert_eq!(loc.stage(), "apps");
        assert_eq!(loc.path(), Some("dashboards"));
        assert_eq!(loc.to_string(), "@apps/dashboards");

        let bare = StageLocation::parse("apps").unwrap();
        assert_eq!(bare.to_string(), "@apps");
        assert!(StageLocation::parse("@").is_err());
    }

    #[test]
    fn test_stage_location_for_object_and_sql() {
        let name = ObjectName::parse("db.schema.app").unwrap();
        let loc = StageLocation::for_object("streamlit", &name);
        assert_eq!(loc.to_string(), "@streamlit/app");
        assert_eq!(loc.to_sql(), "'@streamlit/app'");
    }

    #[test]
    fn test_qualifiers() {
        let full = ObjectName::parse("db2.\"My Schema\".app").unwrap();
        assert_eq!(
            full.qualifiers(),
            (Some("db2".to_string()), Some("My Schema".to_string()))
        );

        let schema_only = ObjectName::parse("s2.app").unwrap();
        assert_eq!(schema_only.qualifiers(), (None, Some("s2".to_string())));

        let bare = ObjectName::parse("app").unwrap();
        assert_eq!(bare.qualifiers(), (None, None));
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(sql_string_literal("it's"), "'it\\'s'");
    }
}
