//! SQL statement builders for Streamlit objects

use snowctl_core::{ObjectName, StageLocation, sql_string_literal};

/// Where a new application takes its files from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppSource<'a> {
    /// Files already live (or will be uploaded) under this location
    Root(&'a StageLocation),
    /// Files are copied once from this stage at creation time
    FromStage(&'a StageLocation),
}

/// Parameters of a `CREATE STREAMLIT` statement
#[derive(Debug, Clone)]
pub struct CreateStatement<'a> {
    pub name: &'a ObjectName,
    pub source: AppSource<'a>,
    pub main_file: &'a str,
    pub query_warehouse: Option<&'a str>,
    pub if_not_exists: bool,
}

impl CreateStatement<'_> {
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("CREATE STREAMLIT ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.name.to_sql());

        match &self.source {
            AppSource::Root(location) => {
                sql.push_str(&format!(" ROOT_LOCATION = {}", location.to_sql()));
            }
            AppSource::FromStage(location) => {
                sql.push_str(&format!(" FROM {}", location.to_sql()));
            }
        }

        sql.push_str(&format!(" MAIN_FILE = {}", sql_string_literal(self.main_file)));

        if let Some(warehouse) = self.query_warehouse {
            sql.push_str(&format!(" QUERY_WAREHOUSE = {}", quote_identifier(warehouse)));
        }
        sql
    }
}

pub fn show_streamlits() -> String {
    "SHOW STREAMLITS".to_string()
}

pub fn describe_streamlit(name: &ObjectName) -> String {
    format!("DESCRIBE STREAMLIT {}", name.to_sql())
}

pub fn grant_usage(name: &ObjectName, role: &ObjectName) -> String {
    format!(
        "GRANT USAGE ON STREAMLIT {} TO ROLE {}",
        name.to_sql(),
        role.to_sql()
    )
}

pub fn drop_streamlit(name: &ObjectName) -> String {
    format!("DROP STREAMLIT {}", name.to_sql())
}

pub fn create_stage_if_not_exists(stage: &str) -> String {
    format!("CREATE STAGE IF NOT EXISTS {}", quote_identifier(stage))
}

/// Quote a free-form identifier coming from configuration
fn quote_identifier(raw: &str) -> String {
    match ObjectName::parse(raw) {
        Ok(name) => name.to_sql(),
        Err(_) => format!("\"{}\"", raw.replace('"', "\"\"")),
    }
}
