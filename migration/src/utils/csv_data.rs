//! CSV exports consumed by the user-related migration steps.
//!
//! The exports live in a fixed directory (`account_data/` by default) and
//! come straight out of spreadsheets, so loading also normalizes the
//! artifacts those exports carry: quoted headers, blank metadata cells,
//! phone numbers mangled into floats.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::services::errors::{MigrationError, MigrationResult};

fn data_file_error(path: &Path, error: impl std::fmt::Display) -> MigrationError {
    MigrationError::DataFile {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// A loaded CSV with headers, kept column-generic so unknown export
/// columns pass through untouched.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn load(path: &Path) -> MigrationResult<Self> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| data_file_error(path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| data_file_error(path, e))?
            .iter()
            .map(|h| h.trim_matches('"').trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| data_file_error(path, e))?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> MigrationResult<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| data_file_error(path, e))?;
        writer
            .write_record(&self.headers)
            .map_err(|e| data_file_error(path, e))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| data_file_error(path, e))?;
        }
        writer.flush().map_err(|e| data_file_error(path, e))?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(|s| s.as_str())
    }

    /// Rewrite every cell of a column in place. Returns false when the
    /// column does not exist, which callers treat as "nothing to do".
    pub fn map_column(&mut self, name: &str, f: impl Fn(&str) -> String) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(index) {
                *cell = f(cell);
            }
        }
        true
    }

    /// Append a column; `values` must hold one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize a metadata cell: blank becomes an empty JSON object, valid
/// JSON is re-serialized into canonical form, anything else passes
/// through for the platform to reject.
pub fn normalize_metadata(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Normalize a phone cell: drop the decimal tail a spreadsheet float
/// export introduces and ensure a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let integral = trimmed.split('.').next().unwrap_or(trimmed);
    if integral.is_empty() {
        return String::new();
    }
    if integral.starts_with('+') {
        integral.to_string()
    } else {
        format!("+{}", integral)
    }
}

/// Deserialize every row of a CSV into `T`.
pub fn load_rows<T: DeserializeOwned>(path: &Path) -> MigrationResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| data_file_error(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| data_file_error(path, e))
}

/// Row of `groups.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRow {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "userIds", default)]
    pub user_ids: String,
    #[serde(rename = "userEmails", default)]
    pub user_emails: String,
}

impl GroupRow {
    /// Rows with neither ids nor emails carry no members and are skipped.
    pub fn has_members(&self) -> bool {
        !self.user_ids.trim().is_empty() || !self.user_emails.trim().is_empty()
    }

    pub fn member_emails(&self) -> Vec<String> {
        self.user_emails
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// Row of `assign_roles_to_users.csv`: one (user, role) pair per row, the
/// `name` column being the role name.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignmentRow {
    pub email: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "roleId", default)]
    pub role_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
}

/// Row of `roles_in_destination.csv`, mapping role names to destination
/// role ids.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationRoleRow {
    #[serde(rename = "roleId")]
    pub role_id: String,
    pub name: String,
}

/// Row of `user_tenants_with_roles.csv` feeding the bulk invite step; the
/// `id` column carries the destination role id.
#[derive(Debug, Clone, Deserialize)]
pub struct InviteRow {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub email: String,
    #[serde(rename = "id", default)]
    pub role_id: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_normalize_metadata() {
        assert_eq!(normalize_metadata(""), "{}");
        assert_eq!(normalize_metadata("   "), "{}");
        assert_eq!(normalize_metadata(r#"{"plan": "pro"}"#), r#"{"plan":"pro"}"#);
        // Broken JSON passes through untouched.
        assert_eq!(normalize_metadata("{not json"), "{not json");
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("15551234567.0"), "+15551234567");
        assert_eq!(normalize_phone("15551234567"), "+15551234567");
        assert_eq!(normalize_phone("+447700900123"), "+447700900123");
        assert_eq!(normalize_phone("  15551234567  "), "+15551234567");
    }

    #[test]
    fn test_table_load_transform_write_roundtrip() {
        let file = write_temp_csv(
            "name,email,tenantId,metadata,phoneNumber\n\
             Ada,ada@example.com,t-1,,15551234567.0\n\
             Grace,grace@example.com,t-2,\"{\"\"plan\"\": \"\"pro\"\"}\",\n",
        );
        let mut table = CsvTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "email"), Some("ada@example.com"));

        assert!(table.map_column("metadata", normalize_metadata));
        assert!(table.map_column("phoneNumber", normalize_phone));
        assert!(!table.map_column("missing", |c| c.to_string()));

        assert_eq!(table.get(0, "metadata"), Some("{}"));
        assert_eq!(table.get(0, "phoneNumber"), Some("+15551234567"));
        assert_eq!(table.get(1, "metadata"), Some(r#"{"plan":"pro"}"#));
        assert_eq!(table.get(1, "phoneNumber"), Some(""));

        table.push_column("roleIds", vec!["r1|r2".to_string(), String::new()]);

        let out = tempfile::NamedTempFile::new().unwrap();
        table.write(out.path()).unwrap();
        let reloaded = CsvTable::load(out.path()).unwrap();
        assert_eq!(reloaded.get(0, "roleIds"), Some("r1|r2"));
        assert_eq!(reloaded.headers.last().map(|s| s.as_str()), Some("roleIds"));
    }

    #[test]
    fn test_missing_file_is_a_data_file_error() {
        let err = CsvTable::load(Path::new("/nonexistent/users.csv")).unwrap_err();
        assert!(matches!(err, MigrationError::DataFile { .. }));
    }

    #[test]
    fn test_group_row_members() {
        let file = write_temp_csv(
            "tenantId,name,description,userIds,userEmails\n\
             t-1,Admins,Ops team,,\"ada@example.com, grace@example.com\"\n\
             t-1,Empty,No members,,\n",
        );
        let rows: Vec<GroupRow> = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].has_members());
        assert_eq!(
            rows[0].member_emails(),
            vec!["ada@example.com".to_string(), "grace@example.com".to_string()]
        );
        assert!(!rows[1].has_members());
        assert!(rows[1].member_emails().is_empty());
    }
}
