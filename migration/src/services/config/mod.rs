//! Configuration from environment variables.
//!
//! Two credential sets (account 1 = source, account 2 = destination), one
//! boolean per migration step and one per deletion step, all read once at
//! startup and immutable for the run. A `.env` file in the working
//! directory is honored when the binaries load it before calling
//! [`Config::from_env`].

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Credentials and base URL for one account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub base_url: String,
    pub client_id: String,
    pub api_key: String,
}

/// One boolean per migration step.
#[derive(Debug, Clone, Default)]
pub struct MigrationFlags {
    pub tenants: bool,
    pub categories: bool,
    pub permissions: bool,
    pub roles: bool,
    pub users: bool,
    pub user_roles: bool,
    pub bulk_invite: bool,
    pub assign_roles: bool,
    pub groups: bool,
    pub applications: bool,
    pub security_rules: bool,
    pub email_templates: bool,
    pub email_sender: bool,
    pub prehooks: bool,
    pub allowed_origins: bool,
    pub jwt_settings: bool,
}

/// One boolean per deletion step, applied to the destination account.
#[derive(Debug, Clone, Default)]
pub struct DeletionFlags {
    pub applications: bool,
    pub prehooks: bool,
    pub users: bool,
    pub roles: bool,
    pub permissions: bool,
    pub tenants: bool,
}

/// Full run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: AccountConfig,
    pub destination: AccountConfig,
    pub migration: MigrationFlags,
    pub deletion: DeletionFlags,
    /// Directory holding the CSV exports consumed by the user steps.
    pub data_dir: PathBuf,
    /// Append-only plain-text log file.
    pub log_file: PathBuf,
}

impl Config {
    /// Parse configuration from process environment variables. Missing or
    /// empty credentials are fatal.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is required", name))
        };
        let flag = |name: &str| -> bool {
            lookup(name)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        Ok(Self {
            source: AccountConfig {
                base_url: required("BASE_URL_1")?,
                client_id: required("CLIENT_ID_1")?,
                api_key: required("API_KEY_1")?,
            },
            destination: AccountConfig {
                base_url: required("BASE_URL_2")?,
                client_id: required("CLIENT_ID_2")?,
                api_key: required("API_KEY_2")?,
            },
            migration: MigrationFlags {
                tenants: flag("MIGRATE_TENANTS"),
                categories: flag("MIGRATE_CATEGORIES"),
                permissions: flag("MIGRATE_PERMISSIONS"),
                roles: flag("MIGRATE_ROLES"),
                users: flag("MIGRATE_USERS"),
                user_roles: flag("MIGRATE_USER_ROLES"),
                bulk_invite: flag("BULK_INVITE_USERS_TO_TENANTS"),
                assign_roles: flag("ASSIGN_ROLES_TO_USERS_ON_ALL_TENANTS"),
                groups: flag("MIGRATE_GROUPS"),
                applications: flag("MIGRATE_APPLICATIONS"),
                security_rules: flag("MIGRATE_SECURITY_RULES"),
                email_templates: flag("MIGRATE_EMAIL_TEMPLATES"),
                email_sender: flag("MIGRATE_EMAIL_SENDER"),
                prehooks: flag("MIGRATE_PREHOOKS"),
                allowed_origins: flag("MIGRATE_ALLOWED_ORIGINS"),
                // Historical .env files carry the misspelled name; honor both.
                jwt_settings: flag("MIGRATE_JWT_SETTINGS") || flag("MIGRATE_JWT_SETTINTS"),
            },
            deletion: DeletionFlags {
                applications: flag("DELETE_APPLICATIONS"),
                prehooks: flag("DELETE_PREHOOKS"),
                users: flag("DELETE_USERS"),
                roles: flag("DELETE_ROLES"),
                permissions: flag("DELETE_PERMISSIONS"),
                tenants: flag("DELETE_TENANTS"),
            },
            data_dir: PathBuf::from(
                lookup("ACCOUNT_DATA_DIR").unwrap_or_else(|| "account_data".to_string()),
            ),
            log_file: PathBuf::from(
                lookup("LOG_FILE").unwrap_or_else(|| "migration.log".to_string()),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        for (name, value) in [
            ("BASE_URL_1", "https://api.eu.example.com"),
            ("CLIENT_ID_1", "client-1"),
            ("API_KEY_1", "key-1"),
            ("BASE_URL_2", "https://api.us.example.com"),
            ("CLIENT_ID_2", "client-2"),
            ("API_KEY_2", "key-2"),
        ] {
            vars.insert(name.to_string(), value.to_string());
        }
        vars
    }

    fn config_from(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&base_env()).unwrap();
        assert_eq!(config.source.base_url, "https://api.eu.example.com");
        assert_eq!(config.destination.client_id, "client-2");
        assert!(!config.migration.tenants);
        assert!(!config.deletion.users);
        assert_eq!(config.data_dir, PathBuf::from("account_data"));
        assert_eq!(config.log_file, PathBuf::from("migration.log"));
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let mut vars = base_env();
        vars.remove("API_KEY_2");
        let err = config_from(&vars).unwrap_err();
        assert!(err.to_string().contains("API_KEY_2"));

        let mut vars = base_env();
        vars.insert("BASE_URL_1".to_string(), "   ".to_string());
        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn test_flag_parsing_is_case_insensitive() {
        let mut vars = base_env();
        vars.insert("MIGRATE_TENANTS".to_string(), "True".to_string());
        vars.insert("MIGRATE_ROLES".to_string(), "TRUE".to_string());
        vars.insert("MIGRATE_USERS".to_string(), "yes".to_string());
        vars.insert("DELETE_TENANTS".to_string(), "false".to_string());
        let config = config_from(&vars).unwrap();
        assert!(config.migration.tenants);
        assert!(config.migration.roles);
        assert!(!config.migration.users);
        assert!(!config.deletion.tenants);
    }

    #[test]
    fn test_jwt_flag_honors_misspelled_variable() {
        let mut vars = base_env();
        vars.insert("MIGRATE_JWT_SETTINTS".to_string(), "true".to_string());
        assert!(config_from(&vars).unwrap().migration.jwt_settings);

        let mut vars = base_env();
        vars.insert("MIGRATE_JWT_SETTINGS".to_string(), "true".to_string());
        assert!(config_from(&vars).unwrap().migration.jwt_settings);
    }
}
