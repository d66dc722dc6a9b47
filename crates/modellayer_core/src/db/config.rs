//! Static connection configuration and operation roles.

use super::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;

const ROOT_USER_KEY: &str = "root";
const DEFAULT_USER_KEY: &str = "default";

/// Operation kind used to pick credentials and cache handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Root,
    Select,
    Insert,
    Update,
    Delete,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Root,
        Role::Select,
        Role::Insert,
        Role::Update,
        Role::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parses a role name, accepting the `read`/`write` aliases.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "root" => Some(Self::Root),
            "select" | "read" => Some(Self::Select),
            "insert" | "write" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database user for one role.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub name: String,
    #[serde(default)]
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings shared by every handle the router builds.
///
/// `users` is keyed by role name (`root`, `select`, `insert`, `update`,
/// `delete`, `default`). `options` are applied as `PRAGMA key = value` after
/// a SQLite connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub driver: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub dbname: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub users: BTreeMap<String, Credentials>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_charset() -> String {
    "utf8".to_string()
}

impl DbConfig {
    /// SQLite config for a database file with a single `root` user.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        let mut users = BTreeMap::new();
        users.insert(
            ROOT_USER_KEY.to_string(),
            Credentials {
                name: ROOT_USER_KEY.to_string(),
                password: String::new(),
            },
        );
        Self {
            driver: "sqlite".to_string(),
            host: String::new(),
            port: 0,
            dbname: path.as_ref().to_string_lossy().into_owned(),
            charset: default_charset(),
            users,
            options: BTreeMap::new(),
        }
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> DbResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> DbResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks that a fallback user exists, role keys are known and `dbname`
    /// names a file.
    ///
    /// Every role handle opens its own connection, so in-memory databases
    /// (`:memory:`, empty names, `mode=memory` URIs) are rejected: each handle
    /// would see a different, empty database.
    pub fn validate(&self) -> DbResult<()> {
        let dbname = self.dbname.trim();
        if dbname.is_empty() || dbname == ":memory:" || dbname.contains("mode=memory") {
            return Err(DbError::InvalidOption("dbname".to_string()));
        }
        if !self.users.contains_key(ROOT_USER_KEY) && !self.users.contains_key(DEFAULT_USER_KEY) {
            return Err(DbError::MissingCredentials { role: Role::Root });
        }
        for key in self.users.keys() {
            if key != DEFAULT_USER_KEY && Role::parse(key).is_none() {
                return Err(DbError::InvalidOption(format!("users.{key}")));
            }
        }
        Ok(())
    }

    /// Resolves credentials for `role`, falling back to `root`, then `default`.
    pub fn credentials_for(&self, role: Role) -> DbResult<&Credentials> {
        self.users
            .iter()
            .find(|(key, _)| Role::parse(key) == Some(role))
            .map(|(_, credentials)| credentials)
            .or_else(|| self.users.get(ROOT_USER_KEY))
            .or_else(|| self.users.get(DEFAULT_USER_KEY))
            .ok_or(DbError::MissingCredentials { role })
    }

    /// Renders the connection string in `driver:host=H:P;dbname=D;charset=C` form.
    pub fn dsn(&self) -> String {
        format!(
            "{}:host={}:{};dbname={};charset={}",
            self.driver, self.host, self.port, self.dbname, self.charset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{DbConfig, Role};
    use crate::db::DbError;

    const CONFIG_JSON: &str = r#"{
        "driver": "sqlite",
        "host": "localhost",
        "port": 3306,
        "dbname": "/tmp/app.db",
        "users": {
            "root": { "name": "admin", "password": "secret" },
            "read": { "name": "reader" }
        },
        "options": { "journal_mode": "WAL" }
    }"#;

    #[test]
    fn json_config_resolves_role_credentials_with_fallback() {
        let config = DbConfig::from_json_str(CONFIG_JSON).unwrap();

        assert_eq!(config.charset, "utf8");
        assert_eq!(config.credentials_for(Role::Select).unwrap().name, "reader");
        assert_eq!(config.credentials_for(Role::Delete).unwrap().name, "admin");
    }

    #[test]
    fn dsn_matches_connection_string_layout() {
        let config = DbConfig::from_json_str(CONFIG_JSON).unwrap();
        assert_eq!(
            config.dsn(),
            "sqlite:host=localhost:3306;dbname=/tmp/app.db;charset=utf8"
        );
    }

    #[test]
    fn config_without_fallback_user_is_rejected() {
        let raw = r#"{ "driver": "sqlite", "dbname": "x.db", "users": { "select": { "name": "r" } } }"#;
        let err = DbConfig::from_json_str(raw).unwrap_err();
        assert!(matches!(err, DbError::MissingCredentials { role: Role::Root }));
    }

    #[test]
    fn in_memory_database_names_are_rejected() {
        for dbname in ["", "  ", ":memory:", "file:shared?mode=memory&cache=shared"] {
            let raw = format!(
                r#"{{ "driver": "sqlite", "dbname": {dbname:?}, "users": {{ "root": {{ "name": "o" }} }} }}"#
            );
            let err = DbConfig::from_json_str(&raw).unwrap_err();
            assert!(matches!(err, DbError::InvalidOption(key) if key == "dbname"), "{dbname}");
        }
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = DbConfig::from_json_str(CONFIG_JSON).unwrap();
        let rendered = format!("{:?}", config.users["root"]);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn role_parse_accepts_aliases() {
        assert_eq!(Role::parse("READ"), Some(Role::Select));
        assert_eq!(Role::parse("write"), Some(Role::Insert));
        assert_eq!(Role::parse("merge"), None);
    }
}
