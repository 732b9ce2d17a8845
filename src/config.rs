use std::path::PathBuf;

use axum::http::HeaderName;

use crate::authz::{AuthzMode, DEFAULT_IDENTITY_HEADER};
use crate::errors::AppError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MOUNT_PATH: &str = "/allapis";

/// Where identity and role bindings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local tables, optionally seeded from a JSON bindings file
    Memory { bindings_file: Option<PathBuf> },
    /// SQLite database, also used for the persisted audit log
    Sqlite { database_url: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mount_path: String,
    pub identity_header: HeaderName,
    pub store: StoreBackend,
    pub authz_mode: AuthzMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            store: StoreBackend::Memory { bindings_file: None },
            authz_mode: AuthzMode::Strict,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::configuration(format!("PORT must be a valid port number, got '{raw}'")))?,
            None => DEFAULT_PORT,
        };

        let mount_path = get("MOUNT_PATH").unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string());
        if !mount_path.starts_with('/') || mount_path.len() < 2 {
            return Err(AppError::configuration(format!(
                "MOUNT_PATH must start with '/' and name a prefix, got '{mount_path}'"
            )));
        }
        let mount_path = mount_path.trim_end_matches('/').to_string();

        let identity_header = match get("IDENTITY_HEADER") {
            Some(raw) => HeaderName::try_from(raw.to_lowercase())
                .map_err(|_| AppError::configuration(format!("IDENTITY_HEADER is not a valid header name: '{raw}'")))?,
            None => HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
        };

        let store = match get("ACCESS_STORE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("memory") => StoreBackend::Memory {
                bindings_file: get("BINDINGS_FILE").map(PathBuf::from),
            },
            Some("sqlite") => StoreBackend::Sqlite {
                database_url: get("DATABASE_URL")
                    .ok_or_else(|| AppError::configuration("DATABASE_URL not set (required for ACCESS_STORE=sqlite)"))?,
            },
            Some(other) => {
                return Err(AppError::configuration(format!(
                    "ACCESS_STORE must be 'memory' or 'sqlite', got '{other}'"
                )))
            }
        };

        let authz_mode = match get("AUTHZ_MODE") {
            Some(raw) => raw.parse::<AuthzMode>().map_err(AppError::configuration)?,
            None => AuthzMode::Strict,
        };

        Ok(Self {
            port,
            mount_path,
            identity_header,
            store,
            authz_mode,
        })
    }
}
