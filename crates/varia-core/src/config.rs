//! Configuration module
//!
//! Storage selection and the defaults every uploader type inherits when its
//! definitions leave a setting unset.

use std::env;

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_LOCAL_STORAGE_BASE_URL, DEFAULT_LOCAL_STORAGE_PATH,
    DEFAULT_STORE_DIR, DEFAULT_VERSION_SEPARATOR,
};
use crate::storage_types::StorageBackend;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariaConfig {
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Version tree defaults
    pub cache_dir: String,
    pub store_dir: String,
    pub version_separator: String,
    pub enable_processing: bool,
    pub delete_cache_after_store: bool,
}

impl Default for VariaConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            local_storage_path: DEFAULT_LOCAL_STORAGE_PATH.to_string(),
            local_storage_base_url: DEFAULT_LOCAL_STORAGE_BASE_URL.to_string(),
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            store_dir: DEFAULT_STORE_DIR.to_string(),
            version_separator: DEFAULT_VERSION_SEPARATOR.to_string(),
            enable_processing: true,
            delete_cache_after_store: true,
        }
    }
}

impl VariaConfig {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => defaults.storage_backend,
        };

        let version_separator =
            lookup("VARIA_VERSION_SEPARATOR").unwrap_or(defaults.version_separator);
        if version_separator.is_empty() || version_separator.contains('/') {
            return Err(anyhow::anyhow!(
                "VARIA_VERSION_SEPARATOR must be non-empty and must not contain '/'"
            ));
        }

        Ok(Self {
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH").unwrap_or(defaults.local_storage_path),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or(defaults.local_storage_base_url),
            cache_dir: lookup("VARIA_CACHE_DIR").unwrap_or(defaults.cache_dir),
            store_dir: lookup("VARIA_STORE_DIR").unwrap_or(defaults.store_dir),
            version_separator,
            enable_processing: parse_bool(
                lookup("VARIA_ENABLE_PROCESSING"),
                defaults.enable_processing,
            ),
            delete_cache_after_store: parse_bool(
                lookup("VARIA_DELETE_CACHE_AFTER_STORE"),
                defaults.delete_cache_after_store,
            ),
        })
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| v.trim().to_lowercase())
        .and_then(|v| match v.as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
