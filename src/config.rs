use crate::truststore::TrustStoreSource;
use std::env;
use std::ffi::OsString;

pub const INTERNAL_STORE_PATH_VAR: &str = "TRUSTSTORE_PATH";
pub const INTERNAL_STORE_PASSWORD_VAR: &str = "TRUSTSTORE_PASSWORD";
pub const DEFAULT_STORE_PASSWORD_VAR: &str = "DEFAULT_TRUSTSTORE_PASSWORD";

/// Trust-store configuration, read from the environment exactly once and
/// passed around explicitly so tests can construct it directly.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Password for the platform store, honored only if that store is a
    /// PKCS#12 archive (the usual PEM bundle takes none).
    pub default_store_password: String,
    /// Optional supplementary store; resolved only when both the path and
    /// the password variables are set.
    pub internal_store: Option<TrustStoreSource>,
}

impl ProbeConfig {
    pub fn from_env() -> Self {
        let default_store_password = env::var(DEFAULT_STORE_PASSWORD_VAR)
            .unwrap_or_else(|_| "changeit".to_string());
        let internal_store = internal_source(
            env::var_os(INTERNAL_STORE_PATH_VAR),
            env::var(INTERNAL_STORE_PASSWORD_VAR).ok(),
        );
        Self {
            default_store_password,
            internal_store,
        }
    }
}

/// Both the path and the password must be present; otherwise the
/// supplementary store is skipped and only the platform store is used.
pub(crate) fn internal_source(
    path: Option<OsString>,
    password: Option<String>,
) -> Option<TrustStoreSource> {
    match (path, password) {
        (Some(path), Some(password)) => Some(TrustStoreSource {
            path: path.into(),
            password: Some(password),
        }),
        _ => None,
    }
}
