//! Engine configuration loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::session_manager::SessionManagerConfig;

const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Connection and tuning settings for the sync engine.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FEDSYNC")]
pub struct SyncSettings {
    /// Base URL of the user's personal data server.
    pub pds_url: Option<String>,
    /// PostgreSQL connection string for the local mirror.
    pub database_url: Option<String>,
    /// Upper bound on each remote request, in milliseconds.
    #[ortho_config(default = 10_000)]
    pub request_timeout_ms: u64,
    /// Session age after which it is refreshed before use, in seconds.
    #[ortho_config(default = 900)]
    pub session_staleness_secs: u64,
    /// Maximum pooled database connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
}

impl SyncSettings {
    /// Configured PDS URL, falling back to the public Bluesky host.
    pub fn pds_url(&self) -> &str {
        self.pds_url.as_deref().unwrap_or(DEFAULT_PDS_URL)
    }

    /// Mirror and session database, when persistence is configured.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Upper bound on each remote call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Session age after which the access token is renewed before use.
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.session_staleness_secs)
    }

    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size
    }

    /// Session manager tuning derived from these settings.
    pub fn session_manager(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            staleness_threshold: self.staleness_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    use crate::domain::repository_client::DEFAULT_REQUEST_TIMEOUT;
    use crate::domain::session_manager::DEFAULT_STALENESS_THRESHOLD;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 5] = [
        "FEDSYNC_PDS_URL",
        "FEDSYNC_DATABASE_URL",
        "FEDSYNC_REQUEST_TIMEOUT_MS",
        "FEDSYNC_SESSION_STALENESS_SECS",
        "FEDSYNC_POOL_MAX_SIZE",
    ];

    fn load_from_empty_args() -> SyncSettings {
        SyncSettings::load_from_iter([OsString::from("federate")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.pds_url(), DEFAULT_PDS_URL);
        assert_eq!(settings.database_url(), None);
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.staleness_threshold(), Duration::from_secs(900));
        assert_eq!(settings.pool_max_size(), 10);
    }

    #[rstest]
    fn defaults_match_the_engine_defaults() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(
            settings.session_manager(),
            SessionManagerConfig {
                staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            }
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("FEDSYNC_PDS_URL", Some("https://pds.example.test".to_owned())),
            (
                "FEDSYNC_DATABASE_URL",
                Some("postgres://sync@localhost/mirror".to_owned()),
            ),
            ("FEDSYNC_REQUEST_TIMEOUT_MS", Some("2500".to_owned())),
            ("FEDSYNC_SESSION_STALENESS_SECS", Some("60".to_owned())),
            ("FEDSYNC_POOL_MAX_SIZE", Some("3".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.pds_url(), "https://pds.example.test");
        assert_eq!(
            settings.database_url(),
            Some("postgres://sync@localhost/mirror")
        );
        assert_eq!(settings.request_timeout(), Duration::from_millis(2500));
        assert_eq!(
            settings.session_manager().staleness_threshold,
            Duration::from_secs(60)
        );
        assert_eq!(settings.pool_max_size(), 3);
    }
}
