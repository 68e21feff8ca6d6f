//! Environment configuration.

use std::env;

use timeline_protocol::TimelineProjection;

pub const DEFAULT_FETCH_LIMIT: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub fetch_limit: u32,
    pub projection: TimelineProjection,
    pub log_filter: Option<String>,
    pub debug: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            fetch_limit: env_u32_opt("TIMELINE_SYNC_FETCH_LIMIT")
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_FETCH_LIMIT),
            projection: env_string_opt("TIMELINE_SYNC_PROJECTION")
                .and_then(|value| TimelineProjection::parse(value.trim()))
                .unwrap_or_default(),
            log_filter: env_string_opt("TIMELINE_SYNC_LOG"),
            debug: env_flag("TIMELINE_SYNC_DEBUG"),
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            fetch_limit: self.fetch_limit,
            projection: self.projection,
        }
    }
}

/// Parameters stamped on every fetch the coordinator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub fetch_limit: u32,
    pub projection: TimelineProjection,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            projection: TimelineProjection::default(),
        }
    }
}

impl From<&EnvConfig> for CoordinatorConfig {
    fn from(config: &EnvConfig) -> Self {
        config.coordinator()
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u32_opt(key: &str) -> Option<u32> {
    env_string_opt(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{CoordinatorConfig, EnvConfig, DEFAULT_FETCH_LIMIT};
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use timeline_protocol::TimelineProjection;

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard("TIMELINE_SYNC_FETCH_LIMIT", None);
        let _g2 = set_env_guard("TIMELINE_SYNC_PROJECTION", None);
        let _g3 = set_env_guard("TIMELINE_SYNC_LOG", None);
        let _g4 = set_env_guard("TIMELINE_SYNC_DEBUG", None);

        let config = EnvConfig::from_env();
        assert_eq!(config.fetch_limit, DEFAULT_FETCH_LIMIT);
        assert_eq!(config.projection, TimelineProjection::Projected);
        assert!(config.log_filter.is_none());
        assert!(!config.debug);
        assert_eq!(config.coordinator(), CoordinatorConfig::default());
    }

    #[test]
    fn env_values_are_read() {
        let _lock = env_lock();
        let _g1 = set_env_guard("TIMELINE_SYNC_FETCH_LIMIT", Some("50"));
        let _g2 = set_env_guard("TIMELINE_SYNC_PROJECTION", Some("canonical"));
        let _g3 = set_env_guard("TIMELINE_SYNC_LOG", Some("timeline_sync=trace"));
        let _g4 = set_env_guard("TIMELINE_SYNC_DEBUG", Some("1"));

        let config = EnvConfig::from_env();
        assert_eq!(config.fetch_limit, 50);
        assert_eq!(config.projection, TimelineProjection::Canonical);
        assert_eq!(config.log_filter.as_deref(), Some("timeline_sync=trace"));
        assert!(config.debug);

        let coordinator = CoordinatorConfig::from(&config);
        assert_eq!(coordinator.fetch_limit, 50);
        assert_eq!(coordinator.projection, TimelineProjection::Canonical);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard("TIMELINE_SYNC_FETCH_LIMIT", Some("0"));
        let _g2 = set_env_guard("TIMELINE_SYNC_PROJECTION", Some("sideways"));
        let _g3 = set_env_guard("TIMELINE_SYNC_LOG", Some("   "));
        let _g4 = set_env_guard("TIMELINE_SYNC_DEBUG", Some("yes"));

        let config = EnvConfig::from_env();
        assert_eq!(config.fetch_limit, DEFAULT_FETCH_LIMIT);
        assert_eq!(config.projection, TimelineProjection::Projected);
        assert!(config.log_filter.is_none());
        assert!(!config.debug);

        let _g5 = set_env_guard("TIMELINE_SYNC_FETCH_LIMIT", Some("lots"));
        assert_eq!(EnvConfig::from_env().fetch_limit, DEFAULT_FETCH_LIMIT);
    }
}
