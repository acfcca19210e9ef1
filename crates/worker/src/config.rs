use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use jobline_core::backoff::{IDLE_JITTER_RATIO, PACE_JITTER_RATIO};
use jobline_core::lease::WorkerIdentity;
use jobline_db::lease::DEFAULT_STORE_TIMEOUT;
use jobline_events::notifier::{DEFAULT_API_BASE, DEFAULT_NOTIFY_TIMEOUT};
use jobline_events::queue_client::{DEFAULT_EVENT_TIMEOUT, DEFAULT_NEXT_JOB_TIMEOUT};
use jobline_events::{ChatNotifierConfig, QueueConfig};

use crate::error::ConfigError;
use crate::worker_loop::LoopConfig;

const NOTIFY_TOKEN_PREFIX: &str = "NOTIFY_TOKEN_";
const CALL_OUT_PREFIX: &str = "CALL_OUT_";
const CALL_OUT_SUFFIX: &str = "_URL";

/// Where jobs are leased from and where lifecycle events go.
#[derive(Debug, Clone)]
pub enum LeaseBackendConfig {
    /// Remote queue service over HTTP.
    Queue(QueueConfig),
    /// Shared PostgreSQL job table. `None` disables the store.
    Store {
        database_url: Option<String>,
        /// Upper bound on each store call.
        timeout: Duration,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub backend: LeaseBackendConfig,
    pub worker_id: String,
    pub capabilities: Vec<String>,
    pub prefetch: u32,
    pub loop_config: LoopConfig,
    pub notify: ChatNotifierConfig,
    /// Job type → call-out URL.
    pub call_outs: HashMap<String, String>,
    pub call_out_timeout: Duration,
    /// Port for `GET /health`; no health server when unset.
    pub health_port: Option<u16>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                                | Default                         |
    /// |----------------------------------------|---------------------------------|
    /// | `LEASE_BACKEND`                        | `queue` (`queue` or `store`)    |
    /// | `QUEUE_BASE_URL`                       | required in queue mode          |
    /// | `QUEUE_NEXT_JOB_URL`, `QUEUE_EVENT_URL`| derived from the base URL       |
    /// | `QUEUE_TOKEN`                          | required in queue mode          |
    /// | `DATABASE_URL`                         | store mode; unset disables it   |
    /// | `STORE_TIMEOUT_MS`                     | `5000`                          |
    /// | `WORKER_ID`                            | `worker-<uuid>`                 |
    /// | `WORKER_CAPABILITIES`                  | empty, comma separated          |
    /// | `WORKER_PREFETCH`                      | `1`                             |
    /// | `HEARTBEAT_INTERVAL_MS`                | `20000`                         |
    /// | `NEXT_JOB_TIMEOUT_MS`                  | `10000`                         |
    /// | `EVENT_TIMEOUT_MS`                     | `5000`                          |
    /// | `IDLE_BACKOFF_MS`                      | `1000`                          |
    /// | `IDLE_JITTER_RATIO`                    | `0.15`                          |
    /// | `PACE_MS`                              | `80`                            |
    /// | `PACE_JITTER_RATIO`                    | `0.5`                           |
    /// | `NOTIFY_API_BASE`                      | `https://api.telegram.org`      |
    /// | `NOTIFY_DEFAULT_TOKEN`                 | unset                           |
    /// | `NOTIFY_TOKEN_<NAMESPACE>`             | unset                           |
    /// | `NOTIFY_TIMEOUT_MS`                    | `5000`                          |
    /// | `CALL_OUT_<TYPE>_URL`                  | unset                           |
    /// | `CALL_OUT_TIMEOUT_MS`                  | `30000`                         |
    /// | `HEALTH_PORT`                          | unset                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim().to_string());

        let backend = match get("LEASE_BACKEND").as_deref().unwrap_or("queue") {
            "queue" => {
                let base = get("QUEUE_BASE_URL").ok_or(ConfigError::Missing("QUEUE_BASE_URL"))?;
                let token = get("QUEUE_TOKEN").ok_or(ConfigError::Missing("QUEUE_TOKEN"))?;
                let mut queue = QueueConfig::new(&base, token).with_timeouts(
                    millis(&vars, "NEXT_JOB_TIMEOUT_MS", DEFAULT_NEXT_JOB_TIMEOUT)?,
                    millis(&vars, "EVENT_TIMEOUT_MS", DEFAULT_EVENT_TIMEOUT)?,
                );
                if let Some(url) = get("QUEUE_NEXT_JOB_URL") {
                    queue.next_job_url = url;
                }
                if let Some(url) = get("QUEUE_EVENT_URL") {
                    queue.event_url = url;
                }
                LeaseBackendConfig::Queue(queue)
            }
            "store" => {
                let timeout = millis(&vars, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT)?;
                if timeout.is_zero() {
                    return Err(invalid("STORE_TIMEOUT_MS", "0", "must be positive"));
                }
                LeaseBackendConfig::Store {
                    database_url: get("DATABASE_URL"),
                    timeout,
                }
            }
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let worker_id =
            get("WORKER_ID").unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()));

        let capabilities: Vec<String> = get("WORKER_CAPABILITIES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = LoopConfig::default();
        let loop_config = LoopConfig {
            heartbeat_interval: millis(
                &vars,
                "HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval,
            )?,
            idle_backoff: millis(&vars, "IDLE_BACKOFF_MS", defaults.idle_backoff)?,
            idle_jitter_ratio: ratio(&vars, "IDLE_JITTER_RATIO", IDLE_JITTER_RATIO)?,
            pace: millis(&vars, "PACE_MS", defaults.pace)?,
            pace_jitter_ratio: ratio(&vars, "PACE_JITTER_RATIO", PACE_JITTER_RATIO)?,
        };
        if loop_config.heartbeat_interval.is_zero() {
            return Err(invalid("HEARTBEAT_INTERVAL_MS", "0", "must be positive"));
        }

        let notify = ChatNotifierConfig {
            api_base: get("NOTIFY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            default_token: get("NOTIFY_DEFAULT_TOKEN"),
            tokens: suffixed(&vars, NOTIFY_TOKEN_PREFIX, ""),
            timeout: millis(&vars, "NOTIFY_TIMEOUT_MS", DEFAULT_NOTIFY_TIMEOUT)?,
        };

        let health_port = match get("HEALTH_PORT") {
            Some(_) => Some(parse(&vars, "HEALTH_PORT", 0u16)?),
            None => None,
        };

        Ok(Self {
            backend,
            worker_id,
            capabilities,
            prefetch: parse(&vars, "WORKER_PREFETCH", 1u32)?,
            loop_config,
            notify,
            call_outs: suffixed(&vars, CALL_OUT_PREFIX, CALL_OUT_SUFFIX),
            call_out_timeout: millis(&vars, "CALL_OUT_TIMEOUT_MS", Duration::from_secs(30))?,
            health_port,
        })
    }

    pub fn identity(&self) -> WorkerIdentity {
        WorkerIdentity::new(self.worker_id.clone())
            .with_capabilities(self.capabilities.clone())
            .with_prefetch(self.prefetch)
    }
}

fn invalid(var: &str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match vars.get(name) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(name, raw, e)),
        None => Ok(default),
    }
}

fn millis(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| invalid(name, raw, e)),
        None => Ok(default),
    }
}

/// A jitter ratio: finite and within `[0, 1]`.
fn ratio(vars: &HashMap<String, String>, name: &str, default: f64) -> Result<f64, ConfigError> {
    let value = parse(vars, name, default)?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        let raw = vars.get(name).map(String::as_str).unwrap_or_default();
        Err(invalid(name, raw, "must be between 0 and 1"))
    }
}

/// Collect `{prefix}{KEY}{suffix}` variables into a map keyed by the
/// lowercased `KEY`.
fn suffixed(vars: &HashMap<String, String>, prefix: &str, suffix: &str) -> HashMap<String, String> {
    vars.iter()
        .filter_map(|(name, value)| {
            let key = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn queue_mode_requires_url_and_token() {
        assert_matches!(
            WorkerConfig::from_vars(vars(&[])),
            Err(ConfigError::Missing("QUEUE_BASE_URL"))
        );
        assert_matches!(
            WorkerConfig::from_vars(vars(&[("QUEUE_BASE_URL", "http://queue")])),
            Err(ConfigError::Missing("QUEUE_TOKEN"))
        );
    }

    #[test]
    fn queue_mode_defaults() {
        let config = WorkerConfig::from_vars(vars(&[
            ("QUEUE_BASE_URL", "http://queue/"),
            ("QUEUE_TOKEN", "secret"),
            ("WORKER_ID", "w-7"),
            ("WORKER_CAPABILITIES", "render, decision,"),
        ]))
        .unwrap();

        let queue = assert_matches!(config.backend, LeaseBackendConfig::Queue(q) => q);
        assert_eq!(queue.next_job_url, "http://queue/next-job");
        assert_eq!(queue.event_url, "http://queue/event");
        assert_eq!(queue.next_job_timeout, Duration::from_secs(10));
        assert_eq!(queue.event_timeout, Duration::from_secs(5));
        assert_eq!(config.worker_id, "w-7");
        assert_eq!(config.capabilities, vec!["render", "decision"]);
        assert_eq!(config.prefetch, 1);
        assert_eq!(config.loop_config.heartbeat_interval, Duration::from_secs(20));
        assert_eq!(config.loop_config.idle_backoff, Duration::from_millis(1000));
        assert_eq!(config.loop_config.pace, Duration::from_millis(80));
        assert!(config.health_port.is_none());
        assert!(!config.notify.has_any_token());
    }

    #[test]
    fn queue_endpoints_can_be_overridden() {
        let config = WorkerConfig::from_vars(vars(&[
            ("QUEUE_BASE_URL", "http://queue"),
            ("QUEUE_TOKEN", "secret"),
            ("QUEUE_EVENT_URL", "http://events/ingest"),
        ]))
        .unwrap();
        let queue = assert_matches!(config.backend, LeaseBackendConfig::Queue(q) => q);
        assert_eq!(queue.next_job_url, "http://queue/next-job");
        assert_eq!(queue.event_url, "http://events/ingest");
    }

    #[test]
    fn store_mode_without_database_is_allowed() {
        let config = WorkerConfig::from_vars(vars(&[("LEASE_BACKEND", "store")])).unwrap();
        let timeout = assert_matches!(
            config.backend,
            LeaseBackendConfig::Store { database_url: None, timeout } => timeout
        );
        assert_eq!(timeout, DEFAULT_STORE_TIMEOUT);
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn store_timeout_is_configurable() {
        let config = WorkerConfig::from_vars(vars(&[
            ("LEASE_BACKEND", "store"),
            ("DATABASE_URL", "postgres://localhost/jobs"),
            ("STORE_TIMEOUT_MS", "750"),
        ]))
        .unwrap();
        assert_matches!(
            config.backend,
            LeaseBackendConfig::Store { timeout, .. } if timeout == Duration::from_millis(750)
        );

        assert_matches!(
            WorkerConfig::from_vars(vars(&[
                ("LEASE_BACKEND", "store"),
                ("STORE_TIMEOUT_MS", "0"),
            ])),
            Err(ConfigError::Invalid { ref var, .. }) if var == "STORE_TIMEOUT_MS"
        );
    }

    #[test]
    fn jitter_ratio_outside_unit_range_is_rejected() {
        for (name, value) in [
            ("IDLE_JITTER_RATIO", "1e30"),
            ("PACE_JITTER_RATIO", "-0.1"),
            ("IDLE_JITTER_RATIO", "NaN"),
            ("PACE_JITTER_RATIO", "inf"),
        ] {
            let err = WorkerConfig::from_vars(vars(&[("LEASE_BACKEND", "store"), (name, value)]))
                .unwrap_err();
            assert_matches!(err, ConfigError::Invalid { ref var, .. } if var == name);
        }

        let config = WorkerConfig::from_vars(vars(&[
            ("LEASE_BACKEND", "store"),
            ("IDLE_JITTER_RATIO", "1"),
            ("PACE_JITTER_RATIO", "0"),
        ]))
        .unwrap();
        assert_eq!(config.loop_config.idle_jitter_ratio, 1.0);
        assert_eq!(config.loop_config.pace_jitter_ratio, 0.0);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert_matches!(
            WorkerConfig::from_vars(vars(&[("LEASE_BACKEND", "redis")])),
            Err(ConfigError::UnknownBackend(b)) if b == "redis"
        );
    }

    #[test]
    fn invalid_number_is_fatal() {
        let err = WorkerConfig::from_vars(vars(&[
            ("LEASE_BACKEND", "store"),
            ("IDLE_BACKOFF_MS", "soon"),
        ]))
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { ref var, .. } if var == "IDLE_BACKOFF_MS");
    }

    #[test]
    fn notify_tokens_and_call_outs_are_collected() {
        let config = WorkerConfig::from_vars(vars(&[
            ("LEASE_BACKEND", "store"),
            ("NOTIFY_DEFAULT_TOKEN", "tok-default"),
            ("NOTIFY_TOKEN_RENDER", "tok-render"),
            ("CALL_OUT_DECISION_URL", "http://decide/score"),
            ("CALL_OUT_TIMEOUT_MS", "1500"),
            ("HEALTH_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.notify.default_token.as_deref(), Some("tok-default"));
        assert_eq!(config.notify.tokens.get("render").map(String::as_str), Some("tok-render"));
        assert_eq!(
            config.call_outs.get("decision").map(String::as_str),
            Some("http://decide/score")
        );
        assert_eq!(config.call_out_timeout, Duration::from_millis(1500));
        assert_eq!(config.health_port, Some(9090));
    }

    #[test]
    fn zero_heartbeat_interval_is_rejected() {
        assert_matches!(
            WorkerConfig::from_vars(vars(&[
                ("LEASE_BACKEND", "store"),
                ("HEARTBEAT_INTERVAL_MS", "0"),
            ])),
            Err(ConfigError::Invalid { .. })
        );
    }
}
