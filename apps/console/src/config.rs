use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use history::HistoryConfig;
use trail_ingest_core::DEFAULT_LINK_TIMEOUT;
use trail_ingest_f1::F1Config;
use tracing::warn;

pub const DEFAULT_UDP_BIND: &str = "0.0.0.0";
pub const DEFAULT_UDP_PORT: u16 = 20777;
pub const DEFAULT_TICK_HZ: u32 = 20;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub f1: F1Config,
    pub tick_hz: u32,
    pub history: HistoryConfig,
    pub link_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            f1: F1Config::default(),
            tick_hz: DEFAULT_TICK_HZ,
            history: HistoryConfig::default(),
            link_timeout: DEFAULT_LINK_TIMEOUT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from `lookup`; bad values are logged and replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ip = read(&lookup, "F1_UDP_BIND", DEFAULT_UDP_BIND.parse::<IpAddr>().ok(), |_: &IpAddr| true);
        let port = read(&lookup, "F1_UDP_PORT", Some(DEFAULT_UDP_PORT), |_: &u16| true);
        let bind_addr = match (ip, port) {
            (Some(ip), Some(port)) => std::net::SocketAddr::new(ip, port).to_string(),
            _ => defaults.f1.bind_addr.clone(),
        };

        let tick_hz = read(&lookup, "TRAIL_TICK_HZ", Some(DEFAULT_TICK_HZ), |hz: &u32| (1..=1000).contains(hz))
            .unwrap_or(DEFAULT_TICK_HZ);

        let base = defaults.history;
        let history = HistoryConfig {
            max_points: read(&lookup, "TRAIL_MAX_POINTS", Some(base.max_points), |n: &usize| *n > 0)
                .unwrap_or(base.max_points),
            distance_threshold: read(&lookup, "TRAIL_DISTANCE_THRESHOLD", Some(base.distance_threshold), |d: &f64| {
                d.is_finite() && *d >= 0.0
            })
            .unwrap_or(base.distance_threshold),
            restart_teleport_threshold: read(
                &lookup,
                "TRAIL_RESTART_THRESHOLD_M",
                Some(base.restart_teleport_threshold),
                |d: &f32| d.is_finite() && *d > 0.0,
            )
            .unwrap_or(base.restart_teleport_threshold),
            lap_start_threshold: read(&lookup, "TRAIL_LAP_START_M", Some(base.lap_start_threshold), |d: &f32| {
                d.is_finite() && *d >= 0.0
            })
            .unwrap_or(base.lap_start_threshold),
            max_sample_age: read(&lookup, "TRAIL_MAX_AGE_SECS", Some(base.max_sample_age.as_secs()), |s: &u64| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(base.max_sample_age),
        };

        let link_timeout = read(&lookup, "TRAIL_LINK_TIMEOUT_SECS", Some(defaults.link_timeout.as_secs()), |s: &u64| {
            *s > 0
        })
        .map(Duration::from_secs)
        .unwrap_or(defaults.link_timeout);

        Self {
            f1: F1Config { bind_addr, ..defaults.f1 },
            tick_hz,
            history,
            link_timeout,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_hz.max(1)
    }
}

fn read<T, F, V>(lookup: &F, key: &str, default: Option<T>, valid: V) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Some(value),
        _ => {
            warn!(key, value = %raw, "invalid setting, using default");
            default
        }
    }
}
