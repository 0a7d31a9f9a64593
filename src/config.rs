use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::warn;

use crate::model::MAX_TRAYS;
use crate::settings::Settings;

/// Complete application configuration, loaded from environment variables or default values.
///
/// Log settings live in [`LogConfig`], which is read first so that warnings
/// from the remaining variables reach an initialised subscriber.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub solver: SolverConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            solver: SolverConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "WEIGHER_SORTER_API_HOST";
    const PORT_VAR: &'static str = "WEIGHER_SORTER_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let default_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (default_ip, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "{} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Policy constants for generation and solving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    tray_count: usize,
    box_limit: usize,
}

impl SolverConfig {
    pub const DEFAULT_TRAY_COUNT: usize = 12;
    const TRAY_COUNT_VAR: &'static str = "WEIGHER_SORTER_TRAY_COUNT";
    const BOX_LIMIT_VAR: &'static str = "WEIGHER_SORTER_BOX_LIMIT";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::TRAY_COUNT_VAR).as_deref(),
            env_string(Self::BOX_LIMIT_VAR).as_deref(),
        )
    }

    fn from_values(tray_count: Option<&str>, box_limit: Option<&str>) -> Self {
        let tray_count = load_usize_with_warning(
            Self::TRAY_COUNT_VAR,
            tray_count,
            Self::DEFAULT_TRAY_COUNT,
            |value| (1..=MAX_TRAYS).contains(&value),
            "must be between 1 and 20",
            "Adjusted tray count changes solve time exponentially",
        );

        let box_limit = load_usize_with_warning(
            Self::BOX_LIMIT_VAR,
            box_limit,
            Settings::DEFAULT_BOX_LIMIT,
            |value| value >= 1,
            "must be at least 1",
            "Adjusted box limit changes how many boxes a result may hold",
        );

        Self {
            tray_count,
            box_limit,
        }
    }

    /// Number of trays produced by each generation run.
    pub fn tray_count(&self) -> usize {
        self.tray_count
    }

    /// Maximum number of boxes per solve.
    pub fn box_limit(&self) -> usize {
        self.box_limit
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tray_count: Self::DEFAULT_TRAY_COUNT,
            box_limit: Settings::DEFAULT_BOX_LIMIT,
        }
    }
}

/// Log output configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    json: bool,
}

impl LogConfig {
    const JSON_VAR: &'static str = "WEIGHER_SORTER_LOG_JSON";

    pub fn from_env() -> Self {
        let json = env_string(Self::JSON_VAR)
            .and_then(|raw| parse_bool(&raw, Self::JSON_VAR))
            .unwrap_or(false);
        Self { json }
    }

    /// Whether log lines are emitted as JSON objects.
    pub fn json(&self) -> bool {
        self.json
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_usize_with_warning(
    var_name: &str,
    raw: Option<&str>,
    default: usize,
    validator: impl Fn(usize) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> usize {
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<usize>() {
        Ok(value) if validator(value) => {
            if value != default {
                warn!("{} ({} = {}).", notice, var_name, value);
            }
            value
        }
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_json_flag_accepts_common_spellings() {
        let cases = [
            ("on", Some(true)),
            (" Yes ", Some(true)),
            ("1", Some(true)),
            ("OFF", Some(false)),
            ("0", Some(false)),
            ("json", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                parse_bool(raw, LogConfig::JSON_VAR),
                expected,
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn api_config_defaults() {
        let config = ApiConfig::from_values(None, None);
        assert_eq!(config.port(), 8080);
        assert!(config.binds_to_all_interfaces());
        assert!(config.uses_default_host());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn api_config_parses_host_and_port() {
        let config =
            ApiConfig::from_values(Some("127.0.0.1".to_string()), Some("9090".to_string()));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.display_host(), "127.0.0.1");
        assert!(!config.binds_to_all_interfaces());
        assert!(!config.uses_default_host());
    }

    #[test]
    fn api_config_rejects_invalid_values() {
        let config =
            ApiConfig::from_values(Some("not-an-ip".to_string()), Some("0".to_string()));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert!(config.uses_default_host());

        let config = ApiConfig::from_values(None, Some("http".to_string()));
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn solver_config_defaults() {
        let config = SolverConfig::from_values(None, None);
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.tray_count(), 12);
        assert_eq!(config.box_limit(), 4);
    }

    #[test]
    fn solver_config_accepts_valid_overrides() {
        let config = SolverConfig::from_values(Some("20"), Some(" 6 "));
        assert_eq!(config.tray_count(), 20);
        assert_eq!(config.box_limit(), 6);
    }

    #[test]
    fn solver_config_rejects_out_of_range_values() {
        let config = SolverConfig::from_values(Some("21"), Some("0"));
        assert_eq!(config, SolverConfig::default());

        let config = SolverConfig::from_values(Some("0"), Some("-2"));
        assert_eq!(config, SolverConfig::default());

        let config = SolverConfig::from_values(Some("twelve"), None);
        assert_eq!(config.tray_count(), 12);
    }
}
