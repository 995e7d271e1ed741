// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use hopper::{DEFAULT_LISTEN_ADDR, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::{
    fs, io,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse the configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("an upstream resolver or a stub address is required")]
    NoUpstream,
    #[error("only one of resolver and stub can be set")]
    BothUpstreams,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("could not resolve {resolver}: {source}")]
    Resolve { resolver: String, source: io::Error },
}

/// Every setting is optional, both in the file and on the command line.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub resolver: Option<String>,
    pub stub: Option<Ipv4Addr>,
    pub listen: Option<SocketAddr>,
    /// In milliseconds
    pub timeout: Option<u64>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Values set in `overrides` win. Setting an upstream in `overrides` replaces both
    /// upstream choices of `self`, so the command line can switch modes.
    pub fn merge(self, overrides: PartialConfig) -> PartialConfig {
        let switch = overrides.resolver.is_some() || overrides.stub.is_some();
        let (resolver, stub) = if switch {
            (overrides.resolver, overrides.stub)
        } else {
            (self.resolver, self.stub)
        };
        PartialConfig {
            resolver,
            stub,
            listen: overrides.listen.or(self.listen),
            timeout: overrides.timeout.or(self.timeout),
            threads: overrides.threads.or(self.threads),
            log_level: overrides.log_level.or(self.log_level),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upstream {
    Resolver(String),
    Stub(Ipv4Addr),
}

/// Validated configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub upstream: Upstream,
    pub listen: SocketAddr,
    pub timeout: Duration,
    pub threads: usize,
    pub log_level: String,
}

impl TryFrom<PartialConfig> for Settings {
    type Error = ConfigError;

    fn try_from(config: PartialConfig) -> Result<Self, Self::Error> {
        let upstream = match (config.resolver, config.stub) {
            (Some(resolver), None) => Upstream::Resolver(resolver),
            (None, Some(addr)) => Upstream::Stub(addr),
            (None, None) => return Err(ConfigError::NoUpstream),
            (Some(_), Some(_)) => return Err(ConfigError::BothUpstreams),
        };
        let timeout = match config.timeout {
            Some(0) => return Err(ConfigError::Zero("timeout")),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_TIMEOUT,
        };
        let threads = match config.threads {
            Some(0) => return Err(ConfigError::Zero("threads")),
            Some(n) => n,
            None => num_cpus::get(),
        };
        let listen = match config.listen {
            Some(addr) => addr,
            None => default_listen(),
        };
        Ok(Settings {
            upstream,
            listen,
            timeout,
            threads,
            log_level: config
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

fn default_listen() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::LOCALHOST, 2053)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(r: &str) -> PartialConfig {
        PartialConfig {
            resolver: Some(r.to_string()),
            ..PartialConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let s = Settings::try_from(resolver("8.8.8.8:53")).unwrap();
        assert_eq!(s.upstream, Upstream::Resolver("8.8.8.8:53".to_string()));
        assert_eq!(s.listen, "127.0.0.1:2053".parse().unwrap());
        assert_eq!(s.timeout, Duration::from_secs(5));
        assert_eq!(s.threads, num_cpus::get());
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn exactly_one_upstream() {
        let none = Settings::try_from(PartialConfig::default()).unwrap_err();
        assert!(matches!(none, ConfigError::NoUpstream));

        let both = PartialConfig {
            stub: Some(Ipv4Addr::new(8, 8, 8, 8)),
            ..resolver("8.8.8.8:53")
        };
        let both = Settings::try_from(both).unwrap_err();
        assert!(matches!(both, ConfigError::BothUpstreams));
    }

    #[test]
    fn zero_values() {
        let timeout = PartialConfig {
            timeout: Some(0),
            ..resolver("8.8.8.8:53")
        };
        assert!(matches!(
            Settings::try_from(timeout),
            Err(ConfigError::Zero("timeout"))
        ));
        let threads = PartialConfig {
            threads: Some(0),
            ..resolver("8.8.8.8:53")
        };
        assert!(matches!(
            Settings::try_from(threads),
            Err(ConfigError::Zero("threads"))
        ));
    }

    #[test]
    fn command_line_wins() {
        let file: PartialConfig = toml::from_str(
            r#"
            resolver = "1.1.1.1:53"
            listen = "0.0.0.0:53"
            timeout = 2000
            log_level = "debug"
            "#,
        )
        .unwrap();
        let cli = PartialConfig {
            timeout: Some(750),
            threads: Some(2),
            ..PartialConfig::default()
        };
        let s = Settings::try_from(file.merge(cli)).unwrap();
        assert_eq!(s.upstream, Upstream::Resolver("1.1.1.1:53".to_string()));
        assert_eq!(s.listen, "0.0.0.0:53".parse().unwrap());
        assert_eq!(s.timeout, Duration::from_millis(750));
        assert_eq!(s.threads, 2);
        assert_eq!(s.log_level, "debug");
    }

    #[test]
    fn command_line_switches_mode() {
        let file = resolver("1.1.1.1:53");
        let cli = PartialConfig {
            stub: Some(Ipv4Addr::new(10, 1, 1, 1)),
            ..PartialConfig::default()
        };
        let s = Settings::try_from(file.merge(cli)).unwrap();
        assert_eq!(s.upstream, Upstream::Stub(Ipv4Addr::new(10, 1, 1, 1)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<PartialConfig>("resolvr = \"1.1.1.1:53\"").unwrap_err();
        assert!(err.to_string().contains("resolvr"));
    }

    #[test]
    fn missing_file() {
        let err = PartialConfig::from_file(Path::new("/nonexistent/hopper.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
