//! Process configuration.
//!
//! Every setting can be given as a CLI flag or through the environment,
//! which is how the bridge is normally deployed:
//!
//! | Variable | Flag | Default |
//! |----------|------|---------|
//! | `IRC_HOST` | `--irc-host` | required |
//! | `IRC_PORT` | `--irc-port` | `6667` |
//! | `IRC_CHANNELS` | `--irc-channels` | none (comma separated) |
//! | `IRC_SSL` | `--irc-ssl` | `false` |
//! | `IRC_INSECURE` | `--irc-insecure` | `false` |
//! | `IRC_USERNAME` | `--irc-username` | `ircbridge` |
//! | `IRC_REALNAME` | `--irc-realname` | `IRC WebSocket bridge` |
//! | `PORT` | `--port` | required |
//! | `LISTEN_HOST` | `--listen-host` | `0.0.0.0` |
//! | `LOG_LEVEL` | `--log` | `info` |
//!
//! Boolean settings accept `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`.

// ============================================================================
// Imports
// ============================================================================

use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::error::{Error, Result};
use crate::irc::BackendSettings;

// ============================================================================
// Constants
// ============================================================================

/// Default IRC port when `IRC_PORT` is not set.
pub const DEFAULT_IRC_PORT: u16 = 6667;

/// Default listening address for the WebSocket server.
const DEFAULT_LISTEN_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

// ============================================================================
// Config
// ============================================================================

/// Settings consumed once at startup.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ircbridge", version, about = "IRC to WebSocket bridge")]
pub struct Config {
    /// IRC server hostname.
    #[arg(long = "irc-host", env = "IRC_HOST")]
    pub irc_host: String,

    /// IRC server port.
    #[arg(long = "irc-port", env = "IRC_PORT", default_value_t = DEFAULT_IRC_PORT)]
    pub irc_port: u16,

    /// Channels every bridge joins after registering.
    #[arg(long = "irc-channels", env = "IRC_CHANNELS", value_delimiter = ',')]
    pub irc_channels: Vec<String>,

    /// Connect to IRC over TLS.
    #[arg(
        long = "irc-ssl",
        env = "IRC_SSL",
        action = ArgAction::Set,
        default_value = "false",
        value_parser = BoolishValueParser::new()
    )]
    pub irc_ssl: bool,

    /// Accept self-signed and expired IRC server certificates.
    #[arg(
        long = "irc-insecure",
        env = "IRC_INSECURE",
        action = ArgAction::Set,
        default_value = "false",
        value_parser = BoolishValueParser::new()
    )]
    pub irc_insecure: bool,

    /// Username sent in `USER` during registration.
    #[arg(long = "irc-username", env = "IRC_USERNAME", default_value = "ircbridge")]
    pub irc_username: String,

    /// Real name sent in `USER` during registration.
    #[arg(
        long = "irc-realname",
        env = "IRC_REALNAME",
        default_value = "IRC WebSocket bridge"
    )]
    pub irc_realname: String,

    /// WebSocket listening port.
    #[arg(long = "port", short = 'p', env = "PORT")]
    pub port: u16,

    /// WebSocket listening address.
    #[arg(long = "listen-host", env = "LISTEN_HOST", default_value_t = DEFAULT_LISTEN_HOST)]
    pub listen_host: IpAddr,

    /// Tracing filter directive.
    #[arg(long = "log", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

// ============================================================================
// Config - Constructors
// ============================================================================

impl Config {
    /// Parses configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required setting is missing or invalid.
    pub fn parse_from_env() -> Result<Self> {
        Self::parse_from_args(std::env::args_os())
    }

    /// Parses configuration from explicit arguments (environment still applies).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required setting is missing or invalid.
    pub fn parse_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.irc_host.trim().is_empty() {
            return Err(Error::config("IRC host must not be empty"));
        }

        if self.irc_insecure && !self.irc_ssl {
            tracing::warn!("IRC_INSECURE has no effect without IRC_SSL");
        }

        Ok(())
    }
}

// ============================================================================
// Config - Accessors
// ============================================================================

impl Config {
    /// Returns the socket address the WebSocket server binds to.
    #[inline]
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_host, self.port)
    }

    /// Returns the channel list with blank entries removed.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.irc_channels
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Builds the backend settings shared by every bridge.
    #[must_use]
    pub fn backend_settings(&self) -> Arc<BackendSettings> {
        Arc::new(BackendSettings {
            host: self.irc_host.trim().to_owned(),
            port: self.irc_port,
            channels: self.channels(),
            tls: self.irc_ssl,
            insecure: self.irc_insecure,
            username: self.irc_username.clone(),
            realname: self.irc_realname.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
