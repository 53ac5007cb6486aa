//! Listener configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::{parse_env, ConfigResult};

/// Default TCP port the relay listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Address and port an HTTP service binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenConfig {
    /// Interface to bind (`BIND_ADDR`, default `0.0.0.0`)
    pub bind_addr: IpAddr,

    /// TCP port (`PORT`, default 8080)
    pub port: u16,
}

impl ListenConfig {
    /// Load from `BIND_ADDR` and `PORT`
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            bind_addr: parse_env("BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_env("PORT", DEFAULT_PORT)?,
        })
    }

    /// Socket address to hand to the TCP listener
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}
