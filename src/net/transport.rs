//! Byte-stream transport used by the MQTT and NTP clients.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Where to open a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoint<'a> {
    pub protocol: Protocol,
    pub host: &'a str,
    pub port: u16,
    /// TCP keep-alive in seconds, 0 to leave it off.
    pub keep_alive: u16,
}

impl<'a> Endpoint<'a> {
    pub const fn tcp(host: &'a str, port: u16, keep_alive: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            host,
            port,
            keep_alive,
        }
    }

    pub const fn udp(host: &'a str, port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            host,
            port,
            keep_alive: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetError {
    /// No answer within the call's timeout. Always worth retrying.
    Timeout,
    /// The peer or modem answered with an error.
    Refused,
    /// An answer arrived but made no sense.
    Protocol,
    /// The underlying serial link failed.
    Io,
    /// The reply did not fit the caller's buffer.
    BufferTooSmall,
}

impl NetError {
    pub const fn is_timeout(self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timed out",
            Self::Refused => "refused",
            Self::Protocol => "unexpected response",
            Self::Io => "serial link error",
            Self::BufferTooSmall => "buffer too small",
        })
    }
}

/// A single connection at a time over some link. Every call is bounded by a
/// timeout and reports it as [`NetError::Timeout`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Join the wireless network. Transports without one succeed trivially.
    async fn join(&mut self, _ssid: &str, _password: &str) -> Result<(), NetError> {
        Ok(())
    }

    async fn connect(&mut self, endpoint: Endpoint<'_>) -> Result<(), NetError>;

    /// Send all of `data`; returns the number of bytes sent.
    async fn send(&mut self, data: &[u8]) -> Result<usize, NetError>;

    /// Receive at least one byte into `buf`.
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    async fn close(&mut self) -> Result<(), NetError>;

    /// Fill `buf` completely.
    async fn receive_exact(&mut self, buf: &mut [u8]) -> Result<(), NetError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.receive(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(NetError::Protocol);
            }
            filled += n;
        }
        Ok(())
    }
}

impl<T: Transport> Transport for &mut T {
    async fn join(&mut self, ssid: &str, password: &str) -> Result<(), NetError> {
        (**self).join(ssid, password).await
    }

    async fn connect(&mut self, endpoint: Endpoint<'_>) -> Result<(), NetError> {
        (**self).connect(endpoint).await
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        (**self).send(data).await
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        (**self).receive(buf).await
    }

    async fn close(&mut self) -> Result<(), NetError> {
        (**self).close().await
    }
}
