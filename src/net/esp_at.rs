//! Transport over an ESP AT-command Wi-Fi modem on a serial link.
//!
//! Single-connection mode (`AT+CIPMUX=0`). Incoming data arrives framed as
//! `+IPD,<len>:<bytes>`; the driver remembers how many payload bytes of the
//! current frame are still unread.

use core::fmt::Write as _;

use embassy_time::Duration;
use heapless::{
    String,
    Vec,
};

use super::transport::{
    Endpoint,
    NetError,
    Protocol,
    Transport,
};
use crate::config::{
    MODEM_LONG_TIMEOUT,
    MODEM_TIMEOUT,
};

/// Serial link to the modem.
#[allow(async_fn_in_trait)]
pub trait Serial {
    type Error;

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next received byte, or `None` if nothing arrived within `timeout`.
    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error>;
}

const LINE_MAX: usize = 96;
/// Unrelated lines tolerated while waiting for a command's final response.
const MAX_LINES: usize = 32;
/// Bytes skipped while hunting for a data frame or the send prompt.
const MAX_NOISE: usize = 512;

enum IpdState {
    Prefix(usize),
    Length(usize),
}

/// Byte-at-a-time recognizer for the `+IPD,<len>:` frame header.
struct IpdHeader {
    state: IpdState,
}

impl IpdHeader {
    const PREFIX: &'static [u8] = b"+IPD,";

    const fn new() -> Self {
        Self {
            state: IpdState::Prefix(0),
        }
    }

    /// Feed one byte. Returns the payload length once a header completes.
    fn push(&mut self, byte: u8) -> Option<usize> {
        match self.state {
            IpdState::Prefix(matched) => {
                if byte == Self::PREFIX[matched] {
                    self.state = if matched + 1 == Self::PREFIX.len() {
                        IpdState::Length(0)
                    } else {
                        IpdState::Prefix(matched + 1)
                    };
                } else {
                    self.state = IpdState::Prefix(usize::from(byte == Self::PREFIX[0]));
                }
            }
            IpdState::Length(len) => match byte {
                b'0'..=b'9' => {
                    self.state =
                        IpdState::Length(len.saturating_mul(10) + usize::from(byte - b'0'));
                }
                b':' => {
                    self.state = IpdState::Prefix(0);
                    return Some(len);
                }
                _ => self.state = IpdState::Prefix(0),
            },
        }
        None
    }
}

pub struct AtModem<S> {
    serial: S,
    /// Payload bytes of the current `+IPD` frame not yet handed out.
    pending: usize,
    initialized: bool,
}

impl<S: Serial> AtModem<S> {
    pub const fn new(serial: S) -> Self {
        Self {
            serial,
            pending: 0,
            initialized: false,
        }
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<u8, NetError> {
        match self.serial.read_byte(timeout).await {
            Ok(Some(b)) => Ok(b),
            Ok(None) => Err(NetError::Timeout),
            Err(_) => Err(NetError::Io),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), NetError> {
        self.serial.write(data).await.map_err(|_| NetError::Io)
    }

    /// Next non-empty line, without the line terminator.
    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8, LINE_MAX>, NetError> {
        let mut line = Vec::new();
        loop {
            match self.read_byte(timeout).await? {
                b'\n' => {
                    if !line.is_empty() {
                        return Ok(line);
                    }
                }
                b'\r' => {}
                // Over-long lines are truncated; only their start matters.
                b => {
                    let _ = line.push(b);
                }
            }
        }
    }

    /// Send `cmd` and wait for one of `finals`. `ERROR` and `FAIL` always
    /// end the exchange as [`NetError::Refused`] unless listed in `finals`.
    /// Returns the index of the matched response.
    async fn command(
        &mut self,
        cmd: &str,
        finals: &[&str],
        timeout: Duration,
    ) -> Result<usize, NetError> {
        trace!("AT > {=str}", cmd);
        self.write(cmd.as_bytes()).await?;
        self.write(b"\r\n").await?;
        self.expect(finals, timeout).await
    }

    async fn expect(&mut self, finals: &[&str], timeout: Duration) -> Result<usize, NetError> {
        for _ in 0..MAX_LINES {
            let line = self.read_line(timeout).await?;
            if let Some(i) = finals.iter().position(|f| f.as_bytes() == line.as_slice()) {
                return Ok(i);
            }
            if line.as_slice() == b"ERROR" || line.as_slice() == b"FAIL" {
                return Err(NetError::Refused);
            }
        }
        Err(NetError::Protocol)
    }

    /// Put the modem in a known state: echo off, station+AP mode, single
    /// connection.
    pub async fn init(&mut self) -> Result<(), NetError> {
        self.command("ATE0", &["OK"], MODEM_TIMEOUT).await?;
        self.command("AT+CWMODE_CUR=3", &["OK"], MODEM_TIMEOUT).await?;
        self.command("AT+CIPMUX=0", &["OK"], MODEM_TIMEOUT).await?;
        self.initialized = true;
        debug!("modem initialized");
        Ok(())
    }

    async fn wait_prompt(&mut self) -> Result<(), NetError> {
        for _ in 0..MAX_NOISE {
            if self.read_byte(MODEM_TIMEOUT).await? == b'>' {
                return Ok(());
            }
        }
        Err(NetError::Protocol)
    }
}

impl<S: Serial> Transport for AtModem<S> {
    async fn join(&mut self, ssid: &str, password: &str) -> Result<(), NetError> {
        if !self.initialized {
            self.init().await?;
        }
        let mut cmd: String<128> = String::new();
        write!(cmd, "AT+CWJAP_CUR=\"{ssid}\",\"{password}\"").map_err(|_| NetError::BufferTooSmall)?;
        match self.command(&cmd, &["OK", "FAIL"], MODEM_LONG_TIMEOUT).await? {
            0 => {
                info!("joined access point {=str}", ssid);
                Ok(())
            }
            _ => Err(NetError::Refused),
        }
    }

    async fn connect(&mut self, endpoint: Endpoint<'_>) -> Result<(), NetError> {
        if !self.initialized {
            self.init().await?;
        }
        self.pending = 0;

        let kind = match endpoint.protocol {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        };
        let mut cmd: String<128> = String::new();
        write!(cmd, "AT+CIPSTART=\"{kind}\",\"{}\",{}", endpoint.host, endpoint.port)
            .map_err(|_| NetError::BufferTooSmall)?;
        if endpoint.protocol == Protocol::Tcp && endpoint.keep_alive > 0 {
            write!(cmd, ",{}", endpoint.keep_alive).map_err(|_| NetError::BufferTooSmall)?;
        }
        self.command(&cmd, &["OK", "ALREADY CONNECTED"], MODEM_LONG_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        let mut cmd: String<24> = String::new();
        write!(cmd, "AT+CIPSEND={}", data.len()).map_err(|_| NetError::BufferTooSmall)?;
        trace!("AT > {=str}", cmd.as_str());
        self.write(cmd.as_bytes()).await?;
        self.write(b"\r\n").await?;
        self.wait_prompt().await?;
        self.write(data).await?;
        match self
            .expect(&["SEND OK", "SEND FAIL"], MODEM_LONG_TIMEOUT)
            .await?
        {
            0 => Ok(data.len()),
            _ => Err(NetError::Refused),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending == 0 {
            let mut header = IpdHeader::new();
            let mut skipped = 0;
            self.pending = loop {
                let b = self.read_byte(MODEM_TIMEOUT).await?;
                if let Some(len) = header.push(b) {
                    break len;
                }
                skipped += 1;
                if skipped > MAX_NOISE {
                    return Err(NetError::Protocol);
                }
            };
        }
        let n = self.pending.min(buf.len());
        for slot in &mut buf[..n] {
            *slot = self.read_byte(MODEM_TIMEOUT).await?;
        }
        self.pending -= n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), NetError> {
        self.pending = 0;
        self.command("AT+CIPCLOSE", &["OK"], MODEM_TIMEOUT).await?;
        Ok(())
    }
}
