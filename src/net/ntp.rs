//! One-shot SNTP query used to set the clock at boot.

use super::transport::{
    Endpoint,
    NetError,
    Transport,
};
use crate::config::TimeServer;

pub const PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
pub const UNIX_OFFSET: u32 = 2_208_988_800;

const TRANSMIT_SECONDS: usize = 40;

/// Client request: LI 3 (unsynchronized), version 4, mode 3 (client).
pub const fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = 0xE3;
    packet[1] = 0; // stratum
    packet[2] = 6; // poll interval
    packet[3] = 0xEC; // precision
    packet
}

/// Transmit timestamp seconds of a server reply.
pub fn transmit_seconds(reply: &[u8; PACKET_LEN]) -> u32 {
    u32::from_be_bytes([
        reply[TRANSMIT_SECONDS],
        reply[TRANSMIT_SECONDS + 1],
        reply[TRANSMIT_SECONDS + 2],
        reply[TRANSMIT_SECONDS + 3],
    ])
}

/// NTP seconds to local Unix seconds.
pub fn to_unix(ntp_seconds: u32, utc_offset_secs: i32) -> u32 {
    ntp_seconds
        .wrapping_sub(UNIX_OFFSET)
        .wrapping_add_signed(utc_offset_secs)
}

/// Ask `server` for the time. Returns local Unix seconds.
pub async fn get_seconds<T: Transport>(transport: &mut T, server: &TimeServer) -> Result<u32, NetError> {
    transport
        .connect(Endpoint::udp(server.host, server.port))
        .await?;

    let result = exchange(transport).await;
    if let Err(e) = transport.close().await {
        debug!("closing time server link failed: {}", e);
    }
    let ntp = result?;
    if ntp < UNIX_OFFSET {
        return Err(NetError::Protocol);
    }
    Ok(to_unix(ntp, server.utc_offset_secs))
}

async fn exchange<T: Transport>(transport: &mut T) -> Result<u32, NetError> {
    transport.send(&request()).await?;
    let mut reply = [0u8; PACKET_LEN];
    transport.receive_exact(&mut reply).await?;
    Ok(transmit_seconds(&reply))
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn request_header() {
        let r = request();
        assert_eq!(&r[..4], &[0xE3, 0, 6, 0xEC]);
        assert!(r[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn converts_to_local_unix() {
        let mut reply = [0u8; PACKET_LEN];
        reply[40..44].copy_from_slice(&(UNIX_OFFSET + 1_000).to_be_bytes());
        assert_eq!(transmit_seconds(&reply), UNIX_OFFSET + 1_000);
        assert_eq!(to_unix(transmit_seconds(&reply), 3600), 4_600);
        assert_eq!(to_unix(UNIX_OFFSET + 10, -5), 5);
    }

    /// Answers every request with one canned reply.
    struct Server {
        reply: Option<[u8; PACKET_LEN]>,
        sent: usize,
        closed: bool,
    }

    impl Transport for Server {
        async fn connect(&mut self, endpoint: Endpoint<'_>) -> Result<(), NetError> {
            assert_eq!(endpoint.port, 123);
            Ok(())
        }

        async fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
            self.sent += data.len();
            Ok(data.len())
        }

        async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
            let reply = self.reply.take().ok_or(NetError::Timeout)?;
            buf[..PACKET_LEN].copy_from_slice(&reply);
            Ok(PACKET_LEN)
        }

        async fn close(&mut self) -> Result<(), NetError> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn query_round_trip() {
        let mut reply = [0u8; PACKET_LEN];
        reply[40..44].copy_from_slice(&(UNIX_OFFSET + 1_623_760_496).to_be_bytes());
        let mut server = Server {
            reply: Some(reply),
            sent: 0,
            closed: false,
        };
        let secs = block_on(get_seconds(&mut server, &TimeServer::DEFAULT)).unwrap();
        assert_eq!(secs, 1_623_760_496 + 3600);
        assert_eq!(server.sent, PACKET_LEN);
        assert!(server.closed);
    }

    #[test]
    fn timeout_is_reported_and_link_closed() {
        let mut server = Server {
            reply: None,
            sent: 0,
            closed: false,
        };
        assert_eq!(
            block_on(get_seconds(&mut server, &TimeServer::DEFAULT)),
            Err(NetError::Timeout)
        );
        assert!(server.closed);
    }
}
