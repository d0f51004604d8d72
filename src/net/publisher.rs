//! Delivers finished scores to the MQTT broker.
//!
//! Each delivery walks `Idle → Init → Connect → WaitConnect → Publish →
//! Disconnect → Idle`. A failure anywhere between Init and Publish drops the
//! link and starts over from Init, forever, until the score is out or the
//! stop flag is raised.

use embassy_futures::select::{
    Either,
    select,
};
use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::Receiver,
    mutex::Mutex,
};

use super::{
    mqtt::{
        self,
        Connect,
        MqttError,
        Packet,
        Version,
    },
    transport::{
        Endpoint,
        Transport,
    },
};
use crate::{
    config::Broker,
    session::StopFlag,
};

/// Frames skipped while waiting for CONNACK before giving up on the attempt.
const MAX_FRAMES_BEFORE_CONNACK: usize = 8;
const FRAME_MAX: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetState {
    /// Waiting for a score.
    Idle,
    /// Opening the transport to the broker.
    Init,
    /// Sending CONNECT.
    Connect,
    /// Reading frames until CONNACK.
    WaitConnect,
    /// Sending the score.
    Publish,
    /// Closing the transport.
    Disconnect,
}

pub struct Publisher {
    broker: Broker,
    version: Version,
    state: NetState,
    link_open: bool,
    attempts: u32,
}

impl Publisher {
    pub const fn new(broker: Broker) -> Self {
        Self {
            broker,
            version: Version::V31,
            state: NetState::Idle,
            link_open: false,
            attempts: 0,
        }
    }

    pub const fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub const fn state(&self) -> NetState {
        self.state
    }

    /// Connection attempts made for the current or last delivery.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run one state of the delivery of `score` and return the next state.
    pub async fn advance<T: Transport>(&mut self, transport: &mut T, score: u32) -> NetState {
        let next = match self.state {
            NetState::Idle => NetState::Init,
            NetState::Init => self.open(transport).await,
            NetState::Connect => self.send_connect(transport).await,
            NetState::WaitConnect => self.wait_connack(transport).await,
            NetState::Publish => self.publish(transport, score).await,
            NetState::Disconnect => self.disconnect(transport).await,
        };
        trace!("publisher {} -> {}", self.state, next);
        self.state = next;
        next
    }

    /// Drive one delivery to completion. Returns `false` if `stop` was
    /// raised before the score went out.
    pub async fn deliver<M: RawMutex, T: Transport>(
        &mut self,
        transport: &mut T,
        score: u32,
        stop: &StopFlag<M>,
    ) -> bool {
        self.state = NetState::Idle;
        self.attempts = 0;
        loop {
            if self.state == NetState::Init && stop.is_stopped() {
                self.drop_link(transport).await;
                self.state = NetState::Idle;
                return false;
            }
            if self.advance(transport, score).await == NetState::Idle {
                info!("score {} published after {} attempt(s)", score, self.attempts);
                return true;
            }
        }
    }

    /// Publish every score arriving on `scores` until `stop` is raised. The
    /// modem stays locked for the whole of each delivery.
    pub async fn run<M: RawMutex, T: Transport, const N: usize>(
        &mut self,
        scores: Receiver<'_, M, u32, N>,
        modem: &Mutex<M, T>,
        stop: &StopFlag<M>,
    ) {
        while !stop.is_stopped() {
            let score = match select(scores.receive(), stop.wait()).await {
                Either::First(score) => score,
                Either::Second(()) => break,
            };
            let mut transport = modem.lock().await;
            self.deliver(&mut *transport, score, stop).await;
        }
        debug!("publisher stopped");
    }

    async fn drop_link<T: Transport>(&mut self, transport: &mut T) {
        if self.link_open {
            let _ = transport.close().await;
            self.link_open = false;
        }
    }

    /// Say goodbye to the broker and close the link. The score is already
    /// out, so the link is considered gone whatever either step reports.
    async fn disconnect<T: Transport>(&mut self, transport: &mut T) -> NetState {
        let mut frame = [0u8; 2];
        let sent = match mqtt::encode_disconnect(&mut frame) {
            Ok(len) => transport.send(&frame[..len]).await.map_err(MqttError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!("sending DISCONNECT failed: {}", e);
        }
        if let Err(e) = transport.close().await {
            debug!("closing broker link failed: {}", e);
        }
        self.link_open = false;
        NetState::Idle
    }

    async fn open<T: Transport>(&mut self, transport: &mut T) -> NetState {
        // Start from a clean link so nothing from a failed attempt leaks in.
        self.drop_link(transport).await;
        self.attempts += 1;
        let endpoint = Endpoint::tcp(self.broker.host, self.broker.port, self.broker.keep_alive_secs);
        match transport.connect(endpoint).await {
            Ok(()) => {
                self.link_open = true;
                NetState::Connect
            }
            Err(e) => {
                warn!("broker connect failed: {}", e);
                NetState::Init
            }
        }
    }

    async fn send_connect<T: Transport>(&mut self, transport: &mut T) -> NetState {
        let connect = Connect {
            client_id: self.broker.token,
            username: Some(self.broker.token),
            password: None,
            keep_alive_secs: self.broker.keep_alive_secs.saturating_mul(2),
        };
        let mut frame = [0u8; FRAME_MAX];
        let sent = match mqtt::encode_connect(&connect, self.version, &mut frame) {
            Ok(len) => transport.send(&frame[..len]).await.map_err(MqttError::from),
            Err(e) => Err(e),
        };
        match sent {
            Ok(_) => NetState::WaitConnect,
            Err(e) => {
                warn!("sending CONNECT failed: {}", e);
                NetState::Init
            }
        }
    }

    async fn wait_connack<T: Transport>(&mut self, transport: &mut T) -> NetState {
        for _ in 0..MAX_FRAMES_BEFORE_CONNACK {
            match mqtt::read_packet(transport).await {
                Ok(Packet::ConnAck { code: 0, .. }) => return NetState::Publish,
                Ok(Packet::ConnAck { code, .. }) => {
                    warn!("broker refused connection: {}", MqttError::Refused(code));
                    return NetState::Init;
                }
                Ok(Packet::Other(kind)) => trace!("skipping frame type {}", kind),
                Err(e) => {
                    warn!("waiting for CONNACK failed: {}", e);
                    return NetState::Init;
                }
            }
        }
        NetState::Init
    }

    async fn publish<T: Transport>(&mut self, transport: &mut T, score: u32) -> NetState {
        let payload = mqtt::score_payload(self.broker.group, score);
        let mut frame = [0u8; FRAME_MAX];
        let sent = match mqtt::encode_publish(self.broker.topic, payload.as_bytes(), &mut frame) {
            Ok(len) => transport.send(&frame[..len]).await.map_err(MqttError::from),
            Err(e) => Err(e),
        };
        match sent {
            Ok(_) => NetState::Disconnect,
            Err(e) => {
                warn!("publishing failed: {}", e);
                NetState::Init
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use heapless::Vec;

    use super::*;
    use crate::{
        config::NetConfig,
        net::transport::NetError,
    };

    /// Broker that accepts every step and answers with a fixed CONNACK.
    struct FakeBroker {
        inbox: Vec<u8, 16>,
        sent: usize,
        connects: usize,
        closes: usize,
        fail_close: bool,
    }

    impl FakeBroker {
        fn new(fail_close: bool) -> Self {
            Self {
                inbox: Vec::new(),
                sent: 0,
                connects: 0,
                closes: 0,
                fail_close,
            }
        }
    }

    impl Transport for FakeBroker {
        async fn connect(&mut self, _endpoint: Endpoint<'_>) -> Result<(), NetError> {
            self.connects += 1;
            Ok(())
        }

        async fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
            self.sent += 1;
            if data[0] == 0x10 {
                self.inbox.clear();
                let _ = self.inbox.extend_from_slice(&[0x20, 2, 0, 0]);
            }
            Ok(data.len())
        }

        async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
            if self.inbox.is_empty() {
                return Err(NetError::Timeout);
            }
            buf[0] = self.inbox.remove(0);
            Ok(1)
        }

        async fn close(&mut self) -> Result<(), NetError> {
            self.closes += 1;
            if self.fail_close { Err(NetError::Timeout) } else { Ok(()) }
        }
    }

    #[test]
    fn walks_every_state_once() {
        let mut p = Publisher::new(NetConfig::from_env().broker);
        let mut b = FakeBroker::new(false);
        let mut seen = [NetState::Idle; 6];
        block_on(async {
            for slot in &mut seen {
                *slot = p.advance(&mut b, 42).await;
            }
        });
        assert_eq!(
            seen,
            [
                NetState::Init,
                NetState::Connect,
                NetState::WaitConnect,
                NetState::Publish,
                NetState::Disconnect,
                NetState::Idle
            ]
        );
        // CONNECT, PUBLISH and DISCONNECT.
        assert_eq!((b.connects, b.sent, b.closes), (1, 3, 1));
    }

    #[test]
    fn close_failure_still_returns_to_idle() {
        let mut p = Publisher::new(NetConfig::from_env().broker);
        let mut b = FakeBroker::new(true);
        let stop = StopFlag::<NoopRawMutex>::new();
        assert!(block_on(p.deliver(&mut b, 7, &stop)));
        assert_eq!(p.state(), NetState::Idle);
        assert_eq!(p.attempts(), 1);
    }

    #[test]
    fn stop_abandons_delivery_between_attempts() {
        let mut p = Publisher::new(NetConfig::from_env().broker);
        let mut b = FakeBroker::new(false);
        let stop = StopFlag::<NoopRawMutex>::new();
        stop.stop();
        assert!(!block_on(p.deliver(&mut b, 7, &stop)));
        assert_eq!(b.connects, 0);
    }
}
