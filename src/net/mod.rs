//! Network side: the transport seam, the AT modem driver, MQTT framing, the
//! score publisher and boot-time clock sync.

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    mutex::Mutex,
};

use crate::{
    config::NetConfig,
    rtc::Rtc,
};

pub mod esp_at;
pub mod mqtt;
pub mod ntp;
pub mod publisher;
pub mod transport;

pub use publisher::{
    NetState,
    Publisher,
};
pub use transport::{
    NetError,
    Transport,
};

/// Boot-time network bring-up: join the access point, then set `rtc` from
/// the time server. On failure the clock is left as it was.
pub async fn bring_up<M: RawMutex, T: Transport, R: Rtc>(
    modem: &Mutex<M, T>,
    config: &NetConfig,
    rtc: &Mutex<M, R>,
) -> Result<u32, NetError> {
    let mut transport = modem.lock().await;
    transport
        .join(config.wifi.ssid, config.wifi.password)
        .await
        .inspect_err(|e| warn!("joining {=str} failed: {}", config.wifi.ssid, e))?;

    let seconds = ntp::get_seconds(&mut *transport, &config.time)
        .await
        .inspect_err(|e| warn!("time sync failed: {}", e))?;
    drop(transport);

    rtc.lock().await.set_seconds(seconds);
    info!("clock set to {} (unix, local)", seconds);
    Ok(seconds)
}
