//! UART link to the ESP-AT Wi-Fi modem.

use embassy_time::{
    Duration,
    with_timeout,
};
use esp_hal::{
    Async,
    uart::{
        Config,
        Uart,
    },
};

use crate::{
    board::ModemResources,
    net::esp_at::Serial,
};

const BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    Tx,
    Rx,
}

pub struct UartSerial {
    uart: Uart<'static, Async>,
}

impl From<ModemResources<'static>> for UartSerial {
    fn from(res: ModemResources<'static>) -> Self {
        let uart = Uart::new(res.uart, Config::default().with_baudrate(BAUD_RATE))
            .unwrap()
            .with_tx(res.tx)
            .with_rx(res.rx)
            .into_async();
        Self { uart }
    }
}

impl Serial for UartSerial {
    type Error = UartError;

    async fn write(&mut self, mut data: &[u8]) -> Result<(), UartError> {
        while !data.is_empty() {
            let n = self.uart.write_async(data).await.map_err(|_| UartError::Tx)?;
            data = &data[n..];
        }
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, UartError> {
        let mut byte = [0u8; 1];
        match with_timeout(timeout, self.uart.read_async(&mut byte)).await {
            Ok(Ok(0)) | Err(_) => Ok(None),
            Ok(Ok(_)) => Ok(Some(byte[0])),
            Ok(Err(_)) => Err(UartError::Rx),
        }
    }
}
