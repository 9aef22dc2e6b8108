use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error as ThisError;

/// Baud rate for reset and presence detection: the 0xF0 frame stretches
/// into the 480 us reset pulse.
const RESET_BAUD: u32 = 9600;
/// Baud rate for data time slots: one frame per bit slot.
const DATA_BAUD: u32 = 115_200;

/// Symmetric send/receive timeout. Exceeding it fails the exchange for
/// good; retrying is the caller's call.
const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Baud-rate mode of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudMode {
    /// Low rate, for bus reset and presence detection
    Reset,
    /// High rate, for bit time slots
    Data,
}

/// Exclusive-access byte channel to the bus adapter.
///
/// Every bus time slot is one exchange: send a byte, read back the byte
/// seen on the wire. The pair must complete before the next exchange is
/// issued; the slot framing has no other synchronization.
pub trait Transport {
    type Error: std::fmt::Debug;

    /// Switch the link to the given baud-rate mode.
    fn set_mode(&mut self, mode: BaudMode) -> Result<(), Self::Error>;

    /// Send one byte and read back its echo off the bus.
    fn exchange(&mut self, tx: u8) -> Result<u8, Self::Error>;
}

/// Serial transport errors
#[derive(Debug, ThisError)]
pub enum SerialError {
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("serial I/O failed: {0}")]
    Io(std::io::Error),
    #[error("exchange timed out")]
    Timeout,
}

impl From<std::io::Error> for SerialError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            SerialError::Timeout
        } else {
            SerialError::Io(e)
        }
    }
}

/// A UART adapter on a serial device (DS9097 style).
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the adapter on the given serial device path.
    ///
    /// The port starts out in reset mode; 8 data bits, no parity, one stop
    /// bit, no flow control.
    pub fn open(path: &str) -> Result<Self, SerialError> {
        let port = serialport::new(path, RESET_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(EXCHANGE_TIMEOUT)
            .open()?;

        log::info!("opened 1-wire adapter on {}", path);

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    type Error = SerialError;

    fn set_mode(&mut self, mode: BaudMode) -> Result<(), SerialError> {
        match mode {
            BaudMode::Reset => {
                // drop whatever an aborted sequence left in the buffers
                self.port.clear(ClearBuffer::All)?;
                self.port.set_baud_rate(RESET_BAUD)?;
            }
            BaudMode::Data => {
                self.port.set_baud_rate(DATA_BAUD)?;
            }
        }
        Ok(())
    }

    fn exchange(&mut self, tx: u8) -> Result<u8, SerialError> {
        self.port.write_all(&[tx])?;
        let mut rx = [0u8; 1];
        self.port.read_exact(&mut rx)?;
        log::trace!("exchange {:#04x} -> {:#04x}", tx, rx[0]);
        Ok(rx[0])
    }
}
