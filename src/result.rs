use std::fmt::Debug;
use thiserror::Error as ThisError;

/// Error type
#[derive(Debug, ThisError)]
pub enum Error<E: Debug> {
    /// Reset echoed back idle-high: nothing holds the line up, not even a
    /// pull-up resistor
    #[error("1-wire line is open, no pull-up detected")]
    WireFault,
    /// Reset came back unchanged: the wiring is fine but nobody answered
    #[error("no presence pulse on the bus")]
    NoPresence,
    #[error("crc mismatch: computed {0:#04x}, received {1:#04x}")]
    CrcMismatch(u8, u8),
    #[error("family code mismatch: expected {0:#04x}, found {1:#04x}")]
    FamilyCodeMismatch(u8, u8),
    /// Fault in the underlying serial link
    #[error("transport error: {0:?}")]
    Port(E),
}

impl<E: Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Port(e)
    }
}
