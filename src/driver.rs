use crate::{Address, BaudMode, Command, Error, OpCode, Transport};
use std::fmt::Debug;

/// Reset frame: at the low baud rate the four zero bits stretch into the
/// reset pulse, and a slave answering presence shortens the echo.
const RESET_PULSE: u8 = 0xF0;
/// Echo when nothing drives the line at all.
const ECHO_OPEN: u8 = 0xFF;

/// Full-width low frame, read back as a written 0.
const SLOT_ZERO: u8 = 0x00;
/// Short low pulse; a slave may hold the rest of the slot low.
const SLOT_ONE: u8 = 0xFF;

/// Bus master over a byte-exchange transport.
///
/// Owns the transport exclusively: the bus has no framing, so interleaved
/// exchanges from a second caller would corrupt the slot sequence.
pub struct Driver<T: Transport> {
    transport: T,
}

impl<E: Debug, T: Transport<Error = E>> Driver<T> {
    pub fn new(transport: T) -> Self {
        Driver { transport }
    }

    /// Resets the bus and listens for a presence pulse.
    ///
    /// Returns `Err(WireFault)` if nothing holds the line up and
    /// `Err(NoPresence)` if the line is fine but no device answered. On
    /// success the transport is left in data mode; every subsequent bus
    /// operation requires this.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.transport.set_mode(BaudMode::Reset)?;
        let echo = self.transport.exchange(RESET_PULSE)?;
        match echo {
            ECHO_OPEN => Err(Error::WireFault),
            RESET_PULSE => Err(Error::NoPresence),
            _ => {
                log::debug!("presence pulse, reset echo {:#04x}", echo);
                self.transport.set_mode(BaudMode::Data)?;
                Ok(())
            }
        }
    }

    /// As [`reset`](Self::reset), but folds both bus-level failures into
    /// `Ok(false)`. Transport faults stay errors.
    pub fn reset_presence(&mut self) -> Result<bool, Error<E>> {
        match self.reset() {
            Ok(()) => Ok(true),
            Err(Error::WireFault | Error::NoPresence) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Sends one time slot; returns the echoed byte so a read can sample
    /// the bus state within the slot.
    pub(crate) fn write_bit(&mut self, bit: bool) -> Result<u8, Error<E>> {
        let slot = if bit { SLOT_ONE } else { SLOT_ZERO };
        Ok(self.transport.exchange(slot)?)
    }

    /// Issues a write-1 slot, which lets a responding device pull the line
    /// low inside the sample window, and samples the echo.
    pub(crate) fn read_bit(&mut self) -> Result<bool, Error<E>> {
        let echo = self.write_bit(true)?;
        Ok(echo & 0x01 == 0x01)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(byte & 0x01 == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, Error<E>> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit()? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        for b in bytes {
            self.write_byte(*b)?;
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), Error<E>> {
        for d in dst {
            *d = self.read_byte()?;
        }
        Ok(())
    }

    pub fn write_command(&mut self, cmd: impl OpCode) -> Result<(), Error<E>> {
        self.write_byte(cmd.op_code())
    }

    /// Addresses one device by its ROM ID (Match-ROM).
    pub fn select(&mut self, addr: &Address) -> Result<(), Error<E>> {
        self.write_command(Command::MatchRom)?;
        self.write_bytes(addr.as_ref())
    }

    /// Addresses whatever is on the bus without an ID (Skip-ROM). Only
    /// meaningful with a single device connected.
    pub fn skip(&mut self) -> Result<(), Error<E>> {
        self.write_command(Command::SkipRom)
    }

    pub fn reset_select_write_only(
        &mut self,
        addr: &Address,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset()?;
        self.select(addr)?;
        self.write_bytes(write)
    }

    pub fn reset_select_write_read(
        &mut self,
        addr: &Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset()?;
        self.select(addr)?;
        self.write_bytes(write)?;
        self.read_bytes(read)
    }

    pub fn reset_skip_write_only(&mut self, write: &[u8]) -> Result<(), Error<E>> {
        self.reset()?;
        self.skip()?;
        self.write_bytes(write)
    }

    pub fn reset_skip_write_read(
        &mut self,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset()?;
        self.skip()?;
        self.write_bytes(write)?;
        self.read_bytes(read)
    }
}
