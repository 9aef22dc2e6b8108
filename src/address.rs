use crate::{DeviceSearch, Driver, Error, Transport};
use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
    str::FromStr,
};
use thiserror::Error as ThisError;

/// 64-bit ROM ID: byte 0 is the family code, bytes 1-6 the serial number,
/// byte 7 the CRC8 over the first seven.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq)]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl Default for Address {
    fn default() -> Self {
        Self::from([0; Self::BYTES as usize])
    }
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for Address {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl AsMut<[u8]> for Address {
    fn as_mut(&mut self) -> &mut [u8] {
        self.deref_mut() as _
    }
}

impl Address {
    /// The length of a device address in bytes
    pub const BYTES: u8 = 8;

    /// The length of a device address in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    /// CRC8 over the family code and serial number. A valid ID carries
    /// this value in its last byte.
    pub fn crc8(&self) -> u8 {
        crate::compute_crc8(&self[..7])
    }

    /// Whether the stored CRC byte matches the first seven bytes.
    pub fn is_valid(&self) -> bool {
        crate::compute_crc8(self.as_ref()) == 0
    }

    pub fn ensure_valid<E: Debug>(&self) -> Result<(), Error<E>> {
        let computed = self.crc8();
        if computed != self[7] {
            Err(Error::CrcMismatch(computed, self[7]))
        } else {
            Ok(())
        }
    }

    /// First device of the given family found on the bus, if any.
    pub fn search_first<E: Debug, T: Transport<Error = E>>(
        driver: &mut Driver<T>,
        family_code: u8,
    ) -> Result<Option<Self>, Error<E>> {
        let mut search = DeviceSearch::new();
        while let Some(address) = driver.search_next(&mut search)? {
            if family_code == address.family_code() {
                return Ok(Some(address));
            }
        }
        Ok(None)
    }
}

/// Error type
#[derive(Debug, ThisError)]
pub enum AddressError {
    #[error("address literal is too short")]
    NotEnough,
    #[error("address literal is not hex")]
    Invalid,
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        if !hex.is_ascii() {
            return Err(AddressError::Invalid);
        }
        if hex.len() < Self::BYTES as usize * 2 {
            return Err(AddressError::NotEnough);
        }

        let mut addr = Address::default();
        for i in 0..Self::BYTES as usize {
            addr[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| AddressError::Invalid)?;
        }

        Ok(addr)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}
