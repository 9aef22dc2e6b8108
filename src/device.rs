use crate::{Address, Driver, Error, Transport};
use std::fmt::Debug;

/// Generic device interface
pub trait Device: Sized {
    /// Device family code
    const FAMILY_CODE: u8;

    /// Get device address
    fn address(&self) -> &Address;

    /// Instantiate the device from an address without checks
    ///
    /// # Safety
    ///
    /// The address is not checked against the device family; the caller
    /// asserts they belong together.
    unsafe fn from_address_unchecked(address: Address) -> Self;

    /// Instantiate the device from an address, checking the family code
    fn from_address<E: Debug>(address: Address) -> Result<Self, Error<E>> {
        if address.family_code() != Self::FAMILY_CODE {
            Err(Error::FamilyCodeMismatch(
                Self::FAMILY_CODE,
                address.family_code(),
            ))
        } else {
            Ok(unsafe { Self::from_address_unchecked(address) })
        }
    }

    /// First device of this family found on the bus, if any
    fn search_first<E: Debug, T: Transport<Error = E>>(
        driver: &mut Driver<T>,
    ) -> Result<Option<Self>, Error<E>> {
        Address::search_first(driver, Self::FAMILY_CODE)
            .map(|res| res.map(|address| unsafe { Self::from_address_unchecked(address) }))
    }
}
