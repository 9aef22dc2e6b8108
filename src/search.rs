use crate::{crc8_update, Address, Command, Driver, Error, Transport};
use std::fmt::Debug;

/// State of one bus enumeration: the ROM bits decided so far and the
/// branch point to revisit on the next pass.
///
/// One value belongs to one bus. It is left alone between passes so the
/// search can resume where it branched, and only the search operations
/// below transition it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSearch {
    rom_no: [u8; Address::BYTES as usize],
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device_flag: bool,
}

impl DeviceSearch {
    pub fn new() -> DeviceSearch {
        DeviceSearch::default()
    }

    /// ROM ID produced by the most recent successful pass.
    pub fn address(&self) -> Address {
        Address::from(self.rom_no)
    }

    /// True once a pass found a device with no branch left to revisit;
    /// the next pass reports nothing and starts the enumeration over.
    pub fn is_exhausted(&self) -> bool {
        self.last_device_flag
    }

    pub fn last_discrepancy(&self) -> u8 {
        self.last_discrepancy
    }

    fn reset_state(&mut self) {
        self.last_discrepancy = 0;
        self.last_family_discrepancy = 0;
        self.last_device_flag = false;
    }

    /// Restricts the next pass to devices of one family.
    pub fn target_family(&mut self, family_code: u8) {
        self.rom_no = [family_code, 0, 0, 0, 0, 0, 0, 0];
        self.last_discrepancy = Address::BITS;
        self.last_family_discrepancy = 0;
        self.last_device_flag = false;
    }

    /// Abandons the family being enumerated; the next pass resumes at the
    /// last branch point outside its family-code bits.
    pub fn skip_family(&mut self) {
        self.last_discrepancy = self.last_family_discrepancy;
        self.last_family_discrepancy = 0;
        if self.last_discrepancy == 0 {
            self.last_device_flag = true;
        }
    }

    pub fn into_iter<T: Transport>(self, driver: &mut Driver<T>) -> DeviceSearchIter<'_, T> {
        DeviceSearchIter {
            search: Some(self),
            driver,
        }
    }
}

pub struct DeviceSearchIter<'a, T: Transport> {
    search: Option<DeviceSearch>,
    driver: &'a mut Driver<T>,
}

impl<E: Debug, T: Transport<Error = E>> Iterator for DeviceSearchIter<'_, T> {
    type Item = Result<Address, Error<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut search = self.search.take()?;
        let result = self.driver.search_next(&mut search).transpose()?;
        self.search = Some(search);
        Some(result)
    }
}

impl<E: Debug, T: Transport<Error = E>> Driver<T> {
    /// Finds the first device on the bus, restarting the enumeration.
    pub fn search_first(
        &mut self,
        search: &mut DeviceSearch,
    ) -> Result<Option<Address>, Error<E>> {
        search.reset_state();
        self.search(search)
    }

    /// Finds the next device, resuming from the recorded branch point.
    pub fn search_next(
        &mut self,
        search: &mut DeviceSearch,
    ) -> Result<Option<Address>, Error<E>> {
        self.search(search)
    }

    /// Enumerates every device on the bus, in search order.
    ///
    /// An empty or unreachable bus yields an empty list; only transport
    /// faults surface as errors.
    pub fn discover(&mut self) -> Result<Vec<Address>, Error<E>> {
        let mut search = DeviceSearch::new();
        let mut devices = Vec::new();
        let mut found = self.search_first(&mut search)?;
        while let Some(address) = found {
            devices.push(address);
            found = self.search_next(&mut search)?;
        }
        Ok(devices)
    }

    /// Checks that the device with the given ROM ID is present, without
    /// disturbing an enumeration in progress: the state is restored no
    /// matter how the probe pass ends.
    pub fn verify(
        &mut self,
        search: &mut DeviceSearch,
        address: &Address,
    ) -> Result<bool, Error<E>> {
        let backup = search.clone();

        // a pass with the discrepancy pinned past the last bit replays the
        // seeded ROM exactly, finding the candidate or nothing
        search.rom_no = **address;
        search.last_discrepancy = Address::BITS;
        search.last_device_flag = false;

        let outcome = self.search(search);
        *search = backup;

        match outcome {
            Ok(Some(found)) => Ok(found == *address),
            Ok(None) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// One pass of the ROM search algorithm (Maxim application note 187):
    /// walk all 64 ID bits, resolving each collision towards the branch
    /// the state dictates, and drive non-matching devices off the bus.
    pub(crate) fn search(
        &mut self,
        search: &mut DeviceSearch,
    ) -> Result<Option<Address>, Error<E>> {
        let mut id_bit_number: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut rom_byte_number: usize = 0;
        let mut rom_byte_mask: u8 = 1;
        let mut crc8: u8 = 0;
        let mut found = false;

        if !search.last_device_flag {
            if !self.reset_presence()? {
                search.reset_state();
                return Ok(None);
            }

            self.write_command(Command::SearchRom)?;

            while rom_byte_number < Address::BYTES as usize {
                let id_bit = self.read_bit()?;
                let cmp_id_bit = self.read_bit()?;

                // 1,1: nobody is answering any more, give up on this pass
                if id_bit && cmp_id_bit {
                    break;
                }

                let search_direction = if id_bit != cmp_id_bit {
                    // every remaining device agrees on this bit
                    id_bit
                } else {
                    // collision between devices on both branches
                    let direction = if id_bit_number < search.last_discrepancy {
                        // replay the choice of the previous pass
                        search.rom_no[rom_byte_number] & rom_byte_mask != 0
                    } else {
                        // take the 1-branch at the old fork, 0 at a new one
                        id_bit_number == search.last_discrepancy
                    };
                    if !direction {
                        last_zero = id_bit_number;
                        if last_zero < 9 {
                            search.last_family_discrepancy = last_zero;
                        }
                    }
                    direction
                };

                if search_direction {
                    search.rom_no[rom_byte_number] |= rom_byte_mask;
                } else {
                    search.rom_no[rom_byte_number] &= !rom_byte_mask;
                }

                // devices on the other branch drop out here
                self.write_bit(search_direction)?;

                id_bit_number += 1;
                rom_byte_mask <<= 1;

                if rom_byte_mask == 0 {
                    crc8 = crc8_update(crc8, search.rom_no[rom_byte_number]);
                    rom_byte_number += 1;
                    rom_byte_mask = 1;
                }
            }

            if id_bit_number > Address::BITS && crc8 == 0 {
                search.last_discrepancy = last_zero;
                if search.last_discrepancy == 0 {
                    search.last_device_flag = true;
                }
                found = true;
            }
        }

        if !found || search.rom_no[0] == 0 {
            search.reset_state();
            return Ok(None);
        }

        let address = search.address();
        log::debug!("found device {}", address);
        Ok(Some(address))
    }
}
