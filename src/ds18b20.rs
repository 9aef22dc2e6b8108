use byteorder::{ByteOrder, LittleEndian};
use std::{fmt::Debug, thread, time::Duration};

use crate::{Address, Device, Driver, Error, OpCode, Transport};

/// DS18B20 function commands.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Worst-case 12-bit conversion time. The scratchpad holds nothing valid
/// before this has elapsed; there is no early or partial read.
pub const CONVERSION_DELAY: Duration = Duration::from_millis(750);

/// A DS18B20 digital thermometer, addressed by its ROM ID.
#[derive(Debug, Clone, Copy)]
pub struct Ds18b20 {
    address: Address,
}

impl From<Ds18b20> for Address {
    fn from(device: Ds18b20) -> Self {
        device.address
    }
}

impl Ds18b20 {
    /// Runs one conversion on this device and reads the result back, in
    /// degrees Celsius. Blocks for the full conversion time.
    pub fn read_temperature<E: Debug, T: Transport<Error = E>>(
        &self,
        driver: &mut Driver<T>,
    ) -> Result<f32, Error<E>> {
        self.read_temperature_raw(driver).map(celsius_from_raw)
    }

    /// As [`read_temperature`](Self::read_temperature), returning the raw
    /// scratchpad word.
    pub fn read_temperature_raw<E: Debug, T: Transport<Error = E>>(
        &self,
        driver: &mut Driver<T>,
    ) -> Result<u16, Error<E>> {
        driver.reset_select_write_only(&self.address, &[Command::Convert.op_code()])?;
        thread::sleep(CONVERSION_DELAY);

        let mut temperature = [0u8; 2];
        driver.reset_select_write_read(
            &self.address,
            &[Command::ReadScratchpad.op_code()],
            &mut temperature,
        )?;

        // cut the remaining scratchpad bytes off instead of clocking them out
        driver.reset_presence()?;

        Ok(LittleEndian::read_u16(&temperature))
    }
}

/// Converts and reads the lone device on the bus without addressing it
/// (Skip-ROM). Only valid with exactly one device connected; with more,
/// their scratchpad replies collide.
pub fn read_temperature_sole<E: Debug, T: Transport<Error = E>>(
    driver: &mut Driver<T>,
) -> Result<f32, Error<E>> {
    driver.reset_skip_write_only(&[Command::Convert.op_code()])?;
    thread::sleep(CONVERSION_DELAY);

    let mut temperature = [0u8; 2];
    driver.reset_skip_write_read(&[Command::ReadScratchpad.op_code()], &mut temperature)?;

    driver.reset_presence()?;

    Ok(celsius_from_raw(LittleEndian::read_u16(&temperature)))
}

impl Device for Ds18b20 {
    const FAMILY_CODE: u8 = 0x28;

    fn address(&self) -> &Address {
        &self.address
    }

    unsafe fn from_address_unchecked(address: Address) -> Self {
        Self { address }
    }
}

/// Decode the raw scratchpad word into degrees Celsius.
///
/// The word is a signed two's-complement fixed-point value in 1/16 degC
/// steps; readings below zero depend on the sign extension here.
pub fn celsius_from_raw(raw: u16) -> f32 {
    raw as i16 as f32 / 16.0
}

/// Split a raw value into whole degrees and a fraction scaled by 10000,
/// so `integer + fraction / 10000` reconstructs it without floats.
pub fn split_temp(temperature: u16) -> (i16, i16) {
    if temperature < 0x8000 {
        (temperature as i16 >> 4, (temperature as i16 & 0xF) * 625)
    } else {
        let abs = -(temperature as i16);
        (-(abs >> 4), -625 * (abs & 0xF))
    }
}
