#![allow(dead_code)]

//! Bit-slot simulation of a 1-Wire bus behind a UART adapter.
//!
//! Models what the real electrical bus does one time slot at a time:
//! wired-AND arbitration on read slots, per-device ROM state machines with
//! search drop-out, Match-ROM/Skip-ROM selection and scratchpad shift-out.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use onewire_serial::{compute_crc8, BaudMode, Transport};

const RESET_PULSE: u8 = 0xF0;
const ECHO_OPEN: u8 = 0xFF;
/// A slave shortening the reset echo; any value besides 0xFF/0xF0 works.
const ECHO_PRESENCE: u8 = 0xE0;

const ROM_BITS: u8 = 64;
const SCRATCHPAD_BITS: usize = 72;

/// Electrical state of the line, as seen at reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Powered and pulled up
    Pulled,
    /// Nothing wired up at all; the receiver idles high
    Open,
}

/// Builds a ROM ID with a correct trailing CRC byte.
pub fn rom_id(family: u8, serial: [u8; 6]) -> [u8; 8] {
    let mut rom = [0u8; 8];
    rom[0] = family;
    rom[1..7].copy_from_slice(&serial);
    rom[7] = compute_crc8(&rom[..7]);
    rom
}

/// Builds a scratchpad image holding the given raw temperature word.
pub fn scratchpad_for(raw: u16) -> [u8; 9] {
    let mut pad = [0u8; 9];
    pad[0] = (raw & 0xFF) as u8;
    pad[1] = (raw >> 8) as u8;
    pad[4] = 0x7F; // configuration register, 12-bit
    pad[8] = compute_crc8(&pad[..8]);
    pad
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy)]
enum SearchPhase {
    WriteBit,
    WriteComplement,
    ReadDirection,
}

#[derive(Debug, Clone, Copy)]
enum DeviceState {
    /// Waiting for a ROM command after reset
    RomCommand { bits: u8, count: u8 },
    /// Participating in a search pass
    Search { bit_index: u8, phase: SearchPhase },
    /// Comparing its ROM ID against a Match-ROM, bit by bit
    MatchRom { bit_index: u8 },
    /// Selected, waiting for a function command
    FunctionCommand { bits: u8, count: u8 },
    /// Shifting out scratchpad bits
    TransmitScratchpad { bit_index: usize },
    /// Out of the conversation until the next reset
    Idle,
}

struct SimDevice {
    rom: [u8; 8],
    scratchpad: [u8; 9],
    state: DeviceState,
}

impl SimDevice {
    fn rom_bit(&self, index: u8) -> bool {
        self.rom[(index / 8) as usize] >> (index % 8) & 0x01 == 0x01
    }

    fn scratchpad_bit(&self, index: usize) -> bool {
        self.scratchpad[index / 8] >> (index % 8) & 0x01 == 0x01
    }

    /// The level this device drives in the current slot, if it is
    /// transmitting rather than sampling.
    fn output(&self) -> Option<bool> {
        match self.state {
            DeviceState::Search {
                bit_index,
                phase: SearchPhase::WriteBit,
            } => Some(self.rom_bit(bit_index)),
            DeviceState::Search {
                bit_index,
                phase: SearchPhase::WriteComplement,
            } => Some(!self.rom_bit(bit_index)),
            DeviceState::TransmitScratchpad { bit_index } if bit_index < SCRATCHPAD_BITS => {
                Some(self.scratchpad_bit(bit_index))
            }
            _ => None,
        }
    }

    /// Advance the state machine once the slot's final bus level is known.
    fn advance(&mut self, bus_bit: bool) {
        self.state = match self.state {
            DeviceState::RomCommand { bits, count } => {
                let bits = bits | (u8::from(bus_bit) << count);
                if count == 7 {
                    match bits {
                        0xF0 => DeviceState::Search {
                            bit_index: 0,
                            phase: SearchPhase::WriteBit,
                        },
                        0x55 => DeviceState::MatchRom { bit_index: 0 },
                        0xCC => DeviceState::FunctionCommand { bits: 0, count: 0 },
                        _ => DeviceState::Idle,
                    }
                } else {
                    DeviceState::RomCommand {
                        bits,
                        count: count + 1,
                    }
                }
            }
            DeviceState::Search { bit_index, phase } => match phase {
                SearchPhase::WriteBit => DeviceState::Search {
                    bit_index,
                    phase: SearchPhase::WriteComplement,
                },
                SearchPhase::WriteComplement => DeviceState::Search {
                    bit_index,
                    phase: SearchPhase::ReadDirection,
                },
                SearchPhase::ReadDirection => {
                    if bus_bit != self.rom_bit(bit_index) {
                        // the master went down the other branch
                        DeviceState::Idle
                    } else if bit_index + 1 == ROM_BITS {
                        // sole survivor of a full search is selected
                        DeviceState::FunctionCommand { bits: 0, count: 0 }
                    } else {
                        DeviceState::Search {
                            bit_index: bit_index + 1,
                            phase: SearchPhase::WriteBit,
                        }
                    }
                }
            },
            DeviceState::MatchRom { bit_index } => {
                if bus_bit != self.rom_bit(bit_index) {
                    DeviceState::Idle
                } else if bit_index + 1 == ROM_BITS {
                    DeviceState::FunctionCommand { bits: 0, count: 0 }
                } else {
                    DeviceState::MatchRom {
                        bit_index: bit_index + 1,
                    }
                }
            }
            DeviceState::FunctionCommand { bits, count } => {
                let bits = bits | (u8::from(bus_bit) << count);
                if count == 7 {
                    match bits {
                        0xBE => DeviceState::TransmitScratchpad { bit_index: 0 },
                        // conversion completes within the master's delay;
                        // the scratchpad image is preset
                        _ => DeviceState::Idle,
                    }
                } else {
                    DeviceState::FunctionCommand {
                        bits,
                        count: count + 1,
                    }
                }
            }
            DeviceState::TransmitScratchpad { bit_index } => {
                if bit_index + 1 >= SCRATCHPAD_BITS {
                    DeviceState::Idle
                } else {
                    DeviceState::TransmitScratchpad {
                        bit_index: bit_index + 1,
                    }
                }
            }
            DeviceState::Idle => DeviceState::Idle,
        };
    }
}

pub struct SimBus {
    devices: Vec<SimDevice>,
    line: Line,
    mode: BaudMode,
    exchanges: Rc<Cell<usize>>,
}

impl SimBus {
    pub fn new(line: Line) -> Self {
        SimBus {
            devices: Vec::new(),
            line,
            mode: BaudMode::Reset,
            exchanges: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_device(mut self, rom: [u8; 8], scratchpad: [u8; 9]) -> Self {
        self.devices.push(SimDevice {
            rom,
            scratchpad,
            state: DeviceState::Idle,
        });
        self
    }

    /// Handle on the exchange counter, usable after the bus moved into a
    /// driver. Lets tests assert that nothing else went over the wire.
    pub fn exchange_counter(&self) -> Rc<Cell<usize>> {
        self.exchanges.clone()
    }

    fn reset_pulse(&mut self) -> u8 {
        match self.line {
            Line::Open => ECHO_OPEN,
            Line::Pulled => {
                if self.devices.is_empty() {
                    RESET_PULSE
                } else {
                    for device in &mut self.devices {
                        device.state = DeviceState::RomCommand { bits: 0, count: 0 };
                    }
                    ECHO_PRESENCE
                }
            }
        }
    }

    fn slot(&mut self, tx: u8) -> u8 {
        let master_bit = tx == 0xFF;
        let mut bus_bit = master_bit;
        for device in &self.devices {
            if let Some(bit) = device.output() {
                bus_bit &= bit;
            }
        }
        for device in &mut self.devices {
            device.advance(bus_bit);
        }
        match (master_bit, bus_bit) {
            (true, true) => 0xFF,
            // a slave held the line low inside the slot
            (true, false) => 0xFE,
            (false, _) => 0x00,
        }
    }
}

impl Transport for SimBus {
    type Error = Infallible;

    fn set_mode(&mut self, mode: BaudMode) -> Result<(), Infallible> {
        self.mode = mode;
        Ok(())
    }

    fn exchange(&mut self, tx: u8) -> Result<u8, Infallible> {
        self.exchanges.set(self.exchanges.get() + 1);
        let rx = match self.mode {
            BaudMode::Reset => self.reset_pulse(),
            BaudMode::Data => self.slot(tx),
        };
        Ok(rx)
    }
}
