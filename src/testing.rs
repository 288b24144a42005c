//! Register-file stand-in for a DRV2605L, used by the unit tests.

use crate::config::ADDRESS;
use crate::registers::{GoReg, ModeReg, Register};
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

const REGISTER_COUNT: usize = Register::LraResonancePeriod as usize + 1;

/// Power-on defaults from the datasheet, device id 7 (DRV2605L).
fn power_on_registers() -> [u8; REGISTER_COUNT] {
    let mut regs = [0u8; REGISTER_COUNT];
    regs[Register::Status as usize] = 7 << 5;
    regs[Register::Mode as usize] = 0x40;
    regs[Register::LibrarySelection as usize] = 0x01;
    regs[Register::WaveformSequence0 as usize] = 0x01;
    regs[Register::AudioToVibeControl as usize] = 0x05;
    regs[Register::AudioToVibeMinimumInputLevel as usize] = 0x19;
    regs[Register::AudioToVibeMaximumInputLevel as usize] = 0xff;
    regs[Register::AudioToVibeMinimumOutputDrive as usize] = 0x19;
    regs[Register::AudioToVibeMaximumOutputDrive as usize] = 0xff;
    regs[Register::RatedVoltage as usize] = 0x3e;
    regs[Register::OverdriveClampVoltage as usize] = 0x8c;
    regs[Register::AutoCalibrationCompensationResult as usize] = 0x0c;
    regs[Register::AutoCalibrationBackEmfResult as usize] = 0x6c;
    regs[Register::FeedbackControl as usize] = 0x36;
    regs[Register::Control1 as usize] = 0x93;
    regs[Register::Control2 as usize] = 0xf5;
    regs[Register::Control3 as usize] = 0xa0;
    regs[Register::Control4 as usize] = 0x20;
    regs[Register::Control5 as usize] = 0x80;
    regs[Register::LraOpenLoopPeriod as usize] = 0x33;
    regs
}

/// Answers reads and writes from a register array, with the register
/// auto-increment the chip applies to multi-byte transfers.
///
/// GO stays set after a `GO = 1` write for `go_polls` reads and then
/// self-clears; `None` keeps it set until written back to zero.
pub struct FakeChip {
    regs: [u8; REGISTER_COUNT],
    /// Every register write, block writes split per register.
    pub writes: Vec<(u8, u8)>,
    /// Number of I2C transactions issued, failed ones included.
    pub transactions: usize,
    pub go_polls: Option<usize>,
    go_remaining: Option<usize>,
    read_faults: Vec<u8>,
    write_faults: Vec<u8>,
}

impl FakeChip {
    pub fn new() -> Self {
        Self {
            regs: power_on_registers(),
            writes: Vec::new(),
            transactions: 0,
            go_polls: None,
            go_remaining: None,
            read_faults: Vec::new(),
            write_faults: Vec::new(),
        }
    }

    pub fn reg(&self, register: Register) -> u8 {
        self.regs[register as usize]
    }

    pub fn set_reg(&mut self, register: Register, value: u8) {
        self.regs[register as usize] = value;
    }

    /// The next transaction reading `register` fails.
    pub fn fail_next_read_of(&mut self, register: Register) {
        self.read_faults.push(register.addr());
    }

    /// The next transaction writing `register` fails.
    pub fn fail_next_write_to(&mut self, register: Register) {
        self.write_faults.push(register.addr());
    }

    fn take_fault(faults: &mut Vec<u8>, register: u8) -> Result<(), BusFault> {
        match faults.iter().position(|r| *r == register) {
            Some(index) => {
                faults.remove(index);
                Err(BusFault)
            }
            None => Ok(()),
        }
    }

    fn store(&mut self, register: u8, value: u8) {
        self.writes.push((register, value));
        if register == Register::Mode.addr() && ModeReg(value).dev_reset() {
            let status = self.regs[Register::Status as usize];
            self.regs = power_on_registers();
            self.regs[Register::Status as usize] = status;
            self.go_remaining = None;
            return;
        }
        if register == Register::Go.addr() {
            self.go_remaining = if GoReg(value).go() { self.go_polls } else { None };
        }
        self.regs[register as usize] = value;
    }

    fn load(&mut self, register: u8) -> u8 {
        if register == Register::Go.addr() {
            match self.go_remaining {
                Some(0) => {
                    self.go_remaining = None;
                    self.regs[register as usize] = 0;
                }
                Some(n) => self.go_remaining = Some(n - 1),
                None => {}
            }
        }
        self.regs[register as usize]
    }
}

impl Write for FakeChip {
    type Error = BusFault;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusFault> {
        self.transactions += 1;
        if address != ADDRESS || bytes.is_empty() {
            return Err(BusFault);
        }
        Self::take_fault(&mut self.write_faults, bytes[0])?;
        for (offset, value) in bytes[1..].iter().enumerate() {
            self.store(bytes[0] + offset as u8, *value);
        }
        Ok(())
    }
}

impl WriteRead for FakeChip {
    type Error = BusFault;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), BusFault> {
        self.transactions += 1;
        if address != ADDRESS || bytes.len() != 1 {
            return Err(BusFault);
        }
        Self::take_fault(&mut self.read_faults, bytes[0])?;
        for (offset, slot) in buffer.iter_mut().enumerate() {
            *slot = self.load(bytes[0] + offset as u8);
        }
        Ok(())
    }
}

/// Delay that only adds up the time it was asked to wait.
#[derive(Debug, Default)]
pub struct FakeDelay {
    pub elapsed_ms: u32,
    pub calls: usize,
}

impl DelayMs<u32> for FakeDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += ms;
        self.calls += 1;
    }
}
