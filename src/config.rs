use crate::registers::Library;

/// The hardcoded address of the driver.  All drivers share the same
/// address so that it is possible to broadcast on the bus and have
/// multiple units emit the same waveform
pub const ADDRESS: u8 = 0x5a;

/// Kind of motor attached to the driver outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuator {
    /// Eccentric rotating mass
    Erm,
    /// Linear resonant actuator
    Lra,
}

/// Interpretation of real-time playback input values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpFormat {
    Signed,
    Unsigned,
}

/// Construction parameters for [`Drv2605`](crate::Drv2605).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// 7-bit I2C address.
    pub address: u8,
    pub actuator: Actuator,
    /// Drive the actuator open loop. Most ROM libraries were designed for
    /// open-loop ERM operation.
    pub open_loop: bool,
    /// Library selected during initialization.
    pub library: Library,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: ADDRESS,
            actuator: Actuator::Erm,
            open_loop: true,
            library: Library::A,
        }
    }
}

impl Config {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_actuator(mut self, actuator: Actuator) -> Self {
        self.actuator = actuator;
        self
    }

    pub fn with_open_loop(mut self, open_loop: bool) -> Self {
        self.open_loop = open_loop;
        self
    }

    pub fn with_library(mut self, library: Library) -> Self {
        self.library = library;
        self
    }

    /// Defaults for an LRA: closed loop with the LRA library.
    pub fn lra() -> Self {
        Self {
            actuator: Actuator::Lra,
            open_loop: false,
            library: Library::Lra,
            ..Self::default()
        }
    }
}

/// Inputs to the auto-calibration routine.
///
/// See the Rated Voltage and Overdrive Voltage-Clamp Programming sections of
/// the datasheet for computing `rated_voltage` and `overdrive_clamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationParams {
    /// RATED_VOLTAGE register value.
    pub rated_voltage: u8,
    /// OD_CLAMP register value.
    pub overdrive_clamp: u8,
    /// FB_BRAKE_FACTOR, 0..=7.
    pub brake_factor: u8,
    /// LOOP_GAIN, 0..=3.
    pub loop_gain: u8,
    /// AUTO_CAL_TIME, 0..=3.
    pub auto_cal_time: u8,
    /// DRIVE_TIME, 0..=31.
    pub drive_time: u8,
    /// How long to wait for GO to self-clear.
    pub timeout_ms: u32,
    /// Delay between two reads of the GO bit.
    pub poll_interval_ms: u32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            rated_voltage: 0x3e,
            overdrive_clamp: 0x8c,
            brake_factor: 0x3,
            loop_gain: 0x1,
            auto_cal_time: 0x2,
            drive_time: 0x13,
            timeout_ms: 2000,
            poll_interval_ms: 10,
        }
    }
}

impl CalibrationParams {
    pub fn with_voltages(mut self, rated_voltage: u8, overdrive_clamp: u8) -> Self {
        self.rated_voltage = rated_voltage;
        self.overdrive_clamp = overdrive_clamp;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u32, poll_interval_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Checks every field against the width of its register field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.rated_voltage == 0 {
            return Err("rated_voltage");
        }
        if self.overdrive_clamp == 0 {
            return Err("overdrive_clamp");
        }
        if self.brake_factor > 7 {
            return Err("brake_factor");
        }
        if self.loop_gain > 3 {
            return Err("loop_gain");
        }
        if self.auto_cal_time > 3 {
            return Err("auto_cal_time");
        }
        if self.drive_time > 31 {
            return Err("drive_time");
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms");
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms");
        }
        Ok(())
    }
}

/// Values computed by a successful auto-calibration. Store them and hand
/// them to [`Drv2605::load_calibration`](crate::Drv2605::load_calibration)
/// to skip calibrating a known motor at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationResult {
    /// A_CAL_COMP
    pub compensation: u8,
    /// A_CAL_BEMF
    pub back_emf: u8,
    /// BEMF_GAIN
    pub bemf_gain: u8,
    pub success: bool,
}
