/*!
A platform agnostic Rust driver for the drv2605 haptic motor controller,
based on the [`embedded-hal`] traits.

The driver keeps a mirror of the chip's operating mode and waveform library
so that mode-dependent operations, such as real-time playback, can put the
chip in the right state before streaming. Auto-calibration and diagnostics
poll the self-clearing GO bit with a caller supplied delay and a bounded
deadline.

```ignore
let mut haptic = Drv2605::new(i2c, Config::default())?;
haptic.set_library(6)?;
haptic.set_waveform(0, 47u8)?;
haptic.set_waveform(1, Waveform::Stop)?;
haptic.play()?;
```

[`embedded-hal`]: https://docs.rs/embedded-hal/0.2
*/
#![cfg_attr(not(test), no_std)]

use core::convert::TryFrom;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};
use log::{debug, info, trace, warn};

mod config;
mod error;
mod registers;
#[cfg(test)]
mod testing;

pub use config::*;
pub use error::DrvError;
pub use registers::*;

/// Driver for a single DRV2605 on an I2C bus.
///
/// Every operation is a blocking bus transaction. The driver assumes it is
/// the only user of the chip for its lifetime and holds no lock; callers that
/// share one instance between threads must serialize access themselves.
///
/// A running auto-calibration cannot be cancelled; only its timeout ends it
/// early.
pub struct Drv2605<I2C> {
    i2c: I2C,
    address: u8,
    actuator: Actuator,
    mode: Option<Mode>,
    library: Option<Library>,
}

impl<I2C, E> Drv2605<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Construct a driver instance, check the device id and put the chip in
    /// a known state: internal trigger mode, a single strong click queued,
    /// time offsets cleared and the actuator and library from `config`.
    pub fn new(i2c: I2C, config: Config) -> Result<Self, DrvError<E>> {
        let mut drv = Self {
            i2c,
            address: config.address,
            actuator: config.actuator,
            mode: None,
            library: None,
        };
        drv.init(&config)?;
        Ok(drv)
    }

    fn init(&mut self, config: &Config) -> Result<(), DrvError<E>> {
        let id = self.device_id()?;
        if !SUPPORTED_DEVICE_IDS.contains(&id) {
            return Err(DrvError::DeviceIdError(id));
        }

        self.set_mode(Mode::InternalTrigger)?;
        self.write(Register::RealTimePlaybackInput, 0)?;
        self.set_single_effect(1)?;
        self.write_block(Register::OverdriveTimeOffset, &[0, 0, 0, 0])?;
        self.write(Register::AudioToVibeMaximumInputLevel, 0x64)?;
        self.set_actuator(config.actuator)?;
        self.set_open_loop(config.open_loop)?;
        self.select_library(config.library)?;

        debug!(
            "drv2605 id {} at {:#04x} ready, {:?} {:?}",
            id, self.address, config.actuator, config.library
        );
        Ok(())
    }

    /// Give back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Write `value` to `register`
    fn write(&mut self, register: Register, value: u8) -> Result<(), DrvError<E>> {
        trace!("write {:?} = {:#04x}", register, value);
        self.i2c
            .write(self.address, &[register.addr(), value])
            .map_err(DrvError::Bus)
    }

    /// Write up to eight consecutive registers starting at `register`
    fn write_block(&mut self, register: Register, values: &[u8]) -> Result<(), DrvError<E>> {
        trace!("write {:?}.. = {:02x?}", register, values);
        let mut buf = [0u8; 1 + WAVEFORM_SLOTS];
        buf[0] = register.addr();
        buf[1..=values.len()].copy_from_slice(values);
        self.i2c
            .write(self.address, &buf[..=values.len()])
            .map_err(DrvError::Bus)
    }

    /// Read an 8-bit value from the register
    fn read(&mut self, register: Register) -> Result<u8, DrvError<E>> {
        let mut buf = [0u8; 1];
        self.read_block(register, &mut buf)?;
        Ok(buf[0])
    }

    fn read_block(&mut self, register: Register, buf: &mut [u8]) -> Result<(), DrvError<E>> {
        self.i2c
            .write_read(self.address, &[register.addr()], buf)
            .map_err(DrvError::Bus)
    }

    pub fn status(&mut self) -> Result<StatusReg, DrvError<E>> {
        self.read(Register::Status).map(StatusReg)
    }

    pub fn device_id(&mut self) -> Result<u8, DrvError<E>> {
        self.status().map(|status| status.device_id())
    }

    /// Reset the device, the equivalent of a power cycle. Any playback is
    /// interrupted immediately and every register returns to its default.
    ///
    /// The mirrored mode and library are forgotten; call [`get_mode`] and
    /// [`get_library`] once the chip is back.
    ///
    /// [`get_mode`]: Self::get_mode
    /// [`get_library`]: Self::get_library
    pub fn reset(&mut self) -> Result<(), DrvError<E>> {
        self.mode = None;
        self.library = None;
        let mut mode = ModeReg(0);
        mode.set_dev_reset(true);
        self.write(Register::Mode, mode.0)
    }

    /// The mode last written to or read from the chip, `None` after a bus
    /// failure or reset.
    pub fn current_mode(&self) -> Option<Mode> {
        self.mode
    }

    /// The library last written to or read from the chip.
    pub fn current_library(&self) -> Option<Library> {
        self.library
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator
    }

    /// Program the operating mode. The mirror is updated only once the chip
    /// accepted the write.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), DrvError<E>> {
        match self.write_mode(mode) {
            Ok(()) => {
                debug!("mode {:?} -> {:?}", self.mode, mode);
                self.mode = Some(mode);
                Ok(())
            }
            Err(e) => {
                self.mode = None;
                Err(e)
            }
        }
    }

    fn write_mode(&mut self, mode: Mode) -> Result<(), DrvError<E>> {
        let mut reg = ModeReg(0);
        match mode.mode_bits() {
            Some(bits) => {
                if let Mode::PwmInput | Mode::AnalogInput = mode {
                    let mut control3 = Control3Reg(self.read(Register::Control3)?);
                    control3.set_n_pwm_analog(mode == Mode::AnalogInput);
                    self.write(Register::Control3, control3.0)?;
                }
                reg.set_mode_bits(bits);
            }
            None => {
                let current = ModeReg(self.read(Register::Mode)?);
                reg.set_mode_bits(current.mode_bits());
                reg.set_standby(true);
            }
        }
        self.write(Register::Mode, reg.0)
    }

    /// Read the operating mode back from the chip and refresh the mirror.
    pub fn get_mode(&mut self) -> Result<Mode, DrvError<E>> {
        let mode = self.read_mode();
        self.mode = mode.as_ref().ok().copied();
        mode
    }

    fn read_mode(&mut self) -> Result<Mode, DrvError<E>> {
        let value = self.read(Register::Mode)?;
        let reg = ModeReg(value);
        let undecodable = DrvError::DecodeError {
            register: Register::Mode,
            value,
        };
        if reg.dev_reset() || reg.reserved() != 0 {
            return Err(undecodable);
        }
        if reg.standby() {
            return Ok(Mode::Standby);
        }
        let analog = if reg.mode_bits() == 3 {
            Control3Reg(self.read(Register::Control3)?).n_pwm_analog()
        } else {
            false
        };
        Mode::from_bits(reg.mode_bits(), analog).ok_or(undecodable)
    }

    /// Select waveform library `n` (0..=7). Anything else is rejected
    /// without touching the bus.
    pub fn set_library(&mut self, n: u8) -> Result<(), DrvError<E>> {
        let library = Library::try_from(n).map_err(DrvError::InvalidLibrary)?;
        self.select_library(library)
    }

    /// Selects the library the playback engine selects when the GO bit is set.
    pub fn select_library(&mut self, library: Library) -> Result<(), DrvError<E>> {
        let result = self.read(Register::LibrarySelection).and_then(|value| {
            let mut register = LibrarySelectionReg(value);
            register.set_library_bits(library as u8);
            self.write(Register::LibrarySelection, register.0)
        });
        self.library = match result {
            Ok(()) => {
                debug!("library {:?}", library);
                Some(library)
            }
            Err(_) => None,
        };
        result
    }

    pub fn get_library(&mut self) -> Result<Library, DrvError<E>> {
        let library = self.read(Register::LibrarySelection).and_then(|value| {
            let reg = LibrarySelectionReg(value);
            if reg.reserved_high() != 0 || reg.reserved_low() {
                return Err(DrvError::DecodeError {
                    register: Register::LibrarySelection,
                    value,
                });
            }
            Library::try_from(reg.library_bits()).map_err(|_| DrvError::DecodeError {
                register: Register::LibrarySelection,
                value,
            })
        });
        self.library = library.as_ref().ok().copied();
        library
    }

    /// This bit sets the output driver into a true high-impedance state. The device
    /// must be enabled to go into the high-impedance state. When in hardware
    /// shutdown or standby mode, the output drivers have 15 kΩ to ground.
    pub fn set_high_impedance(&mut self, value: bool) -> Result<(), DrvError<E>> {
        let mut register = LibrarySelectionReg(self.read(Register::LibrarySelection)?);
        register.set_hi_z(value);
        self.write(Register::LibrarySelection, register.0)
    }

    /// Store `waveform` in sequencer `slot` (0..=7). Accepts a raw slot byte
    /// or a [`Waveform`]. The id is not checked against the selected library,
    /// and writing while a sequence plays is allowed.
    pub fn set_waveform<W: Into<Waveform>>(
        &mut self,
        slot: usize,
        waveform: W,
    ) -> Result<(), DrvError<E>> {
        let register = Register::waveform_slot(slot).ok_or(DrvError::IndexOutOfRange(slot))?;
        let raw = Self::encode(waveform.into())?;
        self.write(register, raw)
    }

    fn encode(waveform: Waveform) -> Result<u8, DrvError<E>> {
        u8::try_from(waveform).map_err(|_| DrvError::InvalidParameter("waveform"))
    }

    pub fn waveform(&mut self, slot: usize) -> Result<Waveform, DrvError<E>> {
        let register = Register::waveform_slot(slot).ok_or(DrvError::IndexOutOfRange(slot))?;
        self.read(register).map(Waveform::from)
    }

    /// Sets the waveform generation registers to the shape provided, in a
    /// single transfer. Slots past the end of `sequence` are cleared.
    pub fn set_sequence(&mut self, sequence: &[Waveform]) -> Result<(), DrvError<E>> {
        if sequence.len() > WAVEFORM_SLOTS {
            return Err(DrvError::IndexOutOfRange(sequence.len()));
        }
        let mut buf = [0u8; WAVEFORM_SLOTS];
        for (raw, waveform) in buf.iter_mut().zip(sequence) {
            *raw = Self::encode(*waveform)?;
        }
        self.write_block(Register::WaveformSequence0, &buf)
    }

    /// All eight sequencer slots, including those after the first `Stop`.
    pub fn sequence(&mut self) -> Result<[Waveform; WAVEFORM_SLOTS], DrvError<E>> {
        let mut buf = [0u8; WAVEFORM_SLOTS];
        self.read_block(Register::WaveformSequence0, &mut buf)?;
        let mut sequence = [Waveform::Stop; WAVEFORM_SLOTS];
        for (waveform, raw) in sequence.iter_mut().zip(buf.iter()) {
            *waveform = Waveform::from(*raw);
        }
        Ok(sequence)
    }

    /// Queue a single effect followed by a stop.
    pub fn set_single_effect(&mut self, id: u8) -> Result<(), DrvError<E>> {
        let effect = Self::encode(Waveform::Effect(id))?;
        self.write_block(Register::WaveformSequence0, &[effect, 0])
    }

    fn write_go(&mut self, go: bool) -> Result<(), DrvError<E>> {
        let mut register = GoReg(0);
        register.set_go(go);
        self.write(Register::Go, register.0)
    }

    /// Start the stored sequence. Returns immediately; see [`is_playing`].
    ///
    /// [`is_playing`]: Self::is_playing
    pub fn play(&mut self) -> Result<(), DrvError<E>> {
        self.write_go(true)
    }

    /// Cancel playback.
    pub fn stop(&mut self) -> Result<(), DrvError<E>> {
        self.write_go(false)
    }

    /// Whether the GO bit is still set. It self-clears once the chip has
    /// finished the sequence.
    pub fn is_playing(&mut self) -> Result<bool, DrvError<E>> {
        self.read(Register::Go).map(|value| GoReg(value).go())
    }

    /// Read GO, then again every `poll_interval_ms` until it clears. Returns
    /// `false` if `timeout_ms` elapsed first. A failed read is retried until
    /// the deadline, and reported if the last poll failed.
    fn wait_for_go<D: DelayMs<u32>>(
        &mut self,
        timeout_ms: u32,
        poll_interval_ms: u32,
        delay: &mut D,
    ) -> Result<bool, DrvError<E>> {
        let mut elapsed = 0u32;
        loop {
            let polled = self.read(Register::Go);
            match polled {
                Ok(value) if !GoReg(value).go() => return Ok(true),
                Ok(_) => {}
                Err(_) => warn!("GO poll failed after {} ms", elapsed),
            }
            if elapsed >= timeout_ms {
                return polled.map(|_| false);
            }
            let step = poll_interval_ms.min(timeout_ms - elapsed);
            delay.delay_ms(step);
            elapsed += step;
        }
    }

    /// Enter `mode`, fire GO and wait for the chip to finish. Yields the
    /// status register, or `None` on timeout. The chip is put back in
    /// internal trigger mode whatever the outcome.
    fn run_routine<D: DelayMs<u32>>(
        &mut self,
        mode: Mode,
        timeout_ms: u32,
        poll_interval_ms: u32,
        delay: &mut D,
    ) -> Result<Option<StatusReg>, DrvError<E>> {
        self.set_mode(mode)?;
        let outcome = self.fire_and_wait(timeout_ms, poll_interval_ms, delay);
        let restored = self.set_mode(Mode::InternalTrigger);
        let status = outcome?;
        restored?;
        Ok(status)
    }

    fn fire_and_wait<D: DelayMs<u32>>(
        &mut self,
        timeout_ms: u32,
        poll_interval_ms: u32,
        delay: &mut D,
    ) -> Result<Option<StatusReg>, DrvError<E>> {
        self.write_go(true)?;
        match self.wait_for_go(timeout_ms, poll_interval_ms, delay) {
            Ok(true) => self.status().map(Some),
            Ok(false) => {
                warn!("GO still set after {} ms, cancelling", timeout_ms);
                self.cancel_go();
                Ok(None)
            }
            Err(e) => {
                self.cancel_go();
                Err(e)
            }
        }
    }

    /// Best effort GO = 0 on a path that is already failing.
    fn cancel_go(&mut self) {
        if self.write_go(false).is_err() {
            warn!("failed to clear GO");
        }
    }

    /// Run the chip's closed-loop auto-calibration for the configured
    /// actuator and return the computed compensation and back-EMF values.
    ///
    /// `params` are validated before anything is written. Calibration time
    /// depends on the motor, so GO is polled every `poll_interval_ms` until
    /// `timeout_ms`, using `delay` as the clock. The chip is left in internal
    /// trigger mode on every outcome.
    pub fn auto_calibrate<D: DelayMs<u32>>(
        &mut self,
        params: &CalibrationParams,
        delay: &mut D,
    ) -> Result<CalibrationResult, DrvError<E>> {
        params.validate().map_err(DrvError::InvalidParameter)?;

        let mut feedback = FeedbackControlReg(self.read(Register::FeedbackControl)?);
        feedback.set_n_erm_lra(self.actuator == Actuator::Lra);
        feedback.set_fb_brake_factor(params.brake_factor);
        feedback.set_loop_gain(params.loop_gain);
        self.write(Register::FeedbackControl, feedback.0)?;

        self.write_block(
            Register::RatedVoltage,
            &[params.rated_voltage, params.overdrive_clamp],
        )?;

        let mut control1 = Control1Reg(self.read(Register::Control1)?);
        control1.set_drive_time(params.drive_time);
        self.write(Register::Control1, control1.0)?;

        let mut control4 = Control4Reg(self.read(Register::Control4)?);
        control4.set_auto_cal_time(params.auto_cal_time);
        control4.set_otp_program(false);
        self.write(Register::Control4, control4.0)?;

        let status = match self.run_routine(
            Mode::AutoCalibration,
            params.timeout_ms,
            params.poll_interval_ms,
            delay,
        )? {
            Some(status) => status,
            None => return Err(DrvError::CalibrationTimeout),
        };
        if status.diagnostic_result() {
            warn!("auto-calibration did not converge");
            return Err(DrvError::CalibrationFailed);
        }

        let mut results = [0u8; 2];
        self.read_block(Register::AutoCalibrationCompensationResult, &mut results)?;
        let feedback = FeedbackControlReg(self.read(Register::FeedbackControl)?);
        let result = CalibrationResult {
            compensation: results[0],
            back_emf: results[1],
            bemf_gain: feedback.bemf_gain(),
            success: true,
        };
        info!(
            "calibrated {:?}: comp {} bemf {} gain {}",
            self.actuator, result.compensation, result.back_emf, result.bemf_gain
        );
        Ok(result)
    }

    /// Restore the results of an earlier auto-calibration.
    pub fn load_calibration(&mut self, calibration: &CalibrationResult) -> Result<(), DrvError<E>> {
        if calibration.bemf_gain > 3 {
            return Err(DrvError::InvalidParameter("bemf_gain"));
        }
        self.write_block(
            Register::AutoCalibrationCompensationResult,
            &[calibration.compensation, calibration.back_emf],
        )?;
        let mut feedback = FeedbackControlReg(self.read(Register::FeedbackControl)?);
        feedback.set_bemf_gain(calibration.bemf_gain);
        self.write(Register::FeedbackControl, feedback.0)
    }

    /// Run the actuator diagnostic. Fails with `DiagnosticsFailed` when the
    /// actuator is missing, shorted or out of range.
    pub fn run_diagnostics<D: DelayMs<u32>>(
        &mut self,
        timeout_ms: u32,
        poll_interval_ms: u32,
        delay: &mut D,
    ) -> Result<(), DrvError<E>> {
        if timeout_ms == 0 {
            return Err(DrvError::InvalidParameter("timeout_ms"));
        }
        if poll_interval_ms == 0 {
            return Err(DrvError::InvalidParameter("poll_interval_ms"));
        }
        match self.run_routine(Mode::Diagnostics, timeout_ms, poll_interval_ms, delay)? {
            Some(status) if status.diagnostic_result() => Err(DrvError::DiagnosticsFailed),
            Some(_) => Ok(()),
            None => Err(DrvError::CalibrationTimeout),
        }
    }

    /// Drive the actuator with a signed amplitude. The chip is switched to
    /// real-time playback mode if it is not there already, so the first
    /// value takes effect without an explicit [`set_mode`].
    ///
    /// [`set_mode`]: Self::set_mode
    pub fn set_realtime_value(&mut self, amplitude: i8) -> Result<(), DrvError<E>> {
        self.stream_realtime(amplitude as u8)
    }

    /// As [`set_realtime_value`](Self::set_realtime_value) for a chip set to
    /// [`RtpFormat::Unsigned`].
    pub fn set_realtime_value_unsigned(&mut self, amplitude: u8) -> Result<(), DrvError<E>> {
        self.stream_realtime(amplitude)
    }

    fn stream_realtime(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write(Register::RealTimePlaybackInput, value)?;
        if self.mode != Some(Mode::RealTimePlayback) {
            self.set_mode(Mode::RealTimePlayback)?;
        }
        Ok(())
    }

    pub fn set_rtp_format(&mut self, format: RtpFormat) -> Result<(), DrvError<E>> {
        let mut control3 = Control3Reg(self.read(Register::Control3)?);
        control3.set_data_format_rtp(format == RtpFormat::Unsigned);
        self.write(Register::Control3, control3.0)
    }

    /// Switch between ERM and LRA drive. Run auto calibration afterwards.
    pub fn set_actuator(&mut self, actuator: Actuator) -> Result<(), DrvError<E>> {
        let mut feedback = FeedbackControlReg(self.read(Register::FeedbackControl)?);
        feedback.set_n_erm_lra(actuator == Actuator::Lra);
        self.write(Register::FeedbackControl, feedback.0)?;
        self.actuator = actuator;
        Ok(())
    }

    /// Select open- or closed-loop drive for the configured actuator.
    pub fn set_open_loop(&mut self, open_loop: bool) -> Result<(), DrvError<E>> {
        let mut control3 = Control3Reg(self.read(Register::Control3)?);
        match self.actuator {
            Actuator::Erm => control3.set_erm_open_loop(open_loop),
            Actuator::Lra => control3.set_lra_open_loop(open_loop),
        }
        self.write(Register::Control3, control3.0)
    }

    /// Adds a two's complement time offset to the overdrive portion of the
    /// library waveforms, in units of PLAYBACK_INTERVAL. Open loop only.
    pub fn set_overdrive_time_offset(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write(Register::OverdriveTimeOffset, value as u8)
    }

    /// Adds a time offset to the positive sustain portion of the library
    /// waveforms.
    pub fn set_sustain_time_offset_positive(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write(Register::SustainTimeOffsetPositive, value as u8)
    }

    /// Adds a time offset to the negative sustain portion of the library
    /// waveforms.
    pub fn set_sustain_time_offset_negative(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write(Register::SustainTimeOffsetNegative, value as u8)
    }

    /// Adds a time offset to the braking portion of the library waveforms.
    /// Open loop only.
    pub fn set_brake_time_offset(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write(Register::BrakeTimeOffset, value as u8)
    }

    /// Supply voltage in millivolts, sampled while the actuator is driven.
    pub fn battery_voltage_mv(&mut self) -> Result<u16, DrvError<E>> {
        let raw = self.read(Register::VBatVoltageMonitor)?;
        Ok((u32::from(raw) * 5600 / 255) as u16)
    }

    /// Measured LRA resonance period in microseconds.
    pub fn lra_resonance_period_us(&mut self) -> Result<u32, DrvError<E>> {
        let raw = self.read(Register::LraResonancePeriod)?;
        Ok(u32::from(raw) * 9846 / 100)
    }
}
