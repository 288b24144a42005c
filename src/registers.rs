use bitfield::bitfield;
use core::convert::TryFrom;

/// Register addresses of the DRV2605 family.
#[allow(unused)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Status = 0x00,
    Mode = 0x01,
    /// Entry point for real-time playback (RTP) data. The playback engine
    /// drives this value to the load while MODE[2:0] = 5. Interpreted as
    /// signed unless DATA_FORMAT_RTP is set in CONTROL3.
    RealTimePlaybackInput = 0x02,
    LibrarySelection = 0x03,
    WaveformSequence0 = 0x04,
    WaveformSequence1 = 0x05,
    WaveformSequence2 = 0x06,
    WaveformSequence3 = 0x07,
    WaveformSequence4 = 0x08,
    WaveformSequence5 = 0x09,
    WaveformSequence6 = 0x0a,
    WaveformSequence7 = 0x0b,
    Go = 0x0c,
    OverdriveTimeOffset = 0x0d,
    SustainTimeOffsetPositive = 0x0e,
    SustainTimeOffsetNegative = 0x0f,
    BrakeTimeOffset = 0x10,
    AudioToVibeControl = 0x11,
    AudioToVibeMinimumInputLevel = 0x12,
    AudioToVibeMaximumInputLevel = 0x13,
    AudioToVibeMinimumOutputDrive = 0x14,
    AudioToVibeMaximumOutputDrive = 0x15,

    /// Full-scale reference voltage for closed-loop operation. Input to the
    /// auto-calibration routine, so it must hold the motor's rated voltage
    /// before calibration runs.
    RatedVoltage = 0x16,

    /// Clamp for automatic overdrive in closed loop, and the full-scale
    /// reference for open-loop operation.
    OverdriveClampVoltage = 0x17,

    /// A_CAL_COMP: voltage compensation computed by auto-calibration.
    /// Coefficient = 1 + A_CAL_COMP / 255
    AutoCalibrationCompensationResult = 0x18,

    /// A_CAL_BEMF: rated back-EMF computed by auto-calibration.
    /// Back-EMF (V) = (A_CAL_BEMF / 255) x 1.22 V / BEMF_GAIN
    AutoCalibrationBackEmfResult = 0x19,

    FeedbackControl = 0x1a,
    Control1 = 0x1b,
    Control2 = 0x1c,
    Control3 = 0x1d,
    Control4 = 0x1e,
    Control5 = 0x1f,
    LraOpenLoopPeriod = 0x20,

    /// Supply voltage, VDD (V) = VBAT x 5.6 V / 255
    VBatVoltageMonitor = 0x21,

    /// Measured LRA period, period (us) = LRA_PERIOD x 98.46 us
    LraResonancePeriod = 0x22,
}

impl Register {
    /// The waveform sequence register backing `slot` (0..=7).
    pub(crate) fn waveform_slot(slot: usize) -> Option<Register> {
        use Register::*;
        const SLOTS: [Register; WAVEFORM_SLOTS] = [
            WaveformSequence0,
            WaveformSequence1,
            WaveformSequence2,
            WaveformSequence3,
            WaveformSequence4,
            WaveformSequence5,
            WaveformSequence6,
            WaveformSequence7,
        ];
        SLOTS.get(slot).copied()
    }

    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// Number of waveform sequencer slots.
pub const WAVEFORM_SLOTS: usize = 8;

bitfield! {
    pub struct StatusReg(u8);
    impl Debug;
    /// Latching overcurrent flag. Set when the load impedance drops below
    /// the threshold; the device shuts down and retries periodically.
    pub oc_detected, _: 0;
    /// Latching overtemperature flag. Clears upon read.
    pub over_temp, _: 1;
    /// Feedback controller timed out: ERM back-EMF stayed at zero for ~10 ms,
    /// or the LRA lost frequency lock. Debug only, clears upon read.
    pub feedback_controller_timed_out, _: 2;
    /// Result of the last auto-calibration or diagnostic routine. Only valid
    /// once GO has self-cleared. Clears upon read.
    /// 0: passed / actuator OK
    /// 1: did not converge / actuator missing or shorted
    pub diagnostic_result, _: 3;
    /// 3: DRV2605, 4: DRV2604, 6: DRV2604L, 7: DRV2605L
    pub device_id, _: 7, 5;
}

/// Device IDs this driver accepts: the ROM-equipped DRV2605 and DRV2605L.
pub const SUPPORTED_DEVICE_IDS: [u8; 2] = [3, 7];

bitfield! {
    pub struct ModeReg(u8);
    impl Debug;
    /// Equivalent to a power cycle. Self-clears once every register has
    /// been restored to its default.
    pub dev_reset, set_dev_reset: 7;
    /// 0: device ready, 1: software standby
    pub standby, set_standby: 6;
    /// Must read back as zero.
    pub reserved, _: 5, 3;
    /// MODE[2:0]
    pub mode_bits, set_mode_bits: 2, 0;
}

/// Operating mode of the chip.
///
/// `PwmInput` and `AnalogInput` share MODE[2:0] = 3 and are told apart by
/// CONTROL3.N_PWM_ANALOG. `Standby` is carried by the STANDBY bit and keeps
/// whatever MODE[2:0] was programmed before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Waveforms are fired by setting the GO bit.
    InternalTrigger,
    /// A rising edge on IN/TRIG sets GO; a second rising edge cancels.
    ExternalTriggerEdge,
    /// GO follows the level of IN/TRIG.
    ExternalTriggerLevel,
    /// The duty cycle on IN/TRIG sets the drive amplitude.
    PwmInput,
    /// The DC level on IN/TRIG sets the drive amplitude.
    AnalogInput,
    /// An AC-coupled audio signal on IN/TRIG is converted into vibration.
    AudioToVibe,
    /// The actuator is driven with the contents of the RTP input register.
    RealTimePlayback,
    /// Actuator diagnostic, started with GO, result in DIAG_RESULT.
    Diagnostics,
    /// Closed-loop calibration, started with GO, result in DIAG_RESULT.
    AutoCalibration,
    /// Software standby, low power with outputs off.
    Standby,
}

impl Mode {
    /// Every mode the driver can program.
    pub const ALL: [Mode; 10] = [
        Mode::InternalTrigger,
        Mode::ExternalTriggerEdge,
        Mode::ExternalTriggerLevel,
        Mode::PwmInput,
        Mode::AnalogInput,
        Mode::AudioToVibe,
        Mode::RealTimePlayback,
        Mode::Diagnostics,
        Mode::AutoCalibration,
        Mode::Standby,
    ];

    /// MODE[2:0] value, `None` for `Standby`.
    pub fn mode_bits(self) -> Option<u8> {
        match self {
            Mode::InternalTrigger => Some(0),
            Mode::ExternalTriggerEdge => Some(1),
            Mode::ExternalTriggerLevel => Some(2),
            Mode::PwmInput | Mode::AnalogInput => Some(3),
            Mode::AudioToVibe => Some(4),
            Mode::RealTimePlayback => Some(5),
            Mode::Diagnostics => Some(6),
            Mode::AutoCalibration => Some(7),
            Mode::Standby => None,
        }
    }

    /// Decodes MODE[2:0] for a device that is not in standby. `analog`
    /// is CONTROL3.N_PWM_ANALOG and only matters for MODE[2:0] = 3.
    pub fn from_bits(bits: u8, analog: bool) -> Option<Mode> {
        let mode = match bits {
            0 => Mode::InternalTrigger,
            1 => Mode::ExternalTriggerEdge,
            2 => Mode::ExternalTriggerLevel,
            3 if analog => Mode::AnalogInput,
            3 => Mode::PwmInput,
            4 => Mode::AudioToVibe,
            5 => Mode::RealTimePlayback,
            6 => Mode::Diagnostics,
            7 => Mode::AutoCalibration,
            _ => return None,
        };
        Some(mode)
    }
}

/// Selection of Library of built-in waveforms. Each library offers all the same
/// waveforms, but is tuned to work for different motors so it is important to
/// choose the correct library for your motor characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    /// No library selected
    Empty = 0,
    /// Rated Voltage 1.3V Overdrive Voltage 3V Rise Time 40-60ms Brake Time 20-40ms
    A = 1,
    /// Rated Voltage 3V Overdrive Voltage 3V Rise Time 40-60ms Brake Time 5-15ms
    B = 2,
    /// Rated Voltage 3V Overdrive Voltage 3V Rise Time 60-80ms Brake Time 10-20ms
    C = 3,
    /// Rated Voltage 3V Overdrive Voltage 3V Rise Time 100-140ms Brake Time 15-25ms
    D = 4,
    /// Rated Voltage 3V Overdrive Voltage 3V Rise Time >140ms Brake Time >30ms
    E = 5,
    /// Tuned for linear resonant actuators
    Lra = 6,
    /// Rated Voltage 4.5V Overdrive Voltage 5V Rise Time 35-45ms Brake Time 10-20ms
    F = 7,
}

impl TryFrom<u8> for Library {
    type Error = u8;

    fn try_from(val: u8) -> Result<Library, u8> {
        match val {
            0 => Ok(Library::Empty),
            1 => Ok(Library::A),
            2 => Ok(Library::B),
            3 => Ok(Library::C),
            4 => Ok(Library::D),
            5 => Ok(Library::E),
            6 => Ok(Library::Lra),
            7 => Ok(Library::F),
            other => Err(other),
        }
    }
}

bitfield! {
    pub struct LibrarySelectionReg(u8);
    impl Debug;
    /// Puts the output driver into a true high-impedance state, effective
    /// immediately even mid-transaction.
    pub hi_z, set_hi_z: 4;
    /// Bits 7:5 and 3 are reserved.
    pub reserved_high, _: 7, 5;
    pub reserved_low, _: 3;
    /// LIBRARY_SEL[2:0], used by the playback engine when GO is set.
    pub library_bits, set_library_bits: 2, 0;
}

bitfield! {
    pub struct WaveformReg(u8);
    impl Debug;
    /// When set, bits 6:0 are a wait time of 10 ms per count instead of
    /// a waveform identifier.
    pub wait, set_wait: 7;
    /// Waveform identifier, or wait time when `wait` is set.
    pub waveform_seq, set_waveform_seq: 6, 0;
}

/// Longest wait a single sequence slot can hold.
pub const MAX_WAIT_MS: u16 = 1270;

/// Contents of one waveform sequencer slot.
///
/// The sequencer starts at slot 0 when GO is set and stops at the first
/// `Stop` entry or after slot 7, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Terminates the sequence.
    Stop,
    /// Plays the given effect from the selected library (1..=127; the ROM
    /// libraries define 1..=123).
    Effect(u8),
    /// Idles for the given number of 10 ms periods (0..=127).
    Wait(u8),
}

impl Waveform {
    /// A wait of `ms` milliseconds, rounded down to 10 ms. Returns `None`
    /// past 1270 ms.
    pub fn wait_ms(ms: u16) -> Option<Waveform> {
        if ms > MAX_WAIT_MS {
            return None;
        }
        Some(Waveform::Wait((ms / 10) as u8))
    }

    /// Duration of a `Wait` slot in milliseconds.
    pub fn wait_duration_ms(self) -> Option<u16> {
        match self {
            Waveform::Wait(tens) => Some(u16::from(tens & 0x7f) * 10),
            _ => None,
        }
    }
}

impl From<u8> for Waveform {
    fn from(raw: u8) -> Waveform {
        let reg = WaveformReg(raw);
        if reg.wait() {
            Waveform::Wait(reg.waveform_seq())
        } else if reg.waveform_seq() == 0 {
            Waveform::Stop
        } else {
            Waveform::Effect(reg.waveform_seq())
        }
    }
}

/// Encodes a slot. Effect ids and wait counts only have seven bits; larger
/// values are handed back as the error.
impl TryFrom<Waveform> for u8 {
    type Error = Waveform;

    fn try_from(waveform: Waveform) -> Result<u8, Waveform> {
        let mut reg = WaveformReg(0);
        match waveform {
            Waveform::Stop => {}
            Waveform::Effect(id) | Waveform::Wait(id) if id > 0x7f => return Err(waveform),
            Waveform::Effect(id) => reg.set_waveform_seq(id),
            Waveform::Wait(tens_of_ms) => {
                reg.set_wait(true);
                reg.set_waveform_seq(tens_of_ms);
            }
        }
        Ok(reg.0)
    }
}

bitfield! {
    pub struct GoReg(u8);
    impl Debug;
    /// Fires the process selected by MODE[2:0]: waveform playback,
    /// auto-calibration or diagnostics. Self-clears when the process
    /// completes; clearing it during playback cancels the sequence.
    pub go, set_go: 0;
}

bitfield! {
    pub struct FeedbackControlReg(u8);
    impl Debug;
    /// 0: ERM, 1: LRA. Set before running auto calibration.
    pub n_erm_lra, set_n_erm_lra: 7;
    /// Braking to driving feedback gain ratio.
    /// 0: 1x, 1: 2x, 2: 3x, 3: 4x, 4: 6x, 5: 8x, 6: 16x, 7: braking disabled
    pub fb_brake_factor, set_fb_brake_factor: 6, 4;
    /// 0: low, 1: medium, 2: high, 3: very high
    pub loop_gain, set_loop_gain: 3, 2;
    /// Back-EMF amplifier gain, populated by auto calibration.
    /// ERM 0.33x/1.0x/1.8x/4.0x, LRA 5x/10x/20x/30x
    pub bemf_gain, set_bemf_gain: 1, 0;
}

bitfield! {
    pub struct Control1Reg(u8);
    impl Debug;
    /// Higher loop gain during overdrive.
    pub startup_boost, set_startup_boost: 7;
    /// 0.9 V common mode on IN/TRIG for AC-coupled analog input.
    pub ac_couple, set_ac_couple: 5;
    /// LRA: initial drive time guess, DRIVE_TIME x 0.1 ms + 0.5 ms.
    /// ERM: back-EMF sample rate, DRIVE_TIME x 0.2 ms + 1 ms.
    pub drive_time, set_drive_time: 4, 0;
}

bitfield! {
    pub struct Control3Reg(u8);
    impl Debug;
    /// Noise gate for PWM and analog inputs.
    pub ng_thresh, set_ng_thresh: 7, 6;
    /// 0: closed loop, 1: open loop (ERM only)
    pub erm_open_loop, set_erm_open_loop: 5;
    pub supply_comp_dis, set_supply_comp_dis: 4;
    /// RTP input interpretation. 0: signed, 1: unsigned
    pub data_format_rtp, set_data_format_rtp: 3;
    pub lra_drive_mode, set_lra_drive_mode: 2;
    /// IN/TRIG interpretation in MODE[2:0] = 3. 0: PWM, 1: analog
    pub n_pwm_analog, set_n_pwm_analog: 1;
    /// 0: auto-resonance, 1: LRA open loop
    pub lra_open_loop, set_lra_open_loop: 0;
}

bitfield! {
    pub struct Control4Reg(u8);
    impl Debug;
    pub zc_det_time, set_zc_det_time: 7, 6;
    /// Auto calibration duration.
    /// 0: 150-350 ms, 1: 250-450 ms, 2: 500-700 ms, 3: 1000-1200 ms
    pub auto_cal_time, set_auto_cal_time: 5, 4;
    /// Set once the OTP memory has been programmed.
    pub otp_status, _: 2;
    pub otp_program, set_otp_program: 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn waveform_decodes_effect_wait_and_stop() {
        assert_eq!(Waveform::from(0u8), Waveform::Stop);
        assert_eq!(Waveform::from(47u8), Waveform::Effect(47));
        assert_eq!(Waveform::from(0x80u8 | 50), Waveform::Wait(50));
        assert_eq!(Waveform::from(0x80u8), Waveform::Wait(0));
    }

    #[test]
    fn wait_ms_caps_at_1270() {
        assert_eq!(Waveform::wait_ms(1270), Some(Waveform::Wait(127)));
        assert_eq!(Waveform::wait_ms(500).map(u8::try_from), Some(Ok(0x80u8 | 50)));
        assert_eq!(Waveform::wait_ms(1271), None);
        assert_eq!(Waveform::Wait(127).wait_duration_ms(), Some(1270));
    }

    #[test]
    fn slot_registers_are_contiguous() {
        for slot in 0..WAVEFORM_SLOTS {
            let reg = Register::waveform_slot(slot).unwrap();
            assert_eq!(reg.addr(), Register::WaveformSequence0.addr() + slot as u8);
        }
        assert_eq!(Register::waveform_slot(WAVEFORM_SLOTS), None);
    }

    #[test]
    fn mode_bits_decode_back() {
        for mode in Mode::ALL.iter().copied() {
            if let Some(bits) = mode.mode_bits() {
                let analog = mode == Mode::AnalogInput;
                assert_eq!(Mode::from_bits(bits, analog), Some(mode));
            }
        }
        assert_eq!(Mode::from_bits(8, false), None);
    }

    #[test]
    fn library_accepts_only_three_bits() {
        assert_eq!(Library::try_from(6), Ok(Library::Lra));
        assert_eq!(Library::try_from(7), Ok(Library::F));
        assert_eq!(Library::try_from(8), Err(8));
    }

    proptest! {
        #[test]
        fn raw_slot_values_survive_waveform(raw in any::<u8>()) {
            prop_assert_eq!(u8::try_from(Waveform::from(raw)), Ok(raw));
        }
    }

    #[test]
    fn seven_bit_overflow_is_refused() {
        assert_eq!(u8::try_from(Waveform::Effect(127)), Ok(127));
        assert_eq!(u8::try_from(Waveform::Effect(128)), Err(Waveform::Effect(128)));
        assert_eq!(u8::try_from(Waveform::Wait(200)), Err(Waveform::Wait(200)));
        assert_eq!(u8::try_from(Waveform::Stop), Ok(0));
    }
}
