use drv2605_haptic::{CalibrationParams, CalibrationResult, Config, Drv2605, DrvError, Mode};
use embedded_hal_mock::delay::MockNoop;
use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use embedded_hal_mock::MockError;
use std::io::ErrorKind;

const ADDR: u8 = 0x5a;

fn write(bytes: &[u8]) -> I2cTransaction {
    I2cTransaction::write(ADDR, bytes.to_vec())
}

fn read(register: u8, response: &[u8]) -> I2cTransaction {
    I2cTransaction::write_read(ADDR, vec![register], response.to_vec())
}

/// What `Drv2605::new` issues for the default ERM configuration against a
/// freshly powered DRV2605L.
fn init_transactions() -> Vec<I2cTransaction> {
    vec![
        read(0x00, &[0xe0]),
        write(&[0x01, 0x00]),
        write(&[0x02, 0x00]),
        write(&[0x04, 0x01, 0x00]),
        write(&[0x0d, 0x00, 0x00, 0x00, 0x00]),
        write(&[0x13, 0x64]),
        read(0x1a, &[0x36]),
        write(&[0x1a, 0x36]),
        read(0x1d, &[0xa0]),
        write(&[0x1d, 0xa0]),
        read(0x03, &[0x01]),
        write(&[0x03, 0x01]),
    ]
}

#[test]
fn library_waveform_play_in_order() {
    let mut expectations = init_transactions();
    expectations.extend(vec![
        read(0x03, &[0x01]),
        write(&[0x03, 0x06]),
        write(&[0x04, 47]),
        write(&[0x05, 0]),
        write(&[0x0c, 0x01]),
    ]);

    let mut haptic = Drv2605::new(I2cMock::new(&expectations), Config::default()).unwrap();
    haptic.set_library(6).unwrap();
    haptic.set_waveform(0, 47u8).unwrap();
    haptic.set_waveform(1, 0u8).unwrap();
    haptic.play().unwrap();

    haptic.release().done();
}

#[test]
fn invalid_library_issues_no_transaction() {
    let mut haptic = Drv2605::new(I2cMock::new(&init_transactions()), Config::default()).unwrap();
    assert!(matches!(haptic.set_library(8), Err(DrvError::InvalidLibrary(8))));
    haptic.release().done();
}

#[test]
fn auto_calibration_protocol() {
    let mut expectations = init_transactions();
    expectations.extend(vec![
        read(0x1a, &[0x36]),
        write(&[0x1a, 0x36]),
        write(&[0x16, 0x3e, 0x8c]),
        read(0x1b, &[0x93]),
        write(&[0x1b, 0x93]),
        read(0x1e, &[0x20]),
        write(&[0x1e, 0x20]),
        write(&[0x01, 0x07]),
        write(&[0x0c, 0x01]),
        read(0x0c, &[0x01]),
        read(0x0c, &[0x00]),
        read(0x00, &[0xe0]),
        write(&[0x01, 0x00]),
        read(0x18, &[0x0d, 0x86]),
        read(0x1a, &[0x36]),
    ]);

    let mut haptic = Drv2605::new(I2cMock::new(&expectations), Config::default()).unwrap();
    let result = haptic
        .auto_calibrate(&CalibrationParams::default(), &mut MockNoop::new())
        .unwrap();
    assert_eq!(
        result,
        CalibrationResult {
            compensation: 0x0d,
            back_emf: 0x86,
            bemf_gain: 2,
            success: true,
        }
    );
    assert_eq!(haptic.current_mode(), Some(Mode::InternalTrigger));

    haptic.release().done();
}

#[test]
fn bus_error_on_mode_write_is_surfaced() {
    let mut expectations = init_transactions();
    expectations.push(write(&[0x01, 0x06]).with_error(MockError::Io(ErrorKind::Other)));

    let mut haptic = Drv2605::new(I2cMock::new(&expectations), Config::default()).unwrap();
    assert!(matches!(haptic.set_mode(Mode::Diagnostics), Err(DrvError::Bus(_))));
    assert_eq!(haptic.current_mode(), None);

    haptic.release().done();
}
