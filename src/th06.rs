//! TH06 (Si7006) relative humidity and temperature sensor.
//!
//! - Humidity: 0 to 100 %RH, 12 bit by default
//! - Temperature: -40 to 125 C, 14 bit by default
//! - Address(7bit): 0x40

use embedded_hal_1::delay::DelayNs;

use crate::bus::{Bus, Status};

const TH06_I2C_ADDR: u8 = 0x40;

const TH06_MEAS_RH_HOLD: u8 = 0xE5;
const TH06_MEAS_RH_NO_HOLD: u8 = 0xF5;
const TH06_MEAS_TEMP_HOLD: u8 = 0xE3;
const TH06_MEAS_TEMP_NO_HOLD: u8 = 0xF3;
const TH06_READ_OLD_TEMP: u8 = 0xE0;
const TH06_RESET: u8 = 0xFE;
const TH06_WRITE_USER_REG: u8 = 0xE6;
const TH06_READ_USER_REG: u8 = 0xE7;
// datasheet command, 0x84 0xB8
const TH06_FIRMWARE: [u8; 2] = [0x84, 0xB8];
const TH06_ID_LOW: [u8; 2] = [0xFA, 0x0F];
const TH06_ID_HIGH: [u8; 2] = [0xFC, 0xC9];

const TH06_RES1_MSK: u8 = 0x80;
const TH06_VDDS_MSK: u8 = 0x40;
const TH06_HTRE_MSK: u8 = 0x04;
const TH06_RES0_MSK: u8 = 0x01;

const TH06_TEMP_VALID_MSK: u16 = 0xFFFC;
const TH06_RH_VALID_MSK: u16 = 0xFFFE;

// reset completes within 15ms
const TH06_RESET_DELAY_MS: u32 = 15;

const CRC8_POLYNOMIAL: u8 = 0x31;

/// TH06 errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Write phase not acknowledged, see [`TH06::last_error`]
    Transport(Status),
    /// Device returned fewer bytes than requested
    ShortRead { requested: usize, available: usize },
    /// Measurement failed the status bit check, carries the raw value
    InvalidReading(u16),
}

/// Measurement resolution, RES1 (D7) and RES0 (D0) of the user register.
///
/// Numeric codes are 0, 1, 2 and 4. Any other code means the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// RH 12 bit, temperature 14 bit
    #[default]
    Rh12Temp14,
    /// RH 8 bit, temperature 12 bit
    Rh8Temp12,
    /// RH 10 bit, temperature 13 bit
    Rh10Temp13,
    /// RH 11 bit, temperature 11 bit
    Rh11Temp11,
}

impl Resolution {
    pub fn code(self) -> u8 {
        match self {
            Resolution::Rh12Temp14 => 0,
            Resolution::Rh8Temp12 => 1,
            Resolution::Rh10Temp13 => 2,
            Resolution::Rh11Temp11 => 4,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Resolution::Rh12Temp14 => 0,
            Resolution::Rh8Temp12 => TH06_RES0_MSK,
            Resolution::Rh10Temp13 => TH06_RES1_MSK,
            Resolution::Rh11Temp11 => TH06_RES1_MSK | TH06_RES0_MSK,
        }
    }

    fn from_bits(reg: u8) -> Self {
        match (reg & TH06_RES1_MSK != 0, reg & TH06_RES0_MSK != 0) {
            (false, false) => Resolution::Rh12Temp14,
            (false, true) => Resolution::Rh8Temp12,
            (true, false) => Resolution::Rh10Temp13,
            (true, true) => Resolution::Rh11Temp11,
        }
    }
}

impl From<u8> for Resolution {
    /// Undefined codes (3, anything above 4) fall back to the default.
    fn from(code: u8) -> Self {
        match code {
            1 => Resolution::Rh8Temp12,
            2 => Resolution::Rh10Temp13,
            4 => Resolution::Rh11Temp11,
            _ => Resolution::Rh12Temp14,
        }
    }
}

/// Decoded RH/Temp user register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Control {
    pub resolution: Resolution,
    /// VDD is below the operating range. Read only.
    pub vdd_low: bool,
    /// On-chip heater enabled
    pub heater: bool,
}

impl Control {
    pub fn from_register(reg: u8) -> Self {
        Control {
            resolution: Resolution::from_bits(reg),
            vdd_low: reg & TH06_VDDS_MSK != 0,
            heater: reg & TH06_HTRE_MSK != 0,
        }
    }

    /// Register value to write. The VDD status bit is never written.
    pub fn to_register(self) -> u8 {
        let mut reg = self.resolution.bits();
        if self.heater {
            reg |= TH06_HTRE_MSK;
        }
        reg
    }
}

/// Measurement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Device holds the clock line until the measurement is done
    #[default]
    Hold,
    /// Device NACKs reads until the measurement is done
    NoHold,
}

/// CRC-8 used by the sensor family.
///
/// Initial value 0xFF, polynomial 0x31 (x^8 + x^5 + x^4 + 1), no final XOR, MSB first.
/// Readings are not checked against it.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFF_u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Temperature in C from a raw measurement.
pub fn temperature_from_raw(raw: u16) -> Result<f32, Error> {
    if raw & TH06_TEMP_VALID_MSK == 0 {
        return Err(Error::InvalidReading(raw));
    }
    Ok((175.72 * raw as f32) / 65536.0 - 46.85)
}

/// Relative humidity in %RH from a raw measurement.
pub fn humidity_from_raw(raw: u16) -> Result<f32, Error> {
    if raw & TH06_RH_VALID_MSK == 0 {
        return Err(Error::InvalidReading(raw));
    }
    Ok((125.0 * raw as f32) / 65536.0 - 6.0)
}

/// TH06 driver over a [`Bus`].
#[derive(Debug)]
pub struct TH06<B> {
    bus: B,
    address: u8,
    last_error: Status,
}

impl<B> TH06<B>
where
    B: Bus,
{
    /// Create a driver using the default address `0x40`
    pub fn new(bus: B) -> Self {
        Self::new_with_address(bus, TH06_I2C_ADDR)
    }

    /// Create a driver using a custom address
    pub fn new_with_address(bus: B, address: u8) -> Self {
        TH06 {
            bus,
            address,
            last_error: Status::Success,
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Selects the default address and brings up the bus. No presence check.
    pub fn begin(&mut self) {
        self.address = TH06_I2C_ADDR;
        self.bus.begin();
    }

    /// Writes the default user register and waits for the device to settle.
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.set_temp_control(Resolution::Rh12Temp14, false)?;
        delay.delay_ms(TH06_RESET_DELAY_MS);
        Ok(())
    }

    /// Sends the reset command. The user register returns to its power-on value.
    pub fn soft_reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.bus.begin_transaction(self.address);
        self.bus.write_byte(TH06_RESET);
        self.end_transaction()?;
        delay.delay_ms(TH06_RESET_DELAY_MS);
        Ok(())
    }

    pub fn temp_control(&mut self) -> Result<Control, Error> {
        let [reg] = self.read_data::<1>(&[TH06_READ_USER_REG])?;
        Ok(Control::from_register(reg))
    }

    /// Writes resolution and heater state. Undefined resolution codes are sent as 0.
    pub fn set_temp_control<R: Into<Resolution>>(&mut self, resolution: R, heater: bool) -> Result<(), Error> {
        let control = Control {
            resolution: resolution.into(),
            vdd_low: false,
            heater,
        };
        self.write_register(TH06_WRITE_USER_REG, control.to_register())
    }

    /// Reads the 8 byte electronic serial number.
    ///
    /// Each 4 byte group is stored last-byte-first, low group ahead of the high group:
    /// reads `[a, b, c, d]` and `[e, f, g, h]` give `[d, c, b, a, h, g, f, e]`.
    pub fn device_id(&mut self) -> Result<[u8; 8], Error> {
        // FIXME: confirm the intended byte order of the serial number against hardware
        let low = self.read_data::<4>(&TH06_ID_LOW)?;
        let high = self.read_data::<4>(&TH06_ID_HIGH)?;

        let mut id = [0u8; 8];
        for i in 0..4 {
            id[3 - i] = low[i];
            id[7 - i] = high[i];
        }
        Ok(id)
    }

    /// 0xFF for firmware 1.0, 0x20 for 2.0
    pub fn firmware_version(&mut self) -> Result<u8, Error> {
        let [version] = self.read_data::<1>(&TH06_FIRMWARE)?;
        Ok(version)
    }

    /// Measures temperature, in C.
    pub fn temperature(&mut self, mode: Mode) -> Result<f32, Error> {
        let register = match mode {
            Mode::Hold => TH06_MEAS_TEMP_HOLD,
            Mode::NoHold => TH06_MEAS_TEMP_NO_HOLD,
        };
        let raw = self.read_u16(register)?;
        self.checked(temperature_from_raw(raw))
    }

    /// Temperature taken during the previous humidity measurement, in C.
    pub fn old_temperature(&mut self) -> Result<f32, Error> {
        let raw = self.read_u16(TH06_READ_OLD_TEMP)?;
        self.checked(temperature_from_raw(raw))
    }

    /// Measures relative humidity, in %RH.
    pub fn humidity(&mut self, mode: Mode) -> Result<f32, Error> {
        let register = match mode {
            Mode::Hold => TH06_MEAS_RH_HOLD,
            Mode::NoHold => TH06_MEAS_RH_NO_HOLD,
        };
        let raw = self.read_u16(register)?;
        self.checked(humidity_from_raw(raw))
    }

    /// Status of the most recent bus transaction.
    pub fn last_error(&self) -> Status {
        self.last_error
    }

    fn checked(&self, value: Result<f32, Error>) -> Result<f32, Error> {
        #[cfg(feature = "defmt")]
        {
            if let Err(Error::InvalidReading(raw)) = value {
                defmt::warn!("th06 {=u8:#x}: rejected reading {=u16:#x}", self.address, raw);
            }
        }
        value
    }

    fn end_transaction(&mut self) -> Result<(), Error> {
        self.last_error = self.bus.end_transaction();
        if self.last_error.is_ok() {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::debug!("th06 {=u8:#x}: transaction failed, {}", self.address, self.last_error);
            Err(Error::Transport(self.last_error))
        }
    }

    fn write_register(&mut self, register: u8, payload: u8) -> Result<(), Error> {
        self.bus.begin_transaction(self.address);
        self.bus.write_byte(register);
        self.bus.write_byte(payload);
        self.end_transaction()
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, Error> {
        let data = self.read_data::<2>(&[register])?;
        Ok(u16::from_be_bytes(data))
    }

    /// Sends a 1 or 2 byte command, then reads exactly `N` bytes.
    fn read_data<const N: usize>(&mut self, command: &[u8]) -> Result<[u8; N], Error> {
        self.bus.begin_transaction(self.address);
        for &byte in command {
            self.bus.write_byte(byte);
        }
        self.end_transaction()?;

        let available = self.bus.request_bytes(self.address, N);
        if available != N {
            #[cfg(feature = "defmt")]
            defmt::debug!("th06 {=u8:#x}: requested {} bytes, got {}", self.address, N, available);
            return Err(Error::ShortRead {
                requested: N,
                available,
            });
        }

        let mut data = [0u8; N];
        for byte in data.iter_mut() {
            *byte = self.bus.read_byte();
        }
        Ok(data)
    }
}
