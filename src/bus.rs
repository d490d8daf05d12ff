//! Two-wire bus transport used by the drivers.
//!
//! The [`Bus`] trait is a Wire-style request/response interface: bytes written between
//! [`Bus::begin_transaction`] and [`Bus::end_transaction`] go out as one write, and
//! [`Bus::request_bytes`] fetches a block that is then drained with [`Bus::read_byte`].
//!
//! [`I2cBus`] adapts any `embedded-hal` 1.0 [`I2c`] peripheral, [`LegacyI2cBus`] any
//! `embedded-hal` 0.2 blocking I²C peripheral.

use embedded_hal_02::blocking::i2c as i2c_02;
use embedded_hal_1::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

/// Size of the transmit and receive buffers of the adapters.
pub const BUFFER_LENGTH: usize = 32;

/// Status of the write phase of a transaction.
///
/// The discriminants are the status codes of the Arduino Wire library.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Transaction acknowledged
    #[default]
    Success = 0,
    /// Data too long to fit in the transmit buffer
    DataTooLong = 1,
    /// NACK received on transmit of the address
    AddressNack = 2,
    /// NACK received on transmit of data
    DataNack = 3,
    /// Any other bus error
    Other = 4,
}

impl Status {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Success
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0 => Status::Success,
            1 => Status::DataTooLong,
            2 => Status::AddressNack,
            3 => Status::DataNack,
            _ => Status::Other,
        }
    }
}

/// Synchronous request/response transport.
pub trait Bus {
    /// Bring up the bus. Called once by the driver's `begin`.
    fn begin(&mut self) {}

    /// Start queueing a write to the device at `address`.
    fn begin_transaction(&mut self, address: u8);

    /// Queue one byte of the current write.
    fn write_byte(&mut self, value: u8);

    /// Send the queued bytes and report how the device acknowledged them.
    fn end_transaction(&mut self) -> Status;

    /// Read `count` bytes from the device, returns how many are available.
    fn request_bytes(&mut self, address: u8, count: usize) -> usize;

    /// Next received byte, `0xFF` once the received block is drained.
    fn read_byte(&mut self) -> u8;
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn begin(&mut self) {
        (**self).begin()
    }

    fn begin_transaction(&mut self, address: u8) {
        (**self).begin_transaction(address)
    }

    fn write_byte(&mut self, value: u8) {
        (**self).write_byte(value)
    }

    fn end_transaction(&mut self) -> Status {
        (**self).end_transaction()
    }

    fn request_bytes(&mut self, address: u8, count: usize) -> usize {
        (**self).request_bytes(address, count)
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }
}

#[derive(Debug)]
struct Buffers {
    address: u8,
    tx: [u8; BUFFER_LENGTH],
    tx_len: usize,
    overflow: bool,
    rx: [u8; BUFFER_LENGTH],
    rx_len: usize,
    rx_pos: usize,
}

impl Buffers {
    const fn new() -> Self {
        Buffers {
            address: 0,
            tx: [0; BUFFER_LENGTH],
            tx_len: 0,
            overflow: false,
            rx: [0; BUFFER_LENGTH],
            rx_len: 0,
            rx_pos: 0,
        }
    }

    fn begin(&mut self, address: u8) {
        self.address = address;
        self.tx_len = 0;
        self.overflow = false;
    }

    fn push(&mut self, value: u8) {
        if self.tx_len < BUFFER_LENGTH {
            self.tx[self.tx_len] = value;
            self.tx_len += 1;
        } else {
            self.overflow = true;
        }
    }

    /// Receive window for a request of `count` bytes, `None` if it doesn't fit.
    fn prepare_rx(&mut self, count: usize) -> Option<&mut [u8]> {
        self.rx_len = 0;
        self.rx_pos = 0;
        if count > BUFFER_LENGTH {
            None
        } else {
            Some(&mut self.rx[..count])
        }
    }

    fn pop(&mut self) -> u8 {
        if self.rx_pos < self.rx_len {
            let value = self.rx[self.rx_pos];
            self.rx_pos += 1;
            value
        } else {
            0xFF
        }
    }
}

fn status_of(kind: ErrorKind) -> Status {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => Status::AddressNack,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => Status::DataNack,
        _ => Status::Other,
    }
}

/// [`Bus`] over an `embedded-hal` 1.0 I²C peripheral.
#[derive(Debug)]
pub struct I2cBus<I2C> {
    i2c: I2C,
    buffers: Buffers,
}

impl<I2C: I2c> I2cBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        I2cBus {
            i2c,
            buffers: Buffers::new(),
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Bus for I2cBus<I2C> {
    fn begin_transaction(&mut self, address: u8) {
        self.buffers.begin(address);
    }

    fn write_byte(&mut self, value: u8) {
        self.buffers.push(value);
    }

    fn end_transaction(&mut self) -> Status {
        let buffers = &self.buffers;
        if buffers.overflow {
            return Status::DataTooLong;
        }
        match self.i2c.write(buffers.address, &buffers.tx[..buffers.tx_len]) {
            Ok(()) => Status::Success,
            Err(e) => status_of(e.kind()),
        }
    }

    fn request_bytes(&mut self, address: u8, count: usize) -> usize {
        let rx = match self.buffers.prepare_rx(count) {
            Some(rx) => rx,
            None => return 0,
        };
        match self.i2c.read(address, rx) {
            Ok(()) => {
                self.buffers.rx_len = count;
                count
            }
            Err(_) => 0,
        }
    }

    fn read_byte(&mut self) -> u8 {
        self.buffers.pop()
    }
}

/// [`Bus`] over an `embedded-hal` 0.2 blocking I²C peripheral.
///
/// The 0.2 traits carry no error kind, every failed write reports [`Status::Other`].
#[derive(Debug)]
pub struct LegacyI2cBus<I2C> {
    i2c: I2C,
    buffers: Buffers,
}

impl<I2C: i2c_02::Write + i2c_02::Read> LegacyI2cBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        LegacyI2cBus {
            i2c,
            buffers: Buffers::new(),
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: i2c_02::Write + i2c_02::Read> Bus for LegacyI2cBus<I2C> {
    fn begin_transaction(&mut self, address: u8) {
        self.buffers.begin(address);
    }

    fn write_byte(&mut self, value: u8) {
        self.buffers.push(value);
    }

    fn end_transaction(&mut self) -> Status {
        let buffers = &self.buffers;
        if buffers.overflow {
            return Status::DataTooLong;
        }
        match self.i2c.write(buffers.address, &buffers.tx[..buffers.tx_len]) {
            Ok(()) => Status::Success,
            Err(_) => Status::Other,
        }
    }

    fn request_bytes(&mut self, address: u8, count: usize) -> usize {
        let rx = match self.buffers.prepare_rx(count) {
            Some(rx) => rx,
            None => return 0,
        };
        match self.i2c.read(address, rx) {
            Ok(()) => {
                self.buffers.rx_len = count;
                count
            }
            Err(_) => 0,
        }
    }

    fn read_byte(&mut self) -> u8 {
        self.buffers.pop()
    }
}
