// Licensed under the Apache-2.0 license

//! Common types and constants for the dsPIC33 I2C driver modules.
//!
//! This module provides shared definitions for error handling, bus
//! configuration, and slave event reporting used across the I2C driver
//! implementation.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::MillisDurationU32 as MilliSeconds;

/// Default conversion between a configured millisecond timeout and
/// busy-wait iterations. Timeout precision is approximate by design; tune
/// [`I2cConfig::iterations_per_ms`] for the deployed clock and optimizer.
pub const DEFAULT_ITERATIONS_PER_MS: u32 = 1000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub fn hz(self) -> u32 {
        self as u32
    }
}

/// Operating role of a bus unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cMode {
    Master,
    Slave7Bit,
    Slave10Bit,
}

/// Current status of a bus unit. Exactly one value is current per unit;
/// each new condition overwrites the previous one, nothing is queued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cStatus {
    Idle,
    Busy,
    Timeout,
    AddressNack,
    DataNack,
    ArbitrationLost,
    BusCollision,
    Overrun,
    Success,
}

/// Failure returned by blocking bus operations.
///
/// Transport-level failures (`Timeout`, `ArbitrationLost`, `BusCollision`,
/// `Overrun`) and protocol-level negative responses (`AddressNack`,
/// `DataNack`) are kept distinct; `Busy` reports a start attempted while a
/// transaction is already in flight on the unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Busy,
    Timeout,
    AddressNack,
    DataNack,
    ArbitrationLost,
    BusCollision,
    Overrun,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::BusCollision => ErrorKind::Bus,
            Error::Overrun => ErrorKind::Overrun,
            Error::Busy | Error::Timeout => ErrorKind::Other,
        }
    }
}

/// Slave-side bus event reported by the interrupt dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cEvent {
    /// START condition seen on the bus.
    Start,
    /// STOP condition seen on the bus.
    Stop,
    /// A byte addressed to this unit was received; the payload carries it.
    DataReceived,
    /// The master is clocking a read; a response byte is expected.
    DataRequested,
}

/// Handler invoked by the slave event dispatcher, at most once per
/// dispatch, from interrupt context.
///
/// Implementations must not block and must not perform bus operations on
/// the unit that raised the event; the dispatcher runs before the unit's
/// polled state machine regains control, so a blocking call here deadlocks
/// the bus.
pub trait I2cEventHandler {
    fn on_event(&mut self, event: I2cEvent, data: u8);
}

/// The C-style callback shape: a plain function pointer works as a handler.
pub type EventCallback = fn(I2cEvent, u8);

impl I2cEventHandler for EventCallback {
    fn on_event(&mut self, event: I2cEvent, data: u8) {
        (*self)(event, data);
    }
}

/// Bus unit configuration, consumed once by controller initialization and
/// read back through accessors afterwards.
pub struct I2cConfig<H = EventCallback> {
    pub mode: I2cMode,
    pub speed: I2cSpeed,
    /// Own address when acting as slave; 7 or 10 significant bits per mode.
    pub own_address: u16,
    /// Address match mask; zero requires an exact match.
    pub address_mask: u16,
    pub general_call: bool,
    pub slew_rate_control: bool,
    /// Alternate electrical profile for SMBus-level signalling.
    pub smbus: bool,
    pub timeout: MilliSeconds,
    pub interrupt_enable: bool,
    pub iterations_per_ms: u32,
    pub callback: Option<H>,
}

impl I2cConfig {
    /// Canonical master preset: 100 kHz, 1000 ms timeout, interrupts off.
    #[must_use]
    pub fn default_master() -> Self {
        I2cConfigBuilder::new().build()
    }

    /// Canonical slave preset: 7-bit slave at 0x40, general call accepted,
    /// interrupts on.
    #[must_use]
    pub fn default_slave() -> Self {
        I2cConfigBuilder::new()
            .mode(I2cMode::Slave7Bit)
            .own_address(0x40)
            .general_call(true)
            .interrupt_enable(true)
            .build()
    }
}

pub struct I2cConfigBuilder<H = EventCallback> {
    mode: I2cMode,
    speed: I2cSpeed,
    own_address: u16,
    address_mask: u16,
    general_call: bool,
    slew_rate_control: bool,
    smbus: bool,
    timeout: MilliSeconds,
    interrupt_enable: bool,
    iterations_per_ms: u32,
    callback: Option<H>,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: I2cMode::Master,
            speed: I2cSpeed::Standard,
            own_address: 0x00,
            address_mask: 0x0000,
            general_call: false,
            slew_rate_control: true,
            smbus: false,
            timeout: MilliSeconds::millis(1000),
            interrupt_enable: false,
            iterations_per_ms: DEFAULT_ITERATIONS_PER_MS,
            callback: None,
        }
    }
}

impl<H: I2cEventHandler> I2cConfigBuilder<H> {
    #[must_use]
    pub fn mode(mut self, mode: I2cMode) -> Self {
        self.mode = mode;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn own_address(mut self, address: u16) -> Self {
        self.own_address = address;
        self
    }
    #[must_use]
    pub fn address_mask(mut self, mask: u16) -> Self {
        self.address_mask = mask;
        self
    }
    #[must_use]
    pub fn general_call(mut self, enabled: bool) -> Self {
        self.general_call = enabled;
        self
    }
    #[must_use]
    pub fn slew_rate_control(mut self, enabled: bool) -> Self {
        self.slew_rate_control = enabled;
        self
    }
    #[must_use]
    pub fn smbus(mut self, enabled: bool) -> Self {
        self.smbus = enabled;
        self
    }
    #[must_use]
    pub fn timeout(mut self, timeout: MilliSeconds) -> Self {
        self.timeout = timeout;
        self
    }
    #[must_use]
    pub fn interrupt_enable(mut self, enabled: bool) -> Self {
        self.interrupt_enable = enabled;
        self
    }
    #[must_use]
    pub fn iterations_per_ms(mut self, iterations: u32) -> Self {
        self.iterations_per_ms = iterations;
        self
    }
    /// Register an event handler; the last registration wins.
    #[must_use]
    pub fn callback<H2: I2cEventHandler>(self, callback: H2) -> I2cConfigBuilder<H2> {
        I2cConfigBuilder {
            mode: self.mode,
            speed: self.speed,
            own_address: self.own_address,
            address_mask: self.address_mask,
            general_call: self.general_call,
            slew_rate_control: self.slew_rate_control,
            smbus: self.smbus,
            timeout: self.timeout,
            interrupt_enable: self.interrupt_enable,
            iterations_per_ms: self.iterations_per_ms,
            callback: Some(callback),
        }
    }
    #[must_use]
    pub fn build(self) -> I2cConfig<H> {
        I2cConfig {
            mode: self.mode,
            speed: self.speed,
            own_address: self.own_address,
            address_mask: self.address_mask,
            general_call: self.general_call,
            slew_rate_control: self.slew_rate_control,
            smbus: self.smbus,
            timeout: self.timeout,
            interrupt_enable: self.interrupt_enable,
            iterations_per_ms: self.iterations_per_ms,
            callback: self.callback,
        }
    }
}
