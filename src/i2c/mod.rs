// Licensed under the Apache-2.0 license

//! dsPIC33 I2C driver module.
//!
//! This module provides the bus transaction engine for the two on-chip
//! I2C units: blocking master transactions with timeout-bounded waits and
//! an interrupt-driven slave event dispatcher, on top of a mockable
//! register interface.
//!
//! ## Concurrency contract
//!
//! One controller instance per unit carries the shared software state for
//! both execution paths: the polled master path (synchronous calls from
//! user code) and the interrupt path (the slave event dispatcher). The
//! busy flag is the only mutual-exclusion signal for the polled path:
//! a start on a busy unit fails immediately rather than interleaving two
//! transactions. The dispatcher never blocks and never enters the polled
//! wait primitive. Driving the same unit as master from the polled path
//! while servicing slave interrupts for it is out of contract; the
//! interleaving is undefined.
//!
//! ## Bringing a unit up
//!
//! ```rust,ignore
//! use dspic33_ddk::common::NoOpLogger;
//! use dspic33_ddk::i2c::{Dspic33I2c, I2cConfig, I2cController, I2cUnit};
//!
//! let regs = unsafe { Dspic33I2c::steal(I2cUnit::I2c1) };
//! let mut i2c = I2cController::new(regs, I2cConfig::default_master(), NoOpLogger);
//! i2c.init();
//!
//! i2c.write_register(0x1D, 0x2D, 0x08)?;
//! let who_am_i = i2c.read_register(0x1D, 0x00)?;
//! ```

pub mod common;
pub mod controller;
pub mod registers;
pub mod slave;
pub mod timing;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{
    Error, EventCallback, I2cConfig, I2cConfigBuilder, I2cEvent, I2cEventHandler, I2cMode,
    I2cSpeed, I2cStatus,
};
pub use controller::I2cController;
pub use registers::{Dspic33I2c, I2cRegisters, I2cUnit};
pub use slave::BufferedSlave;
