// Licensed under the Apache-2.0 license

//! Slave-side event dispatch for the bus units.
//!
//! The dispatcher is the interrupt half of the driver: the per-unit
//! interrupt vector is expected to call [`I2cController::handle_interrupt`]
//! for its unit, and nothing else. Dispatch only reads and writes single
//! register bits plus the receive byte; it never blocks and never enters
//! the polled wait primitive, so it is safe to run at interrupt priority.
//!
//! ```rust,ignore
//! // One entry point per physical unit:
//! fn si2c1_interrupt() {
//!     // I2C1_DRIVER is whatever per-unit storage the firmware uses.
//!     I2C1_DRIVER.with(|driver| driver.handle_interrupt());
//! }
//! ```
//!
//! A registered handler sees at most one event per dispatch and must obey
//! the [`I2cEventHandler`] non-blocking contract; in particular it must
//! not run bus operations on the unit that raised the event. Data service
//! for slave reads belongs in the main loop via the polled helpers below.

use crate::common::Logger;
use crate::i2c::common::{I2cEvent, I2cEventHandler};
use crate::i2c::controller::I2cController;
use crate::i2c::registers::I2cRegisters;

impl<R: I2cRegisters, H: I2cEventHandler, L: Logger> I2cController<R, H, L> {
    /// Dispatch one hardware-flagged bus event to the registered handler.
    ///
    /// Clears the unit's interrupt-pending flag first, then reads the
    /// status bits in fixed priority order (start seen, stop seen, byte
    /// received, byte requested) and reports the first match. With no
    /// handler registered the dispatch is a no-op beyond the flag clear.
    pub fn handle_interrupt(&mut self) {
        self.regs.clear_interrupt_flag();
        let Some(handler) = self.config.callback.as_mut() else {
            return;
        };
        if self.regs.start_detected() {
            handler.on_event(I2cEvent::Start, 0);
        } else if self.regs.stop_detected() {
            handler.on_event(I2cEvent::Stop, 0);
        } else if self.regs.receive_full() {
            let byte = self.regs.read_receive();
            handler.on_event(I2cEvent::DataReceived, byte);
        } else if self.regs.transmit_requested() {
            handler.on_event(I2cEvent::DataRequested, 0);
        }
    }

    /// True when a received byte is waiting in the receive register.
    #[must_use]
    pub fn slave_data_ready(&self) -> bool {
        self.regs.receive_full()
    }

    /// Take the received byte; clears the data-ready condition.
    pub fn slave_read_byte(&mut self) -> u8 {
        self.regs.read_receive()
    }

    /// Load the response byte for a master read and release the stretched
    /// clock so the master can shift it out.
    pub fn slave_write_byte(&mut self, byte: u8) {
        self.regs.write_transmit(byte);
        self.regs.release_clock();
    }
}

/// Capturing event handler: accumulates the bytes of master writes into a
/// fixed-capacity buffer for main-loop consumption.
pub struct BufferedSlave<const N: usize = 64> {
    received: heapless::Vec<u8, N>,
    in_transaction: bool,
    overflowed: bool,
    requests: usize,
}

impl<const N: usize> Default for BufferedSlave<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BufferedSlave<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            received: heapless::Vec::new(),
            in_transaction: false,
            overflowed: false,
            requests: 0,
        }
    }

    /// Bytes captured since the last [`clear`](Self::clear).
    #[must_use]
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// True while a transaction addressed to this unit is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// True when a byte was dropped because the buffer was full.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Master read requests observed and not yet served.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests
    }

    pub fn take_request(&mut self) -> bool {
        if self.requests > 0 {
            self.requests -= 1;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.received.clear();
        self.overflowed = false;
        self.requests = 0;
    }
}

impl<const N: usize> I2cEventHandler for BufferedSlave<N> {
    fn on_event(&mut self, event: I2cEvent, data: u8) {
        match event {
            I2cEvent::Start => self.in_transaction = true,
            I2cEvent::Stop => self.in_transaction = false,
            I2cEvent::DataReceived => {
                if self.received.push(data).is_err() {
                    self.overflowed = true;
                }
            }
            I2cEvent::DataRequested => self.requests += 1,
        }
    }
}
