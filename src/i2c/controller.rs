// Licensed under the Apache-2.0 license

//! Blocking I2C transaction engine for the dsPIC33 bus units.
//!
//! This module provides safe APIs for configuring a bus unit and running
//! master transactions over it: condition sequencing (START / REPEATED
//! START / STOP), byte transfers with acknowledge handshaking, and the
//! composite operations built on top (addressed reads and writes,
//! register-indexed access, bus scan). It implements the embedded-hal
//! `I2c` interface and is designed for `no_std` environments with the
//! hardware behind the [`I2cRegisters`] trait.
//!
//! All waits are bounded busy-polls derived from the configured timeout;
//! there is no hardware timer behind them, so timeout precision is
//! approximate by design. The unit's busy flag is the only
//! mutual-exclusion signal between overlapping master transactions: a
//! `start` on a busy unit fails immediately instead of queueing.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{
    Error, EventCallback, I2cConfig, I2cEventHandler, I2cMode, I2cStatus,
};
use crate::i2c::registers::I2cRegisters;
use crate::i2c::timing;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::MillisDurationU32 as MilliSeconds;

/// Address byte with the read/write direction bit in place.
fn address_header(address: u8, read: bool) -> u8 {
    (address << 1) | u8::from(read)
}

/// Transaction engine for one bus unit.
///
/// One controller instance owns one unit's register bank and its software
/// state (status code, busy flag, configuration). The polled master path
/// and the interrupt dispatcher both run through the same instance; see
/// the module-level notes on the concurrency contract.
pub struct I2cController<R: I2cRegisters, H: I2cEventHandler = EventCallback, L: Logger = NoOpLogger>
{
    pub regs: R,
    pub(crate) config: I2cConfig<H>,
    pub(crate) logger: L,
    pub(crate) status: I2cStatus,
    pub(crate) busy: bool,
}

impl<R: I2cRegisters, H: I2cEventHandler, L: Logger> I2cController<R, H, L> {
    pub fn new(regs: R, config: I2cConfig<H>, logger: L) -> Self {
        Self {
            regs,
            config,
            logger,
            status: I2cStatus::Idle,
            busy: false,
        }
    }

    /// Apply the stored configuration to the hardware unit.
    ///
    /// The unit is disabled for the duration of the register programming
    /// and re-enabled at the end; software state is reset to idle.
    pub fn init(&mut self) {
        self.regs.module_enable(false);
        self.regs.clear_error_flags();
        self.regs.write_baud_divider(timing::baud_divider(
            timing::INSTRUCTION_CLOCK_HZ,
            self.config.speed.hz(),
        ));
        match self.config.mode {
            I2cMode::Master => {
                self.regs.set_ten_bit_addressing(false);
            }
            I2cMode::Slave7Bit => {
                self.regs.set_ten_bit_addressing(false);
                self.regs.write_own_address(self.config.own_address);
                self.regs.write_address_mask(self.config.address_mask);
            }
            I2cMode::Slave10Bit => {
                self.regs.set_ten_bit_addressing(true);
                self.regs.write_own_address(self.config.own_address);
                self.regs.write_address_mask(self.config.address_mask);
            }
        }
        self.regs.set_general_call(self.config.general_call);
        self.regs.set_smbus(self.config.smbus);
        self.regs.set_slew_rate_limiting(self.config.slew_rate_control);
        self.regs.module_enable(true);
        self.regs.set_interrupt_enable(self.config.interrupt_enable);
        self.status = I2cStatus::Idle;
        self.busy = false;
    }

    /// Disable the unit and its interrupt source; software state resets.
    pub fn deinit(&mut self) {
        self.regs.set_interrupt_enable(false);
        self.regs.module_enable(false);
        self.status = I2cStatus::Idle;
        self.busy = false;
    }

    #[must_use]
    pub fn status(&self) -> I2cStatus {
        self.status
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig<H> {
        &self.config
    }

    pub fn set_timeout(&mut self, timeout: MilliSeconds) {
        self.config.timeout = timeout;
    }

    /// Replace the registered event handler; the last registration wins.
    pub fn set_callback(&mut self, callback: Option<H>) {
        self.config.callback = callback;
    }

    /// Reconfigure the own slave address without a full re-init.
    pub fn set_slave_address(&mut self, address: u16) {
        self.config.own_address = address;
        self.regs.write_own_address(address);
    }

    pub fn enable_general_call(&mut self, enabled: bool) {
        self.config.general_call = enabled;
        self.regs.set_general_call(enabled);
    }

    /// Reset the software bookkeeping after a wedged transaction: status
    /// returns to idle, the busy flag clears, and the hardware error flags
    /// are acknowledged. Does not attempt to repair the bus itself.
    pub fn clear_errors(&mut self) {
        self.status = I2cStatus::Idle;
        self.busy = false;
        self.regs.clear_error_flags();
    }

    /// Bounded poll of the pending-operation bits.
    ///
    /// Error flags are inspected before the pending and budget checks on
    /// every iteration, so a collision that lands on the final iteration
    /// is still reported as a collision, not a timeout.
    fn wait_condition(&mut self) -> Result<(), Error> {
        let mut budget = self
            .config
            .timeout
            .ticks()
            .saturating_mul(self.config.iterations_per_ms);
        loop {
            if self.regs.receive_overrun() {
                self.status = I2cStatus::Overrun;
                return Err(Error::Overrun);
            }
            if self.regs.write_collision() {
                self.status = I2cStatus::BusCollision;
                return Err(Error::BusCollision);
            }
            if self.regs.arbitration_lost() {
                self.status = I2cStatus::ArbitrationLost;
                return Err(Error::ArbitrationLost);
            }
            if !self.regs.condition_pending() {
                return Ok(());
            }
            if budget == 0 {
                self.status = I2cStatus::Timeout;
                return Err(Error::Timeout);
            }
            budget -= 1;
        }
    }

    /// Generate a START condition and claim the unit.
    ///
    /// # Errors
    ///
    /// Fails immediately with [`Error::Busy`] if a transaction is already
    /// in flight on this unit (no wait iterations are consumed). Transport
    /// errors from the wait are propagated and release the claim.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.busy {
            return Err(Error::Busy);
        }
        self.busy = true;
        self.status = I2cStatus::Busy;
        self.regs.set_start();
        if let Err(err) = self.wait_condition() {
            self.busy = false;
            return Err(err);
        }
        Ok(())
    }

    /// Generate a REPEATED START condition.
    ///
    /// Does not touch the busy flag: a standalone call outside an owned
    /// transaction is not protected against a concurrent transfer.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the wait.
    pub fn restart(&mut self) -> Result<(), Error> {
        self.regs.set_restart();
        self.wait_condition()
    }

    /// Generate a STOP condition and release the unit.
    ///
    /// The busy flag clears and status returns to idle only when the stop
    /// completes; after a failed stop the unit stays marked busy, and the
    /// caller must not assume the bus is free.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the wait.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.regs.set_stop();
        self.wait_condition()?;
        self.busy = false;
        self.status = I2cStatus::Idle;
        Ok(())
    }

    fn transmit_byte(
        &mut self,
        byte: u8,
        nack_status: I2cStatus,
        nack_error: Error,
    ) -> Result<(), Error> {
        self.regs.write_transmit(byte);
        self.wait_condition()?;
        if self.regs.nack_received() {
            self.status = nack_status;
            return Err(nack_error);
        }
        Ok(())
    }

    /// Clock one byte out and read back the acknowledge.
    ///
    /// The byte is transmitted on success and failure alike; only the
    /// interpretation of the handshake differs.
    ///
    /// # Errors
    ///
    /// [`Error::DataNack`] when the receiver answers negative-acknowledge;
    /// transport errors from the wait otherwise.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.transmit_byte(byte, I2cStatus::DataNack, Error::DataNack)
    }

    /// Address phase of a transaction; a NACK here is an address NACK.
    fn address_phase(&mut self, address: u8, read: bool) -> Result<(), Error> {
        self.transmit_byte(
            address_header(address, read),
            I2cStatus::AddressNack,
            Error::AddressNack,
        )
    }

    /// Clock one byte in, answering with ACK (`send_ack`) or NACK.
    ///
    /// Returns the low byte of the receive register regardless of the wait
    /// outcome; a timed-out read yields whatever was last latched. Check
    /// [`status`](Self::status), not only the returned byte, to detect a
    /// failed read.
    pub fn read_byte(&mut self, send_ack: bool) -> u8 {
        self.regs.set_ack_response(send_ack);
        self.regs.set_receive_enable();
        let _ = self.wait_condition();
        self.regs.read_receive()
    }

    /// Transport-level failure recorded since the transaction started.
    fn transport_error(&self) -> Option<Error> {
        match self.status {
            I2cStatus::Timeout => Some(Error::Timeout),
            I2cStatus::Overrun => Some(Error::Overrun),
            I2cStatus::BusCollision => Some(Error::BusCollision),
            I2cStatus::ArbitrationLost => Some(Error::ArbitrationLost),
            _ => None,
        }
    }

    /// Best-effort STOP on the failure path, so a broken transfer still
    /// leaves the bus electrically idle for other agents.
    fn abort_with_stop(&mut self, err: Error) -> Error {
        if self.stop().is_err() {
            self.logger.log("i2c: bus not released after failed transfer");
        }
        err
    }

    /// Addressed multi-byte write: START, address, payload, STOP.
    ///
    /// An empty payload performs the address-only transaction.
    ///
    /// # Errors
    ///
    /// [`Error::AddressNack`] / [`Error::DataNack`] on a refused byte,
    /// transport errors otherwise. A STOP is attempted on every failure
    /// before the error propagates.
    pub fn write_data(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        self.start()?;
        if let Err(err) = self.address_phase(address, false) {
            self.logger.log("i2c: address not acknowledged");
            return Err(self.abort_with_stop(err));
        }
        for &byte in bytes {
            if let Err(err) = self.write_byte(byte) {
                return Err(self.abort_with_stop(err));
            }
        }
        self.stop()?;
        self.status = I2cStatus::Success;
        Ok(())
    }

    /// Addressed multi-byte read: START, address, N bytes, STOP.
    ///
    /// Every byte but the last is acknowledged; the NACK on the final byte
    /// tells the peripheral the transfer is complete.
    ///
    /// # Errors
    ///
    /// [`Error::AddressNack`] on a refused address, transport errors
    /// recorded during the read loop otherwise. A STOP is attempted on
    /// every failure before the error propagates.
    pub fn read_data(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Error> {
        self.start()?;
        if let Err(err) = self.address_phase(address, true) {
            self.logger.log("i2c: address not acknowledged");
            return Err(self.abort_with_stop(err));
        }
        let count = buffer.len();
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_byte(index + 1 < count);
            if let Some(err) = self.transport_error() {
                return Err(self.abort_with_stop(err));
            }
        }
        self.stop()?;
        self.status = I2cStatus::Success;
        Ok(())
    }

    /// Combined write-then-read joined by a REPEATED START, so the bus is
    /// not released between the phases.
    ///
    /// # Errors
    ///
    /// As for [`write_data`](Self::write_data) and
    /// [`read_data`](Self::read_data); a STOP is attempted on every
    /// failure.
    pub fn write_read_data(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.start()?;
        if let Err(err) = self.address_phase(address, false) {
            return Err(self.abort_with_stop(err));
        }
        for &byte in bytes {
            if let Err(err) = self.write_byte(byte) {
                return Err(self.abort_with_stop(err));
            }
        }
        if let Err(err) = self.restart() {
            return Err(self.abort_with_stop(err));
        }
        if let Err(err) = self.address_phase(address, true) {
            return Err(self.abort_with_stop(err));
        }
        let count = buffer.len();
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_byte(index + 1 < count);
            if let Some(err) = self.transport_error() {
                return Err(self.abort_with_stop(err));
            }
        }
        self.stop()?;
        self.status = I2cStatus::Success;
        Ok(())
    }

    /// Write one value to a register-indexed peripheral location.
    ///
    /// # Errors
    ///
    /// As for [`write_data`](Self::write_data).
    pub fn write_register(&mut self, device: u8, register: u8, value: u8) -> Result<(), Error> {
        self.write_data(device, &[register, value])
    }

    /// Read one value from a register-indexed peripheral location.
    ///
    /// # Errors
    ///
    /// As for [`write_read_data`](Self::write_read_data).
    pub fn read_register(&mut self, device: u8, register: u8) -> Result<u8, Error> {
        let mut value = 0u8;
        self.write_read_data(device, &[register], core::slice::from_mut(&mut value))?;
        Ok(value)
    }

    /// Minimal probe: START, address with write bit, STOP.
    ///
    /// Returns whether the address was acknowledged; transport failures
    /// read as "no device".
    pub fn check_device(&mut self, address: u8) -> bool {
        if self.start().is_err() {
            return false;
        }
        let acknowledged = self.address_phase(address, false).is_ok();
        let _ = self.stop();
        acknowledged
    }

    /// Probe every non-reserved address (1..=126) in strictly ascending
    /// order, recording responders into `devices` up to its capacity.
    ///
    /// Returns the total number of acknowledging addresses, which may
    /// exceed the recorded list; a non-zero count means at least one
    /// device answered.
    pub fn scan_bus(&mut self, devices: &mut [u8]) -> usize {
        let mut found = 0usize;
        for address in 1u8..0x7F {
            if self.check_device(address) {
                if let Some(slot) = devices.get_mut(found) {
                    *slot = address;
                }
                found += 1;
            }
        }
        found
    }

    /// Bounded poll until no transaction is open on the wire.
    ///
    /// Returns `false` when the budget runs out first. Uses the same
    /// approximate iteration accounting as the transaction waits.
    pub fn wait_bus_idle(&mut self, timeout: MilliSeconds) -> bool {
        let mut budget = timeout.ticks().saturating_mul(self.config.iterations_per_ms);
        while self.regs.bus_busy() {
            if budget == 0 {
                return false;
            }
            budget -= 1;
        }
        true
    }

    /// Execute a sequence of operations as one transaction: START for the
    /// first operation, REPEATED START on each direction change, one
    /// trailing STOP. Adjacent same-direction operations are merged, so
    /// the NACK falls only on the very last byte of a read run.
    ///
    /// # Errors
    ///
    /// As for the composite operations; a STOP is attempted on every
    /// failure.
    pub fn transaction_slice(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut started = false;
        let mut previous_read: Option<bool> = None;
        let mut ops = operations.iter_mut().peekable();
        while let Some(op) = ops.next() {
            let is_read = matches!(op, Operation::Read(_));
            if previous_read != Some(is_read) {
                if started {
                    if let Err(err) = self.restart() {
                        return Err(self.abort_with_stop(err));
                    }
                } else {
                    self.start()?;
                    started = true;
                }
                if let Err(err) = self.address_phase(address, is_read) {
                    return Err(self.abort_with_stop(err));
                }
            }
            match op {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if let Err(err) = self.write_byte(byte) {
                            return Err(self.abort_with_stop(err));
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let run_continues = ops
                        .peek()
                        .map_or(false, |next| matches!(next, Operation::Read(_)));
                    let count = buffer.len();
                    for (index, slot) in buffer.iter_mut().enumerate() {
                        let last_of_run = index + 1 == count && !run_continues;
                        *slot = self.read_byte(!last_of_run);
                        if let Some(err) = self.transport_error() {
                            return Err(self.abort_with_stop(err));
                        }
                    }
                }
            }
            previous_read = Some(is_read);
        }
        if started {
            self.stop()?;
            self.status = I2cStatus::Success;
        }
        Ok(())
    }

    /// Dump the stored configuration, informational only.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the sink.
    pub fn print_config<W: embedded_io::Write>(
        &self,
        w: &mut W,
    ) -> Result<(), embedded_io::WriteFmtError<W::Error>> {
        writeln!(w, "=== I2C configuration ===\r")?;
        writeln!(w, "mode: {:?}\r", self.config.mode)?;
        writeln!(w, "speed: {} Hz\r", self.config.speed.hz())?;
        writeln!(w, "own address: 0x{:02X}\r", self.config.own_address)?;
        writeln!(w, "timeout: {} ms\r", self.config.timeout.ticks())?;
        writeln!(w, "general call: {}\r", self.config.general_call)?;
        writeln!(w, "slew rate control: {}\r", self.config.slew_rate_control)?;
        writeln!(w, "smbus: {}\r", self.config.smbus)?;
        writeln!(w, "interrupts: {}\r", self.config.interrupt_enable)
    }

    /// Dump the live unit status, informational only.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the sink.
    pub fn print_status<W: embedded_io::Write>(
        &self,
        w: &mut W,
    ) -> Result<(), embedded_io::WriteFmtError<W::Error>> {
        writeln!(w, "status: {:?}\r", self.status)?;
        writeln!(w, "busy: {}\r", self.busy)?;
        writeln!(w, "bus wire busy: {}\r", self.regs.bus_busy())
    }
}

impl<R: I2cRegisters, H: I2cEventHandler, L: Logger> embedded_hal::i2c::ErrorType
    for I2cController<R, H, L>
{
    type Error = Error;
}

impl<R: I2cRegisters, H: I2cEventHandler, L: Logger> embedded_hal::i2c::I2c
    for I2cController<R, H, L>
{
    fn read(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.read_data(address, buffer)
    }

    fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_data(address, bytes)
    }

    fn write_read(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.write_read_data(address, bytes, buffer)
    }

    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.transaction_slice(address, operations)
    }
}
