// Licensed under the Apache-2.0 license

//! Register-level access to the dsPIC33 I2C bus units.
//!
//! The driver never touches hardware words directly; everything goes
//! through the [`I2cRegisters`] trait so that the same state machine runs
//! against the memory-mapped units and against mock register banks in
//! host tests. [`Dspic33I2c`] is the on-chip realization: a structured
//! register-group view selected per unit, never reached by offsetting a
//! raw base pointer.

use core::ptr::{addr_of, addr_of_mut, read_volatile, write_volatile};

/// I2CxCON bit assignments (dsPIC33F register map).
pub mod con {
    pub const SEN: u16 = 1 << 0;
    pub const RSEN: u16 = 1 << 1;
    pub const PEN: u16 = 1 << 2;
    pub const RCEN: u16 = 1 << 3;
    pub const ACKEN: u16 = 1 << 4;
    pub const ACKDT: u16 = 1 << 5;
    pub const GCEN: u16 = 1 << 7;
    pub const SMEN: u16 = 1 << 8;
    pub const DISSLW: u16 = 1 << 9;
    pub const A10M: u16 = 1 << 10;
    pub const SCLREL: u16 = 1 << 12;
    pub const I2CEN: u16 = 1 << 15;

    /// Master-logic operation bits still in progress while set.
    pub const PENDING: u16 = SEN | RSEN | PEN | RCEN | ACKEN;
}

/// I2CxSTAT bit assignments (dsPIC33F register map).
pub mod stat {
    pub const TBF: u16 = 1 << 0;
    pub const RBF: u16 = 1 << 1;
    pub const R_W: u16 = 1 << 2;
    pub const S: u16 = 1 << 3;
    pub const P: u16 = 1 << 4;
    pub const I2COV: u16 = 1 << 6;
    pub const IWCOL: u16 = 1 << 7;
    pub const BCL: u16 = 1 << 10;
    pub const TRSTAT: u16 = 1 << 14;
    pub const ACKSTAT: u16 = 1 << 15;
}

/// Selector for one of the two physical bus units.
///
/// Every per-unit lookup goes through this enum, so an invalid selector is
/// unrepresentable rather than silently aliased to unit 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cUnit {
    I2c1,
    I2c2,
}

impl I2cUnit {
    /// Base address of the unit's register file.
    #[must_use]
    const fn base(self) -> usize {
        match self {
            I2cUnit::I2c1 => 0x0200,
            I2cUnit::I2c2 => 0x0210,
        }
    }

    /// Interrupt-flag word, interrupt-enable word, and the unit's slave
    /// event bit within both.
    const fn interrupt_regs(self) -> (usize, usize, u16) {
        match self {
            I2cUnit::I2c1 => (0x0086, 0x0096, 1 << 0),
            I2cUnit::I2c2 => (0x008A, 0x009A, 1 << 1),
        }
    }
}

/// Register file of one bus unit, in memory-map order.
#[repr(C)]
pub struct RegisterBlock {
    /// I2CxRCV: receive shift output (read-only).
    pub rcv: u16,
    /// I2CxTRN: transmit register; loading it arms the shifter.
    pub trn: u16,
    /// I2CxBRG: baud rate divider.
    pub brg: u16,
    /// I2CxCON: control.
    pub con: u16,
    /// I2CxSTAT: status.
    pub stat: u16,
    /// I2CxADD: own address.
    pub add: u16,
    /// I2CxMSK: address match mask.
    pub msk: u16,
}

/// Semantic view of one unit's registers.
///
/// Methods are single register accesses; nothing here blocks, so every
/// operation is safe to use from both the polled path and the interrupt
/// dispatcher.
pub trait I2cRegisters {
    // Unit configuration.
    fn module_enable(&mut self, enabled: bool);
    fn write_baud_divider(&mut self, divider: u16);
    fn write_own_address(&mut self, address: u16);
    fn write_address_mask(&mut self, mask: u16);
    fn set_ten_bit_addressing(&mut self, enabled: bool);
    fn set_general_call(&mut self, enabled: bool);
    fn set_smbus(&mut self, enabled: bool);
    fn set_slew_rate_limiting(&mut self, enabled: bool);

    // Condition and transfer-enable bits. The hardware clears each bit
    // when the signalled operation completes on the wire.
    fn set_start(&mut self);
    fn set_restart(&mut self);
    fn set_stop(&mut self);
    fn set_receive_enable(&mut self);
    /// Program the acknowledge driven after the next received byte:
    /// `true` acknowledges, `false` answers negative-acknowledge.
    fn set_ack_response(&mut self, ack: bool);
    /// Release the clock line a slave is stretching.
    fn release_clock(&mut self);

    /// Load the transmit register; on this hardware the load itself starts
    /// clocking the byte out.
    fn write_transmit(&mut self, byte: u8);
    /// True while any condition or transfer operation is still running.
    fn condition_pending(&self) -> bool;
    /// True while a transaction is open on the wire (START seen, no STOP).
    fn bus_busy(&self) -> bool;

    // Handshake and error status.
    /// True when the receiver answered the last byte with NACK.
    fn nack_received(&self) -> bool;
    fn write_collision(&self) -> bool;
    fn receive_overrun(&self) -> bool;
    fn arbitration_lost(&self) -> bool;
    fn clear_error_flags(&mut self);

    // Slave event status.
    fn start_detected(&self) -> bool;
    fn stop_detected(&self) -> bool;
    fn receive_full(&self) -> bool;
    fn transmit_requested(&self) -> bool;
    fn read_receive(&mut self) -> u8;

    // Interrupt plumbing.
    fn set_interrupt_enable(&mut self, enabled: bool);
    fn clear_interrupt_flag(&mut self);
}

/// Memory-mapped register bank of one dsPIC33 I2C unit.
pub struct Dspic33I2c {
    unit: I2cUnit,
}

impl Dspic33I2c {
    /// Take the register bank for `unit`.
    ///
    /// # Safety
    ///
    /// The caller must guarantee exclusive ownership of the unit: two
    /// banks for the same unit would race each other's read-modify-write
    /// sequences.
    #[must_use]
    pub const unsafe fn steal(unit: I2cUnit) -> Self {
        Self { unit }
    }

    #[must_use]
    pub fn unit(&self) -> I2cUnit {
        self.unit
    }

    fn regs(&self) -> *mut RegisterBlock {
        self.unit.base() as *mut RegisterBlock
    }

    fn read_con(&self) -> u16 {
        unsafe { read_volatile(addr_of!((*self.regs()).con)) }
    }

    fn read_stat(&self) -> u16 {
        unsafe { read_volatile(addr_of!((*self.regs()).stat)) }
    }

    fn modify_con(&mut self, set: u16, clear: u16) {
        unsafe {
            let con = addr_of_mut!((*self.regs()).con);
            write_volatile(con, (read_volatile(con) & !clear) | set);
        }
    }

    fn set_con_flag(&mut self, mask: u16, enabled: bool) {
        if enabled {
            self.modify_con(mask, 0);
        } else {
            self.modify_con(0, mask);
        }
    }

    fn clear_stat_bits(&mut self, mask: u16) {
        unsafe {
            let stat = addr_of_mut!((*self.regs()).stat);
            write_volatile(stat, read_volatile(stat) & !mask);
        }
    }
}

impl I2cRegisters for Dspic33I2c {
    fn module_enable(&mut self, enabled: bool) {
        if enabled {
            self.modify_con(con::I2CEN, 0);
        } else {
            // Full control reset, as for a reconfiguration cycle.
            unsafe { write_volatile(addr_of_mut!((*self.regs()).con), 0) };
        }
    }

    fn write_baud_divider(&mut self, divider: u16) {
        unsafe { write_volatile(addr_of_mut!((*self.regs()).brg), divider) };
    }

    fn write_own_address(&mut self, address: u16) {
        unsafe { write_volatile(addr_of_mut!((*self.regs()).add), address) };
    }

    fn write_address_mask(&mut self, mask: u16) {
        unsafe { write_volatile(addr_of_mut!((*self.regs()).msk), mask) };
    }

    fn set_ten_bit_addressing(&mut self, enabled: bool) {
        self.set_con_flag(con::A10M, enabled);
    }

    fn set_general_call(&mut self, enabled: bool) {
        self.set_con_flag(con::GCEN, enabled);
    }

    fn set_smbus(&mut self, enabled: bool) {
        self.set_con_flag(con::SMEN, enabled);
    }

    fn set_slew_rate_limiting(&mut self, enabled: bool) {
        // DISSLW is inverted: set disables the limiter.
        self.set_con_flag(con::DISSLW, !enabled);
    }

    fn set_start(&mut self) {
        self.modify_con(con::SEN, 0);
    }

    fn set_restart(&mut self) {
        self.modify_con(con::RSEN, 0);
    }

    fn set_stop(&mut self) {
        self.modify_con(con::PEN, 0);
    }

    fn set_receive_enable(&mut self) {
        self.modify_con(con::RCEN, 0);
    }

    fn set_ack_response(&mut self, ack: bool) {
        // ACKDT drives the acknowledge slot; a set bit answers NACK.
        self.set_con_flag(con::ACKDT, !ack);
    }

    fn release_clock(&mut self) {
        self.modify_con(con::SCLREL, 0);
    }

    fn write_transmit(&mut self, byte: u8) {
        unsafe { write_volatile(addr_of_mut!((*self.regs()).trn), u16::from(byte)) };
    }

    fn condition_pending(&self) -> bool {
        (self.read_con() & con::PENDING) != 0 || (self.read_stat() & stat::TRSTAT) != 0
    }

    fn bus_busy(&self) -> bool {
        let status = self.read_stat();
        (status & stat::S) != 0 && (status & stat::P) == 0
    }

    fn nack_received(&self) -> bool {
        (self.read_stat() & stat::ACKSTAT) != 0
    }

    fn write_collision(&self) -> bool {
        (self.read_stat() & stat::IWCOL) != 0
    }

    fn receive_overrun(&self) -> bool {
        (self.read_stat() & stat::I2COV) != 0
    }

    fn arbitration_lost(&self) -> bool {
        (self.read_stat() & stat::BCL) != 0
    }

    fn clear_error_flags(&mut self) {
        self.clear_stat_bits(stat::I2COV | stat::IWCOL | stat::BCL);
    }

    fn start_detected(&self) -> bool {
        (self.read_stat() & stat::S) != 0
    }

    fn stop_detected(&self) -> bool {
        (self.read_stat() & stat::P) != 0
    }

    fn receive_full(&self) -> bool {
        (self.read_stat() & stat::RBF) != 0
    }

    fn transmit_requested(&self) -> bool {
        let status = self.read_stat();
        (status & stat::R_W) != 0 && (status & stat::TBF) == 0
    }

    fn read_receive(&mut self) -> u8 {
        // Reading RCV clears RBF in hardware.
        let word = unsafe { read_volatile(addr_of!((*self.regs()).rcv)) };
        (word & 0x00FF) as u8
    }

    fn set_interrupt_enable(&mut self, enabled: bool) {
        let (_, iec, bit) = self.unit.interrupt_regs();
        unsafe {
            let iec = iec as *mut u16;
            let value = read_volatile(iec);
            write_volatile(iec, if enabled { value | bit } else { value & !bit });
        }
    }

    fn clear_interrupt_flag(&mut self) {
        let (ifs, _, bit) = self.unit.interrupt_regs();
        unsafe {
            let ifs = ifs as *mut u16;
            write_volatile(ifs, read_volatile(ifs) & !bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn register_block_matches_memory_map() {
        assert_eq!(offset_of!(RegisterBlock, rcv), 0x0);
        assert_eq!(offset_of!(RegisterBlock, trn), 0x2);
        assert_eq!(offset_of!(RegisterBlock, brg), 0x4);
        assert_eq!(offset_of!(RegisterBlock, con), 0x6);
        assert_eq!(offset_of!(RegisterBlock, stat), 0x8);
        assert_eq!(offset_of!(RegisterBlock, add), 0xA);
        assert_eq!(offset_of!(RegisterBlock, msk), 0xC);
    }

    #[test]
    fn units_resolve_to_distinct_bases() {
        assert_ne!(I2cUnit::I2c1.base(), I2cUnit::I2c2.base());
        assert_ne!(
            I2cUnit::I2c1.interrupt_regs().2,
            I2cUnit::I2c2.interrupt_regs().2
        );
    }

    #[test]
    fn pending_mask_covers_all_condition_bits() {
        assert_eq!(
            con::PENDING,
            con::SEN | con::RSEN | con::PEN | con::RCEN | con::ACKEN
        );
        assert_eq!(con::PENDING, 0x001F);
    }
}
