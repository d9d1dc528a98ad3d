// Licensed under the Apache-2.0 license

//! Mock register bank for host-side driver tests.
//!
//! Models just enough of a bus unit to exercise the transaction engine: a
//! transcript of bus-level operations, an optional echoing peripheral
//! behind a set of acknowledging addresses, injectable fault flags, and a
//! poll counter for the wait primitive.

use crate::i2c::registers::I2cRegisters;
use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    Start,
    Restart,
    Stop,
    Write(u8),
    AckResponse(bool),
    Read,
}

pub struct MockRegisters {
    /// Bus-level operation transcript, in issue order.
    pub ops: Vec<BusOp>,
    /// Addresses that acknowledge their header byte.
    pub devices: Vec<u8>,
    /// Bytes served to reads; `echo_writes` feeds it from writes.
    pub rx_bytes: VecDeque<u8>,
    pub echo_writes: bool,
    /// Polls a condition stays pending before it completes.
    pub pending_ticks: u32,
    pending: Cell<u32>,
    /// Wait-primitive iterations observed (condition_pending calls).
    pub polls: Cell<u32>,
    pub collision: bool,
    pub overrun: bool,
    pub arb_lost: bool,
    /// Make the next STOP never complete.
    pub stop_hangs: bool,
    /// Zero-based index of the data byte the peripheral refuses.
    pub nack_data_at: Option<usize>,
    data_index: usize,
    expect_header: bool,
    header_is_read: bool,
    nack: bool,
    rcv: Cell<u8>,
    /// Polls the wire stays busy for `bus_busy`.
    pub wire_busy_polls: Cell<u32>,

    // Slave status injection.
    pub start_flag: bool,
    pub stop_flag: bool,
    pub rbf: bool,
    pub tx_request: bool,
    pub int_flag_clears: u32,
    pub clock_released: bool,

    // Configuration capture.
    pub enabled: bool,
    pub brg: u16,
    pub own_address: u16,
    pub address_mask: u16,
    pub ten_bit: bool,
    pub general_call: bool,
    pub smbus: bool,
    pub slew_rate: bool,
    pub int_enabled: bool,
    pub error_flag_clears: Cell<u32>,
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisters {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            devices: Vec::new(),
            rx_bytes: VecDeque::new(),
            echo_writes: false,
            pending_ticks: 1,
            pending: Cell::new(0),
            polls: Cell::new(0),
            collision: false,
            overrun: false,
            arb_lost: false,
            stop_hangs: false,
            nack_data_at: None,
            data_index: 0,
            expect_header: false,
            header_is_read: false,
            nack: false,
            rcv: Cell::new(0),
            wire_busy_polls: Cell::new(0),
            start_flag: false,
            stop_flag: false,
            rbf: false,
            tx_request: false,
            int_flag_clears: 0,
            clock_released: false,
            enabled: false,
            brg: 0,
            own_address: 0,
            address_mask: 0,
            ten_bit: false,
            general_call: false,
            smbus: false,
            slew_rate: false,
            int_enabled: false,
            error_flag_clears: Cell::new(0),
        }
    }

    /// Mock with an echoing peripheral behind the given addresses: every
    /// acknowledged data write is queued up and served back to reads.
    pub fn with_devices(addresses: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.devices = addresses.to_vec();
        mock.echo_writes = true;
        mock
    }

    /// Acknowledge directions programmed over the transcript, in order.
    pub fn ack_dir_transcript(&self) -> Vec<bool> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::AckResponse(ack) => Some(*ack),
                _ => None,
            })
            .collect()
    }

    pub fn set_receive_value(&mut self, byte: u8) {
        self.rcv.set(byte);
    }

    fn arm_pending(&mut self, ticks: u32) {
        self.pending.set(ticks);
    }
}

impl I2cRegisters for MockRegisters {
    fn module_enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn write_baud_divider(&mut self, divider: u16) {
        self.brg = divider;
    }

    fn write_own_address(&mut self, address: u16) {
        self.own_address = address;
    }

    fn write_address_mask(&mut self, mask: u16) {
        self.address_mask = mask;
    }

    fn set_ten_bit_addressing(&mut self, enabled: bool) {
        self.ten_bit = enabled;
    }

    fn set_general_call(&mut self, enabled: bool) {
        self.general_call = enabled;
    }

    fn set_smbus(&mut self, enabled: bool) {
        self.smbus = enabled;
    }

    fn set_slew_rate_limiting(&mut self, enabled: bool) {
        self.slew_rate = enabled;
    }

    fn set_start(&mut self) {
        self.ops.push(BusOp::Start);
        self.expect_header = true;
        self.data_index = 0;
        self.nack = false;
        self.arm_pending(self.pending_ticks);
    }

    fn set_restart(&mut self) {
        self.ops.push(BusOp::Restart);
        self.expect_header = true;
        self.data_index = 0;
        self.arm_pending(self.pending_ticks);
    }

    fn set_stop(&mut self) {
        self.ops.push(BusOp::Stop);
        let ticks = if self.stop_hangs {
            u32::MAX
        } else {
            self.pending_ticks
        };
        self.arm_pending(ticks);
    }

    fn set_receive_enable(&mut self) {
        self.ops.push(BusOp::Read);
        self.rcv.set(self.rx_bytes.pop_front().unwrap_or(0xFF));
        self.rbf = true;
        self.arm_pending(self.pending_ticks);
    }

    fn set_ack_response(&mut self, ack: bool) {
        self.ops.push(BusOp::AckResponse(ack));
    }

    fn release_clock(&mut self) {
        self.clock_released = true;
    }

    fn write_transmit(&mut self, byte: u8) {
        self.ops.push(BusOp::Write(byte));
        if self.expect_header {
            self.header_is_read = byte & 1 == 1;
            self.nack = !self.devices.contains(&(byte >> 1));
            self.expect_header = false;
        } else {
            self.nack = self.nack_data_at == Some(self.data_index);
            if self.echo_writes && !self.header_is_read && !self.nack {
                self.rx_bytes.push_back(byte);
            }
            self.data_index += 1;
        }
        self.arm_pending(self.pending_ticks);
    }

    fn condition_pending(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        let remaining = self.pending.get();
        if remaining > 0 {
            self.pending.set(remaining.saturating_sub(1));
            true
        } else {
            false
        }
    }

    fn bus_busy(&self) -> bool {
        let remaining = self.wire_busy_polls.get();
        if remaining > 0 {
            self.wire_busy_polls.set(remaining - 1);
            true
        } else {
            false
        }
    }

    fn nack_received(&self) -> bool {
        self.nack
    }

    fn write_collision(&self) -> bool {
        self.collision
    }

    fn receive_overrun(&self) -> bool {
        self.overrun
    }

    fn arbitration_lost(&self) -> bool {
        self.arb_lost
    }

    fn clear_error_flags(&mut self) {
        self.collision = false;
        self.overrun = false;
        self.arb_lost = false;
        self.error_flag_clears.set(self.error_flag_clears.get() + 1);
    }

    fn start_detected(&self) -> bool {
        self.start_flag
    }

    fn stop_detected(&self) -> bool {
        self.stop_flag
    }

    fn receive_full(&self) -> bool {
        self.rbf
    }

    fn transmit_requested(&self) -> bool {
        self.tx_request
    }

    fn read_receive(&mut self) -> u8 {
        self.rbf = false;
        self.rcv.get()
    }

    fn set_interrupt_enable(&mut self, enabled: bool) {
        self.int_enabled = enabled;
    }

    fn clear_interrupt_flag(&mut self) {
        self.int_flag_clears += 1;
    }
}
