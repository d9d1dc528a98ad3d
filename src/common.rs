// Licensed under the Apache-2.0 license

//! Shared driver infrastructure.
//!
//! Controllers in this crate are generic over a [`Logger`] so that driver
//! diagnostics can be routed to a UART, a host test harness, or discarded
//! entirely without the driver caring which.

/// Sink for driver diagnostic messages.
///
/// Implementations must be cheap and must never block; drivers may call
/// `log` from failure paths that still hold the bus.
pub trait Logger {
    fn log(&mut self, message: &str);
}

/// Logger that discards every message.
///
/// The default logger for controllers where no diagnostic output is wired
/// up, e.g. production builds without a console.
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&mut self, _message: &str) {}
}
