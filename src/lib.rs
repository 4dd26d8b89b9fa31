#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

// Must come first so the logging macros are visible in the modules below.
mod fmt;

pub mod cell;
pub mod config;
pub mod dma;
pub mod echo;
pub mod engine;
pub mod gpio;
pub mod nvic;
pub mod regs;
pub mod serial;

#[cfg(test)]
mod sim;

pub use cell::{ByteCell, Shared};
pub use config::{BaudRate, EchoConfig, HSI_HZ, ValidConfig};
pub use echo::{Autonomous, Cooperative, EchoController, EchoPolicy, ErrorCounts};
pub use engine::{Cells, TransferEngine};
pub use nvic::{InterruptController, Irq, Priority};
pub use regs::Peripherals;
pub use serial::{ErrorFlags, LinePins, SerialLine};

/// Error returned when bringing up the echo engine fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The requested baud rate is zero.
    ZeroBaudRate,
    /// The baud rate needs a divisor below the 16x oversampling minimum.
    BaudRateTooHigh,
    /// The baud rate needs a divisor that does not fit the 16-bit `BRR`.
    BaudRateTooLow,
    /// The DMA completion interrupt would not preempt the line error
    /// interrupt.
    PriorityInversion,
    /// A one-time resource was already taken.
    AlreadyInitialized,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::ZeroBaudRate => "baud rate is zero",
            ConfigError::BaudRateTooHigh => "baud rate too high for the clock",
            ConfigError::BaudRateTooLow => "baud rate too low for the clock",
            ConfigError::PriorityInversion => {
                "DMA interrupt must be more urgent than the error interrupt"
            }
            ConfigError::AlreadyInitialized => "already initialized",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for ConfigError {}
