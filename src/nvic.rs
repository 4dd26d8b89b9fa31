//! Interrupt lines, priorities and the interrupt controller seam.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use crate::ConfigError;

/// Interrupt lines used by the echo engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Irq {
    /// Combined DMA1 channel 2 and 3 interrupt.
    Dma1Channel2_3 = 10,
    /// USART1 global interrupt.
    Usart1 = 27,
}

// SAFETY: The discriminants are the STM32F072 vector table positions.
unsafe impl InterruptNumber for Irq {
    #[inline]
    fn number(self) -> u16 {
        self as u16
    }
}

/// Priority bits implemented by the Cortex-M0 NVIC.
pub const PRIORITY_BITS: u8 = 2;

/// An interrupt priority level. Lower levels are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(pub(crate) u8);

impl Priority {
    /// The most urgent level.
    pub const HIGHEST: Priority = Priority(0);
    /// The least urgent level.
    pub const LOWEST: Priority = Priority((1 << PRIORITY_BITS) - 1);

    /// Creates a priority level, `None` if it does not fit the implemented bits.
    pub const fn new(level: u8) -> Option<Self> {
        if level < (1 << PRIORITY_BITS) {
            Some(Priority(level))
        } else {
            None
        }
    }

    /// The level as passed to [`Priority::new`].
    pub const fn level(self) -> u8 {
        self.0
    }

    /// The byte written to the NVIC priority register, with the level in the
    /// implemented high bits.
    pub const fn raw(self) -> u8 {
        self.0 << (8 - PRIORITY_BITS)
    }

    /// Returns `true` if an interrupt at `self` preempts one at `other`.
    pub const fn is_more_urgent_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

/// Checks that data delivery preempts error bookkeeping.
pub fn check_priorities(dma: Priority, error: Priority) -> Result<(), ConfigError> {
    if dma.is_more_urgent_than(error) {
        Ok(())
    } else {
        Err(ConfigError::PriorityInversion)
    }
}

/// Sets interrupt priorities and unmasks interrupt lines.
pub trait InterruptController {
    /// Sets the priority of `irq`.
    fn set_priority(&mut self, irq: Irq, priority: Priority);

    /// Unmasks `irq`.
    fn enable(&mut self, irq: Irq);
}

impl InterruptController for NVIC {
    fn set_priority(&mut self, irq: Irq, priority: Priority) {
        // SAFETY: Priorities are set during startup, before the handlers that
        // rely on their relative order can run.
        unsafe { NVIC::set_priority(self, irq, priority.raw()) };
    }

    fn enable(&mut self, irq: Irq) {
        // SAFETY: The handlers for these lines only touch state published
        // through `crate::cell::Shared`, and do nothing until it is filled.
        unsafe { NVIC::unmask(irq) };
    }
}
