//! Startup configuration.

use crate::ConfigError;
use crate::dma::ChannelPriority;
use crate::nvic::{self, Priority};
use crate::serial::LinePins;

/// Default kernel clock of USART1: the 8 MHz HSI oscillator.
pub const HSI_HZ: u32 = 8_000_000;

/// Smallest `BRR` value allowed with 16x oversampling.
const MIN_DIVISOR: u32 = 16;
/// `BRR` is a 16-bit field.
const MAX_DIVISOR: u32 = 0xffff;

/// A requested line speed in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudRate(pub u32);

impl BaudRate {
    /// Computes the `BRR` value for a kernel clock of `clock_hz`.
    ///
    /// The fractional part of `clock_hz / baud` is dropped, so the real line
    /// speed can be slightly above the requested one (115200 at 8 MHz gives a
    /// divisor of 69, about 0.6% fast).
    pub const fn divisor(self, clock_hz: u32) -> Result<BaudDivisor, ConfigError> {
        if self.0 == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        let div = clock_hz / self.0;
        if div < MIN_DIVISOR {
            Err(ConfigError::BaudRateTooHigh)
        } else if div > MAX_DIVISOR {
            Err(ConfigError::BaudRateTooLow)
        } else {
            Ok(BaudDivisor(div as u16))
        }
    }
}

/// A validated `BRR` value.
///
/// Only [`BaudRate::divisor`] creates one, so the serial configurator never
/// sees a zero baud rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudDivisor(u16);

impl BaudDivisor {
    /// The raw register value.
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// Everything needed to bring up the echo engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EchoConfig {
    baud_rate: BaudRate,
    clock_hz: u32,
    pins: LinePins,
    dma_priority: Priority,
    error_priority: Priority,
    rx_channel_priority: ChannelPriority,
    tx_channel_priority: ChannelPriority,
}

impl Default for EchoConfig {
    /// 115200 8N1 on PA9/PA10 with the HSI clock. DMA completion at NVIC
    /// level 1, line errors at level 2.
    fn default() -> Self {
        EchoConfig {
            baud_rate: BaudRate(115_200),
            clock_hz: HSI_HZ,
            pins: LinePins::PA9_PA10,
            dma_priority: Priority(1),
            error_priority: Priority(2),
            rx_channel_priority: ChannelPriority::High,
            tx_channel_priority: ChannelPriority::Medium,
        }
    }
}

impl EchoConfig {
    /// Sets the line speed.
    pub const fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = BaudRate(baud_rate);
        self
    }

    /// Sets the USART kernel clock frequency.
    pub const fn clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    /// Selects the TX/RX pin pair.
    pub const fn pins(mut self, pins: LinePins) -> Self {
        self.pins = pins;
        self
    }

    /// Sets the NVIC priorities of the DMA completion and line error
    /// interrupts.
    pub const fn interrupt_priorities(mut self, dma: Priority, error: Priority) -> Self {
        self.dma_priority = dma;
        self.error_priority = error;
        self
    }

    /// Sets the DMA arbitration priority of the RX and TX channels.
    pub const fn channel_priorities(mut self, rx: ChannelPriority, tx: ChannelPriority) -> Self {
        self.rx_channel_priority = rx;
        self.tx_channel_priority = tx;
        self
    }

    /// Checks the configuration and turns it into register values.
    pub fn validate(&self) -> Result<ValidConfig, ConfigError> {
        let divisor = self.baud_rate.divisor(self.clock_hz)?;
        nvic::check_priorities(self.dma_priority, self.error_priority)?;
        Ok(ValidConfig {
            divisor,
            pins: self.pins,
            dma_priority: self.dma_priority,
            error_priority: self.error_priority,
            rx_channel_priority: self.rx_channel_priority,
            tx_channel_priority: self.tx_channel_priority,
        })
    }
}

/// An [`EchoConfig`] that passed [`EchoConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidConfig {
    /// `BRR` value.
    pub divisor: BaudDivisor,
    /// TX/RX pin pair.
    pub pins: LinePins,
    /// NVIC priority of the DMA completion interrupt.
    pub dma_priority: Priority,
    /// NVIC priority of the line error interrupt, less urgent than
    /// `dma_priority`.
    pub error_priority: Priority,
    /// DMA arbitration priority of the RX channel.
    pub rx_channel_priority: ChannelPriority,
    /// DMA arbitration priority of the TX channel.
    pub tx_channel_priority: ChannelPriority,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn divisor_drops_remainder() {
        assert_eq!(BaudRate(115_200).divisor(HSI_HZ).map(BaudDivisor::bits), Ok(69));
        assert_eq!(BaudRate(9_600).divisor(HSI_HZ).map(BaudDivisor::bits), Ok(833));
    }

    #[test]
    fn divisor_rejects_out_of_range_rates() {
        assert_eq!(BaudRate(0).divisor(HSI_HZ), Err(ConfigError::ZeroBaudRate));
        assert_eq!(BaudRate(1_000_000).divisor(HSI_HZ), Err(ConfigError::BaudRateTooHigh));
        assert_eq!(BaudRate(100).divisor(HSI_HZ), Err(ConfigError::BaudRateTooLow));
        assert!(BaudRate(500_000).divisor(HSI_HZ).is_ok());
    }

    #[test]
    fn validate_checks_priorities() {
        let inverted = EchoConfig::default().interrupt_priorities(Priority(2), Priority(1));
        assert_eq!(inverted.validate(), Err(ConfigError::PriorityInversion));

        let ok = EchoConfig::default().validate().unwrap();
        assert_eq!(ok.divisor.bits(), 69);
        assert!(ok.dma_priority.is_more_urgent_than(ok.error_priority));
    }
}
