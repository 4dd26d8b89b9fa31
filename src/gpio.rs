//! Pin and clock configuration.
//!
//! Plain register mutation, no state beyond the hardware. Callers pass valid
//! pins; nothing here can fail.

use crate::regs::{GPIO_PORTS, GpioRegs, RccRegs, rcc};

/// A GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Bank {
    A = 0,
    B,
    C,
    D,
    E,
    F,
}

/// A pin: a port and a number in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    bank: Bank,
    num: u8,
}

impl Pin {
    /// Creates a pin. `num` is taken modulo 16.
    pub const fn new(bank: Bank, num: u8) -> Self {
        Pin {
            bank,
            num: num & 0xf,
        }
    }

    /// The port of this pin.
    pub const fn bank(self) -> Bank {
        self.bank
    }

    /// The pin number within its port.
    pub const fn num(self) -> u8 {
        self.num
    }
}

/// Pin mode, as encoded in `MODER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Mode {
    Input = 0b00,
    Output = 0b01,
    Alternate = 0b10,
    Analog = 0b11,
}

/// Peripheral clocks other than the GPIO ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// DMA controller 1, on AHB.
    Dma1,
    /// USART1, on APB2.
    Usart1,
}

/// Pin/clock configurator.
#[derive(Clone, Copy)]
pub struct Gpio<'a> {
    rcc: &'a RccRegs,
    ports: [&'a GpioRegs; GPIO_PORTS],
}

impl<'a> Gpio<'a> {
    /// Wraps the clock controller and the GPIO ports.
    pub const fn new(rcc: &'a RccRegs, ports: [&'a GpioRegs; GPIO_PORTS]) -> Self {
        Gpio { rcc, ports }
    }

    fn port(&self, bank: Bank) -> &'a GpioRegs {
        self.ports[bank as usize]
    }

    /// Enables the clock of a GPIO port. Calling it again has no effect.
    pub fn enable_clock(&self, bank: Bank) {
        self.rcc
            .ahbenr
            .set_bits(1 << (rcc::AHBENR_IOPAEN_SHIFT + bank as u32));
    }

    /// Enables the clock of a peripheral. Calling it again has no effect.
    pub fn enable_peripheral_clock(&self, peripheral: Peripheral) {
        match peripheral {
            Peripheral::Dma1 => self.rcc.ahbenr.set_bits(rcc::AHBENR_DMAEN),
            Peripheral::Usart1 => self.rcc.apb2enr.set_bits(rcc::APB2ENR_USART1EN),
        }
    }

    /// Sets the mode of `pin`, replacing the previous one.
    pub fn set_mode(&self, pin: Pin, mode: Mode) {
        let shift = u32::from(pin.num) * 2;
        self.port(pin.bank)
            .moder
            .modify(|r| (r & !(0b11 << shift)) | ((mode as u32) << shift));
    }

    /// Routes alternate function `af` (`0..=15`) to `pin`.
    pub fn set_alternate_function(&self, pin: Pin, af: u8) {
        let (index, slot) = if pin.num < 8 {
            (0, pin.num)
        } else {
            (1, pin.num - 8)
        };
        let shift = u32::from(slot) * 4;
        self.port(pin.bank).afr[index]
            .modify(|r| (r & !(0xf << shift)) | ((u32::from(af) & 0xf) << shift));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Ports {
        rcc: RccRegs,
        gpio: [GpioRegs; GPIO_PORTS],
    }

    impl Ports {
        fn new() -> Self {
            Ports {
                rcc: RccRegs::zeroed(),
                gpio: core::array::from_fn(|_| GpioRegs::zeroed()),
            }
        }

        fn gpio(&self) -> Gpio<'_> {
            Gpio::new(&self.rcc, core::array::from_fn(|i| &self.gpio[i]))
        }
    }

    #[test]
    fn enable_clock_is_idempotent() {
        let p = Ports::new();
        let gpio = p.gpio();
        gpio.enable_clock(Bank::A);
        gpio.enable_clock(Bank::A);
        gpio.enable_clock(Bank::C);
        assert_eq!(p.rcc.ahbenr.read(), (1 << 17) | (1 << 19));
    }

    #[test]
    fn peripheral_clocks() {
        let p = Ports::new();
        let gpio = p.gpio();
        gpio.enable_peripheral_clock(Peripheral::Dma1);
        gpio.enable_peripheral_clock(Peripheral::Usart1);
        assert_eq!(p.rcc.ahbenr.read(), 1);
        assert_eq!(p.rcc.apb2enr.read(), 1 << 14);
    }

    #[test]
    fn set_mode_replaces_previous_value() {
        let p = Ports::new();
        let gpio = p.gpio();
        let pa9 = Pin::new(Bank::A, 9);
        p.gpio[0].moder.write(0xffff_ffff);
        gpio.set_mode(pa9, Mode::Alternate);
        assert_eq!(p.gpio[0].moder.read(), !(0b01 << 18));
        gpio.set_mode(pa9, Mode::Input);
        assert_eq!(p.gpio[0].moder.read(), !(0b11 << 18));
    }

    #[test]
    fn alternate_function_splits_at_pin_eight() {
        let p = Ports::new();
        let gpio = p.gpio();
        gpio.set_alternate_function(Pin::new(Bank::B, 6), 0);
        gpio.set_alternate_function(Pin::new(Bank::B, 7), 5);
        gpio.set_alternate_function(Pin::new(Bank::A, 9), 1);
        gpio.set_alternate_function(Pin::new(Bank::A, 10), 1);
        assert_eq!(p.gpio[1].afr[0].read(), 5 << 28);
        assert_eq!(p.gpio[1].afr[1].read(), 0);
        assert_eq!(p.gpio[0].afr[0].read(), 0);
        assert_eq!(p.gpio[0].afr[1].read(), (1 << 4) | (1 << 8));

        // Reassigning clears the old selector.
        gpio.set_alternate_function(Pin::new(Bank::A, 10), 2);
        assert_eq!(p.gpio[0].afr[1].read(), (1 << 4) | (2 << 8));
    }
}
