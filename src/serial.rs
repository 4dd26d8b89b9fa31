//! Serial line configuration and error status.

use crate::config::BaudDivisor;
use crate::gpio::{Bank, Gpio, Mode, Peripheral, Pin};
use crate::nvic::{InterruptController, Irq, Priority};
use crate::regs::{UsartRegs, usart};

/// Which pins USART1 is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinePins {
    /// Transmit pin.
    pub tx: Pin,
    /// Receive pin.
    pub rx: Pin,
    /// Alternate function number selecting USART1 on both pins.
    pub af: u8,
}

impl LinePins {
    /// PA9 (TX) / PA10 (RX), alternate function 1.
    pub const PA9_PA10: LinePins = LinePins {
        tx: Pin::new(Bank::A, 9),
        rx: Pin::new(Bank::A, 10),
        af: 1,
    };

    /// PB6 (TX) / PB7 (RX), alternate function 0.
    pub const PB6_PB7: LinePins = LinePins {
        tx: Pin::new(Bank::B, 6),
        rx: Pin::new(Bank::B, 7),
        af: 0,
    };
}

bitflags::bitflags! {
    /// Line error conditions, at their `ISR`/`ICR` bit positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorFlags: u32 {
        /// Parity error.
        const PARITY = usart::ISR_PE;
        /// Framing error: stop bit not found.
        const FRAMING = usart::ISR_FE;
        /// Noise detected on the line.
        const NOISE = usart::ISR_NF;
        /// A byte arrived before the previous one was read out.
        const OVERRUN = usart::ISR_ORE;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorFlags {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "ErrorFlags {{ overrun: {}, framing: {}, noise: {}, parity: {} }}",
            self.contains(ErrorFlags::OVERRUN),
            self.contains(ErrorFlags::FRAMING),
            self.contains(ErrorFlags::NOISE),
            self.contains(ErrorFlags::PARITY),
        )
    }
}

// The clear bits sit at the same positions as the status bits.
const _: () = assert!(usart::ICR_PECF == usart::ISR_PE);
const _: () = assert!(usart::ICR_FECF == usart::ISR_FE);
const _: () = assert!(usart::ICR_NCF == usart::ISR_NF);
const _: () = assert!(usart::ICR_ORECF == usart::ISR_ORE);

/// Handle to USART1 and the pins it is bound to.
///
/// Only one exists, and its pins never change after construction.
pub struct SerialLine<'a> {
    regs: &'a UsartRegs,
    pins: LinePins,
}

impl<'a> SerialLine<'a> {
    /// Binds the USART1 registers to `pins`.
    pub const fn new(regs: &'a UsartRegs, pins: LinePins) -> Self {
        SerialLine { regs, pins }
    }

    /// The pins this line is routed to.
    pub const fn pins(&self) -> LinePins {
        self.pins
    }

    /// Brings the line up as 8N1 at `divisor` with DMA requests in both
    /// directions and the error interrupt unmasked at `error_priority`.
    ///
    /// The caller picks `error_priority` less urgent than the DMA completion
    /// interrupt, see [`crate::nvic::check_priorities`].
    pub fn configure(
        &self,
        gpio: &Gpio<'_>,
        divisor: BaudDivisor,
        nvic: &mut impl InterruptController,
        error_priority: Priority,
    ) {
        gpio.enable_peripheral_clock(Peripheral::Usart1);

        for pin in [self.pins.tx, self.pins.rx] {
            gpio.enable_clock(pin.bank());
            gpio.set_mode(pin, Mode::Alternate);
            gpio.set_alternate_function(pin, self.pins.af);
        }

        // Reset value: 8 data bits, no parity, 16x oversampling, disabled.
        self.regs.cr1.write(0);
        self.regs.brr.write(u32::from(divisor.bits()));
        self.regs
            .cr1
            .set_bits(usart::CR1_UE | usart::CR1_RE | usart::CR1_TE | usart::CR1_PEIE);
        self.regs
            .cr3
            .set_bits(usart::CR3_DMAT | usart::CR3_DMAR | usart::CR3_EIE);

        nvic.set_priority(Irq::Usart1, error_priority);
        nvic.enable(Irq::Usart1);

        debug!("usart1: brr = {=u16}", divisor.bits());
    }

    /// Address of the receive data register.
    pub fn rdr_address(&self) -> u32 {
        self.regs.rdr.address()
    }

    /// Address of the transmit data register.
    pub fn tdr_address(&self) -> u32 {
        self.regs.tdr.address()
    }

    /// Returns the pending line errors.
    pub fn errors(&self) -> ErrorFlags {
        ErrorFlags::from_bits_truncate(self.regs.isr.read())
    }

    /// Clears exactly the errors in `flags`, leaving any others pending.
    pub fn clear_errors(&self, flags: ErrorFlags) {
        if !flags.is_empty() {
            // Write-1-to-clear: zero bits leave their flags alone.
            self.regs.icr.write(flags.bits());
        }
    }

    /// Reads the pending line errors once, clears them and returns them.
    pub fn take_errors(&self) -> ErrorFlags {
        let errors = self.errors();
        self.clear_errors(errors);
        errors
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BaudRate, HSI_HZ};
    use crate::nvic::test::RecordingNvic;
    use crate::regs::{GPIO_PORTS, GpioRegs, RccRegs};

    struct Board {
        rcc: RccRegs,
        gpio: [GpioRegs; GPIO_PORTS],
        usart: UsartRegs,
    }

    impl Board {
        fn new() -> Self {
            Board {
                rcc: RccRegs::zeroed(),
                gpio: core::array::from_fn(|_| GpioRegs::zeroed()),
                usart: UsartRegs::zeroed(),
            }
        }

        fn gpio(&self) -> Gpio<'_> {
            Gpio::new(&self.rcc, core::array::from_fn(|i| &self.gpio[i]))
        }
    }

    #[test]
    fn configure_115200() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PA9_PA10);
        let mut nvic = RecordingNvic::default();
        // Leftovers from a previous configuration must not survive.
        b.usart.cr1.write(0xffff_ffff);

        let divisor = BaudRate(115_200).divisor(HSI_HZ).unwrap();
        line.configure(&b.gpio(), divisor, &mut nvic, Priority(2));

        assert_eq!(b.rcc.apb2enr.read(), 1 << 14);
        assert_eq!(b.rcc.ahbenr.read(), 1 << 17);
        assert_eq!(b.gpio[0].moder.read(), (0b10 << 18) | (0b10 << 20));
        assert_eq!(b.gpio[0].afr[1].read(), (1 << 4) | (1 << 8));
        assert_eq!(b.usart.brr.read(), 69);
        assert_eq!(b.usart.cr1.read(), 0b1_0000_1101);
        assert_eq!(b.usart.cr3.read(), (1 << 7) | (1 << 6) | 1);
        assert_eq!(nvic.priority(Irq::Usart1), Some(Priority(2)));
        assert!(nvic.is_enabled(Irq::Usart1));
    }

    #[test]
    fn alternate_pins() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PB6_PB7);
        let mut nvic = RecordingNvic::default();
        let divisor = BaudRate(9_600).divisor(HSI_HZ).unwrap();
        line.configure(&b.gpio(), divisor, &mut nvic, Priority(3));

        assert_eq!(b.rcc.ahbenr.read(), 1 << 18);
        assert_eq!(b.gpio[1].moder.read(), (0b10 << 12) | (0b10 << 14));
        assert_eq!(b.gpio[1].afr[0].read(), 0);
        assert_eq!(b.gpio[0].moder.read(), 0);
    }

    #[test]
    fn data_register_addresses() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PA9_PA10);
        assert_eq!(line.tdr_address() - line.rdr_address(), 4);
        assert_eq!(
            line.rdr_address(),
            (&raw const b.usart).expose_provenance() as u32 + 0x24
        );
    }

    #[test]
    fn errors_clear_independently() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PA9_PA10);

        for flag in [
            ErrorFlags::OVERRUN,
            ErrorFlags::FRAMING,
            ErrorFlags::NOISE,
            ErrorFlags::PARITY,
        ] {
            b.usart.icr.write(0);
            line.clear_errors(flag);
            assert_eq!(b.usart.icr.read(), flag.bits());
        }
    }

    #[test]
    fn take_errors_ignores_other_status_bits() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PA9_PA10);
        // RXNE (bit 5) and TC (bit 6) alongside overrun and noise.
        b.usart.isr.write((1 << 5) | (1 << 6) | usart::ISR_ORE | usart::ISR_NF);

        let errors = line.take_errors();
        assert_eq!(errors, ErrorFlags::OVERRUN | ErrorFlags::NOISE);
        assert_eq!(b.usart.icr.read(), usart::ICR_ORECF | usart::ICR_NCF);
    }

    #[test]
    fn take_errors_without_errors_writes_nothing() {
        let b = Board::new();
        let line = SerialLine::new(&b.usart, LinePins::PA9_PA10);
        b.usart.icr.write(0xdead);
        assert!(line.take_errors().is_empty());
        assert_eq!(b.usart.icr.read(), 0xdead);
    }
}
