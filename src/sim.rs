//! A board in RAM for host tests.
//!
//! The register blocks are plain memory, so nothing happens on its own. The
//! methods here play the part of the hardware: they move bytes the way the
//! DMA controller would, latch the flags it would latch and apply the
//! write-1-to-clear semantics of `IFCR` and `ICR`.

use crate::cell::ByteCell;
use crate::config::EchoConfig;
use crate::echo::{EchoController, EchoPolicy};
use crate::engine::{Cells, RX_CHANNEL, TX_CHANNEL};
use crate::nvic::test::RecordingNvic;
use crate::regs::{
    ChannelRegs, DmaRegs, GPIO_PORTS, GpioRegs, Peripherals, RccRegs, UsartRegs, dma, usart,
};

pub(crate) struct Board {
    pub rcc: RccRegs,
    pub gpio: [GpioRegs; GPIO_PORTS],
    pub usart: UsartRegs,
    pub dma: DmaRegs,
    pub rx_cell: ByteCell,
    pub tx_cell: ByteCell,
}

impl Board {
    pub fn new() -> Self {
        Board {
            rcc: RccRegs::zeroed(),
            gpio: core::array::from_fn(|_| GpioRegs::zeroed()),
            usart: UsartRegs::zeroed(),
            dma: DmaRegs::zeroed(),
            rx_cell: ByteCell::new(0),
            tx_cell: ByteCell::new(0),
        }
    }

    pub fn peripherals(&self) -> Peripherals<'_> {
        Peripherals {
            rcc: &self.rcc,
            gpio: core::array::from_fn(|i| &self.gpio[i]),
            usart1: &self.usart,
            dma1: &self.dma,
        }
    }

    pub fn cells(&self) -> Cells<'_> {
        Cells {
            rx: &self.rx_cell,
            tx: &self.tx_cell,
        }
    }

    /// A controller configured with the default configuration.
    pub fn controller<P: EchoPolicy>(&self, policy: P) -> EchoController<'_, P> {
        let mut nvic = RecordingNvic::default();
        EchoController::configure(
            &self.peripherals(),
            self.cells(),
            &EchoConfig::default(),
            policy,
            &mut nvic,
        )
        .unwrap()
    }

    fn channel(&self, number: u8) -> &ChannelRegs {
        &self.dma.channels[usize::from(number) - 1]
    }

    fn serves_request(&self, number: u8) -> bool {
        let ch = self.channel(number);
        ch.ccr.read() & dma::CCR_EN != 0 && ch.cndtr.read() > 0
    }

    /// Counts one byte off `channel` and latches its completion flag when
    /// the count reaches zero.
    fn count_down(&self, number: u8) {
        let ch = self.channel(number);
        let left = ch.cndtr.read() - 1;
        ch.cndtr.write(left);
        if left == 0 && ch.ccr.read() & dma::CCR_TCIE != 0 {
            self.dma.isr.set_bits(dma::tcif(number));
        }
    }

    /// A byte arrives on the line.
    ///
    /// Returns `true` if the receive channel moved it to the receive cell.
    /// Otherwise it stays in `RDR`, overrunning any byte already waiting.
    pub fn line_receives(&self, byte: u8) -> bool {
        self.usart.rdr.write(u32::from(byte));
        if self.serves_request(RX_CHANNEL) {
            let ch = self.channel(RX_CHANNEL);
            assert_eq!(ch.cpar.read(), self.usart.rdr.address());
            assert_eq!(ch.cmar.read(), self.rx_cell.address());
            self.rx_cell.write(byte);
            self.count_down(RX_CHANNEL);
            true
        } else {
            if self.usart.isr.read() & usart::ISR_RXNE != 0 {
                self.usart.isr.set_bits(usart::ISR_ORE);
            }
            self.usart.isr.set_bits(usart::ISR_RXNE);
            false
        }
    }

    /// The transmitter asks for its next byte.
    ///
    /// Returns the byte put on the line, or `None` if the transmit channel
    /// is not armed.
    pub fn line_transmits(&self) -> Option<u8> {
        if !self.serves_request(TX_CHANNEL) {
            return None;
        }
        let ch = self.channel(TX_CHANNEL);
        assert_eq!(ch.cpar.read(), self.usart.tdr.address());
        assert_eq!(ch.cmar.read(), self.tx_cell.address());
        let byte = self.tx_cell.read();
        self.usart.tdr.write(u32::from(byte));
        self.count_down(TX_CHANNEL);
        Some(byte)
    }

    /// Applies pending writes to the clear registers.
    pub fn acknowledge(&self) {
        self.dma.isr.clear_bits(self.dma.ifcr.read());
        self.dma.ifcr.write(0);
        self.usart.isr.clear_bits(self.usart.icr.read());
        self.usart.icr.write(0);
    }

    /// Runs the DMA handler if a completion is latched.
    pub fn dma_interrupt<P: EchoPolicy>(&self, echo: &EchoController<'_, P>) -> bool {
        let pending = dma::tcif(RX_CHANNEL) | dma::tcif(TX_CHANNEL);
        let fired = self.dma.isr.read() & pending != 0;
        if fired {
            echo.on_dma_interrupt();
            self.acknowledge();
        }
        fired
    }

    /// Runs the serial handler if a line error is latched.
    pub fn serial_interrupt<P: EchoPolicy>(&self, echo: &EchoController<'_, P>) -> bool {
        let pending = usart::ISR_PE | usart::ISR_FE | usart::ISR_NF | usart::ISR_ORE;
        let fired = self.usart.isr.read() & pending != 0;
        if fired {
            echo.on_serial_interrupt();
            self.acknowledge();
        }
        fired
    }

    /// Receives `byte`, then lets the transmitter run once. Returns what went
    /// out on the line.
    pub fn echo_cycle<P: EchoPolicy>(&self, echo: &EchoController<'_, P>, byte: u8) -> Option<u8> {
        assert!(self.line_receives(byte));
        self.dma_interrupt(echo);
        let sent = self.line_transmits();
        self.dma_interrupt(echo);
        sent
    }
}
