//! The receive/transmit channel pair of the echo engine.

use crate::cell::ByteCell;
use crate::dma::{Channel, ChannelPriority, ChannelState, Direction, Transfer};
use crate::gpio::{Gpio, Peripheral};
use crate::nvic::{InterruptController, Irq, Priority};
use crate::regs::{DmaRegs, dma};
use crate::serial::SerialLine;

/// USART1_TX request line on the STM32F072 DMA1.
pub const TX_CHANNEL: u8 = 2;
/// USART1_RX request line on the STM32F072 DMA1.
pub const RX_CHANNEL: u8 = 3;

/// Completion events observed by one [`TransferEngine::take_completions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completions {
    /// A byte landed in the receive cell.
    pub rx: bool,
    /// The transmit cell was handed to the line.
    pub tx: bool,
}

/// The two byte cells the channels are bound to.
#[derive(Clone, Copy)]
pub struct Cells<'a> {
    /// Receive DMA destination.
    pub rx: &'a ByteCell,
    /// Transmit DMA source.
    pub tx: &'a ByteCell,
}

/// RX and TX channels, each tied to a fixed byte cell and a fixed USART data
/// register.
pub struct TransferEngine<'a> {
    dma: &'a DmaRegs,
    rx: Channel<'a>,
    tx: Channel<'a>,
    cells: Cells<'a>,
    rx_transfer: Transfer,
    tx_transfer: Transfer,
}

impl<'a> TransferEngine<'a> {
    /// Binds DMA1 channels 3 (RX) and 2 (TX) to `cells` and the data
    /// registers of `line`. Both channels start disabled.
    pub fn new(
        dma: &'a DmaRegs,
        line: &SerialLine<'_>,
        cells: Cells<'a>,
        rx_priority: ChannelPriority,
        tx_priority: ChannelPriority,
    ) -> Self {
        let engine = TransferEngine {
            dma,
            rx: Channel::new(dma, RX_CHANNEL),
            tx: Channel::new(dma, TX_CHANNEL),
            cells,
            rx_transfer: Transfer {
                direction: Direction::PeripheralToMemory,
                peripheral: line.rdr_address(),
                memory: cells.rx.address(),
                priority: rx_priority,
            },
            tx_transfer: Transfer {
                direction: Direction::MemoryToPeripheral,
                peripheral: line.tdr_address(),
                memory: cells.tx.address(),
                priority: tx_priority,
            },
        };
        engine.rx.disable();
        engine.tx.disable();
        engine
    }

    /// Enables the DMA clock and unmasks the combined channel 2/3 interrupt
    /// at `priority`.
    pub fn enable(&self, gpio: &Gpio<'_>, nvic: &mut impl InterruptController, priority: Priority) {
        gpio.enable_peripheral_clock(Peripheral::Dma1);
        nvic.set_priority(Irq::Dma1Channel2_3, priority);
        nvic.enable(Irq::Dma1Channel2_3);
    }

    /// Arms the receive channel for the next byte.
    pub fn arm_receive(&self) {
        self.rx.arm(&self.rx_transfer);
    }

    /// Puts `byte` in the transmit cell and arms the transmit channel.
    ///
    /// The channel is disabled before the cell is written. The caller makes
    /// sure the previous transmit has completed.
    pub fn arm_transmit(&self, byte: u8) {
        self.tx.disable();
        self.cells.tx.write(byte);
        self.tx.arm(&self.tx_transfer);
    }

    /// Disables the transmit channel until the next [`Self::arm_transmit`].
    pub fn disarm_transmit(&self) {
        self.tx.disable();
    }

    /// Reads the shared status register once and clears the completion flag
    /// of each channel that finished.
    pub fn take_completions(&self) -> Completions {
        let isr = self.dma.isr.read();
        let completions = Completions {
            rx: isr & dma::tcif(RX_CHANNEL) != 0,
            tx: isr & dma::tcif(TX_CHANNEL) != 0,
        };

        let mut clear = 0;
        if completions.rx {
            clear |= self.rx.transfer_complete_clear_bit();
        }
        if completions.tx {
            clear |= self.tx.transfer_complete_clear_bit();
        }
        // One write for both: IFCR clears whatever bits it is given.
        if clear != 0 {
            self.dma.ifcr.write(clear);
        }
        completions
    }

    /// The last received byte.
    pub fn received(&self) -> u8 {
        self.cells.rx.read()
    }

    /// The receive channel.
    pub fn rx_channel(&self) -> &Channel<'a> {
        &self.rx
    }

    /// The transmit channel.
    pub fn tx_channel(&self) -> &Channel<'a> {
        &self.tx
    }

    /// Returns `true` while the transmit channel is armed.
    pub fn transmit_armed(&self) -> bool {
        self.tx.state() == ChannelState::Armed
    }
}
