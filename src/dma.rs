//! One-shot, single-byte DMA channels.
//!
//! A [`Channel`] can only be reprogrammed through [`Channel::arm`], which
//! disables the channel before touching its address and count registers and
//! enables it again last. Writing those registers while the channel is
//! enabled is undefined on this hardware, and no other method writes them.

use crate::regs::{ChannelRegs, DmaRegs, dma};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Peripheral data register to memory (receive).
    PeripheralToMemory,
    /// Memory to peripheral data register (transmit).
    MemoryToPeripheral,
}

/// Arbitration priority between DMA channels, `CCR.PL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum ChannelPriority {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}

/// Whether a channel may currently move data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// `EN` is clear; the channel can be reprogrammed.
    Disabled,
    /// `EN` is set; the channel serves the next request from its peripheral.
    Armed,
}

/// A single-byte transfer between a peripheral register and a memory byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
    /// Direction of the transfer.
    pub direction: Direction,
    /// Address of the peripheral data register.
    pub peripheral: u32,
    /// Address of the memory byte.
    pub memory: u32,
    /// Arbitration priority.
    pub priority: ChannelPriority,
}

impl Transfer {
    /// The `CCR` value for this transfer, without `EN`.
    ///
    /// Byte-wide on both sides, no address increment, not circular, transfer
    /// complete interrupt enabled.
    fn ccr(&self) -> u32 {
        let dir = match self.direction {
            Direction::PeripheralToMemory => 0,
            Direction::MemoryToPeripheral => dma::CCR_DIR,
        };
        dir | dma::CCR_TCIE | ((self.priority as u32) << dma::CCR_PL_SHIFT)
    }
}

/// Every transfer moves exactly one byte.
pub const TRANSFER_COUNT: u32 = 1;

/// A DMA1 channel.
pub struct Channel<'a> {
    number: u8,
    dma: &'a DmaRegs,
}

impl<'a> Channel<'a> {
    /// Binds channel `number` (1-based, as in the reference manual) of `dma`.
    ///
    /// # Panics
    ///
    /// If `number` is not a channel of DMA1.
    pub const fn new(dma: &'a DmaRegs, number: u8) -> Self {
        assert!(number >= 1 && number as usize <= dma.channels.len());
        Channel { number, dma }
    }

    /// The channel number, starting at 1.
    pub const fn number(&self) -> u8 {
        self.number
    }

    fn regs(&self) -> &'a ChannelRegs {
        &self.dma.channels[self.number as usize - 1]
    }

    /// Programs `transfer` and enables the channel.
    ///
    /// An armed channel is disabled first, abandoning whatever it was doing.
    pub fn arm(&self, transfer: &Transfer) {
        let regs = self.regs();
        self.disable();
        regs.cpar.write(transfer.peripheral);
        regs.cmar.write(transfer.memory);
        regs.cndtr.write(TRANSFER_COUNT);
        regs.ccr.write(transfer.ccr());
        regs.ccr.set_bits(dma::CCR_EN);
    }

    /// Disables the channel.
    pub fn disable(&self) {
        self.regs().ccr.clear_bits(dma::CCR_EN);
    }

    /// Current state, from the enable bit.
    pub fn state(&self) -> ChannelState {
        if self.regs().ccr.read() & dma::CCR_EN != 0 {
            ChannelState::Armed
        } else {
            ChannelState::Disabled
        }
    }

    /// Bytes still to be moved by the current transfer.
    pub fn remaining(&self) -> u16 {
        self.regs().cndtr.read() as u16
    }

    /// Returns `true` if the transfer complete flag is latched.
    pub fn is_transfer_complete(&self) -> bool {
        self.dma.isr.read() & dma::tcif(self.number) != 0
    }

    /// The `IFCR` bit that clears this channel's transfer complete flag.
    pub fn transfer_complete_clear_bit(&self) -> u32 {
        dma::ctcif(self.number)
    }

    /// Clears the latched transfer complete flag.
    ///
    /// Must happen before acting on the completion, or the interrupt fires
    /// again as soon as the handler returns.
    pub fn clear_transfer_complete(&self) {
        self.dma.ifcr.write(dma::ctcif(self.number));
    }
}
