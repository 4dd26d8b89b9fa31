//! Memory-mapped register blocks for the STM32F072.
//!
//! Only the registers this crate touches are named, the rest of each block is
//! padding so field offsets match the reference manual. Each block is a plain
//! `#[repr(C)]` struct of [`Reg`] cells. On the target the blocks are reached
//! through [`Peripherals`]; in tests they are ordinary values in RAM.

// Register and bit names follow the reference manual.
#![allow(missing_docs)]

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::ConfigError;

/// A 32-bit hardware register.
///
/// All accesses are volatile. The register is shared between interrupt and
/// thread context, so every method takes `&self`.
#[repr(transparent)]
pub struct Reg(UnsafeCell<u32>);

// SAFETY: Every access is a single volatile word read or write, which the
// Cortex-M0 bus performs atomically. Callers order dependent accesses through
// the flags in `crate::cell`.
unsafe impl Sync for Reg {}

impl Reg {
    /// Creates a register holding `value`, for register blocks living in RAM.
    pub const fn new(value: u32) -> Self {
        Reg(UnsafeCell::new(value))
    }

    /// Reads the register.
    #[inline]
    pub fn read(&self) -> u32 {
        // SAFETY: The pointer comes from our own cell, so it is valid and aligned.
        unsafe { self.0.get().read_volatile() }
    }

    /// Writes the register.
    #[inline]
    pub fn write(&self, value: u32) {
        // SAFETY: The pointer comes from our own cell, so it is valid and aligned.
        unsafe { self.0.get().write_volatile(value) }
    }

    /// Read-modify-write.
    #[inline]
    pub fn modify(&self, f: impl FnOnce(u32) -> u32) {
        self.write(f(self.read()));
    }

    /// Sets the bits in `mask`.
    #[inline]
    pub fn set_bits(&self, mask: u32) {
        self.modify(|r| r | mask);
    }

    /// Clears the bits in `mask`.
    #[inline]
    pub fn clear_bits(&self, mask: u32) {
        self.modify(|r| r & !mask);
    }

    /// Address of the register as seen by a bus master such as the DMA.
    #[inline]
    pub fn address(&self) -> u32 {
        self.0.get().expose_provenance() as u32
    }
}

/// Reset and clock control. Only the clock enable registers are named.
#[repr(C)]
pub struct RccRegs {
    _reserved0: [Reg; 5],
    /// AHB peripheral clock enable (DMA, GPIO ports).
    pub ahbenr: Reg,
    /// APB2 peripheral clock enable (USART1).
    pub apb2enr: Reg,
    /// APB1 peripheral clock enable.
    pub apb1enr: Reg,
}

/// One GPIO port.
#[repr(C)]
pub struct GpioRegs {
    pub moder: Reg,
    pub otyper: Reg,
    pub ospeedr: Reg,
    pub pupdr: Reg,
    pub idr: Reg,
    pub odr: Reg,
    pub bsrr: Reg,
    pub lckr: Reg,
    /// `AFRL` (pins 0-7) and `AFRH` (pins 8-15).
    pub afr: [Reg; 2],
    pub brr: Reg,
}

/// Universal synchronous/asynchronous receiver transmitter.
#[repr(C)]
pub struct UsartRegs {
    pub cr1: Reg,
    pub cr2: Reg,
    pub cr3: Reg,
    pub brr: Reg,
    pub gtpr: Reg,
    pub rtor: Reg,
    pub rqr: Reg,
    pub isr: Reg,
    pub icr: Reg,
    pub rdr: Reg,
    pub tdr: Reg,
}

/// Configuration registers of one DMA channel.
#[repr(C)]
pub struct ChannelRegs {
    pub ccr: Reg,
    pub cndtr: Reg,
    pub cpar: Reg,
    pub cmar: Reg,
    _reserved: Reg,
}

/// Number of channels on DMA1 of the STM32F072.
pub const DMA_CHANNELS: usize = 7;

/// DMA controller.
#[repr(C)]
pub struct DmaRegs {
    /// Interrupt status, shared by all channels.
    pub isr: Reg,
    /// Interrupt flag clear, write 1 to clear.
    pub ifcr: Reg,
    /// Channel 1 is `channels[0]`.
    pub channels: [ChannelRegs; DMA_CHANNELS],
}

pub mod rcc {
    pub const AHBENR_DMAEN: u32 = 1 << 0;
    /// `IOPAEN`, port B is the next bit and so on.
    pub const AHBENR_IOPAEN_SHIFT: u32 = 17;
    pub const APB2ENR_USART1EN: u32 = 1 << 14;
}

pub mod usart {
    pub const CR1_UE: u32 = 1 << 0;
    pub const CR1_RE: u32 = 1 << 2;
    pub const CR1_TE: u32 = 1 << 3;
    pub const CR1_PEIE: u32 = 1 << 8;

    pub const CR3_EIE: u32 = 1 << 0;
    pub const CR3_DMAR: u32 = 1 << 6;
    pub const CR3_DMAT: u32 = 1 << 7;

    pub const ISR_PE: u32 = 1 << 0;
    pub const ISR_FE: u32 = 1 << 1;
    pub const ISR_NF: u32 = 1 << 2;
    pub const ISR_ORE: u32 = 1 << 3;
    pub const ISR_RXNE: u32 = 1 << 5;

    pub const ICR_PECF: u32 = 1 << 0;
    pub const ICR_FECF: u32 = 1 << 1;
    pub const ICR_NCF: u32 = 1 << 2;
    pub const ICR_ORECF: u32 = 1 << 3;
}

pub mod dma {
    pub const CCR_EN: u32 = 1 << 0;
    pub const CCR_TCIE: u32 = 1 << 1;
    pub const CCR_DIR: u32 = 1 << 4;
    pub const CCR_CIRC: u32 = 1 << 5;
    pub const CCR_MINC: u32 = 1 << 7;
    pub const CCR_PL_SHIFT: u32 = 12;

    /// Transfer complete flag of `channel` (1-based) in `ISR`.
    pub const fn tcif(channel: u8) -> u32 {
        1 << (4 * (channel as u32 - 1) + 1)
    }

    /// Transfer complete clear bit of `channel` (1-based) in `IFCR`.
    ///
    /// Same position as the flag in `ISR`.
    pub const fn ctcif(channel: u8) -> u32 {
        tcif(channel)
    }
}

const RCC_BASE: usize = 0x4002_1000;
const DMA1_BASE: usize = 0x4002_0000;
const USART1_BASE: usize = 0x4001_3800;
const GPIOA_BASE: usize = 0x4800_0000;
const GPIO_STRIDE: usize = 0x400;

/// Number of GPIO ports on the STM32F072 (A to F).
pub const GPIO_PORTS: usize = 6;

/// The register blocks used by this crate.
#[derive(Clone, Copy)]
pub struct Peripherals<'a> {
    pub rcc: &'a RccRegs,
    pub gpio: [&'a GpioRegs; GPIO_PORTS],
    pub usart1: &'a UsartRegs,
    pub dma1: &'a DmaRegs,
}

impl Peripherals<'static> {
    /// Returns the peripherals once; later calls fail.
    pub fn take() -> Result<Self, ConfigError> {
        static TAKEN: AtomicBool = AtomicBool::new(false);

        // No compare-and-swap on Cortex-M0, so guard the check-and-set.
        let first = critical_section::with(|_| {
            let taken = TAKEN.load(Ordering::Relaxed);
            TAKEN.store(true, Ordering::Relaxed);
            !taken
        });

        if first {
            // SAFETY: The flag above guarantees this runs once.
            Ok(unsafe { Self::steal() })
        } else {
            Err(ConfigError::AlreadyInitialized)
        }
    }

    /// Returns the peripherals without checking for other owners.
    ///
    /// # Safety
    ///
    /// Only valid on the STM32F072. Creating more than one set lets two owners
    /// configure the same hardware.
    pub unsafe fn steal() -> Self {
        // SAFETY: The base addresses are fixed by the device memory map and
        // the blocks match the reference manual layout.
        unsafe {
            Peripherals {
                rcc: &*ptr::with_exposed_provenance(RCC_BASE),
                gpio: core::array::from_fn(|port| {
                    &*ptr::with_exposed_provenance(GPIOA_BASE + GPIO_STRIDE * port)
                }),
                usart1: &*ptr::with_exposed_provenance(USART1_BASE),
                dma1: &*ptr::with_exposed_provenance(DMA1_BASE),
            }
        }
    }
}

macro_rules! zeroed_in_ram {
    ($($block:ty),+) => {
        $(
            #[cfg(test)]
            impl $block {
                /// A register block in RAM with every register cleared.
                pub(crate) fn zeroed() -> Self {
                    // SAFETY: The block only holds `UnsafeCell<u32>`, for which
                    // all zeros is a valid value.
                    unsafe { core::mem::zeroed() }
                }
            }
        )+
    };
}

zeroed_in_ram!(RccRegs, GpioRegs, UsartRegs, DmaRegs);

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::{offset_of, size_of};

    #[test]
    fn block_layouts_match_reference_manual() {
        assert_eq!(offset_of!(RccRegs, ahbenr), 0x14);
        assert_eq!(offset_of!(RccRegs, apb2enr), 0x18);

        assert_eq!(offset_of!(GpioRegs, afr), 0x20);
        assert_eq!(offset_of!(GpioRegs, brr), 0x28);

        assert_eq!(offset_of!(UsartRegs, brr), 0x0c);
        assert_eq!(offset_of!(UsartRegs, isr), 0x1c);
        assert_eq!(offset_of!(UsartRegs, icr), 0x20);
        assert_eq!(offset_of!(UsartRegs, rdr), 0x24);
        assert_eq!(offset_of!(UsartRegs, tdr), 0x28);

        assert_eq!(size_of::<ChannelRegs>(), 20);
        assert_eq!(offset_of!(DmaRegs, channels), 0x08);
        // CCR3 sits at 0x30.
        assert_eq!(offset_of!(DmaRegs, channels) + 2 * size_of::<ChannelRegs>(), 0x30);
    }

    #[test]
    fn transfer_complete_bits() {
        assert_eq!(dma::tcif(2), 1 << 5);
        assert_eq!(dma::tcif(3), 1 << 9);
    }

    #[test]
    fn modify_preserves_other_bits() {
        let r = Reg::new(0b1010);
        r.set_bits(0b0001);
        r.clear_bits(0b1000);
        assert_eq!(r.read(), 0b0011);
    }
}
