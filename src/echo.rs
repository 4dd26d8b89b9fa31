//! The echo controller: what the interrupt handlers do with a received byte.
//!
//! Two policies exist, picked by the type parameter of [`EchoController`]:
//!
//! - [`Autonomous`] echoes entirely inside the DMA interrupt. The main loop
//!   has nothing to do and can sleep.
//! - [`Cooperative`] only signals reception from the interrupt. The main loop
//!   polls [`EchoController::data_available`], reads the byte and transmits
//!   it with [`EchoController::start_transmit`].
//!
//! Both share the line error path: observe, clear, count, continue.
//!
//! # Single-byte depth
//!
//! The receive channel is re-armed as soon as a byte lands, so reception
//! never stalls. With [`Cooperative`], a byte that arrives before the main
//! loop read the previous one overwrites it, and the previous byte is lost.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::ConfigError;
use crate::cell::{Flag, spin_until};
use crate::config::EchoConfig;
use crate::engine::{Cells, TransferEngine};
use crate::gpio::Gpio;
use crate::nvic::InterruptController;
use crate::regs::Peripherals;
use crate::serial::{ErrorFlags, SerialLine};

/// What happens on each DMA completion.
///
/// Both methods run in the DMA interrupt, after the completion flag was
/// cleared.
pub trait EchoPolicy {
    /// A byte landed in the receive cell.
    fn on_receive(&self, engine: &TransferEngine<'_>);

    /// The transmit cell was handed to the line.
    fn on_transmit(&self, engine: &TransferEngine<'_>);
}

/// Echo inside the interrupt handler, no main loop involvement.
///
/// A byte received while the previous echo is still on its way abandons that
/// transmit instead of waiting for it.
#[derive(Debug, Default)]
pub struct Autonomous;

impl EchoPolicy for Autonomous {
    fn on_receive(&self, engine: &TransferEngine<'_>) {
        let byte = engine.received();
        engine.arm_receive();
        // The transmit channel is disabled before the cell is written. If
        // bytes arrive faster than they can be echoed, the previous transmit
        // is abandoned.
        engine.arm_transmit(byte);
    }

    fn on_transmit(&self, engine: &TransferEngine<'_>) {
        engine.disarm_transmit();
    }
}

/// Signal reception to the main loop, which drives the transmit.
#[derive(Debug)]
pub struct Cooperative {
    rx_complete: Flag,
    tx_done: Flag,
}

impl Cooperative {
    /// Nothing received, transmitter idle.
    pub const fn new() -> Self {
        Cooperative {
            rx_complete: Flag::new(false),
            tx_done: Flag::new(true),
        }
    }
}

impl Default for Cooperative {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoPolicy for Cooperative {
    fn on_receive(&self, engine: &TransferEngine<'_>) {
        // Re-arm unconditionally, even if the last byte was never read.
        engine.arm_receive();
        self.rx_complete.set();
    }

    fn on_transmit(&self, engine: &TransferEngine<'_>) {
        // Disable before signalling, so the main loop never sees `tx_done`
        // with the channel still enabled.
        engine.disarm_transmit();
        self.tx_done.set();
    }
}

/// Line error counts since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounts {
    /// Overrun errors.
    pub overrun: u32,
    /// Framing errors.
    pub framing: u32,
    /// Noise errors.
    pub noise: u32,
    /// Parity errors.
    pub parity: u32,
}

/// Written only from the serial interrupt, so plain load/store suffices.
#[derive(Default)]
struct ErrorCounters {
    overrun: AtomicU32,
    framing: AtomicU32,
    noise: AtomicU32,
    parity: AtomicU32,
}

impl ErrorCounters {
    const fn new() -> Self {
        ErrorCounters {
            overrun: AtomicU32::new(0),
            framing: AtomicU32::new(0),
            noise: AtomicU32::new(0),
            parity: AtomicU32::new(0),
        }
    }

    fn record(&self, errors: ErrorFlags) {
        for (flag, counter) in [
            (ErrorFlags::OVERRUN, &self.overrun),
            (ErrorFlags::FRAMING, &self.framing),
            (ErrorFlags::NOISE, &self.noise),
            (ErrorFlags::PARITY, &self.parity),
        ] {
            if errors.contains(flag) {
                let n = counter.load(Ordering::Relaxed);
                counter.store(n.wrapping_add(1), Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> ErrorCounts {
        ErrorCounts {
            overrun: self.overrun.load(Ordering::Relaxed),
            framing: self.framing.load(Ordering::Relaxed),
            noise: self.noise.load(Ordering::Relaxed),
            parity: self.parity.load(Ordering::Relaxed),
        }
    }
}

/// The serial line, the transfer engine and an [`EchoPolicy`].
///
/// Meant to live in a [`crate::cell::Shared`] so the DMA and USART interrupt
/// handlers can reach it.
pub struct EchoController<'a, P> {
    line: SerialLine<'a>,
    engine: TransferEngine<'a>,
    policy: P,
    errors: ErrorCounters,
}

impl<'a, P: EchoPolicy> EchoController<'a, P> {
    /// Assembles a controller from already configured parts.
    pub const fn new(line: SerialLine<'a>, engine: TransferEngine<'a>, policy: P) -> Self {
        EchoController {
            line,
            engine,
            policy,
            errors: ErrorCounters::new(),
        }
    }

    /// Brings up the serial line and the DMA engine from `config`.
    ///
    /// The configuration is validated before any register is touched. Both
    /// interrupt lines are unmasked on return; run this with interrupts
    /// disabled if the handlers look the controller up in a static that is
    /// filled afterwards.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`EchoConfig::validate`].
    pub fn configure(
        peripherals: &Peripherals<'a>,
        cells: Cells<'a>,
        config: &EchoConfig,
        policy: P,
        nvic: &mut impl InterruptController,
    ) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let gpio = Gpio::new(peripherals.rcc, peripherals.gpio);

        let line = SerialLine::new(peripherals.usart1, config.pins);
        line.configure(&gpio, config.divisor, nvic, config.error_priority);

        let engine = TransferEngine::new(
            peripherals.dma1,
            &line,
            cells,
            config.rx_channel_priority,
            config.tx_channel_priority,
        );
        engine.enable(&gpio, nvic, config.dma_priority);

        debug!("echo: configured {}", config);
        Ok(Self::new(line, engine, policy))
    }

    /// Arms reception of the first byte.
    pub fn start(&self) {
        self.engine.arm_receive();
    }

    /// Body of the combined DMA channel 2/3 interrupt handler.
    ///
    /// Both completions are checked on every call. The finished transmit is
    /// retired before the received byte is handled, so an echo armed for that
    /// byte is not disarmed in the same call.
    pub fn on_dma_interrupt(&self) {
        let completions = self.engine.take_completions();
        if completions.tx {
            trace!("echo: tx done");
            self.policy.on_transmit(&self.engine);
        }
        if completions.rx {
            trace!("echo: rx {=u8:#x}", self.engine.received());
            self.policy.on_receive(&self.engine);
        }
    }

    /// Body of the USART1 interrupt handler.
    ///
    /// Clears every pending line error and returns them. A corrupted or lost
    /// byte is simply not echoed.
    pub fn on_serial_interrupt(&self) -> ErrorFlags {
        let errors = self.line.take_errors();
        if !errors.is_empty() {
            self.errors.record(errors);
            warn!("echo: line errors {}", errors);
        }
        errors
    }

    /// Line errors observed since startup.
    pub fn error_counts(&self) -> ErrorCounts {
        self.errors.snapshot()
    }

    /// The serial line.
    pub fn line(&self) -> &SerialLine<'a> {
        &self.line
    }

    /// The transfer engine.
    pub fn engine(&self) -> &TransferEngine<'a> {
        &self.engine
    }

    /// The policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl EchoController<'_, Cooperative> {
    /// Returns `true` if a byte was received and not yet read.
    pub fn data_available(&self) -> bool {
        self.policy.rx_complete.is_set()
    }

    /// Returns the last received byte and marks it as read.
    ///
    /// Does not wait; without a pending byte it returns the previous one.
    pub fn read(&self) -> u8 {
        critical_section::with(|_| {
            self.policy.rx_complete.clear();
            self.engine.received()
        })
    }

    /// Returns the received byte if one is pending.
    pub fn try_read(&self) -> Option<u8> {
        critical_section::with(|_| {
            self.policy
                .rx_complete
                .take()
                .then(|| self.engine.received())
        })
    }

    /// Sends `byte`, first spinning until the previous transmit completed.
    ///
    /// Must not be called from an interrupt at or above the DMA priority, or
    /// it spins forever.
    pub fn start_transmit(&self, byte: u8) {
        spin_until(|| self.policy.tx_done.take());
        self.engine.arm_transmit(byte);
    }

    /// One step of the main loop: echo the pending byte, if any.
    ///
    /// Returns `true` if a byte was echoed.
    pub fn echo_pending(&self) -> bool {
        match self.try_read() {
            Some(byte) => {
                self.start_transmit(byte);
                true
            }
            None => false,
        }
    }
}
