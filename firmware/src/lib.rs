//! Board glue shared by the echo binaries: logger, panic handler, the DMA
//! byte cells and startup.

#![no_std]

use cortex_m::peripheral::NVIC;
use defmt_rtt as _;
use dma_echo::{ByteCell, Cells, EchoConfig, EchoController, EchoPolicy, Peripherals, Shared};
use panic_probe as _;

pub use cortex_m_rt::entry;
pub use stm32f0::stm32f0x2::interrupt;

/// Receive DMA destination.
static RX_CELL: ByteCell = ByteCell::new(0);
/// Transmit DMA source.
static TX_CELL: ByteCell = ByteCell::new(0);

/// Configures the echo engine with the default configuration, publishes it
/// in `slot` and arms reception.
///
/// Configuration and publication happen in one critical section, so an
/// interrupt that becomes pending on the way only runs once its handler can
/// find the controller.
pub fn bring_up<P>(
    slot: &'static Shared<EchoController<'static, P>>,
    policy: P,
    nvic: &mut NVIC,
) -> &'static EchoController<'static, P>
where
    P: EchoPolicy + Sync,
{
    let peripherals = defmt::unwrap!(Peripherals::take());
    let config = EchoConfig::default();
    let cells = Cells {
        rx: &RX_CELL,
        tx: &TX_CELL,
    };

    let echo = defmt::unwrap!(critical_section::with(|_| {
        let echo = EchoController::configure(&peripherals, cells, &config, policy, nvic)?;
        slot.init(echo)
    }));

    echo.start();
    defmt::info!("echo: listening on {}", config);
    echo
}

/// Runs the DMA completion handler of the controller in `slot`, if any.
pub fn dma_interrupt<P: EchoPolicy>(slot: &Shared<EchoController<'static, P>>) {
    if let Some(echo) = slot.get() {
        echo.on_dma_interrupt();
    }
}

/// Runs the line error handler of the controller in `slot`, if any.
pub fn serial_interrupt<P: EchoPolicy>(slot: &Shared<EchoController<'static, P>>) {
    if let Some(echo) = slot.get() {
        echo.on_serial_interrupt();
    }
}
