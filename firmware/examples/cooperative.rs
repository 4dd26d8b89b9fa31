//! Echo driven from the main loop; the DMA interrupt only signals.

#![no_std]
#![no_main]

use dma_echo::{Cooperative, EchoController, ErrorCounts, Shared};
use firmware::{entry, interrupt};

static ECHO: Shared<EchoController<'static, Cooperative>> = Shared::new();

#[entry]
fn main() -> ! {
    let mut cp = defmt::unwrap!(cortex_m::Peripherals::take());
    let echo = firmware::bring_up(&ECHO, Cooperative::new(), &mut cp.NVIC);

    let mut reported = ErrorCounts::default();
    loop {
        if !echo.echo_pending() {
            let counts = echo.error_counts();
            if counts != reported {
                defmt::info!("echo: {}", counts);
                reported = counts;
            }
        }
    }
}

#[interrupt]
fn DMA1_CH2_3() {
    firmware::dma_interrupt(&ECHO);
}

#[interrupt]
fn USART1() {
    firmware::serial_interrupt(&ECHO);
}
