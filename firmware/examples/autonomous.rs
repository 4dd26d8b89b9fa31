//! Echo entirely from the DMA interrupt. The core sleeps in between.

#![no_std]
#![no_main]

use dma_echo::{Autonomous, EchoController, Shared};
use firmware::{entry, interrupt};

static ECHO: Shared<EchoController<'static, Autonomous>> = Shared::new();

#[entry]
fn main() -> ! {
    let mut cp = defmt::unwrap!(cortex_m::Peripherals::take());
    firmware::bring_up(&ECHO, Autonomous, &mut cp.NVIC);

    // Nothing left for thread mode: return to sleep after every handler.
    cp.SCB.set_sleeponexit();
    loop {
        cortex_m::asm::wfi();
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
