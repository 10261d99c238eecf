//! LoRa receiver demo: wires an SX1276 to the Pi's SPI0 bus, configures it
//! once, then prints every packet it hears until interrupted.
//!
//! Log verbosity is controlled through `RUST_LOG`.

use std::io;

use anyhow::{anyhow, Context, Result};
use rppal::gpio::Gpio;
use rppal::hal::Delay;
use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};
use sx1276_blocking::SX1276;

use rpi_lora_rx::lora::{LoraConfig, LoraReceiver};

/// BCM pin wired to the radio's NRESET line.
const RESET_PIN: u8 = 22;

/// SPI clock for the register interface.
const SPI_CLOCK_HZ: u32 = 1_000_000;

fn main() -> Result<()> {
    env_logger::init();

    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
        .context("failed to open SPI0")?;
    let spi = SimpleHalSpiDevice::new(spi);
    let reset = Gpio::new()
        .context("failed to open the GPIO character device")?
        .get(RESET_PIN)
        .context("failed to claim the reset pin")?
        .into_output();

    let radio = SX1276::new(spi, reset, Delay::new());
    let mut receiver = LoraReceiver::new(radio);
    receiver
        .init(&LoraConfig::default())
        .map_err(|err| anyhow!("LoRa radio initialization failed: {err:?}"))?;

    println!("\n-- LoRa Receiver --\n");

    let mut stdout = io::stdout().lock();
    receiver
        .run(&mut stdout)
        .map_err(|err| anyhow!("receive loop failed: {err}"))
}
