//! A blocking LoRa receiver for an SX1276 radio attached to a Raspberry Pi.
//!
//! This crate provides a `LoraReceiver` struct that configures the modem once
//! and then loops forever, printing the payload and link quality of every
//! packet it hears. It is built upon the `sx1276_blocking` driver crate and
//! talks to the radio only through the `Transceiver` trait, so the receive
//! loop can be exercised against a mock in tests.
//!
//! The `rpi-lora-rx` binary wires the driver to the Pi's SPI0 bus and a GPIO
//! reset line via `rppal`.

#![deny(missing_docs)]

/// The receive loop and its radio-facing seam.
pub mod lora;
