//! A blocking, `no_std` driver for the Semtech SX1276 LoRa transceiver.
//!
//! This crate provides a low-level synchronous driver for the SX1276/77/78/79
//! family of LoRa chips. It is built upon the blocking `embedded-hal` traits
//! and covers the receive path: one-time modem configuration followed by
//! single-shot receive attempts drained from the chip FIFO.
//!
//! The main entry point is the `SX1276` struct, which takes an SPI device and
//! the reset pin used to bring the modem up.
//!
//! # Usage
//!
//! See the `rpi-lora-rx` crate for a higher-level example of how this driver
//! can be used.

#![cfg_attr(not(test), no_std)]

pub mod reg;

mod sx;
pub use sx::*;
