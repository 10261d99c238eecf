//! The receive loop, its configuration and the radio-facing seam.

use std::fmt;
use std::io::{self, Write};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use sx1276_blocking::{HeaderMode, PacketStatus, RxGain, SxError, SX1276};

/// The subset of the modem driver the receiver depends on.
///
/// The `sx1276_blocking` driver implements this for real hardware; tests
/// substitute a scripted mock.
pub trait Transceiver {
    /// Driver error type.
    type Error: fmt::Debug;

    /// Resets and initializes the modem.
    fn begin(&mut self) -> Result<(), Self::Error>;
    /// Sets the RF carrier frequency in Hz.
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;
    /// Configures the receive-path LNA.
    fn set_rx_gain(&mut self, gain: RxGain) -> Result<(), Self::Error>;
    /// Sets the spreading factor.
    fn set_spreading_factor(&mut self, sf: u8) -> Result<(), Self::Error>;
    /// Sets the signal bandwidth in Hz.
    fn set_bandwidth(&mut self, hz: u32) -> Result<(), Self::Error>;
    /// Sets the coding rate denominator.
    fn set_code_rate(&mut self, denominator: u8) -> Result<(), Self::Error>;
    /// Selects explicit or implicit packet headers.
    fn set_header_mode(&mut self, header: HeaderMode) -> Result<(), Self::Error>;
    /// Sets the preamble length in symbols.
    fn set_preamble_length(&mut self, symbols: u16) -> Result<(), Self::Error>;
    /// Enables or disables the payload CRC check.
    fn set_crc_enable(&mut self, enable: bool) -> Result<(), Self::Error>;
    /// Sets the LoRa sync word.
    fn set_sync_word(&mut self, word: u8) -> Result<(), Self::Error>;
    /// Starts a single-shot receive attempt.
    fn request(&mut self) -> Result<(), Self::Error>;
    /// Blocks until the attempt terminates.
    fn wait(&mut self) -> Result<(), Self::Error>;
    /// Payload bytes not yet consumed.
    fn available(&self) -> usize;
    /// Pops one payload byte.
    fn read(&mut self) -> Option<u8>;
    /// RSSI of the last packet in dBm.
    fn packet_rssi(&mut self) -> Result<f32, Self::Error>;
    /// SNR of the last packet in dB.
    fn snr(&mut self) -> Result<f32, Self::Error>;
    /// Outcome of the last receive attempt.
    fn status(&self) -> PacketStatus;
}

impl<TSPI, TNRST, TDELAY, TSPIERR, TPINERR> Transceiver for SX1276<TSPI, TNRST, TDELAY>
where
    TSPIERR: fmt::Debug,
    TPINERR: fmt::Debug,
    TSPI: SpiDevice<Error = TSPIERR>,
    TNRST: OutputPin<Error = TPINERR>,
    TDELAY: DelayNs,
{
    type Error = SxError<TSPIERR, TPINERR>;

    fn begin(&mut self) -> Result<(), Self::Error> {
        SX1276::begin(self)
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        SX1276::set_frequency(self, hz)
    }

    fn set_rx_gain(&mut self, gain: RxGain) -> Result<(), Self::Error> {
        SX1276::set_rx_gain(self, gain)
    }

    fn set_spreading_factor(&mut self, sf: u8) -> Result<(), Self::Error> {
        SX1276::set_spreading_factor(self, sf)
    }

    fn set_bandwidth(&mut self, hz: u32) -> Result<(), Self::Error> {
        SX1276::set_bandwidth(self, hz)
    }

    fn set_code_rate(&mut self, denominator: u8) -> Result<(), Self::Error> {
        SX1276::set_code_rate(self, denominator)
    }

    fn set_header_mode(&mut self, header: HeaderMode) -> Result<(), Self::Error> {
        SX1276::set_header_mode(self, header)
    }

    fn set_preamble_length(&mut self, symbols: u16) -> Result<(), Self::Error> {
        SX1276::set_preamble_length(self, symbols)
    }

    fn set_crc_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        SX1276::set_crc_enable(self, enable)
    }

    fn set_sync_word(&mut self, word: u8) -> Result<(), Self::Error> {
        SX1276::set_sync_word(self, word)
    }

    fn request(&mut self) -> Result<(), Self::Error> {
        SX1276::request(self)
    }

    fn wait(&mut self) -> Result<(), Self::Error> {
        SX1276::wait(self)
    }

    fn available(&self) -> usize {
        SX1276::available(self)
    }

    fn read(&mut self) -> Option<u8> {
        SX1276::read(self)
    }

    fn packet_rssi(&mut self) -> Result<f32, Self::Error> {
        SX1276::packet_rssi(self)
    }

    fn snr(&mut self) -> Result<f32, Self::Error> {
        SX1276::snr(self)
    }

    fn status(&self) -> PacketStatus {
        SX1276::status(self)
    }
}

/// Configuration for the LoRa receiver.
///
/// The defaults match the transmitter this demo listens to.
#[derive(Debug, Clone)]
pub struct LoraConfig {
    /// RF carrier frequency in Hz.
    pub frequency: u32,
    /// Receive-path LNA strategy.
    pub rx_gain: RxGain,
    /// Spreading factor.
    pub spreading_factor: u8,
    /// Signal bandwidth in Hz.
    pub bandwidth: u32,
    /// Coding rate denominator (5..=8 meaning 4/5..4/8).
    pub code_rate: u8,
    /// Packet header mode.
    pub header_mode: HeaderMode,
    /// Preamble length in symbols.
    pub preamble_length: u16,
    /// Whether the payload CRC is checked.
    pub crc_enable: bool,
    /// Sync word. `0x12` is the conventional private-network value.
    pub sync_word: u8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            frequency: 915_000_000,
            rx_gain: RxGain::PowerSaving,
            spreading_factor: 9,
            bandwidth: 125_000,
            code_rate: 7,
            header_mode: HeaderMode::Explicit,
            preamble_length: 10,
            crc_enable: true,
            sync_word: 0x12, // private network
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Raw payload bytes; empty for failed attempts.
    pub payload: Vec<u8>,
    /// RSSI in dBm.
    pub rssi: f32,
    /// SNR in dB.
    pub snr: f32,
    /// How the attempt terminated.
    pub status: PacketStatus,
}

/// An error raised by the receive loop.
#[derive(Debug)]
pub enum ReceiverError<E> {
    /// The radio driver failed.
    Radio(E),
    /// Writing a report line failed.
    Io(io::Error),
}

impl<E: fmt::Debug> fmt::Display for ReceiverError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(err) => write!(f, "radio error: {err:?}"),
            Self::Io(err) => write!(f, "output error: {err}"),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for ReceiverError<E> {}

impl<E> From<io::Error> for ReceiverError<E> {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A high-level interface around an SX1276 configured for receive.
///
/// This struct applies the one-time modem configuration and then drives
/// single-shot receive attempts, reporting each one on the given writer.
pub struct LoraReceiver<R: Transceiver> {
    /// The underlying radio.
    pub radio: R,
    packets: u64,
}

impl<R: Transceiver> LoraReceiver<R> {
    /// Creates a new `LoraReceiver` around an unconfigured radio.
    pub fn new(radio: R) -> Self {
        Self { radio, packets: 0 }
    }

    /// Initializes the radio and applies the full receive configuration.
    ///
    /// Any failure aborts initialization; the caller must not enter the
    /// receive loop afterwards.
    pub fn init(&mut self, config: &LoraConfig) -> Result<(), R::Error> {
        log::info!("Begin LoRa radio");
        self.radio.begin()?;

        log::info!("Set frequency to {} Hz", config.frequency);
        self.radio.set_frequency(config.frequency)?;

        log::info!("Set RX gain: {:?}", config.rx_gain);
        self.radio.set_rx_gain(config.rx_gain)?;

        log::info!(
            "Set modulation: SF {}, BW {} Hz, CR 4/{}",
            config.spreading_factor,
            config.bandwidth,
            config.code_rate
        );
        self.radio.set_spreading_factor(config.spreading_factor)?;
        self.radio.set_bandwidth(config.bandwidth)?;
        self.radio.set_code_rate(config.code_rate)?;

        log::info!(
            "Set packet parameters: {:?} header, preamble {}, CRC {}",
            config.header_mode,
            config.preamble_length,
            if config.crc_enable { "on" } else { "off" }
        );
        self.radio.set_header_mode(config.header_mode)?;
        self.radio.set_preamble_length(config.preamble_length)?;
        self.radio.set_crc_enable(config.crc_enable)?;

        log::info!("Set sync word {:#04x}", config.sync_word);
        self.radio.set_sync_word(config.sync_word)?;

        Ok(())
    }

    /// Runs one receive attempt to completion and collects its outcome.
    pub fn poll_once(&mut self) -> Result<Packet, R::Error> {
        self.radio.request()?;
        self.radio.wait()?;

        let mut payload = Vec::with_capacity(self.radio.available());
        while self.radio.available() > 0 {
            match self.radio.read() {
                Some(byte) => payload.push(byte),
                None => break,
            }
        }

        let rssi = self.radio.packet_rssi()?;
        let snr = self.radio.snr()?;
        let status = self.radio.status();

        if !payload.is_empty() {
            self.packets += 1;
        }

        Ok(Packet {
            payload,
            rssi,
            snr,
            status,
        })
    }

    /// Writes the report for one iteration: the payload line, the link
    /// quality line, and at most one error line.
    pub fn report<W: Write>(&self, packet: &Packet, out: &mut W) -> io::Result<()> {
        writeln!(out, "Received: {}", decode_payload(&packet.payload))?;
        writeln!(
            out,
            "Packet status: RSSI = {:.2} dBm | SNR = {:.2} dB",
            packet.rssi, packet.snr
        )?;
        match packet.status {
            PacketStatus::CrcError => writeln!(out, "CRC error")?,
            PacketStatus::HeaderError => writeln!(out, "Packet header error")?,
            _ => {}
        }
        Ok(())
    }

    /// Runs a single iteration of the receive loop.
    pub fn run_once<W: Write>(&mut self, out: &mut W) -> Result<(), ReceiverError<R::Error>> {
        let packet = self.poll_once().map_err(ReceiverError::Radio)?;
        self.report(&packet, out)?;
        if packet.status == PacketStatus::RxDone {
            log::debug!(
                "packet #{}: {} bytes [{}]",
                self.packets,
                packet.payload.len(),
                hex_dump(&packet.payload)
            );
        }
        Ok(())
    }

    /// Receives and reports packets forever.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<(), ReceiverError<R::Error>> {
        loop {
            self.run_once(out)?;
        }
    }

    /// Number of non-empty packets received so far.
    pub fn packets_received(&self) -> u64 {
        self.packets
    }
}

/// Renders a payload for the `Received:` line: UTF-8 with trailing NUL
/// padding stripped, or a hex dump when the bytes are not valid UTF-8.
pub fn decode_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.trim_end_matches('\0').to_string(),
        Err(_) => format!("<hex: {}>", hex_dump(payload)),
    }
}

fn hex_dump(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_trailing_nul_padding() {
        assert_eq!(decode_payload(b"hello\0\0\0"), "hello");
    }

    #[test]
    fn decode_passes_plain_text_through() {
        assert_eq!(decode_payload(b"HeLoRa World!"), "HeLoRa World!");
    }

    #[test]
    fn decode_falls_back_to_hex_for_binary_payloads() {
        assert_eq!(decode_payload(&[0xff, 0x00, 0x41]), "<hex: ff 00 41>");
    }

    #[test]
    fn decode_handles_empty_payloads() {
        assert_eq!(decode_payload(&[]), "");
    }
}
