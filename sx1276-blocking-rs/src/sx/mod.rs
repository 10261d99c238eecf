//! The core implementation of the SX1276 driver.

pub(crate) mod err;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::reg::{irq, mode, Register, SPI_WRITE};

pub use self::err::{PinError, SpiError, SxError};

/// Largest LoRa payload the 256-byte FIFO can hold in explicit header mode.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Value of `Register::Version` on SX1276/77/78/79 silicon.
const CHIP_VERSION: u8 = 0x12;

/// Crystal oscillator frequency in Hz.
const F_XOSC: u64 = 32_000_000;

/// LoRa packet header mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderMode {
    /// The header carries payload length, coding rate and CRC presence.
    Explicit,
    /// Fixed-length packets with no header on air.
    Implicit,
}

/// LNA gain strategy for the receive path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RxGain {
    /// Maximum gain with the HF boost current enabled.
    Boosted,
    /// Maximum gain at the default LNA current.
    PowerSaving,
}

/// Outcome of the most recent receive attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketStatus {
    /// The modem is configured but no receive has been requested.
    Standby,
    /// A receive was requested and the modem is listening.
    RxWait,
    /// A packet was received and its payload is available.
    RxDone,
    /// The receive window closed without detecting a packet.
    RxTimeout,
    /// A packet was received but its payload CRC did not check out.
    CrcError,
    /// A packet finished without a valid header being detected.
    HeaderError,
}

/// A wrapper around a Semtech SX1276 LoRa modem.
pub struct SX1276<TSPI: SpiDevice, TNRST, TDELAY> {
    spi: TSPI,
    nrst_pin: TNRST,
    delay: TDELAY,
    status: PacketStatus,
    explicit_header: bool,
    rx_buf: [u8; MAX_PAYLOAD_LEN],
    rx_len: usize,
    rx_pos: usize,
}

impl<TSPI, TNRST, TDELAY, TSPIERR, TPINERR> SX1276<TSPI, TNRST, TDELAY>
where
    TSPIERR: core::fmt::Debug,
    TPINERR: core::fmt::Debug,
    TSPI: SpiDevice<Error = TSPIERR>,
    TNRST: OutputPin<Error = TPINERR>,
    TDELAY: DelayNs,
{
    /// Creates a new `SX1276` driver instance.
    ///
    /// # Arguments
    ///
    /// * `spi` - An SPI device with the modem's chip select wired in.
    /// * `nrst_pin` - The GPIO output connected to the modem's NRESET line.
    /// * `delay` - A blocking delay provider.
    pub fn new(spi: TSPI, nrst_pin: TNRST, delay: TDELAY) -> Self {
        Self {
            spi,
            nrst_pin,
            delay,
            status: PacketStatus::Standby,
            explicit_header: true,
            rx_buf: [0; MAX_PAYLOAD_LEN],
            rx_len: 0,
            rx_pos: 0,
        }
    }

    /// Initializes the modem: hardware reset, silicon revision check,
    /// LoRa mode selection and FIFO base setup. Leaves the modem in standby.
    ///
    /// Must succeed before any other call is meaningful.
    pub fn begin(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        log::trace!("sx1276::begin start");
        self.reset()?;

        let version = self.read_register(Register::Version)?;
        log::trace!("sx1276::begin version register: {version:#04x}");
        if version != CHIP_VERSION {
            return Err(SxError::Version(version));
        }

        // The LoRa modem can only be selected while the chip sleeps.
        self.set_op_mode(mode::SLEEP)?;
        self.delay.delay_ms(10);

        self.write_register(Register::FifoTxBaseAddr, 0x00)?;
        self.write_register(Register::FifoRxBaseAddr, 0x00)?;
        // DIO0 mapped to RxDone; the driver polls the flags register,
        // the pin is only useful for probing.
        self.write_register(Register::DioMapping1, 0x00)?;

        self.set_op_mode(mode::STDBY)?;
        self.status = PacketStatus::Standby;
        log::trace!("sx1276::begin done");
        Ok(())
    }

    /// Resets the modem by pulsing the NRESET pin.
    pub fn reset(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.nrst_pin.set_low().map_err(PinError::Output)?;
        // The datasheet asks for >= 100 us low, then 5 ms for the chip
        // to come out of POR.
        self.delay.delay_ms(1);
        self.nrst_pin.set_high().map_err(PinError::Output)?;
        self.delay.delay_ms(10);
        Ok(())
    }

    /// Sets the RF carrier frequency in Hz.
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let frf = ((hz as u64) << 19) / F_XOSC;
        self.write_register(Register::FrfMsb, (frf >> 16) as u8)?;
        self.write_register(Register::FrfMid, (frf >> 8) as u8)?;
        self.write_register(Register::FrfLsb, frf as u8)
    }

    /// Configures the LNA for the receive path and enables AGC.
    pub fn set_rx_gain(&mut self, gain: RxGain) -> Result<(), SxError<TSPIERR, TPINERR>> {
        // G1 (maximum) gain either way; `Boosted` adds the 150% LNA
        // boost current on the HF port.
        let lna = match gain {
            RxGain::Boosted => 0x20 | 0x03,
            RxGain::PowerSaving => 0x20,
        };
        self.write_register(Register::Lna, lna)?;
        let config = self.read_register(Register::ModemConfig3)?;
        self.write_register(Register::ModemConfig3, config | 0x04)
    }

    /// Sets the spreading factor, 6 through 12.
    ///
    /// SF6 additionally requires implicit header mode, which is left to
    /// the caller; only the detection registers are adjusted here.
    pub fn set_spreading_factor(&mut self, sf: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        if !(6..=12).contains(&sf) {
            return Err(SxError::InvalidParam("spreading factor must be 6..=12"));
        }
        if sf == 6 {
            self.write_register(Register::DetectOptimize, 0x05)?;
            self.write_register(Register::DetectionThreshold, 0x0C)?;
        } else {
            self.write_register(Register::DetectOptimize, 0x03)?;
            self.write_register(Register::DetectionThreshold, 0x0A)?;
        }
        let config = self.read_register(Register::ModemConfig2)?;
        self.write_register(Register::ModemConfig2, (config & 0x0F) | (sf << 4))
    }

    /// Sets the signal bandwidth in Hz. Only the ten bandwidths the chip
    /// supports are accepted.
    pub fn set_bandwidth(&mut self, hz: u32) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let bw: u8 = match hz {
            7_800 => 0,
            10_400 => 1,
            15_600 => 2,
            20_800 => 3,
            31_250 => 4,
            41_700 => 5,
            62_500 => 6,
            125_000 => 7,
            250_000 => 8,
            500_000 => 9,
            _ => return Err(SxError::InvalidParam("unsupported bandwidth")),
        };
        let config = self.read_register(Register::ModemConfig1)?;
        self.write_register(Register::ModemConfig1, (config & 0x0F) | (bw << 4))
    }

    /// Sets the coding rate denominator, 5 through 8 (4/5 .. 4/8).
    pub fn set_code_rate(&mut self, denominator: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        if !(5..=8).contains(&denominator) {
            return Err(SxError::InvalidParam(
                "coding rate denominator must be 5..=8",
            ));
        }
        let cr = denominator - 4;
        let config = self.read_register(Register::ModemConfig1)?;
        self.write_register(Register::ModemConfig1, (config & 0xF1) | (cr << 1))
    }

    /// Selects explicit or implicit packet headers.
    pub fn set_header_mode(&mut self, header: HeaderMode) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.explicit_header = header == HeaderMode::Explicit;
        let implicit = match header {
            HeaderMode::Explicit => 0x00,
            HeaderMode::Implicit => 0x01,
        };
        let config = self.read_register(Register::ModemConfig1)?;
        self.write_register(Register::ModemConfig1, (config & 0xFE) | implicit)
    }

    /// Sets the preamble length in symbols.
    pub fn set_preamble_length(&mut self, symbols: u16) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::PreambleMsb, (symbols >> 8) as u8)?;
        self.write_register(Register::PreambleLsb, symbols as u8)
    }

    /// Enables or disables the payload CRC check on receive.
    pub fn set_crc_enable(&mut self, enable: bool) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let config = self.read_register(Register::ModemConfig2)?;
        self.write_register(Register::ModemConfig2, (config & 0xFB) | ((enable as u8) << 2))
    }

    /// Sets the LoRa sync word. `0x12` is the conventional private-network
    /// value, `0x34` is reserved for LoRaWAN.
    pub fn set_sync_word(&mut self, word: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::SyncWord, word)
    }

    /// Starts a single-shot receive attempt: clears stale interrupt flags,
    /// rewinds the FIFO pointer and enters RX-single mode.
    pub fn request(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.rx_len = 0;
        self.rx_pos = 0;
        self.set_op_mode(mode::STDBY)?;
        self.write_register(Register::IrqFlags, 0xFF)?;
        self.write_register(Register::FifoAddrPtr, 0x00)?;
        self.set_op_mode(mode::RX_SINGLE)?;
        self.status = PacketStatus::RxWait;
        Ok(())
    }

    /// Blocks until the receive attempt started by `request` terminates,
    /// then classifies it and, on success, drains the payload from the
    /// FIFO into the internal buffer.
    ///
    /// The RX-single symbol timeout inside the modem bounds the wait, so
    /// no timeout parameter is taken.
    pub fn wait(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let flags = loop {
            let flags = self.read_register(Register::IrqFlags)?;
            if flags & (irq::RX_DONE | irq::RX_TIMEOUT) != 0 {
                break flags;
            }
            self.delay.delay_ms(1);
        };
        // Write-1-to-clear: acknowledge exactly what was observed.
        self.write_register(Register::IrqFlags, flags)?;
        log::trace!("sx1276::wait irq flags: {flags:#04x}");

        if flags & irq::RX_TIMEOUT != 0 {
            self.status = PacketStatus::RxTimeout;
            return Ok(());
        }
        if flags & irq::PAYLOAD_CRC_ERROR != 0 {
            self.status = PacketStatus::CrcError;
            return Ok(());
        }
        if self.explicit_header && flags & irq::VALID_HEADER == 0 {
            self.status = PacketStatus::HeaderError;
            return Ok(());
        }

        let len = (self.read_register(Register::RxNbBytes)? as usize).min(MAX_PAYLOAD_LEN);
        let current = self.read_register(Register::FifoRxCurrentAddr)?;
        self.write_register(Register::FifoAddrPtr, current)?;
        for i in 0..len {
            self.rx_buf[i] = self.read_register(Register::Fifo)?;
        }
        self.rx_len = len;
        self.status = PacketStatus::RxDone;
        log::trace!("sx1276::wait received {len} bytes");
        Ok(())
    }

    /// Number of payload bytes not yet consumed by `read`.
    pub fn available(&self) -> usize {
        self.rx_len - self.rx_pos
    }

    /// Pops one payload byte, or `None` once the packet is drained.
    pub fn read(&mut self) -> Option<u8> {
        if self.rx_pos < self.rx_len {
            let byte = self.rx_buf[self.rx_pos];
            self.rx_pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// RSSI of the last packet in dBm.
    ///
    /// Uses the HF-port offset; packets below the noise floor are
    /// corrected with the measured SNR.
    pub fn packet_rssi(&mut self) -> Result<f32, SxError<TSPIERR, TPINERR>> {
        let raw = self.read_register(Register::PktRssiValue)? as i16;
        let snr_quarter_db = self.read_register(Register::PktSnrValue)? as i8;
        let rssi = if snr_quarter_db < 0 {
            -157 + raw + (snr_quarter_db / 4) as i16
        } else {
            -157 + raw * 16 / 15
        };
        Ok(rssi as f32)
    }

    /// SNR of the last packet in dB.
    pub fn snr(&mut self) -> Result<f32, SxError<TSPIERR, TPINERR>> {
        let raw = self.read_register(Register::PktSnrValue)? as i8;
        Ok(raw as f32 / 4.0)
    }

    /// Status of the most recent receive attempt.
    pub fn status(&self) -> PacketStatus {
        self.status
    }

    /// Releases the SPI device and reset pin.
    pub fn release(self) -> (TSPI, TNRST) {
        (self.spi, self.nrst_pin)
    }

    fn set_op_mode(&mut self, m: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::OpMode, mode::LONG_RANGE | m)
    }

    fn read_register(&mut self, register: Register) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        let mut buf = [register.addr() & !SPI_WRITE, 0x00];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(SpiError::Transfer)?;
        Ok(buf[1])
    }

    fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.spi
            .write(&[register.addr() | SPI_WRITE, value])
            .map_err(SpiError::Write)
            .map_err(Into::into)
    }
}
