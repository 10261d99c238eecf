//! SX1276 register map (LoRa page) and related bit constants.

/// Register addresses used by the driver.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Register {
    /// FIFO read/write access port.
    Fifo = 0x00,
    /// Operating mode and modem selection.
    OpMode = 0x01,
    /// Carrier frequency, most significant byte.
    FrfMsb = 0x06,
    /// Carrier frequency, middle byte.
    FrfMid = 0x07,
    /// Carrier frequency, least significant byte.
    FrfLsb = 0x08,
    /// LNA gain and boost settings.
    Lna = 0x0C,
    /// SPI pointer into the FIFO data buffer.
    FifoAddrPtr = 0x0D,
    /// Start address of the TX region of the FIFO.
    FifoTxBaseAddr = 0x0E,
    /// Start address of the RX region of the FIFO.
    FifoRxBaseAddr = 0x0F,
    /// Start address of the most recently received packet.
    FifoRxCurrentAddr = 0x10,
    /// Interrupt flags, write 1 to clear.
    IrqFlags = 0x12,
    /// Payload length of the most recently received packet.
    RxNbBytes = 0x13,
    /// Estimated SNR of the last packet, in quarter dB.
    PktSnrValue = 0x19,
    /// Raw RSSI of the last packet.
    PktRssiValue = 0x1A,
    /// Bandwidth, coding rate and header mode.
    ModemConfig1 = 0x1D,
    /// Spreading factor, CRC enable and RX timeout MSBs.
    ModemConfig2 = 0x1E,
    /// RX-single symbol timeout, least significant byte.
    SymbTimeoutLsb = 0x1F,
    /// Preamble length, most significant byte.
    PreambleMsb = 0x20,
    /// Preamble length, least significant byte.
    PreambleLsb = 0x21,
    /// Low data rate optimization and AGC enable.
    ModemConfig3 = 0x26,
    /// LoRa detection optimization (SF6 vs SF7-12).
    DetectOptimize = 0x31,
    /// LoRa detection threshold (SF6 vs SF7-12).
    DetectionThreshold = 0x37,
    /// LoRa sync word.
    SyncWord = 0x39,
    /// DIO0..DIO3 mapping.
    DioMapping1 = 0x40,
    /// Silicon revision.
    Version = 0x42,
}

impl Register {
    /// Returns the raw register address.
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Bit 7 of the address byte selects write access on the SPI bus.
pub const SPI_WRITE: u8 = 0x80;

/// Interrupt flag bits in `Register::IrqFlags`.
pub mod irq {
    /// RX-single mode timed out without a packet.
    pub const RX_TIMEOUT: u8 = 0x80;
    /// Packet reception completed.
    pub const RX_DONE: u8 = 0x40;
    /// The payload CRC of the received packet did not check out.
    pub const PAYLOAD_CRC_ERROR: u8 = 0x20;
    /// A valid LoRa header was detected.
    pub const VALID_HEADER: u8 = 0x10;
    /// Packet transmission completed.
    pub const TX_DONE: u8 = 0x08;
}

/// Operating-mode bits in `Register::OpMode`.
pub mod mode {
    /// Selects the LoRa modem (only writable from sleep).
    pub const LONG_RANGE: u8 = 0x80;
    /// Sleep mode.
    pub const SLEEP: u8 = 0x00;
    /// Standby mode.
    pub const STDBY: u8 = 0x01;
    /// Continuous receive mode.
    pub const RX_CONTINUOUS: u8 = 0x05;
    /// Single-shot receive mode with symbol timeout.
    pub const RX_SINGLE: u8 = 0x06;
}
