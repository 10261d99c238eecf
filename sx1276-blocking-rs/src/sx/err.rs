//! Error types for the SX1276 driver.

use core::fmt::{self, Debug};

/// An error related to SPI communication.
pub enum SpiError<TSPIERR> {
    /// An error occurred during a `write` operation.
    Write(TSPIERR),
    /// An error occurred during a `transfer` operation.
    Transfer(TSPIERR),
}

impl<TSPIERR: Debug> Debug for SpiError<TSPIERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(err) => write!(f, "Write({err:?})"),
            Self::Transfer(err) => write!(f, "Transfer({err:?})"),
        }
    }
}

/// An error related to GPIO pin operations.
pub enum PinError<TPINERR> {
    /// An error occurred on an output pin.
    Output(TPINERR),
}

impl<TPINERR: Debug> Debug for PinError<TPINERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(err) => write!(f, "Output({err:?})"),
        }
    }
}

/// The main error type for the SX1276 driver.
pub enum SxError<TSPIERR, TPINERR> {
    /// An SPI-related error.
    Spi(SpiError<TSPIERR>),
    /// A pin-related error.
    Pin(PinError<TPINERR>),
    /// The silicon revision register did not read back as expected.
    /// Carries the value that was read.
    Version(u8),
    /// A configuration value outside the range the modem accepts.
    InvalidParam(&'static str),
}

impl<TSPIERR: Debug, TPINERR: Debug> Debug for SxError<TSPIERR, TPINERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(err) => write!(f, "Spi({err:?})"),
            Self::Pin(err) => write!(f, "Pin({err:?})"),
            Self::Version(version) => write!(f, "Version({version:#04x})"),
            Self::InvalidParam(what) => write!(f, "InvalidParam({what})"),
        }
    }
}

impl<TSPIERR, TPINERR> From<SpiError<TSPIERR>> for SxError<TSPIERR, TPINERR> {
    fn from(spi_err: SpiError<TSPIERR>) -> Self {
        SxError::Spi(spi_err)
    }
}

impl<TSPIERR, TPINERR> From<PinError<TPINERR>> for SxError<TSPIERR, TPINERR> {
    fn from(pin_err: PinError<TPINERR>) -> Self {
        SxError::Pin(pin_err)
    }
}
