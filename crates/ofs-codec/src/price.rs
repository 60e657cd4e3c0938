//! Native → canonical price conversion.
//!
//! The ledger reports prices as integers in its smallest unit (wei for an
//! 18-decimal chain). The index stores a decimal number of whole units.

use std::fmt;

use ofs_schemas::NativePrice;

/// Largest power of ten representable in a `u128`.
const MAX_DECIMALS: u32 = 38;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// `10^decimals` would overflow the native integer width.
    UnsupportedDecimals(u32),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnsupportedDecimals(d) => write!(
                f,
                "native price decimals must be <= {MAX_DECIMALS}, got {d}"
            ),
        }
    }
}

impl std::error::Error for CodecError {}

/// Number of decimal places between the native unit and one whole unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceUnit {
    decimals: u32,
}

impl PriceUnit {
    /// Wei → ether.
    pub const WEI: PriceUnit = PriceUnit { decimals: 18 };

    pub fn new(decimals: u32) -> Result<Self, CodecError> {
        if decimals > MAX_DECIMALS {
            return Err(CodecError::UnsupportedDecimals(decimals));
        }
        Ok(Self { decimals })
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Split into whole and fractional parts with integer arithmetic first so
    /// the whole part is never rounded through a float division.
    pub fn to_decimal(&self, native: NativePrice) -> f64 {
        let scale = 10u128.pow(self.decimals);
        let whole = native.0 / scale;
        let frac = native.0 % scale;
        whole as f64 + (frac as f64 / scale as f64)
    }
}

impl Default for PriceUnit {
    fn default() -> Self {
        Self::WEI
    }
}
