// Consensus-critical. Changes to encodings invalidate every stored root.
//! Canonical primitive value types for the Shade ledger.

use crate::constants::*;
use borsh::{BorshDeserialize, BorshSerialize};
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors related to parsing, validation, or construction of core types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Hex string had an unexpected byte length.
    #[error("invalid hex length: expected {expected} bytes, got {got} bytes")]
    InvalidHexLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        got: usize,
    },

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Arithmetic overflow or underflow occurred.
    #[error("amount overflow or underflow")]
    AmountOverflow,

    /// A value violated protocol constraints.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    /// A curve point or scalar failed to decode.
    #[error("invalid curve encoding: {0}")]
    InvalidEncoding(&'static str),

    /// A signature or nullifier proof did not verify.
    #[error("verification failed: {0}")]
    Verification(&'static str),
}

/// Fixed-size 32-byte hash used for roots, leaves, keys and nonces.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hash32(pub [u8; HASH32_LEN]);

impl Hash32 {
    /// Returns an all-zero hash (the empty leaf).
    pub const fn zero() -> Self {
        Self([0u8; HASH32_LEN])
    }

    /// Returns the underlying byte array.
    pub const fn as_bytes(&self) -> &[u8; HASH32_LEN] {
        &self.0
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH32_LEN]
    }

    /// Encode a small integer as a field element (little-endian, zero padded).
    pub fn from_u64(v: u64) -> Self {
        let mut out = [0u8; HASH32_LEN];
        out[..8].copy_from_slice(&v.to_le_bytes());
        Self(out)
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; HASH32_LEN]> for Hash32 {
    fn from(value: [u8; HASH32_LEN]) -> Self {
        Self(value)
    }
}

impl From<Hash32> for [u8; HASH32_LEN] {
    fn from(value: Hash32) -> Self {
        value.0
    }
}

impl FromStr for Hash32 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH32_LEN {
            return Err(CoreError::InvalidHexLength {
                expected: HASH32_LEN,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; HASH32_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Merkle root type.
pub type Root = Hash32;

/// Blinding nonce of a UTXO commitment.
pub type Nonce = Hash32;

/// Amount expressed in the smallest unit.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Amount(pub u64);

impl Amount {
    /// Returns a zero amount.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Constructs an amount from units.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Returns the underlying unit value.
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Result<Self, CoreError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Result<Self, CoreError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Field-element encoding used inside commitments and signed messages.
    pub fn to_field(self) -> [u8; HASH32_LEN] {
        Hash32::from_u64(self.0).0
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash32_hex_roundtrip_accepts_prefix() {
        let h = Hash32([0xab; 32]);
        let parsed: Hash32 = format!("0x{h}").parse().unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn hash32_rejects_short_hex() {
        let err = "abcd".parse::<Hash32>().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidHexLength {
                expected: 32,
                got: 2
            }
        ));
    }

    #[test]
    fn amount_checked_math() {
        let a = Amount::from_units(7);
        assert_eq!(a.checked_sub(Amount(3)).unwrap(), Amount(4));
        assert!(a.checked_sub(Amount(8)).is_err());
        assert!(Amount(u64::MAX).checked_add(Amount(1)).is_err());
    }

    #[test]
    fn field_encoding_is_little_endian() {
        let f = Amount(0x0102).to_field();
        assert_eq!(f[0], 0x02);
        assert_eq!(f[1], 0x01);
        assert!(f[2..].iter().all(|b| *b == 0));
    }
}
