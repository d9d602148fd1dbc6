//! # Core Entities
//!
//! Identifiers shared by the root-chain side (custody, heights) and the
//! rollup side (blocks, state roots).

use std::fmt;

/// A 32-byte hash (state roots, data commitments).
pub type Hash = [u8; 32];

/// A 20-byte root-chain address.
///
/// Used for balance owners, validators and the exodus watchdog alike.
pub type Address = [u8; 20];

/// Opaque token identifier assigned by governance.
pub type TokenId = u32;

/// Token id reserved for the chain's native asset.
pub const NATIVE_TOKEN: TokenId = 0;

/// Custody amount in base units.
pub type Amount = u128;

/// Root-chain height, used for expiry and lock maturation.
pub type BlockHeight = u64;

/// Rollup block number. Block 0 is genesis.
pub type BlockNumber = u64;

/// The all-zero hash, used as the default genesis state root.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Abbreviated hex rendering for log lines, e.g. `3fa2..9c01`.
pub struct ShortHex<'a>(pub &'a [u8]);

impl fmt::Display for ShortHex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes.len() <= 4 {
            return write!(f, "{}", hex::encode(bytes));
        }
        write!(
            f,
            "{}..{}",
            hex::encode(&bytes[..2]),
            hex::encode(&bytes[bytes.len() - 2..])
        )
    }
}

impl fmt::Debug for ShortHex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Build an address whose first byte is `n`. Handy in tests and fixtures.
pub fn address_from_byte(n: u8) -> Address {
    let mut address = [0u8; 20];
    address[0] = n;
    address
}
