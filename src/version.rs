//! Version, variant and DCE Security domain types.

use std::fmt;

/// The 4-bit version number stored in the high nibble of octet 6.
///
/// Values 1 through 8 are defined by RFC 4122 and RFC 9562; `0` marks the Nil UUID and `15` the
/// Max UUID. Every other value is reserved but still round-trips losslessly.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Version(u8);

impl Version {
    /// Version of the Nil UUID.
    pub const EMPTY: Self = Self(0);
    /// Gregorian time-based version.
    pub const V1: Self = Self(1);
    /// DCE Security version.
    pub const V2: Self = Self(2);
    /// MD5 name-based version.
    pub const V3: Self = Self(3);
    /// Random version.
    pub const V4: Self = Self(4);
    /// SHA-1 name-based version.
    pub const V5: Self = Self(5);
    /// Reordered Gregorian time-based version.
    pub const V6: Self = Self(6);
    /// Unix-epoch time-based version.
    pub const V7: Self = Self(7);
    /// Custom (implementation-defined) version.
    pub const V8: Self = Self(8);
    /// Version of the Max UUID.
    pub const MAX: Self = Self(15);

    /// Creates a version from the low four bits of `value`.
    pub const fn new(value: u8) -> Self {
        Self(value & 0x0f)
    }

    /// Returns the version number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns `true` for versions whose payload carries a timestamp (1, 2, 6 and 7).
    pub const fn is_time_based(self) -> bool {
        matches!(self.0, 1 | 2 | 6 | 7)
    }

    /// Returns `true` for versions derived from a namespace and a name (3, 5 and 8).
    ///
    /// Version 8 is only name-based when produced by a hashspace generator, but it is reported
    /// here since such generators require input.
    pub const fn is_name_based(self) -> bool {
        matches!(self.0, 3 | 5 | 8)
    }
}

impl From<u8> for Version {
    fn from(src: u8) -> Self {
        Self::new(src)
    }
}

impl From<Version> for u8 {
    fn from(src: Version) -> Self {
        src.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The variant field, encoded as a unary prefix in the high bits of octet 8.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum Variant {
    /// `0xx`: reserved for NCS backward compatibility.
    Ncs = 0,
    /// `10x`: the layout of RFC 4122 and RFC 9562.
    #[default]
    Rfc4122 = 1,
    /// `110`: reserved for Microsoft backward compatibility.
    Microsoft = 2,
    /// `111`: reserved for future definition.
    Reserved = 3,
}

impl Variant {
    /// `(mask, value)` pairs owned by each variant inside octet 8.
    const BITS: [(u8, u8); 4] = [(0x80, 0x00), (0xc0, 0x80), (0xe0, 0xc0), (0xe0, 0xe0)];

    /// Decodes the variant from octet 8 by counting its leading one bits.
    pub(crate) const fn decode(octet: u8) -> Self {
        match (!(octet | 0x1f)).leading_zeros() {
            0 => Self::Ncs,
            1 => Self::Rfc4122,
            2 => Self::Microsoft,
            _ => Self::Reserved,
        }
    }

    /// Writes the variant prefix into `octet`, leaving the bits the variant does not own intact.
    pub(crate) const fn encode(self, octet: u8) -> u8 {
        let (mask, value) = Self::BITS[self as usize];
        (octet & !mask) | value
    }

    /// Creates a variant from its numeric code, taking the low two bits.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Self::Ncs,
            1 => Self::Rfc4122,
            2 => Self::Microsoft,
            _ => Self::Reserved,
        }
    }
}

/// The local domain of a DCE Security (version 2) UUID.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct DceSecurityDomain(pub u8);

impl DceSecurityDomain {
    /// POSIX user id domain.
    pub const PERSON: Self = Self(0);
    /// POSIX group id domain.
    pub const GROUP: Self = Self(1);
    /// Organization domain.
    pub const ORG: Self = Self(2);
}
