use std::{fmt, ops, str};

use crate::components::{self, Components};
use crate::{DceSecurityDomain, Result, Variant, Version};

/// Represents a Universally Unique IDentifier.
///
/// The value is kept as its 16-byte big-endian (network order) representation, so ordering and
/// hashing follow the canonical string form.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// Nil UUID (00000000-0000-0000-0000-000000000000)
    pub const NIL: Self = Self([0x00; 16]);

    /// Max UUID (ffffffff-ffff-ffff-ffff-ffffffffffff)
    pub const MAX: Self = Self([0xff; 16]);

    /// Name space ID for fully-qualified domain names (6ba7b810-9dad-11d1-80b4-00c04fd430c8)
    pub const NAMESPACE_DNS: Self = Self::from_u128(0x6ba7b810_9dad_11d1_80b4_00c04fd430c8);

    /// Name space ID for URLs (6ba7b811-9dad-11d1-80b4-00c04fd430c8)
    pub const NAMESPACE_URL: Self = Self::from_u128(0x6ba7b811_9dad_11d1_80b4_00c04fd430c8);

    /// Name space ID for ISO OIDs (6ba7b812-9dad-11d1-80b4-00c04fd430c8)
    pub const NAMESPACE_OID: Self = Self::from_u128(0x6ba7b812_9dad_11d1_80b4_00c04fd430c8);

    /// Name space ID for X.500 DNs (6ba7b814-9dad-11d1-80b4-00c04fd430c8)
    pub const NAMESPACE_X500: Self = Self::from_u128(0x6ba7b814_9dad_11d1_80b4_00c04fd430c8);

    /// Returns a reference to the underlying byte array.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; 16] {
        &mut self.0
    }

    /// Creates a UUID from its 128-bit integer value.
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    /// Creates a UUID from the six RFC 4122 fields, taken verbatim (version and variant bits
    /// included).
    pub const fn from_fields(
        time_low: u32,
        time_mid: u16,
        time_hi_and_version: u16,
        clock_seq_hi_and_variant: u8,
        clock_seq_low: u8,
        node: [u8; 6],
    ) -> Self {
        let tl = time_low.to_be_bytes();
        let tm = time_mid.to_be_bytes();
        let th = time_hi_and_version.to_be_bytes();
        Self([
            tl[0],
            tl[1],
            tl[2],
            tl[3],
            tm[0],
            tm[1],
            th[0],
            th[1],
            clock_seq_hi_and_variant,
            clock_seq_low,
            node[0],
            node[1],
            node[2],
            node[3],
            node[4],
            node[5],
        ])
    }

    /// Returns the component strategy matching the version of this UUID.
    pub fn components(&self) -> &'static dyn Components {
        components::of_version(self.version())
    }

    /// Returns the version number.
    pub fn version(&self) -> Version {
        Version::new(self.0[6] >> 4)
    }

    /// Returns the variant.
    pub fn variant(&self) -> Variant {
        Variant::decode(self.0[8])
    }

    /// Returns `true` if the variant is the one defined by RFC 4122 and RFC 9562.
    pub fn is_rfc4122(&self) -> bool {
        self.variant() == Variant::Rfc4122
    }

    /// Returns the embedded timestamp in 100-nanosecond ticks since the Unix epoch.
    ///
    /// Fails with [`Error::NotSupported`](crate::Error::NotSupported) unless the version is 1,
    /// 2, 6 or 7.
    pub fn timestamp(&self) -> Result<i64> {
        self.components().timestamp(self)
    }

    /// Returns the clock sequence of a version 1, 2 or 6 UUID.
    pub fn clock_sequence(&self) -> Result<u16> {
        self.components().clock_sequence(self)
    }

    /// Returns the node id of a version 1, 2 or 6 UUID.
    pub fn node_id(&self) -> Result<[u8; 6]> {
        self.components().node_id(self)
    }

    /// Returns the local domain of a version 2 UUID.
    pub fn domain(&self) -> Result<DceSecurityDomain> {
        self.components().domain(self)
    }

    /// Returns the local id of a version 2 UUID.
    pub fn local_id(&self) -> Result<u32> {
        self.components().local_id(self)
    }

    /// Returns the 8-4-4-4-12 hexadecimal string representation stored in a stack-allocated
    /// structure that can be dereferenced as `str` and [`Display`](fmt::Display)ed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use guidgen::Uuid;
    ///
    /// let x = "6ba7b810-9dad-11d1-80b4-00c04fd430c8".parse::<Uuid>()?;
    /// let y = x.encode();
    /// assert_eq!(&y as &str, "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
    /// assert_eq!(x, Uuid::NAMESPACE_DNS);
    /// # Ok::<(), guidgen::ParseError>(())
    /// ```
    pub fn encode(&self) -> impl ops::Deref<Target = str> + fmt::Display {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";

        let mut buffer = [0u8; 36];
        let mut pos = 0;
        for (i, e) in self.0.iter().enumerate() {
            buffer[pos] = DIGITS[(e >> 4) as usize];
            buffer[pos + 1] = DIGITS[(e & 15) as usize];
            pos += 2;
            if i == 3 || i == 5 || i == 7 || i == 9 {
                buffer[pos] = b'-';
                pos += 1;
            }
        }
        debug_assert!(buffer.is_ascii());
        UuidStr(buffer)
    }

    /// Returns a value that displays as a `urn:uuid:` URN.
    pub fn urn(&self) -> impl fmt::Display {
        struct Urn(Uuid);
        impl fmt::Display for Urn {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "urn:uuid:{}", self.0.encode())
            }
        }
        Urn(*self)
    }
}

impl fmt::Display for Uuid {
    /// Returns the 8-4-4-4-12 canonical hexadecimal string representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl str::FromStr for Uuid {
    type Err = ParseError;

    /// Creates an object from the 8-4-4-4-12 hexadecimal string representation.
    fn from_str(src: &str) -> std::result::Result<Self, Self::Err> {
        const ERR: ParseError = ParseError {};
        let mut dst = [0u8; 16];
        let mut iter = src.chars();
        for (i, e) in dst.iter_mut().enumerate() {
            let hi = iter.next().ok_or(ERR)?.to_digit(16).ok_or(ERR)? as u8;
            let lo = iter.next().ok_or(ERR)?.to_digit(16).ok_or(ERR)? as u8;
            *e = (hi << 4) | lo;
            if (i == 3 || i == 5 || i == 7 || i == 9) && iter.next().ok_or(ERR)? != '-' {
                return Err(ERR);
            }
        }
        if iter.next().is_none() {
            Ok(Self(dst))
        } else {
            Err(ERR)
        }
    }
}

impl From<Uuid> for [u8; 16] {
    fn from(src: Uuid) -> Self {
        src.0
    }
}

impl From<[u8; 16]> for Uuid {
    fn from(src: [u8; 16]) -> Self {
        Self(src)
    }
}

impl AsRef<[u8]> for Uuid {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Uuid> for u128 {
    fn from(src: Uuid) -> Self {
        Self::from_be_bytes(src.0)
    }
}

impl From<u128> for Uuid {
    fn from(src: u128) -> Self {
        Self::from_u128(src)
    }
}

impl From<Uuid> for String {
    fn from(src: Uuid) -> Self {
        src.to_string()
    }
}

impl TryFrom<String> for Uuid {
    type Error = ParseError;

    fn try_from(src: String) -> std::result::Result<Self, Self::Error> {
        src.parse()
    }
}

/// Concrete return type of [`Uuid::encode()`] containing the stack-allocated 8-4-4-4-12 string
/// representation.
struct UuidStr([u8; 36]);

impl ops::Deref for UuidStr {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        debug_assert!(self.0.is_ascii());
        unsafe { str::from_utf8_unchecked(&self.0) }
    }
}

impl fmt::Display for UuidStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self)
    }
}

/// Error parsing an invalid string representation of UUID.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid string representation")
    }
}

impl std::error::Error for ParseError {}

#[cfg(feature = "uuid")]
#[cfg_attr(docsrs, doc(cfg(feature = "uuid")))]
mod uuid_support {
    use super::Uuid;

    impl From<Uuid> for uuid::Uuid {
        fn from(src: Uuid) -> Self {
            uuid::Uuid::from_bytes(src.0)
        }
    }

    impl From<uuid::Uuid> for Uuid {
        fn from(src: uuid::Uuid) -> Self {
            Self(src.into_bytes())
        }
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
mod serde_support {
    use super::{fmt, Uuid};
    use serde::{de, Deserializer, Serializer};

    impl serde::Serialize for Uuid {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() {
                serializer.serialize_str(&self.encode())
            } else {
                serializer.serialize_bytes(self.as_bytes())
            }
        }
    }

    impl<'de> serde::Deserialize<'de> for Uuid {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            if deserializer.is_human_readable() {
                deserializer.deserialize_str(UuidVisitor)
            } else {
                deserializer.deserialize_bytes(UuidVisitor)
            }
        }
    }

    struct UuidVisitor;

    impl<'de> de::Visitor<'de> for UuidVisitor {
        type Value = Uuid;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "a UUID representation")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            value.parse::<Self::Value>().map_err(de::Error::custom)
        }

        fn visit_bytes<E: de::Error>(self, value: &[u8]) -> Result<Self::Value, E> {
            <[u8; 16]>::try_from(value)
                .map(Self::Value::from)
                .map_err(de::Error::custom)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::Uuid;
    use crate::{DceSecurityDomain, Variant, Version};

    /// Returns a collection of prepared cases
    fn prepare_cases() -> &'static [(u128, &'static str)] {
        &[
            (0, "00000000-0000-0000-0000-000000000000"),
            (
                0x6ba7b810_9dad_11d1_80b4_00c04fd430c8,
                "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            ),
            (
                0x017f22e2_79b0_7cc3_98c4_dc0c0c07398f,
                "017f22e2-79b0-7cc3-98c4-dc0c0c07398f",
            ),
            (u128::MAX, "ffffffff-ffff-ffff-ffff-ffffffffffff"),
        ]
    }

    /// Encodes and decodes prepared cases correctly
    #[test]
    fn encodes_and_decodes_prepared_cases_correctly() {
        for &(value, text) in prepare_cases() {
            let e = Uuid::from(value);
            assert_eq!(Ok(e), text.parse());
            assert_eq!(Ok(e), text.to_uppercase().parse());
            assert_eq!(&e.encode() as &str, text);
            assert_eq!(e.to_string(), text);
            assert_eq!(e.urn().to_string(), format!("urn:uuid:{text}"));
            #[cfg(feature = "uuid")]
            assert_eq!(&uuid::Uuid::from(e).to_string(), text);
        }
    }

    /// Returns error to invalid string representation
    #[test]
    fn returns_error_to_invalid_string_representation() {
        let cases = [
            "",
            " 0180a8f0-5b82-75b4-9fef-ecad657c30bb",
            "0180a8f0-5b84-7438-ab50-f0626f78002b ",
            "+0180a8f0-5b84-7438-ab50-f06405d35edb",
            "0180a8f05b847438ab50f068decfbfd7",
            "0180a8f0-5b847438-ab50-f06991838802",
            "{0180a8f0-5b84-7438-ab50-f06ac2e5e082}",
            "0180a8g0-5b84-7438-ab50-f06c91175b8a",
            "0180a8f0-5b84-7438-ab50_f06d3ea24429",
        ];

        for e in cases {
            assert!(e.parse::<Uuid>().is_err());
        }
    }

    /// Has symmetric converters
    #[test]
    fn has_symmetric_converters() {
        for &(value, _) in prepare_cases() {
            let e = Uuid::from(value);
            assert_eq!(Uuid::from(<[u8; 16]>::from(e)), e);
            assert_eq!(u128::from(e), value);
            assert_eq!(Uuid::try_from(e.to_string()), Ok(e));
            #[cfg(feature = "uuid")]
            assert_eq!(Uuid::from(<uuid::Uuid>::from(e)), e);
        }
    }

    /// Decodes fields of a known DCE Security UUID
    #[test]
    fn decodes_fields_of_a_known_dce_security_uuid() {
        let e = Uuid::from_fields(0x0000_03e8, 0x1234, 0x2567, 0x89, 0x00, [1, 2, 3, 4, 5, 6]);
        assert_eq!(e.to_string(), "000003e8-1234-2567-8900-010203040506");
        assert_eq!(e.version(), Version::V2);
        assert_eq!(e.variant(), Variant::Rfc4122);
        assert_eq!(e.local_id(), Ok(1000));
        assert_eq!(e.domain(), Ok(DceSecurityDomain::PERSON));
        assert_eq!(e.clock_sequence(), Ok(0x09));
        assert_eq!(e.node_id(), Ok([1, 2, 3, 4, 5, 6]));
    }

    /// Reports version and variant of namespace ids
    #[test]
    fn reports_version_and_variant_of_namespace_ids() {
        for e in [
            Uuid::NAMESPACE_DNS,
            Uuid::NAMESPACE_URL,
            Uuid::NAMESPACE_OID,
            Uuid::NAMESPACE_X500,
        ] {
            assert_eq!(e.version(), Version::V1);
            assert!(e.is_rfc4122());
            assert!(e.timestamp().is_ok());
        }
        assert_eq!(Uuid::NIL.version(), Version::EMPTY);
        assert_eq!(Uuid::MAX.version(), Version::MAX);
        assert_eq!(Uuid::MAX.variant(), Variant::Reserved);
        assert!(Uuid::MAX.timestamp().is_err());
    }
}
