//! Per-version views of the fields packed into a UUID.
//!
//! Each UUID version stores a different payload in the 122 bits left around the version and
//! variant. [`of_version()`] returns the strategy that knows the layout of a version; operations
//! that have no meaning for that version fail with [`Error::NotSupported`].
//!
//! Timestamps are exchanged as 100-nanosecond ticks since the Unix epoch (see
//! [`timestamp`](crate::timestamp)) whatever the epoch and resolution of the underlying field.

use crate::fields::Fields;
use crate::timestamp::{self, GREGORIAN_EPOCH, TICKS_PER_MILLISECOND, UNIX_EPOCH_TICKS};
use crate::{DceSecurityDomain, Error, Result, Uuid, Variant, Version};

/// Bits that remain once the version and the two-bit RFC variant are cleared.
const RAW_MASK: [u8; 16] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x0f, 0xff, 0x3f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// Raw bits of version 7 that are not covered by the millisecond timestamp.
const V7_RANDOM_MASK: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0xff, 0x3f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

const MAX_GREGORIAN: i64 = (1 << 60) - 1;
const MAX_UNIX_MS: i64 = (1 << 48) - 1;

/// Uniform access to the version-specific fields of a UUID.
///
/// The common operations (version, variant and raw data) are implemented for every version.
pub trait Components: Send + Sync {
    /// Reads the variant.
    fn variant(&self, uuid: &Uuid) -> Variant {
        Variant::decode(uuid.as_bytes().clk_seq_hi_var())
    }

    /// Writes the variant, touching only the one to three bits it owns.
    fn set_variant(&self, uuid: &mut Uuid, variant: Variant) {
        let bytes = uuid.bytes_mut();
        bytes[8] = variant.encode(bytes[8]);
    }

    /// Reads the version.
    fn version(&self, uuid: &Uuid) -> Version {
        Version::new((uuid.as_bytes().time_hi_and_version() >> 12) as u8)
    }

    /// Writes the version into the high nibble of octet 6.
    fn set_version(&self, uuid: &mut Uuid, version: Version) {
        let value = (version.get() as u16) << 12;
        uuid.bytes_mut().set_time_hi_and_version(value, 0xf000);
    }

    /// Returns the bytes with the version and the two high variant bits cleared.
    fn raw_data(&self, uuid: &Uuid) -> [u8; 16] {
        masked(uuid.as_bytes(), &RAW_MASK)
    }

    /// Returns the mask of bits addressable by [`raw_data()`](Components::raw_data).
    fn raw_data_mask(&self) -> [u8; 16] {
        RAW_MASK
    }

    /// Overwrites the raw data, keeping the current version and variant bits.
    fn set_raw_data(&self, uuid: &mut Uuid, data: &[u8; 16]) {
        merge(uuid.bytes_mut(), data, &RAW_MASK);
    }

    /// Reads the timestamp in ticks since the Unix epoch.
    fn timestamp(&self, _uuid: &Uuid) -> Result<i64> {
        Err(Error::NotSupported("timestamp"))
    }

    /// Writes the timestamp given in ticks since the Unix epoch.
    fn set_timestamp(&self, _uuid: &mut Uuid, _ticks: i64) -> Result<()> {
        Err(Error::NotSupported("timestamp"))
    }

    fn clock_sequence(&self, _uuid: &Uuid) -> Result<u16> {
        Err(Error::NotSupported("clock sequence"))
    }

    fn set_clock_sequence(&self, _uuid: &mut Uuid, _value: u16) -> Result<()> {
        Err(Error::NotSupported("clock sequence"))
    }

    fn node_id(&self, _uuid: &Uuid) -> Result<[u8; 6]> {
        Err(Error::NotSupported("node id"))
    }

    fn set_node_id(&self, _uuid: &mut Uuid, _node_id: [u8; 6]) -> Result<()> {
        Err(Error::NotSupported("node id"))
    }

    fn domain(&self, _uuid: &Uuid) -> Result<DceSecurityDomain> {
        Err(Error::NotSupported("DCE Security domain"))
    }

    fn set_domain(&self, _uuid: &mut Uuid, _domain: DceSecurityDomain) -> Result<()> {
        Err(Error::NotSupported("DCE Security domain"))
    }

    fn local_id(&self, _uuid: &Uuid) -> Result<u32> {
        Err(Error::NotSupported("local id"))
    }

    fn set_local_id(&self, _uuid: &mut Uuid, _local_id: u32) -> Result<()> {
        Err(Error::NotSupported("local id"))
    }

    fn hash_data(&self, _uuid: &Uuid) -> Result<[u8; 16]> {
        Err(Error::NotSupported("hash data"))
    }

    fn hash_data_mask(&self) -> Result<[u8; 16]> {
        Err(Error::NotSupported("hash data"))
    }

    fn set_hash_data(&self, _uuid: &mut Uuid, _data: &[u8; 16]) -> Result<()> {
        Err(Error::NotSupported("hash data"))
    }

    fn random_data(&self, _uuid: &Uuid) -> Result<[u8; 16]> {
        Err(Error::NotSupported("random data"))
    }

    fn random_data_mask(&self) -> Result<[u8; 16]> {
        Err(Error::NotSupported("random data"))
    }

    fn set_random_data(&self, _uuid: &mut Uuid, _data: &[u8; 16]) -> Result<()> {
        Err(Error::NotSupported("random data"))
    }

    fn custom_data(&self, _uuid: &Uuid) -> Result<[u8; 16]> {
        Err(Error::NotSupported("custom data"))
    }

    fn custom_data_mask(&self) -> Result<[u8; 16]> {
        Err(Error::NotSupported("custom data"))
    }

    fn set_custom_data(&self, _uuid: &mut Uuid, _data: &[u8; 16]) -> Result<()> {
        Err(Error::NotSupported("custom data"))
    }
}

/// Returns the component strategy for `version`.
pub fn of_version(version: Version) -> &'static dyn Components {
    match version.get() {
        1 => &Gregorian::V1,
        2 => &DceSecurity,
        3 | 5 => &NameBased,
        4 => &Random,
        6 => &Gregorian::V6,
        7 => &UnixTime,
        8 => &Custom,
        _ => &Common,
    }
}

fn masked(bytes: &[u8; 16], mask: &[u8; 16]) -> [u8; 16] {
    core::array::from_fn(|i| bytes[i] & mask[i])
}

fn merge(bytes: &mut [u8; 16], data: &[u8; 16], mask: &[u8; 16]) {
    for i in 0..16 {
        bytes[i] = (bytes[i] & !mask[i]) | (data[i] & mask[i]);
    }
}

/// Converts ticks into a field value counted in `unit` ticks from `epoch`, bounded by `max`.
fn to_field(ticks: i64, epoch: i64, unit: i64, max: i64) -> Result<u64> {
    match ticks.checked_sub(epoch).map(|d| d.div_euclid(unit)) {
        Some(value) if (0..=max).contains(&value) => Ok(value as u64),
        _ => Err(Error::out_of_range(
            "timestamp",
            timestamp::display(epoch),
            timestamp::display(epoch + max * unit + (unit - 1)),
        )),
    }
}

fn check_width(name: &'static str, value: u16, bits: u32) -> Result<()> {
    let max = (1u16 << bits) - 1;
    if value > max {
        Err(Error::out_of_range(name, 0, max))
    } else {
        Ok(())
    }
}

/// Nil, Max and unknown versions: only the common operations.
struct Common;

impl Components for Common {}

/// Versions 1 and 6: 60-bit Gregorian timestamp, 14-bit clock sequence and 48-bit node id.
enum Gregorian {
    V1,
    V6,
}

impl Components for Gregorian {
    fn timestamp(&self, uuid: &Uuid) -> Result<i64> {
        let bytes = uuid.as_bytes();
        let (low, mid, hi) = (
            bytes.time_low() as i64,
            bytes.time_mid() as i64,
            (bytes.time_hi_and_version() & 0x0fff) as i64,
        );
        let value = match self {
            Self::V1 => (hi << 48) | (mid << 32) | low,
            Self::V6 => (low << 28) | (mid << 12) | hi,
        };
        Ok(GREGORIAN_EPOCH + value)
    }

    fn set_timestamp(&self, uuid: &mut Uuid, ticks: i64) -> Result<()> {
        let value = to_field(ticks, GREGORIAN_EPOCH, 1, MAX_GREGORIAN)?;
        let bytes = uuid.bytes_mut();
        match self {
            Self::V1 => {
                bytes.set_time_low(value as u32);
                bytes.set_time_mid((value >> 32) as u16);
                bytes.set_time_hi_and_version((value >> 48) as u16, 0x0fff);
            }
            Self::V6 => {
                bytes.set_time_low((value >> 28) as u32);
                bytes.set_time_mid((value >> 12) as u16);
                bytes.set_time_hi_and_version(value as u16, 0x0fff);
            }
        }
        Ok(())
    }

    fn clock_sequence(&self, uuid: &Uuid) -> Result<u16> {
        let bytes = uuid.as_bytes();
        Ok((((bytes.clk_seq_hi_var() & 0x3f) as u16) << 8) | bytes.clk_seq_low() as u16)
    }

    fn set_clock_sequence(&self, uuid: &mut Uuid, value: u16) -> Result<()> {
        check_width("clock sequence", value, 14)?;
        let bytes = uuid.bytes_mut();
        bytes.set_clk_seq_hi_var((value >> 8) as u8, 0x3f);
        bytes.set_clk_seq_low(value as u8);
        Ok(())
    }

    fn node_id(&self, uuid: &Uuid) -> Result<[u8; 6]> {
        Ok(uuid.as_bytes().node())
    }

    fn set_node_id(&self, uuid: &mut Uuid, node_id: [u8; 6]) -> Result<()> {
        uuid.bytes_mut().set_node(node_id);
        Ok(())
    }
}

/// Version 2: version 1 with `time_low` replaced by a local id and `clk_seq_low` by a domain.
struct DceSecurity;

impl Components for DceSecurity {
    fn timestamp(&self, uuid: &Uuid) -> Result<i64> {
        let bytes = uuid.as_bytes();
        let value = (((bytes.time_hi_and_version() & 0x0fff) as i64) << 48)
            | ((bytes.time_mid() as i64) << 32);
        Ok(GREGORIAN_EPOCH + value)
    }

    /// Writes bits 32 to 59 of the Gregorian timestamp; the low 32 bits are dropped.
    fn set_timestamp(&self, uuid: &mut Uuid, ticks: i64) -> Result<()> {
        let value = to_field(ticks, GREGORIAN_EPOCH, 1, MAX_GREGORIAN)?;
        let bytes = uuid.bytes_mut();
        bytes.set_time_mid((value >> 32) as u16);
        bytes.set_time_hi_and_version((value >> 48) as u16, 0x0fff);
        Ok(())
    }

    fn clock_sequence(&self, uuid: &Uuid) -> Result<u16> {
        Ok((uuid.as_bytes().clk_seq_hi_var() & 0x3f) as u16)
    }

    fn set_clock_sequence(&self, uuid: &mut Uuid, value: u16) -> Result<()> {
        check_width("clock sequence", value, 6)?;
        uuid.bytes_mut().set_clk_seq_hi_var(value as u8, 0x3f);
        Ok(())
    }

    fn node_id(&self, uuid: &Uuid) -> Result<[u8; 6]> {
        Ok(uuid.as_bytes().node())
    }

    fn set_node_id(&self, uuid: &mut Uuid, node_id: [u8; 6]) -> Result<()> {
        uuid.bytes_mut().set_node(node_id);
        Ok(())
    }

    fn domain(&self, uuid: &Uuid) -> Result<DceSecurityDomain> {
        Ok(DceSecurityDomain(uuid.as_bytes().clk_seq_low()))
    }

    fn set_domain(&self, uuid: &mut Uuid, domain: DceSecurityDomain) -> Result<()> {
        uuid.bytes_mut().set_clk_seq_low(domain.0);
        Ok(())
    }

    fn local_id(&self, uuid: &Uuid) -> Result<u32> {
        Ok(uuid.as_bytes().time_low())
    }

    fn set_local_id(&self, uuid: &mut Uuid, local_id: u32) -> Result<()> {
        uuid.bytes_mut().set_time_low(local_id);
        Ok(())
    }
}

/// Versions 3 and 5: truncated name hash.
struct NameBased;

impl Components for NameBased {
    fn hash_data(&self, uuid: &Uuid) -> Result<[u8; 16]> {
        Ok(self.raw_data(uuid))
    }

    fn hash_data_mask(&self) -> Result<[u8; 16]> {
        Ok(RAW_MASK)
    }

    fn set_hash_data(&self, uuid: &mut Uuid, data: &[u8; 16]) -> Result<()> {
        self.set_raw_data(uuid, data);
        Ok(())
    }
}

/// Version 4: every payload bit is random.
struct Random;

impl Components for Random {
    fn random_data(&self, uuid: &Uuid) -> Result<[u8; 16]> {
        Ok(self.raw_data(uuid))
    }

    fn random_data_mask(&self) -> Result<[u8; 16]> {
        Ok(RAW_MASK)
    }

    fn set_random_data(&self, uuid: &mut Uuid, data: &[u8; 16]) -> Result<()> {
        self.set_raw_data(uuid, data);
        Ok(())
    }
}

/// Version 7: 48-bit Unix milliseconds followed by random (or counter) bits.
struct UnixTime;

impl Components for UnixTime {
    fn timestamp(&self, uuid: &Uuid) -> Result<i64> {
        let bytes = uuid.as_bytes();
        let ms = ((bytes.time_low() as i64) << 16) | bytes.time_mid() as i64;
        Ok(UNIX_EPOCH_TICKS + ms * TICKS_PER_MILLISECOND)
    }

    fn set_timestamp(&self, uuid: &mut Uuid, ticks: i64) -> Result<()> {
        let ms = to_field(ticks, UNIX_EPOCH_TICKS, TICKS_PER_MILLISECOND, MAX_UNIX_MS)?;
        let bytes = uuid.bytes_mut();
        bytes.set_time_low((ms >> 16) as u32);
        bytes.set_time_mid(ms as u16);
        Ok(())
    }

    fn random_data(&self, uuid: &Uuid) -> Result<[u8; 16]> {
        Ok(masked(uuid.as_bytes(), &V7_RANDOM_MASK))
    }

    fn random_data_mask(&self) -> Result<[u8; 16]> {
        Ok(V7_RANDOM_MASK)
    }

    fn set_random_data(&self, uuid: &mut Uuid, data: &[u8; 16]) -> Result<()> {
        merge(uuid.bytes_mut(), data, &V7_RANDOM_MASK);
        Ok(())
    }
}

/// Version 8: the whole payload is implementation-defined.
struct Custom;

impl Components for Custom {
    fn custom_data(&self, uuid: &Uuid) -> Result<[u8; 16]> {
        Ok(self.raw_data(uuid))
    }

    fn custom_data_mask(&self) -> Result<[u8; 16]> {
        Ok(RAW_MASK)
    }

    fn set_custom_data(&self, uuid: &mut Uuid, data: &[u8; 16]) -> Result<()> {
        self.set_raw_data(uuid, data);
        Ok(())
    }
}
