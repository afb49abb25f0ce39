//! Generators for every RFC 4122 / RFC 9562 UUID version
//!
//! ```rust
//! use guidgen::{new_uuid, Uuid, Version};
//!
//! let uuid = new_uuid(Version::V7)?;
//! println!("{}", uuid); // e.g. "01809424-3e59-7c05-9219-566f82fff672"
//! println!("{:?}", uuid.as_bytes()); // as 16-byte big-endian array
//! println!("{}", uuid.urn()); // "urn:uuid:01809424-..."
//!
//! let parsed: Uuid = "6ba7b810-9dad-11d1-80b4-00c04fd430c8".parse()?;
//! assert_eq!(parsed, Uuid::NAMESPACE_DNS);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! See [RFC 9562](https://www.rfc-editor.org/rfc/rfc9562).
//!
//! # Field and bit layout
//!
//! Every UUID shares the following frame; what the payload fields mean depends on the
//! version:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           payload                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            payload            |  ver  |       payload         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |var|                         payload                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           payload                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! - Versions 1 and 6 carry a 60-bit count of 100-nanosecond intervals since
//!   1582-10-15, a 14-bit clock sequence and a 48-bit node id. Version 6 stores the
//!   timestamp most significant bits first so that the UUIDs sort by time.
//! - Version 2 replaces the low 32 timestamp bits with a local id and the low clock
//!   sequence byte with a domain.
//! - Versions 3 and 5 carry the truncated MD5 and SHA-1 hash of a namespace ID and a
//!   name; version 8 name-based UUIDs use a SHA-2, SHA-3 or SHAKE hash keyed by a hashspace ID.
//! - Version 4 is entirely random.
//! - Version 7 carries the 48-bit Unix timestamp in milliseconds, a 12-bit
//!   sub-millisecond fraction and a 14-bit counter that keep UUIDs monotonic, followed
//!   by 48 random bits.
//! - The `var` field is a unary prefix: `0` (NCS), `10` (RFC 4122), `110`
//!   (Microsoft) or `111` (reserved).
//!
//! Field access for any UUID goes through [`Uuid::components()`]; generation goes
//! through the [`generator`] module.
//!
//! # Clock sequence persistence
//!
//! Versions 1, 2 and 6 keep their clock sequence in a [`GeneratorState`]. Giving the state a
//! file path keeps the guarantee against duplicates across process restarts:
//!
//! ```rust,no_run
//! use guidgen::GeneratorState;
//! use std::path::Path;
//!
//! GeneratorState::global().set_storage_path(Some(Path::new("/var/lib/myapp/uuid.state")));
//! ```

pub mod components;
pub mod generator;
pub mod hashing;
pub mod local_id;
pub mod node_id;
pub mod state;
pub mod storage;
pub mod timestamp;

mod cache;
mod counter;
mod error;
mod fields;
mod random;
mod uuid;
mod version;

pub use error::{Error, Result, StorageError, StorageErrorKind};
pub use generator::{new_uuid, Generator};
pub use hashing::HashAlgorithm;
pub use node_id::NodeIdSource;
pub use state::GeneratorState;
pub use uuid::{ParseError, Uuid};
pub use version::{DceSecurityDomain, Variant, Version};
