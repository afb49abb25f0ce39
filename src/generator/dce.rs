use std::sync::{Arc, OnceLock};

use super::{stamp, Generator, TimeBasedGenerator};
use crate::components;
use crate::local_id::{LocalIdSource, SystemLocalIds};
use crate::node_id::{NodeIdProvider, NodeIdSource, PhysicalAddress};
use crate::state::GeneratorState;
use crate::{DceSecurityDomain, Result, Uuid, Variant, Version};

/// Generates DCE Security (version 2) UUIDs.
///
/// A version 2 UUID is a version 1 UUID whose `time_low` field holds a local id and whose
/// `clk_seq_low` field holds the [`DceSecurityDomain`]. Only the upper six bits of the clock
/// sequence survive, so the timestamp resolution is about seven minutes.
pub struct DceSecurityGenerator {
    base: TimeBasedGenerator,
    local_ids: Arc<dyn LocalIdSource>,
}

impl DceSecurityGenerator {
    pub fn new(
        node_source: NodeIdSource,
        state: Arc<GeneratorState>,
        local_ids: Arc<dyn LocalIdSource>,
    ) -> Result<Self> {
        Ok(Self {
            base: TimeBasedGenerator::new(Version::V1, node_source, state)?,
            local_ids,
        })
    }

    /// Returns the process-wide generator using the MAC address and the ids of the current
    /// process.
    pub fn shared() -> &'static Self {
        static G: OnceLock<DceSecurityGenerator> = OnceLock::new();
        G.get_or_init(|| {
            let node_ids = NodeIdProvider::Physical(PhysicalAddress::system());
            Self {
                base: TimeBasedGenerator::with_global_state(Version::V1, node_ids),
                local_ids: Arc::new(SystemLocalIds),
            }
        })
    }

    fn local_id(&self, domain: DceSecurityDomain, local_id: Option<u32>) -> Result<u32> {
        match (local_id, domain) {
            (Some(id), _) => Ok(id),
            (None, DceSecurityDomain::PERSON) => self.local_ids.user_id(),
            (None, DceSecurityDomain::GROUP) => self.local_ids.group_id(),
            (None, _) => Ok(0),
        }
    }
}

impl Generator for DceSecurityGenerator {
    fn version(&self) -> Version {
        Version::V2
    }

    /// Generates a UUID in the [`PERSON`](DceSecurityDomain::PERSON) domain with the current
    /// user id.
    fn new_uuid(&self) -> Result<Uuid> {
        self.new_uuid_dce(DceSecurityDomain::PERSON, None)
    }

    fn new_uuid_dce(&self, domain: DceSecurityDomain, local_id: Option<u32>) -> Result<Uuid> {
        let local_id = self.local_id(domain, local_id)?;
        let (ts, sequence, node_id) = self.base.next_fields();
        let c = components::of_version(Version::V2);
        let mut uuid = Uuid::NIL;
        c.set_timestamp(&mut uuid, ts)?;
        c.set_clock_sequence(&mut uuid, (sequence >> 8) & 0x3f)?;
        c.set_node_id(&mut uuid, node_id)?;
        c.set_domain(&mut uuid, domain)?;
        c.set_local_id(&mut uuid, local_id)?;
        stamp(&mut uuid, Version::V2, Variant::Rfc4122);
        Ok(uuid)
    }
}
