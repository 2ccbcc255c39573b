//! Two-bit list generations.
//!
//! Every entry added to the remote list carries `tag * 4 + generation` as
//! its reference id. Each successful start makes the generation it stamped
//! the readable one and moves on to the next, so replies still in flight
//! from an earlier start fall out of the filter.

use crate::item::Tag;

const GENERATIONS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generations {
    write: u8,
    read: u8,
}

impl Default for Generations {
    fn default() -> Self {
        // Read starts at 3: before the first start only generation-3 ids
        // pass, and this list issues none until its fourth start.
        Self { write: 0, read: 3 }
    }
}

impl Generations {
    /// Generation stamped onto entries added by the next start.
    pub fn write(&self) -> u8 {
        self.write
    }

    /// Generation accepted from the service.
    pub fn read(&self) -> u8 {
        self.read
    }

    /// Reference id for an entry added by the next start.
    pub fn add_ref(&self, tag: Tag) -> u64 {
        reference(tag, self.write)
    }

    /// Reference id of an entry of the active generation.
    pub fn active_ref(&self, tag: Tag) -> u64 {
        reference(tag, self.read)
    }

    /// Commit a successful start.
    pub fn advance(&mut self) {
        self.read = self.write;
        self.write = (self.write + 1) % GENERATIONS;
    }

    /// Tag of `ref_id` if it belongs to the readable generation.
    pub fn accept(&self, ref_id: u64) -> Option<Tag> {
        if ref_id % u64::from(GENERATIONS) != u64::from(self.read) {
            return None;
        }
        Tag::try_from(ref_id / u64::from(GENERATIONS)).ok()
    }
}

fn reference(tag: Tag, generation: u8) -> u64 {
    u64::from(tag) * u64::from(GENERATIONS) + u64::from(generation)
}
