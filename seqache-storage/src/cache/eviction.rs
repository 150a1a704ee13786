//! Whole-group capacity enforcement.
//!
//! Eviction is all-or-nothing: when a group is full the entire bucket is
//! dropped before the next insert. The count-then-delete sequence is not
//! atomic, so concurrent writers can overshoot the bound by the number of
//! writers racing on the same group.

use seqache_core::SeqacheResult;

use super::keys::GroupKey;
use super::traits::StoreAdapter;

/// What [`enforce_capacity`] did to the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Room left; the group was untouched.
    Retained { count: u64 },
    /// The group was full and has been deleted.
    Evicted { count: u64 },
}

impl Eviction {
    pub fn is_evicted(&self) -> bool {
        matches!(self, Eviction::Evicted { .. })
    }
}

/// Make room for one more field in `group`.
///
/// Must run immediately before every insert. A group holding
/// `max_group_size` or more fields is deleted, so after the insert the
/// group never holds more than `max_group_size` fields.
pub async fn enforce_capacity<S>(
    store: &S,
    group: &GroupKey,
    max_group_size: u64,
) -> SeqacheResult<Eviction>
where
    S: StoreAdapter + ?Sized,
{
    let count = store.count_fields(group).await?;
    if count >= max_group_size {
        store.delete_group(group).await?;
        Ok(Eviction::Evicted { count })
    } else {
        Ok(Eviction::Retained { count })
    }
}
