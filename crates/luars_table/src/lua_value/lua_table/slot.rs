// Bucket chains: singly linked slots, live entries and tombstones
use crate::lua_value::LuaValue;

use super::entry::{DeadKey, Entry};

pub enum SlotKind {
    Live(Entry),
    /// Removed entry. Kept in place so `next` can still continue from its key.
    Dead(DeadKey),
}

pub struct Slot {
    pub(super) kind: SlotKind,
    pub(super) next: Option<Box<Slot>>,
}

pub(super) type Bucket = Option<Box<Slot>>;

impl Slot {
    pub fn new(entry: Entry) -> Box<Slot> {
        Box::new(Slot {
            kind: SlotKind::Live(entry),
            next: None,
        })
    }

    /// Key match for live entries and tombstones alike
    #[inline]
    pub fn keyeq(&self, key: &LuaValue) -> bool {
        match &self.kind {
            SlotKind::Live(entry) => entry.keyeq(key),
            SlotKind::Dead(dead) => dead.keyeq(key),
        }
    }

    /// The live entry at this slot, if any
    #[inline]
    pub fn entry(&self) -> Option<&Entry> {
        match &self.kind {
            SlotKind::Live(entry) => Some(entry),
            SlotKind::Dead(_) => None,
        }
    }

    /// Key/value pair visible to lookups and enumeration
    #[inline]
    pub fn live_pair(&self) -> Option<(LuaValue, LuaValue)> {
        self.entry().and_then(Entry::pair)
    }

    #[inline(always)]
    pub fn is_tombstone(&self) -> bool {
        matches!(self.kind, SlotKind::Dead(_))
    }
}

pub struct ChainIter<'a> {
    cur: Option<&'a Slot>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Slot;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cur?;
        self.cur = slot.next.as_deref();
        Some(slot)
    }
}

#[inline]
pub(super) fn chain(bucket: &Bucket) -> ChainIter<'_> {
    ChainIter {
        cur: bucket.as_deref(),
    }
}

/// First slot (live or tombstone) whose key matches
pub(super) fn find_mut<'a>(bucket: &'a mut Bucket, key: &LuaValue) -> Option<&'a mut Slot> {
    let mut cur = bucket.as_deref_mut();
    while let Some(slot) = cur {
        if slot.keyeq(key) {
            return Some(slot);
        }
        cur = slot.next.as_deref_mut();
    }
    None
}

pub(super) fn push_back(bucket: &mut Bucket, slot: Box<Slot>) {
    let mut tail = bucket;
    while let Some(node) = tail {
        tail = &mut node.next;
    }
    *tail = Some(slot);
}

/// Prepend, used when relinking during a rehash
#[inline]
pub(super) fn push_front(bucket: &mut Bucket, mut slot: Box<Slot>) {
    slot.next = bucket.take();
    *bucket = Some(slot);
}

/// Drop tombstones and entries that lost their key or value.
///
/// Returns how many counted (non-tombstone) entries were removed.
pub(super) fn prune(bucket: &mut Bucket) -> usize {
    let mut rest = bucket.take();
    let mut removed = 0;
    let mut tail = bucket;
    while let Some(mut slot) = rest {
        rest = slot.next.take();
        let keep = match &slot.kind {
            SlotKind::Dead(_) => false,
            SlotKind::Live(entry) => {
                let alive = entry.is_alive();
                if !alive {
                    removed += 1;
                }
                alive
            }
        };
        if keep {
            tail = &mut tail.insert(slot).next;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TablePtr;
    use crate::lua_value::lua_table::weak_policy::WeakPolicy;

    fn bucket_of(keys: &[i64]) -> Bucket {
        let mut bucket = None;
        for &k in keys {
            push_back(&mut bucket, Slot::new(Entry::new(LuaValue::Integer(k), LuaValue::Integer(k * 10))));
        }
        bucket
    }

    fn ints(keys: &[i64]) -> Vec<LuaValue> {
        keys.iter().map(|&k| LuaValue::Integer(k)).collect()
    }

    fn keys(bucket: &Bucket) -> Vec<LuaValue> {
        chain(bucket).filter_map(|s| s.live_pair()).map(|(k, _)| k).collect()
    }

    #[test]
    fn test_push_back_keeps_order() {
        let bucket = bucket_of(&[1, 2, 3]);
        assert_eq!(keys(&bucket), ints(&[1, 2, 3]));
    }

    #[test]
    fn test_tombstone_keeps_chain_walkable() {
        let mut bucket = bucket_of(&[1, 2, 3]);
        let slot = find_mut(&mut bucket, &LuaValue::Integer(2)).unwrap();
        slot.kind = SlotKind::Dead(DeadKey::new(LuaValue::Integer(2)));

        assert_eq!(chain(&bucket).count(), 3);
        assert_eq!(keys(&bucket), ints(&[1, 3]));
        assert!(chain(&bucket).any(|s| s.is_tombstone() && s.keyeq(&LuaValue::Integer(2))));

        assert_eq!(prune(&mut bucket), 0);
        assert_eq!(chain(&bucket).count(), 2);
        assert_eq!(keys(&bucket), ints(&[1, 3]));
    }

    #[test]
    fn test_prune_drops_collected_entries() {
        let keep = TablePtr::new();
        let lose = TablePtr::new();
        let mut bucket = None;
        let policy = WeakPolicy::WeakKeys;
        push_back(&mut bucket, Slot::new(policy.entry(keep.clone().into(), LuaValue::Integer(1))));
        push_back(&mut bucket, Slot::new(policy.entry(lose.clone().into(), LuaValue::Integer(2))));
        drop(lose);

        assert_eq!(prune(&mut bucket), 1);
        assert_eq!(keys(&bucket), vec![LuaValue::Table(keep)]);
    }
}
