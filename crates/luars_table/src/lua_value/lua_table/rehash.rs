// Rehash: choose new region sizes from an integer-key histogram and migrate
use crate::lua_value::LuaValue;
use crate::lua_vm::lua_limits::{MAXABITS, MAXASIZE, MIN_HASH_CAPACITY};

use super::slot::{self, Slot, SlotKind};
use super::{LuaTable, empty_array, empty_buckets};

/// Why the table is being rehashed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RehashCause {
    /// An integer key in `1..=MAXASIZE` is about to be inserted
    IntKey(usize),
    /// Some other key is about to be inserted into the hash region
    HashKey,
    /// The weak-mode policy changed; no key is pending
    ModeChange,
}

/// ceil(log2(x)) for x >= 1
#[inline]
pub(super) fn ceil_log2(x: usize) -> usize {
    if x <= 1 {
        0
    } else {
        (usize::BITS - (x - 1).leading_zeros()) as usize
    }
}

/// Largest power of two `n` such that more than half of `1..=n` would be in use.
///
/// `nums[b]` counts integer keys `k` with `ceil_log2(k) == b`, `total` is their sum.
pub(super) fn compute_array_size(nums: &[usize; MAXABITS + 1], total: usize) -> usize {
    let mut keys = nums[0];
    let mut size = 0;
    for log in 1..=MAXABITS {
        keys += nums[log];
        if total * 2 < 1 << log {
            // not enough integer keys
            break;
        }
        if keys >= 1 << (log - 1) {
            size = 1 << log;
        }
    }
    size
}

/// Hash region capacity for `entries` live entries: 0, or a power of two of at least 2
#[inline]
pub(super) fn hash_capacity_for(entries: usize) -> usize {
    if entries == 0 {
        0
    } else {
        entries.max(MIN_HASH_CAPACITY).next_power_of_two()
    }
}

impl LuaTable {
    /// Histogram of live integer keys in both regions
    fn count_int_keys(&self, nums: &mut [usize; MAXABITS + 1]) -> usize {
        let mut total = 0;
        for (i, stored) in self.array.iter().enumerate() {
            if self.weak_policy.array_get(stored).is_some() {
                nums[ceil_log2(i + 1)] += 1;
                total += 1;
            }
        }
        for bucket in &self.hash {
            for entry in slot::chain(bucket).filter_map(Slot::entry) {
                if !entry.is_alive() {
                    continue;
                }
                if let Some(k) = entry.array_key(MAXASIZE as usize) {
                    nums[ceil_log2(k)] += 1;
                    total += 1;
                }
            }
        }
        total
    }

    pub(super) fn rehash(&mut self, cause: RehashCause) {
        let mut nums = [0usize; MAXABITS + 1];
        let mut total = self.count_int_keys(&mut nums);
        if let RehashCause::IntKey(k) = cause {
            nums[ceil_log2(k)] += 1;
            total += 1;
        }
        let array_size = compute_array_size(&nums, total);

        // entries that will not fit in the new array region
        let mut hash_entries = self
            .array
            .iter()
            .skip(array_size)
            .filter(|stored| self.weak_policy.array_get(stored).is_some())
            .count();
        for bucket in &self.hash {
            hash_entries += slot::chain(bucket)
                .filter_map(Slot::entry)
                .filter(|entry| entry.is_alive() && entry.array_key(array_size).is_none())
                .count();
        }
        match cause {
            RehashCause::IntKey(k) if k > array_size => hash_entries += 1,
            RehashCause::HashKey => hash_entries += 1,
            _ => {}
        }

        log::debug!(
            "rehash ({:?}): array {} -> {}, hash {} -> {}",
            cause,
            self.array.len(),
            array_size,
            self.hash.len(),
            hash_capacity_for(hash_entries)
        );
        self.resize(
            array_size,
            hash_capacity_for(hash_entries),
            cause == RehashCause::ModeChange,
        );
    }

    /// Replace both regions, moving every live pair to its new home.
    ///
    /// Tombstones and collected entries are dropped. With `rebuild`, hash
    /// entries are reconstructed under the current weak policy.
    pub(super) fn resize(&mut self, array_size: usize, hash_capacity: usize, rebuild: bool) {
        let policy = self.weak_policy;
        let old_array = std::mem::replace(&mut self.array, empty_array(array_size));
        let old_hash = std::mem::replace(&mut self.hash, empty_buckets(hash_capacity));
        let mask = hash_capacity.saturating_sub(1);
        let mut count = 0;

        for (i, stored) in old_array.into_iter().enumerate() {
            let Some(value) = policy.array_get(&stored) else {
                continue;
            };
            if i < array_size {
                self.array[i] = Some(policy.wrap(value));
            } else {
                let entry = policy.entry(LuaValue::Integer(i as i64 + 1), value);
                let idx = entry.bucket_index(mask);
                slot::push_front(&mut self.hash[idx], Slot::new(entry));
                count += 1;
            }
        }

        for bucket in old_hash {
            let mut rest = bucket;
            while let Some(mut node) = rest {
                rest = node.next.take();
                let SlotKind::Live(entry) = node.kind else {
                    continue;
                };
                if !entry.is_alive() {
                    continue;
                }
                if let Some(k) = entry.array_key(array_size) {
                    self.array[k - 1] = entry.value().map(|v| policy.wrap(v));
                    continue;
                }
                let entry = match entry.pair() {
                    Some((key, value)) if rebuild => policy.entry(key, value),
                    _ => entry,
                };
                let idx = entry.bucket_index(mask);
                slot::push_front(&mut self.hash[idx], Slot::new(entry));
                count += 1;
            }
        }

        self.hash_count = count;
    }
}
