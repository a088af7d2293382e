// LuaTable - hybrid array/hash storage
mod border;
mod entry;
mod iter;
mod rehash;
mod slot;
mod sort;
mod table_ptr;
mod weak_policy;

pub use entry::{DeadKey, Entry};
pub use sort::heap_sort;
pub use table_ptr::TablePtr;
pub use weak_policy::{StoredValue, WeakPolicy};

use crate::LuaResult;
use crate::lua_value::LuaValue;
use crate::lua_value::lua_value::float_to_integer;
use crate::lua_vm::lua_limits::{MAXASIZE, MIN_HASH_CAPACITY};
use rehash::RehashCause;
use slot::{Bucket, Slot, SlotKind};

/// Lua table storage.
///
/// Integer keys `1..=array.len()` always live in the array region; every
/// other key lives in the chained hash region. Both regions have a capacity
/// of zero or a power of two.
pub struct LuaTable {
    array: Vec<Option<StoredValue>>,
    hash: Vec<Bucket>,
    /// Live entries chained in `hash` (tombstones excluded)
    hash_count: usize,
    metatable: Option<TablePtr>,
    weak_policy: WeakPolicy,
}

impl Default for LuaTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaTable {
    pub fn new() -> Self {
        Self {
            array: Vec::new(),
            hash: Vec::new(),
            hash_count: 0,
            metatable: None,
            weak_policy: WeakPolicy::Strong,
        }
    }

    /// 预分配: both hints are rounded up to powers of two
    pub fn with_capacity(narray: usize, nhash: usize) -> Self {
        let mut table = Self::new();
        if narray > 0 {
            table.array = empty_array(narray.next_power_of_two());
        }
        if nhash > 0 {
            table.hash = empty_buckets(nhash.max(MIN_HASH_CAPACITY).next_power_of_two());
        }
        table
    }

    /// Table constructor: positional values take keys `1..=n`, then the
    /// named pairs are stored. Nil values are skipped.
    pub fn from_parts(named: Vec<(LuaValue, LuaValue)>, positional: Vec<LuaValue>) -> LuaResult<Self> {
        let nhash = named.iter().filter(|(_, v)| !v.is_nil()).count();
        let mut table = Self::with_capacity(positional.len(), nhash);
        for (i, value) in positional.into_iter().enumerate() {
            if !value.is_nil() {
                table.set_int(i as i64 + 1, value);
            }
        }
        for (key, value) in named {
            if !value.is_nil() {
                table.raw_set(key, value)?;
            }
        }
        Ok(table)
    }

    /// `table.pack` shape: values at `1..=n` plus the count under `"n"`
    pub fn from_varargs(values: Vec<LuaValue>) -> Self {
        let n = values.len();
        let mut table = Self::with_capacity(n, 1);
        for (i, value) in values.into_iter().enumerate() {
            if !value.is_nil() {
                table.set_int(i as i64 + 1, value);
            }
        }
        table.hash_set(LuaValue::string("n"), LuaValue::Integer(n as i64));
        table
    }

    /// Grow the array region to hold at least `narray` slots
    pub fn presize_array(&mut self, narray: usize) {
        if narray > self.array.len() {
            let hash_capacity = self.hash.len();
            self.resize(narray.next_power_of_two(), hash_capacity, false);
        }
    }

    // ============ Introspection ============

    #[inline(always)]
    pub fn array_capacity(&self) -> usize {
        self.array.len()
    }

    #[inline(always)]
    pub fn hash_capacity(&self) -> usize {
        self.hash.len()
    }

    #[inline(always)]
    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    #[inline(always)]
    pub fn weak_policy(&self) -> WeakPolicy {
        self.weak_policy
    }

    #[inline(always)]
    pub fn has_metatable(&self) -> bool {
        self.metatable.is_some()
    }

    pub fn get_metatable(&self) -> Option<TablePtr> {
        self.metatable.clone()
    }

    /// Attach `metatable` and switch to `policy`. Changing the policy rewraps
    /// every stored key and value.
    pub(crate) fn attach_metatable(&mut self, metatable: Option<TablePtr>, policy: WeakPolicy) {
        self.metatable = metatable;
        if policy != self.weak_policy {
            log::trace!("weak mode changed: {:?} -> {:?}", self.weak_policy, policy);
            self.weak_policy = policy;
            self.rehash(RehashCause::ModeChange);
        }
    }

    // ============ Raw access ============

    #[inline(always)]
    fn array_index(&self, key: i64) -> Option<usize> {
        if key >= 1 && (key as u64) <= self.array.len() as u64 {
            Some(key as usize - 1)
        } else {
            None
        }
    }

    pub fn raw_get(&self, key: &LuaValue) -> Option<LuaValue> {
        match key {
            LuaValue::Nil => None,
            LuaValue::Integer(i) => self.get_int(*i),
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => self.get_int(i),
                None => self.hash_get(key),
            },
            _ => self.hash_get(key),
        }
    }

    #[inline]
    pub fn get_int(&self, key: i64) -> Option<LuaValue> {
        match self.array_index(key) {
            Some(idx) => self.weak_policy.array_get(&self.array[idx]),
            None => self.hash_get(&LuaValue::Integer(key)),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<LuaValue> {
        self.hash_get(&LuaValue::string(key))
    }

    /// Store `value` under `key`; a nil value removes the key.
    /// Nil and NaN keys are rejected before anything is touched.
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        let key = key.normalize_key();
        key.check_key()?;
        match key {
            LuaValue::Integer(i) => self.set_int(i, value),
            key => self.hash_set(key, value),
        }
        Ok(())
    }

    pub fn set_int(&mut self, key: i64, value: LuaValue) {
        match self.array_index(key) {
            Some(idx) => {
                self.array[idx] = if value.is_nil() {
                    None
                } else {
                    Some(self.weak_policy.wrap(value))
                };
            }
            None => self.hash_set(LuaValue::Integer(key), value),
        }
    }

    // ============ Hash region ============

    #[inline]
    fn bucket_of(&self, key: &LuaValue) -> usize {
        key.key_hash().slot(self.hash.len().saturating_sub(1))
    }

    fn hash_get(&self, key: &LuaValue) -> Option<LuaValue> {
        if self.hash_count == 0 {
            return None;
        }
        slot::chain(&self.hash[self.bucket_of(key)])
            .filter_map(Slot::entry)
            .find(|entry| entry.keyeq(key))
            .and_then(Entry::value)
    }

    fn hash_set(&mut self, key: LuaValue, value: LuaValue) {
        if value.is_nil() {
            self.hash_remove(&key);
            return;
        }

        if !self.hash.is_empty() {
            let idx = self.bucket_of(&key);
            let policy = self.weak_policy;
            if let Some(slot) = slot::find_mut(&mut self.hash[idx], &key) {
                if let SlotKind::Live(entry) = &mut slot.kind {
                    entry.replace(value, policy);
                    return;
                }
            }
            // new key: sweep the chain it is about to join
            let removed = slot::prune(&mut self.hash[idx]);
            self.hash_count -= removed;
        }

        if self.hash_count >= self.hash.len() {
            match key {
                LuaValue::Integer(k) if k > 0 && k <= MAXASIZE => {
                    // a rehash might make room in the array region for this key
                    self.rehash(RehashCause::IntKey(k as usize));
                    if let Some(idx) = self.array_index(k) {
                        self.array[idx] = Some(self.weak_policy.wrap(value));
                        return;
                    }
                }
                _ => self.rehash(RehashCause::HashKey),
            }
        }

        if self.hash.is_empty() {
            self.hash = empty_buckets(MIN_HASH_CAPACITY);
        }
        let entry = self.weak_policy.entry(key, value);
        let idx = entry.bucket_index(self.hash.len() - 1);
        slot::push_back(&mut self.hash[idx], Slot::new(entry));
        self.hash_count += 1;
    }

    /// Turn the key's entry into a tombstone; the chain stays intact
    fn hash_remove(&mut self, key: &LuaValue) {
        if self.hash.is_empty() {
            return;
        }
        let idx = self.bucket_of(key);
        if let Some(slot) = slot::find_mut(&mut self.hash[idx], key) {
            if !slot.is_tombstone() {
                slot.kind = SlotKind::Dead(DeadKey::new(key.clone()));
                self.hash_count -= 1;
            }
        }
    }

    // ============ List operations ============

    /// `table.insert`: position 0 appends after the border, otherwise values
    /// from `pos` upward shift up by one until the first hole. The shift
    /// stops at `i64::MAX`; a value pushed past it is dropped.
    pub fn insert(&mut self, pos: i64, value: LuaValue) {
        let pos = if pos == 0 { self.raw_len().checked_add(1) } else { Some(pos) };
        let Some(mut pos) = pos else {
            return;
        };
        let mut value = value;
        while !value.is_nil() {
            let displaced = self.get_int(pos).unwrap_or_default();
            self.set_int(pos, value);
            value = displaced;
            match pos.checked_add(1) {
                Some(next) => pos = next,
                None => break,
            }
        }
    }

    /// `table.remove`: position 0 removes the value at the border.
    /// Returns `None` past the border or when nothing was there.
    pub fn remove(&mut self, pos: i64) -> Option<LuaValue> {
        let n = self.raw_len();
        let mut pos = if pos == 0 {
            n
        } else if pos > n {
            return None;
        } else {
            pos
        };
        let removed = self.get_int(pos)?;
        loop {
            let next = pos.checked_add(1);
            let current = next.and_then(|k| self.get_int(k));
            let shifted = current.is_some();
            self.set_int(pos, current.unwrap_or_default());
            match next {
                Some(k) if shifted => pos = k,
                _ => break,
            }
        }
        Some(removed)
    }
}

fn empty_array(len: usize) -> Vec<Option<StoredValue>> {
    let mut array = Vec::with_capacity(len);
    array.resize_with(len, || None);
    array
}

fn empty_buckets(len: usize) -> Vec<Bucket> {
    let mut hash = Vec::with_capacity(len);
    hash.resize_with(len, || None);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_and_hash_residency() {
        let mut t = LuaTable::new();
        t.raw_set("x".into(), 1.into()).unwrap();
        // a free hash slot takes the integer key without a rehash
        t.raw_set(1.into(), 2.into()).unwrap();
        assert_eq!(t.array_capacity(), 0);
        assert_eq!(t.hash_count(), 2);

        // the next rehash moves it into the array region
        t.raw_set("y".into(), 3.into()).unwrap();
        assert_eq!(t.raw_get(&1.into()), Some(LuaValue::Integer(2)));
        assert_eq!(t.raw_get(&"x".into()), Some(LuaValue::Integer(1)));
        assert_eq!(t.array_capacity(), 2);
        assert_eq!(t.hash_count(), 2);
    }

    #[test]
    fn test_float_key_shares_integer_slot() {
        let mut t = LuaTable::new();
        t.raw_set(LuaValue::Float(3.0), "three".into()).unwrap();
        assert_eq!(t.get_int(3), Some(LuaValue::string("three")));
        t.raw_set(LuaValue::Float(3.5), "half".into()).unwrap();
        assert_eq!(t.raw_get(&LuaValue::Float(3.5)), Some(LuaValue::string("half")));
    }

    #[test]
    fn test_invalid_keys_leave_table_untouched() {
        let mut t = LuaTable::new();
        assert!(t.raw_set(LuaValue::Nil, 1.into()).is_err());
        assert!(t.raw_set(LuaValue::Float(f64::NAN), 1.into()).is_err());
        assert_eq!(t.array_capacity(), 0);
        assert_eq!(t.hash_capacity(), 0);
        assert_eq!(t.raw_get(&LuaValue::Nil), None);
    }

    #[test]
    fn test_with_capacity_rounds_up() {
        let t = LuaTable::with_capacity(5, 1);
        assert_eq!(t.array_capacity(), 8);
        assert_eq!(t.hash_capacity(), 2);
        let t = LuaTable::with_capacity(0, 3);
        assert_eq!(t.array_capacity(), 0);
        assert_eq!(t.hash_capacity(), 4);
    }

    #[test]
    fn test_removal_counts() {
        let mut t = LuaTable::new();
        t.raw_set("a".into(), 1.into()).unwrap();
        t.raw_set("b".into(), 2.into()).unwrap();
        assert_eq!(t.hash_count(), 2);
        t.raw_set("a".into(), LuaValue::Nil).unwrap();
        assert_eq!(t.hash_count(), 1);
        // removing twice is a no-op
        t.raw_set("a".into(), LuaValue::Nil).unwrap();
        assert_eq!(t.hash_count(), 1);
        assert_eq!(t.raw_get(&"a".into()), None);
    }

    #[test]
    fn test_presize_moves_hash_keys() {
        let mut t = LuaTable::new();
        t.raw_set("k".into(), true.into()).unwrap();
        t.raw_set(3.into(), "c".into()).unwrap();
        assert_eq!(t.array_capacity(), 0);
        t.presize_array(5);
        assert_eq!(t.array_capacity(), 8);
        assert_eq!(t.hash_count(), 1);
        assert_eq!(t.get_int(3), Some(LuaValue::string("c")));
    }

    #[test]
    fn test_from_parts() {
        let t = LuaTable::from_parts(
            vec![("name".into(), "lua".into()), ("skip".into(), LuaValue::Nil)],
            vec![10.into(), 20.into(), 30.into()],
        )
        .unwrap();
        assert_eq!(t.raw_len(), 3);
        assert_eq!(t.get_str("name"), Some(LuaValue::string("lua")));
        assert_eq!(t.get_str("skip"), None);
        assert_eq!(t.hash_count(), 1);
    }

    #[test]
    fn test_insert_stops_at_largest_key() {
        let mut t = LuaTable::new();
        t.set_int(i64::MAX, "x".into());
        t.insert(i64::MAX, "y".into());
        assert_eq!(t.get_int(i64::MAX), Some(LuaValue::string("y")));
        assert_eq!(t.get_int(i64::MIN), None);
        assert_eq!(t.hash_count(), 1);
    }

    #[test]
    fn test_remove_last_slot_at_largest_key() {
        let mut t = LuaTable::new();
        t.set_int(i64::MAX - 1, "a".into());
        t.set_int(i64::MAX, "b".into());
        // the border of this table is 0, so the slot is out of reach
        assert_eq!(t.remove(i64::MAX), None);
        assert_eq!(t.get_int(i64::MAX), Some(LuaValue::string("b")));
    }

    #[test]
    fn test_from_varargs_sets_count() {
        let t = LuaTable::from_varargs(vec![1.into(), LuaValue::Nil, 3.into()]);
        assert_eq!(t.get_str("n"), Some(LuaValue::Integer(3)));
        assert_eq!(t.get_int(2), None);
        assert_eq!(t.get_int(3), Some(LuaValue::Integer(3)));
    }
}
