// Weak-mode policy: how values and entries are held once a metatable sets `__mode`
use crate::lua_value::{LuaValue, WeakValue};

use super::entry::Entry;

/// A value as it sits in storage: either owned outright or behind a weak holder
#[derive(Clone)]
pub enum StoredValue {
    Strong(LuaValue),
    Weak(WeakValue),
}

impl StoredValue {
    /// The live value, or `None` if the weak referent was collected
    #[inline]
    pub fn get(&self) -> Option<LuaValue> {
        match self {
            StoredValue::Strong(v) => Some(v.clone()),
            StoredValue::Weak(w) => w.upgrade(),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        match self {
            StoredValue::Strong(_) => true,
            StoredValue::Weak(w) => w.is_alive(),
        }
    }

    /// Raw key comparison without cloning strong values
    #[inline]
    pub fn matches(&self, key: &LuaValue) -> bool {
        match self {
            StoredValue::Strong(v) => v.raw_equals(key),
            StoredValue::Weak(w) => w.upgrade().is_some_and(|v| v.raw_equals(key)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeakPolicy {
    #[default]
    Strong,
    WeakKeys,
    WeakValues,
    WeakKeysAndValues,
}

impl WeakPolicy {
    /// Derive the policy from a metatable's `__mode` field
    pub fn from_mode(mode: Option<&LuaValue>) -> Self {
        let Some(mode) = mode.and_then(LuaValue::as_str) else {
            return WeakPolicy::Strong;
        };
        match (mode.contains('k'), mode.contains('v')) {
            (false, false) => WeakPolicy::Strong,
            (true, false) => WeakPolicy::WeakKeys,
            (false, true) => WeakPolicy::WeakValues,
            (true, true) => WeakPolicy::WeakKeysAndValues,
        }
    }

    #[inline(always)]
    pub fn weak_keys(self) -> bool {
        matches!(self, WeakPolicy::WeakKeys | WeakPolicy::WeakKeysAndValues)
    }

    #[inline(always)]
    pub fn weak_values(self) -> bool {
        matches!(self, WeakPolicy::WeakValues | WeakPolicy::WeakKeysAndValues)
    }

    /// Wrap a value for storage in the array region (or an entry's value part)
    #[inline]
    pub fn wrap(self, value: LuaValue) -> StoredValue {
        if self.weak_values() {
            weaken(value)
        } else {
            StoredValue::Strong(value)
        }
    }

    #[inline]
    fn wrap_key(self, key: LuaValue) -> StoredValue {
        if self.weak_keys() {
            weaken(key)
        } else {
            StoredValue::Strong(key)
        }
    }

    /// Build a hash entry for `key`/`value` under this policy.
    ///
    /// Entries that end up with nothing weak in them use the plain shapes.
    pub fn entry(self, key: LuaValue, value: LuaValue) -> Entry {
        if self == WeakPolicy::Strong {
            return Entry::new(key, value);
        }
        let hash = key.key_hash();
        match (self.wrap_key(key), self.wrap(value)) {
            (StoredValue::Strong(key), StoredValue::Strong(value)) => Entry::new(key, value),
            (key, value) => Entry::Weak { key, hash, value },
        }
    }

    /// Read back an array slot, turning a collected referent into "absent"
    #[inline(always)]
    pub fn array_get(self, stored: &Option<StoredValue>) -> Option<LuaValue> {
        stored.as_ref().and_then(StoredValue::get)
    }
}

#[inline]
fn weaken(value: LuaValue) -> StoredValue {
    if value.is_collectable() {
        if let Some(weak) = value.downgrade() {
            return StoredValue::Weak(weak);
        }
    }
    StoredValue::Strong(value)
}
