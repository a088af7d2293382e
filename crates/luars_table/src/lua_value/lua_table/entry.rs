// Entry / tombstone shapes stored in hash chains
use crate::lua_value::{KeyHash, LuaValue};

use super::weak_policy::{StoredValue, WeakPolicy};

/// Key/value cell of the hash region.
///
/// The shapes only differ in how much they store; behaviorally they are
/// interchangeable. `Weak` is produced by a weak-mode policy and may lose its
/// key or value to the host at any time.
pub enum Entry {
    Normal {
        key: LuaValue,
        value: LuaValue,
    },
    IntKey {
        key: i64,
        value: LuaValue,
    },
    NumberValue {
        key: LuaValue,
        value: f64,
    },
    Weak {
        key: StoredValue,
        hash: KeyHash,
        value: StoredValue,
    },
}

impl Entry {
    /// Strong entry with the most compact shape for this pair
    pub fn new(key: LuaValue, value: LuaValue) -> Self {
        match (key, value) {
            (LuaValue::Integer(key), value) => Entry::IntKey { key, value },
            (key, LuaValue::Float(value)) => Entry::NumberValue { key, value },
            (key, value) => Entry::Normal { key, value },
        }
    }

    #[inline]
    pub fn key(&self) -> Option<LuaValue> {
        match self {
            Entry::Normal { key, .. } | Entry::NumberValue { key, .. } => Some(key.clone()),
            Entry::IntKey { key, .. } => Some(LuaValue::Integer(*key)),
            Entry::Weak { key, .. } => key.get(),
        }
    }

    #[inline]
    pub fn value(&self) -> Option<LuaValue> {
        match self {
            Entry::Normal { value, .. } | Entry::IntKey { value, .. } => Some(value.clone()),
            Entry::NumberValue { value, .. } => Some(LuaValue::Float(*value)),
            Entry::Weak { value, .. } => value.get(),
        }
    }

    /// Both halves, or `None` if either was collected
    pub fn pair(&self) -> Option<(LuaValue, LuaValue)> {
        Some((self.key()?, self.value()?))
    }

    #[inline]
    pub fn keyeq(&self, key: &LuaValue) -> bool {
        match self {
            Entry::IntKey { key: k, .. } => matches!(key, LuaValue::Integer(i) if i == k),
            Entry::Normal { key: k, .. } | Entry::NumberValue { key: k, .. } => k.raw_equals(key),
            Entry::Weak { key: k, .. } => k.matches(key),
        }
    }

    #[inline]
    pub fn key_hash(&self) -> KeyHash {
        match self {
            Entry::Normal { key, .. } | Entry::NumberValue { key, .. } => key.key_hash(),
            Entry::IntKey { key, .. } => LuaValue::Integer(*key).key_hash(),
            Entry::Weak { hash, .. } => *hash,
        }
    }

    #[inline(always)]
    pub fn bucket_index(&self, mask: usize) -> usize {
        self.key_hash().slot(mask)
    }

    /// `Some(k)` if this entry sits at integer key `k` with `1 <= k <= max`
    #[inline]
    pub fn array_key(&self, max: usize) -> Option<usize> {
        let k = match self {
            Entry::IntKey { key, .. } => *key,
            Entry::Weak {
                key: StoredValue::Strong(LuaValue::Integer(key)),
                ..
            } => *key,
            _ => return None,
        };
        if k >= 1 && (k as u64) <= max as u64 {
            Some(k as usize)
        } else {
            None
        }
    }

    pub fn key_alive(&self) -> bool {
        match self {
            Entry::Weak { key, .. } => key.is_alive(),
            _ => true,
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Entry::Weak { key, value, .. } => key.is_alive() && value.is_alive(),
            _ => true,
        }
    }

    /// Overwrite the value, reshaping the entry if the new value needs it
    pub fn replace(&mut self, value: LuaValue, policy: WeakPolicy) {
        match self {
            Entry::Weak { value: slot, .. } => *slot = policy.wrap(value),
            Entry::IntKey { value: slot, .. } if policy == WeakPolicy::Strong => *slot = value,
            _ => {
                let key = self.take_key();
                *self = policy.entry(key, value);
            }
        }
    }

    fn take_key(&mut self) -> LuaValue {
        match self {
            Entry::Normal { key, .. } | Entry::NumberValue { key, .. } => std::mem::take(key),
            Entry::IntKey { key, .. } => LuaValue::Integer(*key),
            Entry::Weak { key, .. } => key.get().unwrap_or_default(),
        }
    }
}

/// Key left behind by a removed entry.
///
/// Large keys are held weakly: a tombstone must never keep its key alive.
pub struct DeadKey {
    key: StoredValue,
    hash: KeyHash,
}

impl DeadKey {
    pub fn new(key: LuaValue) -> Self {
        let hash = key.key_hash();
        let key = match key.is_large_key().then(|| key.downgrade()).flatten() {
            Some(weak) => StoredValue::Weak(weak),
            None => StoredValue::Strong(key),
        };
        DeadKey { key, hash }
    }

    #[inline]
    pub fn keyeq(&self, key: &LuaValue) -> bool {
        self.key.matches(key)
    }

    #[inline(always)]
    pub fn bucket_index(&self, mask: usize) -> usize {
        self.hash.slot(mask)
    }

    /// No caller can still hold this key
    #[inline]
    pub fn is_collected(&self) -> bool {
        !self.key.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TablePtr;

    #[test]
    fn test_entry_shapes() {
        assert!(matches!(
            Entry::new(LuaValue::Integer(1), LuaValue::string("a")),
            Entry::IntKey { key: 1, .. }
        ));
        assert!(matches!(
            Entry::new(LuaValue::string("x"), LuaValue::Float(1.5)),
            Entry::NumberValue { .. }
        ));
        assert!(matches!(
            Entry::new(LuaValue::string("x"), LuaValue::Boolean(true)),
            Entry::Normal { .. }
        ));
    }

    #[test]
    fn test_replace_reshapes() {
        let mut entry = Entry::new(LuaValue::string("x"), LuaValue::Float(1.5));
        entry.replace(LuaValue::string("y"), WeakPolicy::Strong);
        assert!(matches!(entry, Entry::Normal { .. }));
        assert_eq!(entry.value(), Some(LuaValue::string("y")));
        assert!(entry.keyeq(&LuaValue::string("x")));

        let mut entry = Entry::new(LuaValue::Integer(7), LuaValue::Boolean(false));
        entry.replace(LuaValue::Float(0.5), WeakPolicy::Strong);
        assert_eq!(entry.value(), Some(LuaValue::Float(0.5)));
        assert_eq!(entry.array_key(8), Some(7));
        assert_eq!(entry.array_key(4), None);
    }

    #[test]
    fn test_dead_key_holds_large_keys_weakly() {
        let t = TablePtr::new();
        let dead = DeadKey::new(LuaValue::Table(t.clone()));
        assert!(dead.keyeq(&LuaValue::Table(t.clone())));
        assert!(!dead.is_collected());
        drop(t);
        assert!(dead.is_collected());

        let dead = DeadKey::new(LuaValue::Integer(5));
        assert!(dead.keyeq(&LuaValue::Integer(5)));
        assert!(!dead.is_collected());
    }
}
