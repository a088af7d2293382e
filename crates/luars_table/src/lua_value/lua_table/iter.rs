// next / inext enumeration
use crate::LuaResult;
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaError;

use super::LuaTable;
use super::slot::{self, Slot};

impl LuaTable {
    /// Pair following `key`, or `None` at the end. A nil key starts the traversal.
    ///
    /// Keys removed during a traversal can still be passed back in: their
    /// tombstones keep their position in the bucket chain.
    pub fn next(&self, key: &LuaValue) -> LuaResult<Option<(LuaValue, LuaValue)>> {
        let asize = self.array.len();
        // position in the combined array+hash index space
        let mut i = match key {
            LuaValue::Nil => 0,
            key => {
                let key = key.clone().normalize_key();
                match key {
                    LuaValue::Integer(k) if k >= 1 && (k as u64) <= asize as u64 => k as usize,
                    key => {
                        if self.hash.is_empty() {
                            return Err(invalid_key(&key));
                        }
                        let b = self.bucket_of(&key);
                        let mut found = false;
                        for slot in slot::chain(&self.hash[b]) {
                            if found {
                                if let Some(pair) = slot.live_pair() {
                                    return Ok(Some(pair));
                                }
                            } else if slot.keyeq(&key) {
                                found = true;
                            }
                        }
                        if !found {
                            return Err(invalid_key(&key));
                        }
                        b + 1 + asize
                    }
                }
            }
        };

        while i < asize {
            if let Some(value) = self.weak_policy.array_get(&self.array[i]) {
                return Ok(Some((LuaValue::Integer(i as i64 + 1), value)));
            }
            i += 1;
        }

        for bucket in &self.hash[i - asize..] {
            if let Some(pair) = slot::chain(bucket).find_map(Slot::live_pair) {
                return Ok(Some(pair));
            }
        }
        Ok(None)
    }

    /// Array-style step: `(key + 1, t[key + 1])`, or `None` at the first hole
    #[inline]
    pub fn inext(&self, key: i64) -> Option<(LuaValue, LuaValue)> {
        let k = key.checked_add(1)?;
        self.get_int(k).map(|value| (LuaValue::Integer(k), value))
    }

    /// Number of live pairs, counted by walking `next`
    pub fn key_count(&self) -> usize {
        self.keys().len()
    }

    /// All live keys in traversal order
    pub fn keys(&self) -> Vec<LuaValue> {
        let mut keys = Vec::new();
        let mut key = LuaValue::Nil;
        while let Ok(Some((k, _))) = self.next(&key) {
            keys.push(k.clone());
            key = k;
        }
        keys
    }
}

fn invalid_key(key: &LuaValue) -> LuaError {
    LuaError::InvalidIterationKey {
        key: format!("{key:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_on_empty_table() {
        assert_eq!(LuaTable::new().next(&LuaValue::Nil).unwrap(), None);
    }

    #[test]
    fn test_next_unknown_key_errors() {
        let mut t = LuaTable::new();
        t.raw_set("a".into(), 1.into()).unwrap();
        let err = t.next(&"zzz".into()).unwrap_err();
        assert_eq!(err.to_string(), "invalid key to 'next'");
        assert!(LuaTable::new().next(&"a".into()).is_err());
    }

    #[test]
    fn test_inext_stops_at_hole() {
        let mut t = LuaTable::new();
        t.set_int(1, "a".into());
        t.set_int(2, "b".into());
        t.set_int(4, "d".into());
        assert_eq!(t.inext(0), Some((LuaValue::Integer(1), LuaValue::string("a"))));
        assert_eq!(t.inext(1), Some((LuaValue::Integer(2), LuaValue::string("b"))));
        assert_eq!(t.inext(2), None);
        assert_eq!(t.inext(i64::MAX), None);
    }
}
