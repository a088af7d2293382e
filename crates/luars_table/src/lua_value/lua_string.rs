use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::{Rc, Weak};

use ahash::RandomState;
use smol_str::SmolStr;

use crate::lua_vm::lua_limits::LUAI_MAXSHORTLEN;

/// Lua string with a cached content hash.
///
/// Short strings (up to `LUAI_MAXSHORTLEN` bytes) are plain values: they are
/// copied inline and can never be collected. Long strings are shared
/// allocations, compared by content but held weakly by weak tables.
#[derive(Clone)]
pub enum LuaString {
    Short { text: SmolStr, hash: u64 },
    Long(Rc<LongString>),
}

pub struct LongString {
    text: Box<str>,
    hash: u64,
}

impl LuaString {
    pub fn new(s: &str) -> Self {
        let hash = hash_str(s);
        if s.len() <= LUAI_MAXSHORTLEN {
            LuaString::Short {
                text: SmolStr::new(s),
                hash,
            }
        } else {
            LuaString::Long(Rc::new(LongString {
                text: s.into(),
                hash,
            }))
        }
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        match self {
            LuaString::Short { text, .. } => text.as_str(),
            LuaString::Long(long) => &long.text,
        }
    }

    #[inline(always)]
    pub fn hash(&self) -> u64 {
        match self {
            LuaString::Short { hash, .. } => *hash,
            LuaString::Long(long) => long.hash,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn is_long(&self) -> bool {
        matches!(self, LuaString::Long(_))
    }

    /// Weak handle for long strings; short strings have no identity to track.
    pub(crate) fn downgrade(&self) -> Option<Weak<LongString>> {
        match self {
            LuaString::Short { .. } => None,
            LuaString::Long(long) => Some(Rc::downgrade(long)),
        }
    }

    pub(crate) fn from_long(long: Rc<LongString>) -> Self {
        LuaString::Long(long)
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        if let (LuaString::Long(a), LuaString::Long(b)) = (self, other) {
            if Rc::ptr_eq(a, b) {
                return true;
            }
        }
        self.hash() == other.hash() && self.as_str() == other.as_str()
    }
}

impl Eq for LuaString {}

impl PartialOrd for LuaString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LuaString {
    /// Bytewise ordering, as `strcmp` would give
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().as_bytes().cmp(other.as_str().as_bytes())
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::new(s)
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::new(&s)
    }
}

/// Content hash with fixed seeds, so iteration order is reproducible
#[inline]
fn hash_str(s: &str) -> u64 {
    let hashbuilder = RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    );
    let mut hasher = hashbuilder.build_hasher();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_strings() {
        let short = LuaString::new("hello");
        assert!(!short.is_long());
        assert!(short.downgrade().is_none());

        let text = "x".repeat(LUAI_MAXSHORTLEN + 1);
        let long = LuaString::new(&text);
        assert!(long.is_long());
        assert_eq!(long, LuaString::new(&text));
        assert_eq!(long.hash(), LuaString::new(&text).hash());
    }

    #[test]
    fn test_string_ordering_is_bytewise() {
        assert!(LuaString::new("a") < LuaString::new("b"));
        assert!(LuaString::new("Z") < LuaString::new("a"));
        assert!(LuaString::new("ab") > LuaString::new("a"));
    }
}
