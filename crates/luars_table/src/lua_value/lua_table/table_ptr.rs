// TablePtr - shared handle, the metatable-aware table API
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::LuaResult;
use crate::lua_value::{LuaFunction, LuaValue, MultiValue};
use crate::lua_vm::lua_limits::{MAX_SORT, MAX_UNPACK};
use crate::lua_vm::metamethod::{self, TmKind};
use crate::lua_vm::LuaError;

use super::LuaTable;
use super::weak_policy::WeakPolicy;

/// Reference-counted table handle.
///
/// Operations that can run metamethods live here rather than on `LuaTable`:
/// they only borrow the table between handler calls, so a handler is free to
/// read or write the same table.
#[derive(Clone)]
pub struct TablePtr(Rc<RefCell<LuaTable>>);

impl Default for TablePtr {
    fn default() -> Self {
        Self::new()
    }
}

impl TablePtr {
    pub fn new() -> Self {
        Self::from_table(LuaTable::new())
    }

    pub fn with_capacity(narray: usize, nhash: usize) -> Self {
        Self::from_table(LuaTable::with_capacity(narray, nhash))
    }

    pub fn from_table(table: LuaTable) -> Self {
        TablePtr(Rc::new(RefCell::new(table)))
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<LuaTable>>) -> Self {
        TablePtr(rc)
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &TablePtr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<LuaTable>> {
        Rc::downgrade(&self.0)
    }

    pub fn borrow(&self) -> Ref<'_, LuaTable> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, LuaTable> {
        self.0.borrow_mut()
    }

    #[inline(always)]
    pub fn to_value(&self) -> LuaValue {
        LuaValue::Table(self.clone())
    }

    // ============ Raw access ============

    pub fn raw_get(&self, key: &LuaValue) -> Option<LuaValue> {
        self.0.borrow().raw_get(key)
    }

    pub fn raw_get_int(&self, key: i64) -> Option<LuaValue> {
        self.0.borrow().get_int(key)
    }

    pub fn raw_get_str(&self, key: &str) -> Option<LuaValue> {
        self.0.borrow().get_str(key)
    }

    pub fn raw_set(&self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        self.0.borrow_mut().raw_set(key, value)
    }

    pub fn raw_set_int(&self, key: i64, value: LuaValue) {
        self.0.borrow_mut().set_int(key, value);
    }

    pub fn raw_len(&self) -> i64 {
        self.0.borrow().raw_len()
    }

    // ============ Metatable-aware access ============

    /// `t[key]`, falling back to `__index` on a raw miss
    pub fn get(&self, key: &LuaValue) -> LuaResult<LuaValue> {
        metamethod::index(&self.to_value(), key)
    }

    pub fn get_int(&self, key: i64) -> LuaResult<LuaValue> {
        if let Some(value) = self.raw_get_int(key) {
            return Ok(value);
        }
        metamethod::index(&self.to_value(), &LuaValue::Integer(key))
    }

    /// `t[key] = value`, going through `__newindex` only when the key is absent
    pub fn set(&self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        let key = key.normalize_key();
        if !key.is_valid_key()
            && !matches!(
                metamethod::get_tm(&self.to_value(), TmKind::NewIndex),
                Some(LuaValue::Function(_))
            )
        {
            return key.check_key();
        }
        metamethod::new_index(&self.to_value(), key, value)
    }

    pub fn set_int(&self, key: i64, value: LuaValue) -> LuaResult<()> {
        metamethod::new_index(&self.to_value(), LuaValue::Integer(key), value)
    }

    /// `#t`: the `__len` handler if there is one, else a border
    pub fn length(&self) -> LuaResult<LuaValue> {
        let Some(handler) = metamethod::get_tm(&self.to_value(), TmKind::Len) else {
            return Ok(LuaValue::Integer(self.raw_len()));
        };
        let result = metamethod::call_tm(&handler, &[self.to_value()])?.first();
        match result.as_integer() {
            Some(n) => Ok(LuaValue::Integer(n)),
            None => Err(LuaError::NonIntegerLength {
                found: result.to_string(),
            }),
        }
    }

    /// Equality as the `==` operator sees it, including `__eq`
    pub fn equals(&self, other: &LuaValue) -> LuaResult<bool> {
        metamethod::equals(&self.to_value(), other)
    }

    // ============ Traversal ============

    pub fn next(&self, key: &LuaValue) -> LuaResult<Option<(LuaValue, LuaValue)>> {
        self.0.borrow().next(key)
    }

    pub fn inext(&self, key: i64) -> Option<(LuaValue, LuaValue)> {
        self.0.borrow().inext(key)
    }

    pub fn key_count(&self) -> usize {
        self.0.borrow().key_count()
    }

    pub fn keys(&self) -> Vec<LuaValue> {
        self.0.borrow().keys()
    }

    // ============ Table library ============

    pub fn insert(&self, pos: i64, value: LuaValue) {
        self.0.borrow_mut().insert(pos, value);
    }

    pub fn remove(&self, pos: i64) -> Option<LuaValue> {
        self.0.borrow_mut().remove(pos)
    }

    /// `table.concat(t, sep, i, j)`; every element must be a string or number
    pub fn concat(&self, sep: &str, i: i64, j: i64) -> LuaResult<LuaValue> {
        let mut buf = String::new();
        let mut k = i;
        while k <= j {
            let value = self.get_int(k)?;
            if !value.to_concat_string(&mut buf) {
                return Err(LuaError::InvalidConcatValue {
                    index: k,
                    type_name: value.type_name(),
                });
            }
            if k == j {
                break;
            }
            buf.push_str(sep);
            k += 1;
        }
        Ok(LuaValue::string(&buf))
    }

    /// `table.sort(t [, comp])`. Without a comparator values are ordered by
    /// `<`, which may consult `__lt`. The size limit is checked against `#t`,
    /// so a `__len` handler counts.
    ///
    /// Sorting works on a copy of the sequence that is written back once all
    /// comparisons succeeded. A comparator reading the table sees the
    /// unsorted contents, and its writes to the sorted slots are overwritten.
    pub fn sort(&self, comparator: Option<&LuaFunction>) -> LuaResult<()> {
        let len = self.length()?.as_integer().unwrap_or_default();
        if len >= MAX_SORT {
            return Err(LuaError::SortTooLarge { len });
        }
        // sort a snapshot so comparators never observe a borrowed table
        let mut values = self.0.borrow().sequence();
        if values.len() < 2 {
            return Ok(());
        }
        match comparator {
            Some(cmp) => super::heap_sort(&mut values, |a, b| {
                Ok(cmp.call(&[a.clone(), b.clone()])?.first().is_truthy())
            })?,
            None => super::heap_sort(&mut values, metamethod::less_than)?,
        }
        self.0.borrow_mut().store_sequence(values);
        Ok(())
    }

    /// `table.unpack(t, i, j)`
    pub fn unpack(&self, i: i64, j: i64) -> LuaResult<MultiValue> {
        if i > j {
            return Ok(MultiValue::empty());
        }
        let count = j.abs_diff(i).saturating_add(1);
        if count >= MAX_UNPACK {
            return Err(LuaError::UnpackTooLarge { count });
        }
        let mut values = Vec::with_capacity(count as usize);
        for k in i..=j {
            values.push(self.get_int(k)?);
        }
        Ok(MultiValue::multiple(values))
    }

    pub fn unpack_all(&self) -> LuaResult<MultiValue> {
        self.unpack(1, self.raw_len())
    }

    // ============ Metatable ============

    pub fn get_metatable(&self) -> Option<TablePtr> {
        self.0.borrow().get_metatable()
    }

    /// Attach or detach a metatable. Fails if the current one has a
    /// `__metatable` field. A `__mode` field selects the weak policy.
    pub fn set_metatable(&self, metatable: Option<TablePtr>) -> LuaResult<()> {
        if let Some(current) = self.get_metatable()
            && current.raw_get_str(TmKind::Metatable.name()).is_some()
        {
            log::trace!("rejected metatable change on protected table");
            return Err(LuaError::ProtectedMetatable);
        }
        let policy = match &metatable {
            Some(mt) => WeakPolicy::from_mode(mt.raw_get_str(TmKind::Mode.name()).as_ref()),
            None => WeakPolicy::Strong,
        };
        self.0.borrow_mut().attach_metatable(metatable, policy);
        Ok(())
    }
}
