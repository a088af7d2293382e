mod lua_string;
mod lua_thread;
#[allow(clippy::module_inception)]
mod lua_value;
pub mod lua_table;

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use smol_str::SmolStr;

use crate::lua_vm::LuaResult;

pub use lua_string::{LongString, LuaString};
pub use lua_table::{LuaTable, TablePtr};
pub use lua_thread::{CoroutineStatus, LuaThread, ThreadInner};
pub use lua_value::{KeyHash, LuaValue, LuaValueKind, WeakValue};

/// Multi-value return type (for functions returning multiple values)
/// Optimized to avoid heap allocation for common single-value case
#[derive(Debug, Clone, Default)]
pub enum MultiValue {
    #[default]
    Empty,
    Single(LuaValue),
    Many(Vec<LuaValue>),
}

impl MultiValue {
    #[inline(always)]
    pub fn empty() -> Self {
        MultiValue::Empty
    }

    #[inline(always)]
    pub fn single(value: LuaValue) -> Self {
        MultiValue::Single(value)
    }

    #[inline(always)]
    pub fn two(v1: LuaValue, v2: LuaValue) -> Self {
        MultiValue::Many(vec![v1, v2])
    }

    pub fn multiple(mut values: Vec<LuaValue>) -> Self {
        match values.len() {
            0 => MultiValue::Empty,
            1 => MultiValue::Single(values.pop().unwrap_or_default()),
            _ => MultiValue::Many(values),
        }
    }

    /// Consume into a Vec
    pub fn all_values(self) -> Vec<LuaValue> {
        match self {
            MultiValue::Empty => Vec::new(),
            MultiValue::Single(v) => vec![v],
            MultiValue::Many(v) => v,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        match self {
            MultiValue::Empty => 0,
            MultiValue::Single(_) => 1,
            MultiValue::Many(v) => v.len(),
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First value, or nil when there is none (call results are adjusted to one value)
    #[inline(always)]
    pub fn first(&self) -> LuaValue {
        self.get(0).unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<LuaValue> {
        match self {
            MultiValue::Empty => None,
            MultiValue::Single(v) => {
                if index == 0 {
                    Some(v.clone())
                } else {
                    None
                }
            }
            MultiValue::Many(v) => v.get(index).cloned(),
        }
    }
}

pub type HostFunction = dyn Fn(&[LuaValue]) -> LuaResult<MultiValue>;

/// Callable value. Metamethod handlers and sort comparators are host closures.
#[derive(Clone)]
pub struct LuaFunction(Rc<FunctionInner>);

pub struct FunctionInner {
    name: SmolStr,
    func: Box<HostFunction>,
}

impl LuaFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[LuaValue]) -> LuaResult<MultiValue> + 'static,
    {
        LuaFunction(Rc::new(FunctionInner {
            name: SmolStr::new(name),
            func: Box::new(func),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn call(&self, args: &[LuaValue]) -> LuaResult<MultiValue> {
        (self.0.func)(args)
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &LuaFunction) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<FunctionInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_inner(inner: Rc<FunctionInner>) -> Self {
        LuaFunction(inner)
    }
}

/// Full userdata: an opaque host object plus an optional metatable
#[derive(Clone)]
pub struct LuaUserdata(Rc<UserdataInner>);

pub struct UserdataInner {
    data: RefCell<Box<dyn Any>>,
    metatable: RefCell<Option<TablePtr>>,
}

impl LuaUserdata {
    pub fn new<T: Any>(data: T) -> Self {
        LuaUserdata(Rc::new(UserdataInner {
            data: RefCell::new(Box::new(data)),
            metatable: RefCell::new(None),
        }))
    }

    pub fn data(&self) -> Ref<'_, Box<dyn Any>> {
        self.0.data.borrow()
    }

    pub fn downcast_ref<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.0.data.borrow().downcast_ref::<T>().map(f)
    }

    pub fn get_metatable(&self) -> Option<TablePtr> {
        self.0.metatable.borrow().clone()
    }

    pub fn set_metatable(&self, metatable: Option<TablePtr>) {
        *self.0.metatable.borrow_mut() = metatable;
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &LuaUserdata) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<UserdataInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_inner(inner: Rc<UserdataInner>) -> Self {
        LuaUserdata(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_value_len_and_emptiness() {
        assert!(MultiValue::empty().is_empty());
        assert!(MultiValue::Many(Vec::new()).is_empty());
        assert!(!MultiValue::single(LuaValue::Nil).is_empty());
        let two = MultiValue::two(1.into(), 2.into());
        assert_eq!(two.len(), 2);
        assert_eq!(two.first(), LuaValue::Integer(1));
        assert_eq!(two.get(2), None);
    }
}
