use std::cell::Cell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    Suspended,
    Running,
    Normal,
    Dead,
}

/// Lua Thread (coroutine) handle.
/// The scheduler lives outside this crate; tables only need its identity.
#[derive(Clone)]
pub struct LuaThread(Rc<ThreadInner>);

pub struct ThreadInner {
    status: Cell<CoroutineStatus>,
}

impl LuaThread {
    pub fn new() -> Self {
        LuaThread(Rc::new(ThreadInner {
            status: Cell::new(CoroutineStatus::Suspended),
        }))
    }

    pub fn status(&self) -> CoroutineStatus {
        self.0.status.get()
    }

    pub fn set_status(&self, status: CoroutineStatus) {
        self.0.status.set(status);
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &LuaThread) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ThreadInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_inner(inner: Rc<ThreadInner>) -> Self {
        LuaThread(inner)
    }
}

impl Default for LuaThread {
    fn default() -> Self {
        Self::new()
    }
}
