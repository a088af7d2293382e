// Lua Table Engine
// Hybrid array/hash tables with metatable dispatch and weak modes

#[cfg(test)]
mod test;

pub mod lua_value;
pub mod lua_vm;

#[cfg(feature = "serde")]
pub mod serde;

pub use lua_value::{
    CoroutineStatus, LuaFunction, LuaString, LuaTable, LuaThread, LuaUserdata, LuaValue,
    MultiValue, TablePtr,
};
pub use lua_vm::{LuaError, LuaResult, TmKind};
