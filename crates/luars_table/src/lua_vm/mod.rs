// Runtime-facing pieces of the table engine: errors, limits and metamethod dispatch
pub mod lua_error;
pub mod lua_limits;
pub mod metamethod;

pub use lua_error::LuaError;
pub use metamethod::TmKind;

pub type LuaResult<T> = Result<T, LuaError>;
