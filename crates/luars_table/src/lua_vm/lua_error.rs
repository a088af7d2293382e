/// Errors raised by table operations.
///
/// Every variant maps to a catchable runtime error of the language; none of
/// them leaves the table in a partially updated state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuaError {
    /// `set`/`rawset` with a nil or NaN key
    #[error("table index is {kind}")]
    InvalidKey { kind: &'static str },

    /// `next` was handed a key that is neither live nor a known tombstone
    #[error("invalid key to 'next'")]
    InvalidIterationKey { key: String },

    /// `__len` returned something that is not an integer
    #[error("table length is not an integer: {found}")]
    NonIntegerLength { found: String },

    #[error("array too big: {len}")]
    SortTooLarge { len: i64 },

    #[error("too many results to unpack")]
    UnpackTooLarge { count: u64 },

    /// The current metatable carries a `__metatable` field
    #[error("cannot change a protected metatable")]
    ProtectedMetatable,

    #[error("attempt to index a {type_name} value")]
    IndexNonTable { type_name: &'static str },

    #[error("'{event}' chain too long; possible loop")]
    MetamethodLoop { event: &'static str },

    #[error("invalid value (at index {index}) in table for 'concat'")]
    InvalidConcatValue { index: i64, type_name: &'static str },

    #[error("{}", compare_message(.lhs, .rhs))]
    Compare {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("attempt to call a {type_name} value")]
    CallNonFunction { type_name: &'static str },

    /// Raised by host functions (comparators, metamethod handlers)
    #[error("{0}")]
    RuntimeError(String),
}

fn compare_message(lhs: &str, rhs: &str) -> String {
    if lhs == rhs {
        format!("attempt to compare two {lhs} values")
    } else {
        format!("attempt to compare {lhs} with {rhs}")
    }
}

impl LuaError {
    pub fn runtime(message: impl Into<String>) -> Self {
        LuaError::RuntimeError(message.into())
    }
}
