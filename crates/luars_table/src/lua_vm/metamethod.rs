// Metamethod lookup and dispatch for table operations
use crate::lua_value::{LuaValue, MultiValue};
use crate::lua_vm::lua_limits::MAXTAGLOOP;
use crate::lua_vm::{LuaError, LuaResult};

/// Metamethod events consulted by the table engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmKind {
    Index,
    NewIndex,
    Mode,
    Len,
    Eq,
    Lt,
    Call,
    Metatable,
}

impl TmKind {
    pub const fn name(self) -> &'static str {
        match self {
            TmKind::Index => "__index",
            TmKind::NewIndex => "__newindex",
            TmKind::Mode => "__mode",
            TmKind::Len => "__len",
            TmKind::Eq => "__eq",
            TmKind::Lt => "__lt",
            TmKind::Call => "__call",
            TmKind::Metatable => "__metatable",
        }
    }
}

/// Raw lookup of `event` in the metatable of `value`
#[inline]
pub fn get_tm(value: &LuaValue, event: TmKind) -> Option<LuaValue> {
    value.metatable()?.raw_get_str(event.name())
}

/// Call a handler: functions directly, anything else through its `__call`
pub fn call_tm(handler: &LuaValue, args: &[LuaValue]) -> LuaResult<MultiValue> {
    match handler {
        LuaValue::Function(f) => f.call(args),
        other => match get_tm(other, TmKind::Call) {
            Some(LuaValue::Function(f)) => {
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(other.clone());
                call_args.extend_from_slice(args);
                f.call(&call_args)
            }
            _ => Err(LuaError::CallNonFunction {
                type_name: other.type_name(),
            }),
        },
    }
}

/// `obj[key]` with `__index` fallback.
///
/// Table handlers are followed iteratively; a function handler ends the
/// chain with its first result.
pub fn index(obj: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
    let mut current = obj.clone();
    for _ in 0..MAXTAGLOOP {
        let handler = match &current {
            LuaValue::Table(t) => {
                if let Some(value) = t.raw_get(key) {
                    return Ok(value);
                }
                match get_tm(&current, TmKind::Index) {
                    Some(handler) => handler,
                    None => return Ok(LuaValue::Nil),
                }
            }
            other => get_tm(other, TmKind::Index).ok_or(LuaError::IndexNonTable {
                type_name: other.type_name(),
            })?,
        };
        if let LuaValue::Function(f) = &handler {
            return Ok(f.call(&[current, key.clone()])?.first());
        }
        current = handler;
    }
    Err(LuaError::MetamethodLoop {
        event: TmKind::Index.name(),
    })
}

/// `obj[key] = value` with `__newindex` fallback.
///
/// A present raw slot, or a table without a handler, is written raw.
pub fn new_index(obj: &LuaValue, key: LuaValue, value: LuaValue) -> LuaResult<()> {
    let mut current = obj.clone();
    for _ in 0..MAXTAGLOOP {
        let handler = match &current {
            LuaValue::Table(t) => {
                if t.raw_get(&key).is_some() {
                    return t.raw_set(key, value);
                }
                match get_tm(&current, TmKind::NewIndex) {
                    Some(handler) => handler,
                    None => return t.raw_set(key, value),
                }
            }
            other => get_tm(other, TmKind::NewIndex).ok_or(LuaError::IndexNonTable {
                type_name: other.type_name(),
            })?,
        };
        if let LuaValue::Function(f) = &handler {
            f.call(&[current, key, value])?;
            return Ok(());
        }
        current = handler;
    }
    Err(LuaError::MetamethodLoop {
        event: TmKind::NewIndex.name(),
    })
}

/// `a == b`. `__eq` is only tried for two distinct tables (or two userdata),
/// first from `a`'s metatable, then from `b`'s.
pub fn equals(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    if a.raw_equals(b) {
        return Ok(true);
    }
    match (a, b) {
        (LuaValue::Table(_), LuaValue::Table(_)) | (LuaValue::Userdata(_), LuaValue::Userdata(_)) => {
            match get_tm(a, TmKind::Eq).or_else(|| get_tm(b, TmKind::Eq)) {
                Some(handler) => Ok(call_tm(&handler, &[a.clone(), b.clone()])?
                    .first()
                    .is_truthy()),
                None => Ok(false),
            }
        }
        _ => Ok(false),
    }
}

/// `a < b`: numbers numerically, strings bytewise, otherwise `__lt`
pub fn less_than(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => Ok(x < y),
        (LuaValue::Integer(_) | LuaValue::Float(_), LuaValue::Integer(_) | LuaValue::Float(_)) => {
            Ok(num_lt(a, b))
        }
        (LuaValue::String(x), LuaValue::String(y)) => Ok(x < y),
        _ => match get_tm(a, TmKind::Lt).or_else(|| get_tm(b, TmKind::Lt)) {
            Some(handler) => Ok(call_tm(&handler, &[a.clone(), b.clone()])?
                .first()
                .is_truthy()),
            None => Err(LuaError::Compare {
                lhs: a.type_name(),
                rhs: b.type_name(),
            }),
        },
    }
}

/// Mixed integer/float comparison without losing precision on large integers
fn num_lt(a: &LuaValue, b: &LuaValue) -> bool {
    match (a, b) {
        (LuaValue::Integer(i), LuaValue::Float(f)) => int_lt_float(*i, *f),
        (LuaValue::Float(f), LuaValue::Integer(i)) => float_lt_int(*f, *i),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x < y,
            _ => false,
        },
    }
}

fn int_lt_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        false
    } else if f >= 9_223_372_036_854_775_808.0 {
        true
    } else if f > -9_223_372_036_854_775_808.0 {
        // i < f  <=>  i < ceil(f)
        i < f.ceil() as i64
    } else {
        false
    }
}

fn float_lt_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        false
    } else if f >= 9_223_372_036_854_775_808.0 {
        false
    } else if f >= -9_223_372_036_854_775_808.0 {
        // f < i  <=>  floor(f) < i
        (f.floor() as i64) < i
    } else {
        true
    }
}
