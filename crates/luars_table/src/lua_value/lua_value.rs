// LuaValue - the value model consumed by the table engine
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use super::lua_string::LongString;
use super::lua_thread::ThreadInner;
use super::{FunctionInner, LuaFunction, LuaString, LuaThread, LuaUserdata, UserdataInner};
use crate::lua_value::lua_table::{LuaTable, TablePtr};
use crate::lua_vm::LuaError;

#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(TablePtr),
    Function(LuaFunction),
    Userdata(LuaUserdata),
    Thread(LuaThread),
}

/// Type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaValueKind {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    Userdata,
    Thread,
}

impl LuaValueKind {
    pub fn name(self) -> &'static str {
        match self {
            LuaValueKind::Nil => "nil",
            LuaValueKind::Boolean => "boolean",
            LuaValueKind::Number => "number",
            LuaValueKind::String => "string",
            LuaValueKind::Table => "table",
            LuaValueKind::Function => "function",
            LuaValueKind::Userdata => "userdata",
            LuaValueKind::Thread => "thread",
        }
    }
}

/// Hash code of a key plus the bucket strategy its type uses.
///
/// Numbers and identity-hashed objects (tables, userdata, threads) are
/// spread with a modulo; everything else is masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHash {
    code: u64,
    modular: bool,
}

impl KeyHash {
    #[inline(always)]
    pub fn code(self) -> u64 {
        self.code
    }

    /// Bucket index for a hash region of `mask + 1` buckets
    #[inline(always)]
    pub fn slot(self, mask: usize) -> usize {
        if mask == 0 {
            return 0;
        }
        if self.modular {
            hashmod(self.code, mask)
        } else {
            hashpow2(self.code, mask)
        }
    }
}

#[inline(always)]
pub(crate) fn hashpow2(code: u64, mask: usize) -> usize {
    (code as usize) & mask
}

#[inline(always)]
pub(crate) fn hashmod(code: u64, mask: usize) -> usize {
    ((code & 0x7fff_ffff) as usize) % mask
}

/// Weak holder for a collectable value
#[derive(Clone)]
pub enum WeakValue {
    String(Weak<LongString>),
    Table(Weak<RefCell<LuaTable>>),
    Function(Weak<FunctionInner>),
    Userdata(Weak<UserdataInner>),
    Thread(Weak<ThreadInner>),
}

impl WeakValue {
    /// The referent, or `None` once its last strong handle is gone
    pub fn upgrade(&self) -> Option<LuaValue> {
        match self {
            WeakValue::String(w) => w
                .upgrade()
                .map(|s| LuaValue::String(LuaString::from_long(s))),
            WeakValue::Table(w) => w.upgrade().map(|t| LuaValue::Table(TablePtr::from_rc(t))),
            WeakValue::Function(w) => w
                .upgrade()
                .map(|f| LuaValue::Function(LuaFunction::from_inner(f))),
            WeakValue::Userdata(w) => w
                .upgrade()
                .map(|u| LuaValue::Userdata(LuaUserdata::from_inner(u))),
            WeakValue::Thread(w) => w
                .upgrade()
                .map(|t| LuaValue::Thread(LuaThread::from_inner(t))),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        match self {
            WeakValue::String(w) => w.strong_count() > 0,
            WeakValue::Table(w) => w.strong_count() > 0,
            WeakValue::Function(w) => w.strong_count() > 0,
            WeakValue::Userdata(w) => w.strong_count() > 0,
            WeakValue::Thread(w) => w.strong_count() > 0,
        }
    }
}

impl LuaValue {
    #[inline(always)]
    pub fn nil() -> Self {
        LuaValue::Nil
    }

    #[inline(always)]
    pub fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    #[inline(always)]
    pub fn integer(i: i64) -> Self {
        LuaValue::Integer(i)
    }

    #[inline(always)]
    pub fn float(f: f64) -> Self {
        LuaValue::Float(f)
    }

    pub fn string(s: &str) -> Self {
        LuaValue::String(LuaString::new(s))
    }

    pub fn table(t: TablePtr) -> Self {
        LuaValue::Table(t)
    }

    pub fn function(f: LuaFunction) -> Self {
        LuaValue::Function(f)
    }

    // ============ Type checks ============

    pub fn kind(&self) -> LuaValueKind {
        match self {
            LuaValue::Nil => LuaValueKind::Nil,
            LuaValue::Boolean(_) => LuaValueKind::Boolean,
            LuaValue::Integer(_) | LuaValue::Float(_) => LuaValueKind::Number,
            LuaValue::String(_) => LuaValueKind::String,
            LuaValue::Table(_) => LuaValueKind::Table,
            LuaValue::Function(_) => LuaValueKind::Function,
            LuaValue::Userdata(_) => LuaValueKind::Userdata,
            LuaValue::Thread(_) => LuaValueKind::Thread,
        }
    }

    #[inline(always)]
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    #[inline(always)]
    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    #[inline(always)]
    pub fn is_string(&self) -> bool {
        matches!(self, LuaValue::String(_))
    }

    #[inline(always)]
    pub fn is_table(&self) -> bool {
        matches!(self, LuaValue::Table(_))
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(self, LuaValue::Function(_))
    }

    /// Lua truthiness: only nil and false are false
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    // ============ Accessors ============

    #[inline(always)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => float_to_integer(*f),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Integer(i) => Some(*i as f64),
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TablePtr> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&LuaFunction> {
        match self {
            LuaValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Metatable for types that carry one individually
    pub fn metatable(&self) -> Option<TablePtr> {
        match self {
            LuaValue::Table(t) => t.get_metatable(),
            LuaValue::Userdata(u) => u.get_metatable(),
            _ => None,
        }
    }

    // ============ Keys ============

    /// A float with an exact integer value addresses the same slot as the integer
    #[inline]
    pub fn normalize_key(self) -> LuaValue {
        match self {
            LuaValue::Float(f) => match float_to_integer(f) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(f),
            },
            other => other,
        }
    }

    #[inline]
    pub fn is_valid_key(&self) -> bool {
        match self {
            LuaValue::Nil => false,
            LuaValue::Float(f) => !f.is_nan(),
            _ => true,
        }
    }

    pub(crate) fn check_key(&self) -> Result<(), LuaError> {
        match self {
            LuaValue::Nil => Err(LuaError::InvalidKey { kind: "nil" }),
            LuaValue::Float(f) if f.is_nan() => Err(LuaError::InvalidKey { kind: "NaN" }),
            _ => Ok(()),
        }
    }

    #[inline]
    pub fn key_hash(&self) -> KeyHash {
        let (code, modular) = match self {
            LuaValue::Nil => (0, false),
            LuaValue::Boolean(b) => (if *b { 1231 } else { 1237 }, false),
            LuaValue::Integer(i) => (int_hash(*i), true),
            LuaValue::Float(f) => {
                let bits = f.to_bits();
                (bits ^ (bits >> 32), true)
            }
            LuaValue::String(s) => (s.hash(), false),
            LuaValue::Table(t) => (addr_hash(t.addr()), true),
            LuaValue::Function(f) => (addr_hash(f.addr()), false),
            LuaValue::Userdata(u) => (addr_hash(u.addr()), true),
            LuaValue::Thread(t) => (addr_hash(t.addr()), true),
        };
        KeyHash { code, modular }
    }

    #[inline(always)]
    pub fn hash_code(&self) -> u64 {
        self.key_hash().code()
    }

    /// Primitive equality: numbers by value, strings by content, objects by identity
    pub fn raw_equals(&self, other: &LuaValue) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => a.ptr_eq(b),
            (LuaValue::Function(a), LuaValue::Function(b)) => a.ptr_eq(b),
            (LuaValue::Userdata(a), LuaValue::Userdata(b)) => a.ptr_eq(b),
            (LuaValue::Thread(a), LuaValue::Thread(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    // ============ Weak references ============

    /// Objects a weak table may let go of. Strings are values here and
    /// are never removed from weak tables.
    #[inline]
    pub fn is_collectable(&self) -> bool {
        matches!(
            self,
            LuaValue::Table(_) | LuaValue::Function(_) | LuaValue::Userdata(_) | LuaValue::Thread(_)
        )
    }

    /// Keys a tombstone keeps behind a weak holder: long strings and heap objects.
    /// Numbers, booleans and short strings are always held by value.
    #[inline]
    pub fn is_large_key(&self) -> bool {
        self.is_collectable() || matches!(self, LuaValue::String(s) if s.is_long())
    }

    pub fn downgrade(&self) -> Option<WeakValue> {
        match self {
            LuaValue::String(s) => s.downgrade().map(WeakValue::String),
            LuaValue::Table(t) => Some(WeakValue::Table(t.downgrade())),
            LuaValue::Function(f) => Some(WeakValue::Function(f.downgrade())),
            LuaValue::Userdata(u) => Some(WeakValue::Userdata(u.downgrade())),
            LuaValue::Thread(t) => Some(WeakValue::Thread(t.downgrade())),
            _ => None,
        }
    }

    // ============ Conversions ============

    /// String form used by `concat`; only strings and numbers convert
    pub fn to_concat_string(&self, buf: &mut String) -> bool {
        match self {
            LuaValue::String(s) => buf.push_str(s.as_str()),
            LuaValue::Integer(i) => {
                let mut itoa_buf = itoa::Buffer::new();
                buf.push_str(itoa_buf.format(*i));
            }
            LuaValue::Float(f) => buf.push_str(&float_to_string(*f)),
            _ => return false,
        }
        true
    }
}

#[inline(always)]
fn int_hash(i: i64) -> u64 {
    (i ^ (i >> 32)) as u64
}

#[inline(always)]
fn addr_hash(addr: usize) -> u64 {
    (addr >> 3) as u64
}

/// Exact integer value of a float, if it has one
#[inline]
pub(crate) fn float_to_integer(f: f64) -> Option<i64> {
    // -2^63 is exact; 2^63 is not representable
    if f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Float text as `tostring` gives it: `%.14g`, plus `.0` when the result
/// would read as an integer
pub(crate) fn float_to_string(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan".into() } else { "nan".into() };
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let mut s = format_g(f, 14);
    if s.bytes().all(|b| b == b'-' || b.is_ascii_digit()) {
        s.push_str(".0");
    }
    s
}

/// C's `%.{precision}g` for finite values
fn format_g(f: f64, precision: usize) -> String {
    // the exponent after rounding to `precision` significant digits
    let sci = format!("{:.*e}", precision - 1, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.unsigned_abs())
    } else {
        let decimals = (precision as i32 - 1 - exp) as usize;
        trim_fraction(&format!("{f:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{b}"),
            LuaValue::Integer(i) => write!(f, "{i}"),
            LuaValue::Float(n) => write!(f, "{}", float_to_string(*n)),
            LuaValue::String(s) => write!(f, "{s:?}"),
            LuaValue::Table(t) => write!(f, "table: {:#x}", t.addr()),
            LuaValue::Function(func) => write!(f, "function: {}", func.name()),
            LuaValue::Userdata(u) => write!(f, "userdata: {:#x}", u.addr()),
            LuaValue::Thread(t) => write!(f, "thread: {:#x}", t.addr()),
        }
    }
}

impl fmt::Display for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::String(s) => write!(f, "{s}"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<i32> for LuaValue {
    fn from(i: i32) -> Self {
        LuaValue::Integer(i as i64)
    }
}

impl From<f64> for LuaValue {
    fn from(f: f64) -> Self {
        LuaValue::Float(f)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::string(s)
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::string(&s)
    }
}

impl From<LuaString> for LuaValue {
    fn from(s: LuaString) -> Self {
        LuaValue::String(s)
    }
}

impl From<TablePtr> for LuaValue {
    fn from(t: TablePtr) -> Self {
        LuaValue::Table(t)
    }
}

impl From<LuaFunction> for LuaValue {
    fn from(f: LuaFunction) -> Self {
        LuaValue::Function(f)
    }
}

impl From<LuaUserdata> for LuaValue {
    fn from(u: LuaUserdata) -> Self {
        LuaValue::Userdata(u)
    }
}

impl From<LuaThread> for LuaValue {
    fn from(t: LuaThread) -> Self {
        LuaValue::Thread(t)
    }
}

impl<T: Into<LuaValue>> From<Option<T>> for LuaValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}
