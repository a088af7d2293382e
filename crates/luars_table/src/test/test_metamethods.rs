// Tests for metatable dispatch: __index, __newindex, __len, __eq, __metatable
use std::cell::RefCell;
use std::rc::Rc;

use crate::*;

fn metatable_with(event: &str, handler: LuaValue) -> TablePtr {
    let mt = TablePtr::new();
    mt.raw_set(event.into(), handler).unwrap();
    mt
}

#[test]
fn test_index_table_chain() {
    let base = TablePtr::new();
    base.raw_set("greeting".into(), "hello".into()).unwrap();

    let middle = TablePtr::new();
    middle
        .set_metatable(Some(metatable_with("__index", base.to_value())))
        .unwrap();

    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__index", middle.to_value())))
        .unwrap();

    assert_eq!(t.get(&"greeting".into()).unwrap(), LuaValue::string("hello"));
    assert_eq!(t.get(&"missing".into()).unwrap(), LuaValue::Nil);
    // raw access ignores the chain
    assert_eq!(t.raw_get(&"greeting".into()), None);
}

#[test]
fn test_index_function_receives_table_and_key() {
    let t = TablePtr::new();
    let handler = LuaFunction::new("index", |args| {
        assert!(args[0].is_table());
        let key = args[1].as_str().unwrap_or_default().to_uppercase();
        Ok(MultiValue::single(key.into()))
    });
    t.set_metatable(Some(metatable_with("__index", handler.into())))
        .unwrap();
    t.raw_set("present".into(), 1.into()).unwrap();

    assert_eq!(t.get(&"abc".into()).unwrap(), LuaValue::string("ABC"));
    assert_eq!(t.get(&"present".into()).unwrap(), LuaValue::Integer(1));
    assert_eq!(t.get_int(3).unwrap(), LuaValue::string(""));
}

#[test]
fn test_newindex_only_for_absent_keys() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let handler = LuaFunction::new("newindex", move |args| {
        sink.borrow_mut().push(args[1].clone());
        Ok(MultiValue::empty())
    });

    let t = TablePtr::new();
    t.raw_set("existing".into(), 1.into()).unwrap();
    t.set_metatable(Some(metatable_with("__newindex", handler.into())))
        .unwrap();

    t.set("existing".into(), 2.into()).unwrap();
    t.set("fresh".into(), 3.into()).unwrap();

    assert_eq!(t.raw_get(&"existing".into()), Some(LuaValue::Integer(2)));
    assert_eq!(t.raw_get(&"fresh".into()), None);
    assert_eq!(*log.borrow(), vec![LuaValue::string("fresh")]);
}

#[test]
fn test_newindex_table_redirects_writes() {
    let store = TablePtr::new();
    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__newindex", store.to_value())))
        .unwrap();

    t.set("k".into(), "v".into()).unwrap();
    assert_eq!(t.raw_get(&"k".into()), None);
    assert_eq!(store.raw_get(&"k".into()), Some(LuaValue::string("v")));
}

#[test]
fn test_metatable_without_handlers_writes_through() {
    let t = TablePtr::new();
    t.set_metatable(Some(TablePtr::new())).unwrap();
    t.set("a".into(), 1.into()).unwrap();
    assert_eq!(t.get(&"a".into()).unwrap(), LuaValue::Integer(1));
}

#[test]
fn test_newindex_function_accepts_nil_key() {
    let hits = Rc::new(RefCell::new(0));
    let counter = hits.clone();
    let handler = LuaFunction::new("newindex", move |_| {
        *counter.borrow_mut() += 1;
        Ok(MultiValue::empty())
    });
    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__newindex", handler.into())))
        .unwrap();
    t.set(LuaValue::Nil, 1.into()).unwrap();
    assert_eq!(*hits.borrow(), 1);

    // a table handler does not make a nil key valid
    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__newindex", TablePtr::new().into())))
        .unwrap();
    assert!(t.set(LuaValue::Nil, 1.into()).is_err());
}

#[test]
fn test_handler_may_write_to_same_table() {
    let t = TablePtr::new();
    let target = t.clone();
    let handler = LuaFunction::new("newindex", move |args| {
        target.raw_set(args[1].clone(), args[2].clone())?;
        Ok(MultiValue::empty())
    });
    t.set_metatable(Some(metatable_with("__newindex", handler.into())))
        .unwrap();
    t.set("x".into(), 5.into()).unwrap();
    assert_eq!(t.raw_get(&"x".into()), Some(LuaValue::Integer(5)));
}

#[test]
fn test_len_metamethod() {
    let t = TablePtr::new();
    t.insert(0, 1.into());
    assert_eq!(t.length().unwrap(), LuaValue::Integer(1));

    let handler = LuaFunction::new("len", |_| Ok(MultiValue::single(42.into())));
    t.set_metatable(Some(metatable_with("__len", handler.into())))
        .unwrap();
    assert_eq!(t.length().unwrap(), LuaValue::Integer(42));
    assert_eq!(t.raw_len(), 1);

    let integral = LuaFunction::new("len", |_| Ok(MultiValue::single(LuaValue::Float(7.0))));
    t.set_metatable(Some(metatable_with("__len", integral.into())))
        .unwrap();
    assert_eq!(t.length().unwrap(), LuaValue::Integer(7));
}

#[test]
fn test_len_must_be_integer() {
    let t = TablePtr::new();
    let handler = LuaFunction::new("len", |_| Ok(MultiValue::single("three".into())));
    t.set_metatable(Some(metatable_with("__len", handler.into())))
        .unwrap();
    let err = t.length().unwrap_err();
    assert!(matches!(err, LuaError::NonIntegerLength { .. }));
    assert_eq!(err.to_string(), "table length is not an integer: three");

    let fractional = LuaFunction::new("len", |_| Ok(MultiValue::single(LuaValue::Float(1.5))));
    t.set_metatable(Some(metatable_with("__len", fractional.into())))
        .unwrap();
    assert!(t.length().is_err());
}

#[test]
fn test_eq_metamethod() {
    let always = LuaFunction::new("eq", |_| Ok(MultiValue::single(true.into())));
    let mt = metatable_with("__eq", always.into());

    let a = TablePtr::new();
    let b = TablePtr::new();
    // plain tables compare by identity
    assert!(!a.equals(&b.to_value()).unwrap());
    assert!(a.equals(&a.to_value()).unwrap());

    a.set_metatable(Some(mt.clone())).unwrap();
    assert!(a.equals(&b.to_value()).unwrap());
    // the right operand's handler is used when the left has none
    assert!(b.equals(&a.to_value()).unwrap());

    // never consulted for non-tables
    assert!(!a.equals(&LuaValue::Integer(1)).unwrap());
}

#[test]
fn test_eq_not_called_for_identical_tables() {
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let handler = LuaFunction::new("eq", move |_| {
        *counter.borrow_mut() += 1;
        Ok(MultiValue::single(false.into()))
    });
    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__eq", handler.into())))
        .unwrap();
    assert!(t.equals(&t.to_value()).unwrap());
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_protected_metatable() {
    let mt = metatable_with("__metatable", "locked".into());
    let t = TablePtr::new();
    t.set_metatable(Some(mt.clone())).unwrap();

    let err = t.set_metatable(Some(TablePtr::new())).unwrap_err();
    assert_eq!(err, LuaError::ProtectedMetatable);
    let err = t.set_metatable(None).unwrap_err();
    assert_eq!(err.to_string(), "cannot change a protected metatable");
    assert!(t.get_metatable().unwrap().ptr_eq(&mt));
}

#[test]
fn test_get_and_clear_metatable() {
    let t = TablePtr::new();
    assert!(t.get_metatable().is_none());
    let mt = TablePtr::new();
    t.set_metatable(Some(mt.clone())).unwrap();
    assert!(t.get_metatable().unwrap().ptr_eq(&mt));
    t.set_metatable(None).unwrap();
    assert!(t.get_metatable().is_none());
}

#[test]
fn test_userdata_index_chain() {
    let methods = TablePtr::new();
    methods.raw_set("kind".into(), "point".into()).unwrap();
    let ud = LuaUserdata::new((1.0f64, 2.0f64));
    ud.set_metatable(Some(metatable_with("__index", methods.to_value())));

    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__index", ud.clone().into())))
        .unwrap();
    assert_eq!(t.get(&"kind".into()).unwrap(), LuaValue::string("point"));
    assert_eq!(ud.downcast_ref(|p: &(f64, f64)| p.1), Some(2.0));
}

#[test]
fn test_index_error_from_non_table_handler() {
    let t = TablePtr::new();
    t.set_metatable(Some(metatable_with("__index", true.into())))
        .unwrap();
    let err = t.get(&"x".into()).unwrap_err();
    assert_eq!(err.to_string(), "attempt to index a boolean value");
}

#[test]
fn test_lt_metamethod_drives_default_sort() {
    let mt = TablePtr::new();
    let lt = LuaFunction::new("lt", |args| {
        let a = args[0].as_table().and_then(|t| t.raw_get_str("w"));
        let b = args[1].as_table().and_then(|t| t.raw_get_str("w"));
        let a = a.and_then(|v| v.as_integer()).unwrap_or_default();
        let b = b.and_then(|v| v.as_integer()).unwrap_or_default();
        Ok(MultiValue::single((a < b).into()))
    });
    mt.raw_set("__lt".into(), lt.into()).unwrap();

    let list = TablePtr::new();
    for w in [3, 1, 2] {
        let item = TablePtr::new();
        item.raw_set("w".into(), w.into()).unwrap();
        item.set_metatable(Some(mt.clone())).unwrap();
        list.insert(0, item.into());
    }
    list.sort(None).unwrap();
    let weights: Vec<i64> = (1..=3)
        .map(|i| {
            list.raw_get_int(i)
                .and_then(|v| v.as_table().and_then(|t| t.raw_get_str("w")))
                .and_then(|v| v.as_integer())
                .unwrap()
        })
        .collect();
    assert_eq!(weights, vec![1, 2, 3]);
}
