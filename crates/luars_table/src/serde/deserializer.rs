/// Deserializer for converting serde_json::Value to Lua values
///
/// - JSON null -> Lua nil
/// - JSON boolean -> Lua boolean
/// - JSON number -> Lua integer when it fits, else float
/// - JSON string -> Lua string
/// - JSON array -> Lua table (array-like)
/// - JSON object -> Lua table (map-like)
use serde_json::Value as JsonValue;

use crate::lua_value::{LuaTable, LuaValue, TablePtr};

/// Convert a serde_json::Value to a Lua value
pub fn from_value(json_value: &JsonValue) -> Result<LuaValue, String> {
    match json_value {
        JsonValue::Null => Ok(LuaValue::nil()),

        JsonValue::Bool(b) => Ok(LuaValue::boolean(*b)),

        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(LuaValue::integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(LuaValue::float(f))
            } else {
                Err("Invalid JSON number".to_string())
            }
        }

        JsonValue::String(s) => Ok(LuaValue::string(s)),

        JsonValue::Array(arr) => {
            // null elements leave holes, as in a table constructor
            let values = arr.iter().map(from_value).collect::<Result<Vec<_>, _>>()?;
            let table = LuaTable::from_parts(Vec::new(), values).map_err(|e| e.to_string())?;
            Ok(LuaValue::Table(TablePtr::from_table(table)))
        }

        JsonValue::Object(obj) => {
            let named = obj
                .iter()
                .map(|(k, v)| Ok((LuaValue::string(k), from_value(v)?)))
                .collect::<Result<Vec<_>, String>>()?;
            let table = LuaTable::from_parts(named, Vec::new()).map_err(|e| e.to_string())?;
            Ok(LuaValue::Table(TablePtr::from_table(table)))
        }
    }
}

/// Convert a JSON string to a Lua value
pub fn from_str(json_str: &str) -> Result<LuaValue, String> {
    let json_value: JsonValue =
        serde_json::from_str(json_str).map_err(|e| format!("Failed to parse JSON: {}", e))?;

    from_value(&json_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serde::{lua_to_json, lua_to_json_string};

    #[test]
    fn test_json_round_trip_shapes() {
        let value = from_str(r#"{"name": "lua", "list": [1, 2.5, "x"], "flag": true}"#).unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.raw_get_str("name"), Some(LuaValue::string("lua")));
        let list = table.raw_get_str("list").unwrap();
        assert_eq!(list.as_table().unwrap().raw_len(), 3);

        let json = lua_to_json(&value).unwrap();
        assert_eq!(json["list"][1], serde_json::json!(2.5));
        assert_eq!(json["flag"], serde_json::json!(true));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let t = TablePtr::new();
        t.raw_set("self".into(), t.to_value()).unwrap();
        assert!(lua_to_json_string(&t.to_value(), false).is_err());
        // break the cycle so the table is freed
        t.raw_set("self".into(), LuaValue::Nil).unwrap();
    }
}
