/// Serializer for converting Lua values to serde_json::Value
///
/// - Lua nil -> JSON null
/// - Lua boolean -> JSON boolean
/// - Lua number -> JSON number
/// - Lua string -> JSON string
/// - Lua table (keys exactly 1..n) -> JSON array
/// - Lua table (anything else) -> JSON object
/// - functions, userdata, threads -> error
use std::collections::HashSet;

use serde_json::{Map, Number, Value as JsonValue};

use crate::lua_value::{LuaValue, TablePtr};

/// Convert a Lua value to a serde_json::Value
pub fn to_value(lua_value: &LuaValue) -> Result<JsonValue, String> {
    let mut visited = HashSet::new();
    to_value_internal(lua_value, &mut visited)
}

/// Convert a Lua value to a JSON string
pub fn to_string(lua_value: &LuaValue, pretty: bool) -> Result<String, String> {
    let json_value = to_value(lua_value)?;

    if pretty {
        serde_json::to_string_pretty(&json_value)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))
    } else {
        serde_json::to_string(&json_value).map_err(|e| format!("Failed to serialize to JSON: {}", e))
    }
}

fn to_value_internal(lua_value: &LuaValue, visited: &mut HashSet<usize>) -> Result<JsonValue, String> {
    match lua_value {
        LuaValue::Nil => Ok(JsonValue::Null),
        LuaValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        LuaValue::Integer(i) => Ok(JsonValue::Number(Number::from(*i))),
        LuaValue::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("Invalid number: {}", f)),
        LuaValue::String(s) => Ok(JsonValue::String(s.as_str().to_string())),
        LuaValue::Table(table) => {
            // Check for circular reference
            let ptr_addr = table.addr();
            if !visited.insert(ptr_addr) {
                return Err("Circular reference detected in table".to_string());
            }

            let pairs = table_pairs(table)?;
            let result = if is_array_like(&pairs) {
                pairs
                    .iter()
                    .map(|(_, v)| to_value_internal(v, visited))
                    .collect::<Result<Vec<_>, _>>()
                    .map(JsonValue::Array)
            } else {
                table_to_json_object(&pairs, visited)
            };

            visited.remove(&ptr_addr);
            result
        }
        other => Err(format!("Cannot serialize Lua {} to JSON", other.type_name())),
    }
}

/// All pairs, sorted by integer key when every key is a positive integer
fn table_pairs(table: &TablePtr) -> Result<Vec<(LuaValue, LuaValue)>, String> {
    let mut pairs = Vec::new();
    let mut key = LuaValue::Nil;
    while let Some((k, v)) = table.next(&key).map_err(|e| e.to_string())? {
        pairs.push((k.clone(), v));
        key = k;
    }
    if pairs.iter().all(|(k, _)| matches!(k, LuaValue::Integer(i) if *i > 0)) {
        pairs.sort_by_key(|(k, _)| k.as_integer());
    }
    Ok(pairs)
}

fn is_array_like(pairs: &[(LuaValue, LuaValue)]) -> bool {
    // Empty table is treated as array
    pairs
        .iter()
        .enumerate()
        .all(|(i, (k, _))| matches!(k, LuaValue::Integer(n) if *n == i as i64 + 1))
}

fn table_to_json_object(
    pairs: &[(LuaValue, LuaValue)],
    visited: &mut HashSet<usize>,
) -> Result<JsonValue, String> {
    let mut map = Map::new();
    for (key, value) in pairs {
        let key_str = match key {
            LuaValue::String(s) => s.as_str().to_string(),
            LuaValue::Integer(_) | LuaValue::Float(_) => key.to_string(),
            LuaValue::Boolean(b) => b.to_string(),
            other => {
                return Err(format!(
                    "Cannot use Lua {} as a JSON object key",
                    other.type_name()
                ));
            }
        };
        map.insert(key_str, to_value_internal(value, visited)?);
    }
    Ok(JsonValue::Object(map))
}
