//! Conversion between [`DynamicValue`] and Lua values.
//!
//! Lua has a single table type, so the direction Lua → tree has to decide
//! between list and map: a non-empty table whose keys are all positive
//! integers becomes a list ordered by key, every other table becomes a map
//! with stringified keys. Holes left by `t[i] = nil` are dropped, so that
//! idiom removes the element. Lua strings that are not valid UTF-8 come back
//! as bytes.

use super::{DynamicMap, DynamicValue};
use mlua::prelude::*;

/// Tables nested deeper than this are rejected; it also stops
/// self-referencing tables from recursing forever.
const MAX_DEPTH: usize = 128;

impl IntoLua for DynamicValue {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        Ok(match self {
            Self::String(s) => LuaValue::String(lua.create_string(&s)?),
            Self::Bool(b) => LuaValue::Boolean(b),
            Self::Int(i) => LuaValue::Integer(i),
            Self::Float(f) => LuaValue::Number(f),
            Self::Bytes(b) => LuaValue::String(lua.create_string(&b)?),
            Self::List(items) => {
                let table = lua.create_table()?;
                for (idx, item) in items.into_iter().enumerate() {
                    table.raw_set(idx + 1, item)?;
                }
                LuaValue::Table(table)
            }
            Self::Map(entries) => {
                let table = lua.create_table()?;
                for (key, value) in entries {
                    table.raw_set(key, value)?;
                }
                LuaValue::Table(table)
            }
            Self::Absent => LuaValue::Nil,
        })
    }
}

impl FromLua for DynamicValue {
    fn from_lua(value: LuaValue, _lua: &Lua) -> LuaResult<Self> {
        from_lua_at_depth(value, 0)
    }
}

fn from_lua_at_depth(value: LuaValue, depth: usize) -> LuaResult<DynamicValue> {
    match value {
        LuaValue::Nil => Ok(DynamicValue::Absent),
        LuaValue::Boolean(b) => Ok(DynamicValue::Bool(b)),
        LuaValue::Integer(i) => Ok(DynamicValue::Int(i)),
        LuaValue::Number(n) => Ok(DynamicValue::Float(n)),
        LuaValue::String(s) => {
            let bytes = s.as_bytes();
            Ok(match std::str::from_utf8(&bytes) {
                Ok(text) => DynamicValue::String(text.to_string()),
                Err(_) => DynamicValue::Bytes(bytes.to_vec()),
            })
        }
        LuaValue::Table(table) => table_to_dynamic(&table, depth + 1),
        other => Err(LuaError::RuntimeError(format!(
            "cannot convert Lua {} into a telemetry value",
            other.type_name()
        ))),
    }
}

fn table_to_dynamic(table: &LuaTable, depth: usize) -> LuaResult<DynamicValue> {
    if depth > MAX_DEPTH {
        return Err(LuaError::RuntimeError(format!(
            "table nesting exceeds {MAX_DEPTH} levels"
        )));
    }

    let mut pairs = Vec::new();
    for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        pairs.push(pair?);
    }

    if is_positional(&pairs) {
        pairs.sort_by_key(|(key, _)| match key {
            LuaValue::Integer(idx) => *idx,
            _ => 0,
        });
        let items = pairs
            .into_iter()
            .map(|(_, value)| from_lua_at_depth(value, depth))
            .collect::<LuaResult<Vec<_>>>()?;
        return Ok(DynamicValue::List(items));
    }

    let mut map = DynamicMap::new();
    for (key, value) in pairs {
        let key = match key {
            LuaValue::String(s) => String::from_utf8_lossy(&s.as_bytes()).into_owned(),
            LuaValue::Integer(i) => i.to_string(),
            LuaValue::Number(n) => n.to_string(),
            other => {
                return Err(LuaError::RuntimeError(format!(
                    "table keys must be strings or numbers, found {}",
                    other.type_name()
                )))
            }
        };
        map.insert(key, from_lua_at_depth(value, depth)?);
    }
    Ok(DynamicValue::Map(map))
}

/// A non-empty table keyed only by positive integers.
fn is_positional(pairs: &[(LuaValue, LuaValue)]) -> bool {
    !pairs.is_empty()
        && pairs
            .iter()
            .all(|(key, _)| matches!(key, LuaValue::Integer(i) if *i >= 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_through_lua(value: DynamicValue) -> DynamicValue {
        let lua = Lua::new();
        lua.globals().set("tree", value).unwrap();
        lua.globals().get::<DynamicValue>("tree").unwrap()
    }

    #[test]
    fn test_scalars_keep_their_runtime_type() {
        assert_eq!(roundtrip_through_lua(DynamicValue::Int(3)), DynamicValue::Int(3));
        assert_eq!(
            roundtrip_through_lua(DynamicValue::Float(3.0)),
            DynamicValue::Float(3.0)
        );
        assert_eq!(
            roundtrip_through_lua(DynamicValue::from("host")),
            DynamicValue::from("host")
        );
    }

    #[test]
    fn test_invalid_utf8_comes_back_as_bytes() {
        let raw = vec![0xff, 0x00, 0xfe];
        assert_eq!(
            roundtrip_through_lua(DynamicValue::Bytes(raw.clone())),
            DynamicValue::Bytes(raw)
        );
    }

    #[test]
    fn test_list_and_map_tables() {
        let lua = Lua::new();
        let list: DynamicValue = lua.load("return {10, 20, 30}").eval().unwrap();
        assert_eq!(
            list,
            DynamicValue::List(vec![
                DynamicValue::Int(10),
                DynamicValue::Int(20),
                DynamicValue::Int(30)
            ])
        );

        let map: DynamicValue = lua.load("return {[0] = 'z', [1] = 'a'}").eval().unwrap();
        let DynamicValue::Map(map) = map else {
            panic!("a zero key should make a map");
        };
        assert_eq!(map.get("0"), Some(&DynamicValue::from("z")));
        assert_eq!(map.get("1"), Some(&DynamicValue::from("a")));
    }

    #[test]
    fn test_nil_assignment_removes_list_element() {
        let lua = Lua::new();
        let items: Vec<DynamicValue> = ["a", "b", "c", "d"]
            .into_iter()
            .map(DynamicValue::from)
            .collect();
        lua.globals().set("items", DynamicValue::List(items)).unwrap();

        let edited: DynamicValue = lua
            .load("items[2] = nil; items[4] = nil; return items")
            .eval()
            .unwrap();
        assert_eq!(
            edited,
            DynamicValue::List(vec![DynamicValue::from("a"), DynamicValue::from("c")])
        );

        let sparse: DynamicValue = lua.load("return {[5] = 'e', [2] = 'b'}").eval().unwrap();
        assert_eq!(
            sparse,
            DynamicValue::List(vec![DynamicValue::from("b"), DynamicValue::from("e")])
        );
    }

    #[test]
    fn test_lua_edits_are_visible() {
        let lua = Lua::new();
        let mut node = DynamicMap::new();
        node.insert("count".to_string(), DynamicValue::Int(1));
        lua.globals().set("tree", DynamicValue::Map(node)).unwrap();

        let edited: DynamicValue = lua
            .load("tree.count = tree.count + 1; tree.extra = 0.5; return tree")
            .eval()
            .unwrap();
        let DynamicValue::Map(edited) = edited else {
            panic!("expected a map");
        };
        assert_eq!(edited.get("count"), Some(&DynamicValue::Int(2)));
        assert_eq!(edited.get("extra"), Some(&DynamicValue::Float(0.5)));
    }

    #[test]
    fn test_function_values_are_rejected() {
        let lua = Lua::new();
        let result = lua.load("return {f = function() end}").eval::<DynamicValue>();
        assert!(result.is_err());
    }

    #[test]
    fn test_self_referencing_table_is_rejected() {
        let lua = Lua::new();
        let result = lua.load("local t = {}; t.me = t; return t").eval::<DynamicValue>();
        assert!(result.is_err());
    }
}
