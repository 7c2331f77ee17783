use std::rc::Rc;

use mlua::{Error as LuaError, Function, Lua, Result as LuaResult, Table, Value, Variadic};

pub(crate) const READ_ONLY_MESSAGE: &str = "Attempt to modify read-only table";

const IPAIRS_FOR_ARRAY_KEY: &str = "esm_engine.ipairs_for_array";

/// Wraps `table` in a proxy that rejects writes. Reads, `#` and `pairs`
/// see the wrapped table.
pub(crate) fn make_read_only<'lua>(lua: &'lua Lua, table: Table<'lua>) -> LuaResult<Table<'lua>> {
    wrap(lua, table, false)
}

/// Like [`make_read_only`], but reading a key the table does not hold is an
/// error instead of nil.
pub(crate) fn make_strict_read_only<'lua>(
    lua: &'lua Lua,
    table: Table<'lua>,
) -> LuaResult<Table<'lua>> {
    wrap(lua, table, true)
}

fn wrap<'lua>(lua: &'lua Lua, table: Table<'lua>, strict: bool) -> LuaResult<Table<'lua>> {
    let key = Rc::new(lua.create_registry_value(table.clone())?);
    let metatable = lua.create_table()?;

    if strict {
        let index_key = key.clone();
        let index = lua.create_function(move |lua_ctx, (_proxy, field): (Table, Value)| {
            let inner: Table = lua_ctx.registry_value(&index_key)?;
            let value: Value = inner.raw_get(field.clone())?;
            if value.is_nil() {
                return Err(LuaError::RuntimeError(format!(
                    "Key not found: {}",
                    describe_key(&field)
                )));
            }
            Ok(value)
        })?;
        metatable.set("__index", index)?;
    } else {
        metatable.set("__index", table)?;
    }

    metatable.set("__newindex", reject_writes(lua)?)?;

    let len_key = key.clone();
    metatable.set(
        "__len",
        lua.create_function(move |lua_ctx, _: Value| {
            let inner: Table = lua_ctx.registry_value(&len_key)?;
            Ok(inner.raw_len())
        })?,
    )?;

    metatable.set(
        "__pairs",
        lua.create_function(move |lua_ctx, _: Value| {
            let inner: Table = lua_ctx.registry_value(&key)?;
            let next: Function = lua_ctx.globals().get("next")?;
            Ok((next, inner, Value::Nil))
        })?,
    )?;
    metatable.set("__metatable", false)?;

    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(metatable));
    Ok(proxy)
}

pub(crate) fn reject_writes(lua: &Lua) -> LuaResult<Function<'_>> {
    lua.create_function(|_, _: Variadic<Value>| -> LuaResult<()> {
        Err(LuaError::RuntimeError(READ_ONLY_MESSAGE.to_string()))
    })
}

/// Iterator factory for array-like proxies: walks `obj[1]`, `obj[2]`, ...
/// through the proxy's `__index` until the first nil.
pub(crate) fn ipairs_for_array(lua: &Lua) -> LuaResult<Function<'_>> {
    if let Value::Function(existing) = lua.named_registry_value::<Value>(IPAIRS_FOR_ARRAY_KEY)? {
        return Ok(existing);
    }

    let step = lua.create_function(|_, (container, index): (Table, i64)| {
        let next = index + 1;
        let value: Value = container.get(next)?;
        if value.is_nil() {
            return Ok((Value::Nil, Value::Nil));
        }
        Ok((Value::Integer(next), value))
    })?;
    let step_key = lua.create_registry_value(step)?;
    let factory = lua.create_function(move |lua_ctx, container: Table| {
        let step: Function = lua_ctx.registry_value(&step_key)?;
        Ok((step, container, 0))
    })?;
    lua.set_named_registry_value(IPAIRS_FOR_ARRAY_KEY, factory.clone())?;
    Ok(factory)
}

pub(crate) fn describe_key(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_string_lossy().into_owned(),
        Value::Integer(number) => number.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Boolean(flag) => flag.to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lua: &Lua) -> Table<'_> {
        let table = lua.create_table().unwrap();
        table.set("name", "fargoth").unwrap();
        table.set(1, "first").unwrap();
        table.set(2, "second").unwrap();
        table
    }

    #[test]
    fn read_only_rejects_writes_but_reads_through() {
        let lua = Lua::new();
        let proxy = make_read_only(&lua, sample(&lua)).unwrap();
        lua.globals().set("t", proxy).unwrap();

        let name: String = lua.load("return t.name").eval().unwrap();
        assert_eq!(name, "fargoth");
        let missing: Value = lua.load("return t.absent").eval().unwrap();
        assert!(missing.is_nil());
        let len: i64 = lua.load("return #t").eval().unwrap();
        assert_eq!(len, 2);

        let err = lua.load("t.name = 'other'").exec().unwrap_err();
        assert!(err.to_string().contains(READ_ONLY_MESSAGE));
        let meta: Value = lua.load("return getmetatable(t)").eval().unwrap();
        assert_eq!(meta, Value::Boolean(false));
    }

    #[test]
    fn strict_read_only_rejects_missing_keys() {
        let lua = Lua::new();
        let proxy = make_strict_read_only(&lua, sample(&lua)).unwrap();
        lua.globals().set("t", proxy).unwrap();

        let name: String = lua.load("return t.name").eval().unwrap();
        assert_eq!(name, "fargoth");
        let err = lua.load("return t.absent").eval::<Value>().unwrap_err();
        assert!(err.to_string().contains("Key not found: absent"));
    }

    #[test]
    fn pairs_walks_the_wrapped_table() {
        let lua = Lua::new();
        let proxy = make_read_only(&lua, sample(&lua)).unwrap();
        lua.globals().set("t", proxy).unwrap();

        let count: i64 = lua
            .load("local n = 0 for _ in pairs(t) do n = n + 1 end return n")
            .eval()
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn ipairs_for_array_stops_at_first_nil() {
        let lua = Lua::new();
        let iterate = ipairs_for_array(&lua).unwrap();
        lua.globals().set("iterate", iterate).unwrap();
        lua.globals().set("t", sample(&lua)).unwrap();

        let joined: String = lua
            .load(
                "local out = {} for i, v in iterate(t) do out[#out + 1] = i .. '=' .. v end \
                 return table.concat(out, ',')",
            )
            .eval()
            .unwrap();
        assert_eq!(joined, "1=first,2=second");
    }
}
