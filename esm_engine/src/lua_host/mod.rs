mod dialogue;
mod read_only;

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use mlua::{FromLuaMulti, Function, Lua, LuaOptions, Result as LuaResult, StdLib, Value, Variadic};

use crate::store::DialogueStore;
use crate::vfs::Vfs;

/// Version of the script-facing `core` table layout.
pub const API_REVISION: i64 = 1;

/// Engine state the bindings read from. Everything is shared read-only.
#[derive(Clone)]
pub struct LuaContext {
    pub store: Rc<DialogueStore>,
    pub vfs: Option<Rc<dyn Vfs>>,
}

impl LuaContext {
    pub fn new(store: Rc<DialogueStore>, vfs: Option<Rc<dyn Vfs>>) -> Self {
        LuaContext { store, vfs }
    }
}

pub struct LuaHost {
    lua: Lua,
}

impl LuaHost {
    pub fn new(context: LuaContext) -> Result<Self> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
            .context("initialising Lua runtime with standard libraries")?;
        install_print(&lua).context("installing Lua print hook")?;
        install_core(&lua, &context).context("installing core bindings")?;
        log::debug!("Lua host ready with {} dialogue records", context.store.len());
        Ok(LuaHost { lua })
    }

    pub fn run_chunk(&self, name: &str, source: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .with_context(|| format!("running Lua chunk {name}"))
    }

    pub fn run_file(&self, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading Lua script {}", path.display()))?;
        log::info!("running {}", path.display());
        self.run_chunk(&path.display().to_string(), &source)
    }

    pub fn eval<'lua, R: FromLuaMulti<'lua>>(&'lua self, source: &str) -> Result<R> {
        self.lua
            .load(source)
            .eval()
            .context("evaluating Lua expression")
    }
}

fn install_core(lua: &Lua, context: &LuaContext) -> LuaResult<()> {
    let core = lua.create_table()?;
    core.set("API_REVISION", API_REVISION)?;
    core.set("dialogue", dialogue::init_core_dialogue_bindings(lua, context)?)?;
    lua.globals()
        .set("core", read_only::make_read_only(lua, core)?)
}

/// Routes script `print` through the logger so it honours `RUST_LOG`.
fn install_print(lua: &Lua) -> LuaResult<()> {
    let print = lua.create_function(|lua_ctx, args: Variadic<Value>| {
        let tostring: Function = lua_ctx.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for value in args.iter() {
            parts.push(tostring.call::<_, String>(value.clone())?);
        }
        log::info!(target: "lua", "{}", parts.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print)
}
