use std::rc::Rc;

use esm_formats::{DialInfo, Dialogue, DialogueType, QuestStatus, RefId};
use mlua::{IntoLua, Lua, Result as LuaResult, Table, Value};

use super::read_only::{ipairs_for_array, make_read_only, make_strict_read_only, reject_writes};
use super::LuaContext;
use crate::vfs::{correct_sound_path, Vfs};

const DIALOGUE_SECTIONS: [(&str, DialogueType); 5] = [
    ("journal", DialogueType::Journal),
    ("topic", DialogueType::Topic),
    ("greeting", DialogueType::Greeting),
    ("persuasion", DialogueType::Persuasion),
    ("voice", DialogueType::Voice),
];

/// Builds the `core.dialogue` table: one strict read-only section per
/// dialogue type, each holding the `records` store of that type.
pub(crate) fn init_core_dialogue_bindings<'lua>(
    lua: &'lua Lua,
    context: &LuaContext,
) -> LuaResult<Table<'lua>> {
    let api = lua.create_table()?;
    for (name, kind) in DIALOGUE_SECTIONS {
        let section = lua.create_table()?;
        section.set("records", create_store_object(lua, context, kind)?)?;
        api.set(name, make_strict_read_only(lua, section)?)?;
    }
    make_read_only(lua, api)
}

fn store_type_name(kind: DialogueType) -> String {
    format!("ESM3_Dialogue_Type{}", kind.as_raw())
}

/// Converts a 1-based Lua index into a 0-based position.
fn lua_index(key: &Value) -> Option<usize> {
    match key {
        Value::Integer(index) if *index >= 1 => usize::try_from(*index - 1).ok(),
        Value::Number(index) if index.is_finite() && index.fract() == 0.0 && *index >= 1.0 => {
            Some(*index as usize - 1)
        }
        _ => None,
    }
}

fn finish_object<'lua>(
    lua: &'lua Lua,
    metatable: Table<'lua>,
    name: &str,
) -> LuaResult<Table<'lua>> {
    metatable.set("__name", name)?;
    metatable.set("__newindex", reject_writes(lua)?)?;
    metatable.set("__metatable", false)?;
    let object = lua.create_table()?;
    object.set_metatable(Some(metatable));
    Ok(object)
}

fn create_store_object<'lua>(
    lua: &'lua Lua,
    context: &LuaContext,
    kind: DialogueType,
) -> LuaResult<Table<'lua>> {
    let type_name = store_type_name(kind);
    let metatable = lua.create_table()?;

    let tostring_store = context.store.clone();
    let tostring_name = type_name.clone();
    metatable.set(
        "__tostring",
        lua.create_function(move |_, _: Value| {
            let count = tostring_store.filtered(kind).len();
            Ok(format!("{{{count} {tostring_name} records}}"))
        })?,
    )?;

    let len_store = context.store.clone();
    metatable.set(
        "__len",
        lua.create_function(move |_, _: Value| Ok(len_store.filtered(kind).len()))?,
    )?;

    let index_context = context.clone();
    metatable.set(
        "__index",
        lua.create_function(move |lua_ctx, (_store, key): (Value, Value)| {
            let records = index_context.store.filtered(kind);
            let record = match &key {
                Value::String(id) => id
                    .to_str()
                    .ok()
                    .and_then(|id| records.search(&RefId::deserialize_text(id))),
                other => lua_index(other).and_then(|index| records.at(index)),
            };
            match record {
                Some(record) => Ok(Value::Table(create_dialogue_object(
                    lua_ctx,
                    &index_context,
                    record.clone(),
                )?)),
                None => Ok(Value::Nil),
            }
        })?,
    )?;

    let pairs = ipairs_for_array(lua)?;
    metatable.set("__pairs", pairs.clone())?;
    metatable.set("__ipairs", pairs)?;

    finish_object(lua, metatable, &format!("{type_name} Store"))
}

fn create_dialogue_object<'lua>(
    lua: &'lua Lua,
    context: &LuaContext,
    record: Rc<Dialogue>,
) -> LuaResult<Table<'lua>> {
    let metatable = lua.create_table()?;

    let tostring_record = record.clone();
    metatable.set(
        "__tostring",
        lua.create_function(move |_, _: Value| {
            Ok(format!("ESM3_Dialogue[{}]", tostring_record.id.to_debug_string()))
        })?,
    )?;

    let index_context = context.clone();
    metatable.set(
        "__index",
        lua.create_function(move |lua_ctx, (_record, key): (Value, Value)| {
            let Value::String(key) = key else {
                return Ok(Value::Nil);
            };
            let Ok(key) = key.to_str() else {
                return Ok(Value::Nil);
            };
            match key {
                "id" => record.id.serialize_text().into_lua(lua_ctx),
                "name" => record.string_id.as_str().into_lua(lua_ctx),
                "questName" => record.quest_name().into_lua(lua_ctx),
                "infos" => Ok(Value::Table(create_info_list(
                    lua_ctx,
                    &index_context,
                    record.clone(),
                )?)),
                _ => Ok(Value::Nil),
            }
        })?,
    )?;

    finish_object(lua, metatable, "ESM3_Dialogue")
}

fn create_info_list<'lua>(
    lua: &'lua Lua,
    context: &LuaContext,
    record: Rc<Dialogue>,
) -> LuaResult<Table<'lua>> {
    let metatable = lua.create_table()?;

    let tostring_record = record.clone();
    metatable.set(
        "__tostring",
        lua.create_function(move |_, _: Value| {
            Ok(format!(
                "{{{} ESM3_Dialogue[{}] info elements}}",
                tostring_record.infos.len(),
                tostring_record.id.to_debug_string()
            ))
        })?,
    )?;

    let len_record = record.clone();
    metatable.set(
        "__len",
        lua.create_function(move |_, _: Value| Ok(len_record.infos.len()))?,
    )?;

    let index_context = context.clone();
    metatable.set(
        "__index",
        lua.create_function(move |lua_ctx, (_infos, key): (Value, Value)| {
            match lua_index(&key).filter(|index| *index < record.infos.len()) {
                Some(index) => Ok(Value::Table(create_info_object(
                    lua_ctx,
                    &index_context,
                    record.clone(),
                    index,
                )?)),
                None => Ok(Value::Nil),
            }
        })?,
    )?;

    let pairs = ipairs_for_array(lua)?;
    metatable.set("__pairs", pairs.clone())?;
    metatable.set("__ipairs", pairs)?;

    finish_object(lua, metatable, "ESM3_Dialogue_Infos")
}

fn create_info_object<'lua>(
    lua: &'lua Lua,
    context: &LuaContext,
    record: Rc<Dialogue>,
    index: usize,
) -> LuaResult<Table<'lua>> {
    let metatable = lua.create_table()?;

    let tostring_record = record.clone();
    metatable.set(
        "__tostring",
        lua.create_function(move |_, _: Value| {
            let info = &tostring_record.infos[index];
            Ok(format!("ESM3_Dialogue_Info[{}]", info.id.to_debug_string()))
        })?,
    )?;

    let vfs = context.vfs.clone();
    metatable.set(
        "__index",
        lua.create_function(move |lua_ctx, (_info, key): (Value, Value)| {
            let Value::String(key) = key else {
                return Ok(Value::Nil);
            };
            let Ok(key) = key.to_str() else {
                return Ok(Value::Nil);
            };
            info_field(lua_ctx, &record.infos[index], key, vfs.as_deref())
        })?,
    )?;

    finish_object(lua, metatable, "ESM3_Dialogue_Info")
}

/// Reads one script-visible property of an info. Journal infos carry quest
/// data only; every actor filter is nil for them.
fn info_field<'lua>(
    lua: &'lua Lua,
    info: &DialInfo,
    key: &str,
    vfs: Option<&dyn Vfs>,
) -> LuaResult<Value<'lua>> {
    let journal = info.is_journal();
    let id_filter = |id: &RefId| (!journal && !id.is_empty()).then(|| id.serialize_text());
    let raw_filter = |raw: i8| (!journal && raw != -1).then_some(i32::from(raw));
    let quest_flag = |status: QuestStatus| journal.then_some(info.quest_status == status);

    match key {
        "id" => info.id.serialize_text().into_lua(lua),
        "text" => info.response.as_str().into_lua(lua),
        "questStage" => journal
            .then_some(info.data.disposition_or_journal_index)
            .into_lua(lua),
        "isQuestFinished" => quest_flag(QuestStatus::Finished).into_lua(lua),
        "isQuestRestart" => quest_flag(QuestStatus::Restart).into_lua(lua),
        "isQuestName" => quest_flag(QuestStatus::Name).into_lua(lua),
        "filterActorId" => id_filter(&info.actor).into_lua(lua),
        "filterActorRace" => id_filter(&info.race).into_lua(lua),
        "filterActorClass" => id_filter(&info.class).into_lua(lua),
        "filterActorFaction" => {
            if journal || info.faction.is_empty() {
                Ok(Value::Nil)
            } else if info.factionless {
                "".into_lua(lua)
            } else {
                info.faction.serialize_text().into_lua(lua)
            }
        }
        "filterActorFactionRank" => raw_filter(info.data.rank).into_lua(lua),
        "filterActorCell" => id_filter(&info.cell).into_lua(lua),
        "filterActorDisposition" => (!journal)
            .then_some(info.data.disposition_or_journal_index)
            .into_lua(lua),
        "filterActorGender" => raw_filter(info.data.gender).into_lua(lua),
        "filterPlayerFaction" => id_filter(&info.pc_faction).into_lua(lua),
        "filterPlayerFactionRank" => raw_filter(info.data.pc_rank).into_lua(lua),
        "sound" => {
            if journal || info.sound.is_empty() {
                Ok(Value::Nil)
            } else {
                correct_sound_path(&info.sound, vfs).into_lua(lua)
            }
        }
        "resultScript" => (!info.result_script.is_empty())
            .then_some(info.result_script.as_str())
            .into_lua(lua),
        _ => Ok(Value::Nil),
    }
}
