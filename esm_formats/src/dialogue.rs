use std::fmt;

use anyhow::{Result, bail, ensure};
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::esm::{Record, RecordWriter, Tag};
use crate::refid::RefId;

/// Faction id stored in `FNAM` for infos that require the speaker to have
/// no faction at all.
pub const FACTIONLESS_MARKER: &str = "FFFF";

const INFO_DATA_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DialogueType {
    Topic,
    Voice,
    Greeting,
    Persuasion,
    Journal,
    Unknown,
}

impl DialogueType {
    pub const ALL: [DialogueType; 5] = [
        DialogueType::Topic,
        DialogueType::Voice,
        DialogueType::Greeting,
        DialogueType::Persuasion,
        DialogueType::Journal,
    ];

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => DialogueType::Topic,
            1 => DialogueType::Voice,
            2 => DialogueType::Greeting,
            3 => DialogueType::Persuasion,
            4 => DialogueType::Journal,
            _ => DialogueType::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            DialogueType::Topic => 0,
            DialogueType::Voice => 1,
            DialogueType::Greeting => 2,
            DialogueType::Persuasion => 3,
            DialogueType::Journal => 4,
            DialogueType::Unknown => -1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DialogueType::Topic => "topic",
            DialogueType::Voice => "voice",
            DialogueType::Greeting => "greeting",
            DialogueType::Persuasion => "persuasion",
            DialogueType::Journal => "journal",
            DialogueType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DialogueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum QuestStatus {
    #[default]
    None,
    Name,
    Finished,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InfoData {
    pub kind: DialogueType,
    /// Disposition filter for conversation infos, stage index for journal
    /// entries.
    pub disposition_or_journal_index: i32,
    pub rank: i8,
    pub gender: i8,
    pub pc_rank: i8,
}

impl Default for InfoData {
    fn default() -> Self {
        InfoData {
            kind: DialogueType::Topic,
            disposition_or_journal_index: 0,
            rank: -1,
            gender: -1,
            pc_rank: -1,
        }
    }
}

impl InfoData {
    fn parse(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= INFO_DATA_SIZE,
            "INFO DATA holds {} bytes, expected {INFO_DATA_SIZE}",
            data.len()
        );
        Ok(InfoData {
            kind: DialogueType::from_raw(i32::from(data[0])),
            disposition_or_journal_index: LittleEndian::read_i32(&data[4..8]),
            rank: data[8] as i8,
            gender: data[9] as i8,
            pc_rank: data[10] as i8,
        })
    }

    fn to_bytes(self) -> [u8; INFO_DATA_SIZE] {
        let mut bytes = [0u8; INFO_DATA_SIZE];
        bytes[0] = self.kind.as_raw() as u8;
        LittleEndian::write_i32(&mut bytes[4..8], self.disposition_or_journal_index);
        bytes[8] = self.rank as u8;
        bytes[9] = self.gender as u8;
        bytes[10] = self.pc_rank as u8;
        bytes
    }
}

/// One response line attached to a dialogue topic or journal entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialInfo {
    pub id: RefId,
    pub prev: RefId,
    pub next: RefId,
    pub data: InfoData,
    pub actor: RefId,
    pub race: RefId,
    pub class: RefId,
    pub faction: RefId,
    pub factionless: bool,
    pub cell: RefId,
    pub pc_faction: RefId,
    pub sound: String,
    pub response: String,
    pub result_script: String,
    pub quest_status: QuestStatus,
    #[serde(skip)]
    pub deleted: bool,
}

impl DialInfo {
    pub fn load(record: &Record<'_>) -> Result<Self> {
        if record.tag != Tag::INFO {
            bail!("expected INFO record, found {}", record.tag.as_str());
        }
        let mut info = DialInfo::default();
        let mut has_id = false;
        for sub in &record.subrecords {
            match &sub.tag.0 {
                b"INAM" => {
                    info.id = RefId::string(sub.zstring());
                    has_id = true;
                }
                b"PNAM" => info.prev = RefId::string(sub.zstring()),
                b"NNAM" => info.next = RefId::string(sub.zstring()),
                b"DATA" => info.data = InfoData::parse(sub.data)?,
                b"ONAM" => info.actor = RefId::string(sub.zstring()),
                b"RNAM" => info.race = RefId::string(sub.zstring()),
                b"CNAM" => info.class = RefId::string(sub.zstring()),
                b"FNAM" => {
                    let faction = sub.zstring();
                    info.factionless = faction == FACTIONLESS_MARKER;
                    info.faction = RefId::string(faction);
                }
                b"ANAM" => info.cell = RefId::string(sub.zstring()),
                b"DNAM" => info.pc_faction = RefId::string(sub.zstring()),
                b"SNAM" => info.sound = sub.zstring(),
                b"NAME" => info.response = sub.zstring(),
                b"BNAM" => info.result_script = sub.zstring(),
                b"QSTN" => info.quest_status = QuestStatus::Name,
                b"QSTF" => info.quest_status = QuestStatus::Finished,
                b"QSTR" => info.quest_status = QuestStatus::Restart,
                b"DELE" => info.deleted = true,
                _ => {}
            }
        }
        ensure!(has_id, "INFO record without INAM");
        Ok(info)
    }

    pub fn save(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut record = RecordWriter::new(Tag::INFO);
        record
            .zstring(b"INAM", &self.id.serialize_text())?
            .zstring(b"PNAM", &self.prev.serialize_text())?
            .zstring(b"NNAM", &self.next.serialize_text())?;
        if self.deleted {
            record.i32(b"DELE", 0)?;
            return record.finish(out);
        }
        record.raw(b"DATA", &self.data.to_bytes())?;
        let optional_ids = [
            (b"ONAM", &self.actor),
            (b"RNAM", &self.race),
            (b"CNAM", &self.class),
            (b"FNAM", &self.faction),
            (b"ANAM", &self.cell),
            (b"DNAM", &self.pc_faction),
        ];
        for (tag, id) in optional_ids {
            if !id.is_empty() {
                record.zstring(tag, &id.serialize_text())?;
            }
        }
        if !self.sound.is_empty() {
            record.zstring(b"SNAM", &self.sound)?;
        }
        if !self.response.is_empty() {
            record.string(b"NAME", &self.response)?;
        }
        if !self.result_script.is_empty() {
            record.string(b"BNAM", &self.result_script)?;
        }
        match self.quest_status {
            QuestStatus::None => {}
            QuestStatus::Name => {
                record.raw(b"QSTN", &[1])?;
            }
            QuestStatus::Finished => {
                record.raw(b"QSTF", &[1])?;
            }
            QuestStatus::Restart => {
                record.raw(b"QSTR", &[1])?;
            }
        }
        record.finish(out)
    }

    pub fn is_journal(&self) -> bool {
        self.data.kind == DialogueType::Journal
    }
}

/// A topic, greeting, persuasion, voice or journal record together with
/// the infos that follow it in the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialogue {
    pub id: RefId,
    pub string_id: String,
    pub kind: DialogueType,
    pub infos: Vec<DialInfo>,
    #[serde(skip)]
    pub deleted: bool,
}

impl Dialogue {
    pub fn new(string_id: impl Into<String>, kind: DialogueType) -> Self {
        let string_id = string_id.into();
        Dialogue {
            id: RefId::string(string_id.clone()),
            string_id,
            kind,
            infos: Vec::new(),
            deleted: false,
        }
    }

    pub fn load(record: &Record<'_>) -> Result<Self> {
        if record.tag != Tag::DIAL {
            bail!("expected DIAL record, found {}", record.tag.as_str());
        }
        let mut string_id = None;
        let mut kind = DialogueType::Unknown;
        let mut deleted = false;
        for sub in &record.subrecords {
            match &sub.tag.0 {
                b"NAME" => string_id = Some(sub.zstring()),
                b"DATA" => {
                    // Some early plugins store the type as a full int.
                    let raw = if sub.data.len() == 4 {
                        sub.i32()?
                    } else {
                        i32::from(sub.u8()?)
                    };
                    kind = DialogueType::from_raw(raw);
                }
                b"DELE" => deleted = true,
                _ => {}
            }
        }
        let Some(string_id) = string_id else {
            bail!("DIAL record without NAME");
        };
        let mut dialogue = Dialogue::new(string_id, kind);
        dialogue.deleted = deleted;
        Ok(dialogue)
    }

    /// Writes the `DIAL` record followed by each of its infos.
    pub fn save(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut record = RecordWriter::new(Tag::DIAL);
        record.zstring(b"NAME", &self.string_id)?;
        if self.deleted {
            record.i32(b"DELE", 0)?;
        } else {
            record.raw(b"DATA", &[self.kind.as_raw() as u8])?;
        }
        record.finish(out)?;
        for info in &self.infos {
            info.save(out)?;
        }
        Ok(())
    }

    pub fn quest_name(&self) -> Option<&str> {
        if self.kind != DialogueType::Journal {
            return None;
        }
        self.infos
            .iter()
            .find(|info| info.quest_status == QuestStatus::Name)
            .map(|info| info.response.as_str())
    }

    pub fn find_info(&self, id: &RefId) -> Option<usize> {
        self.infos.iter().position(|info| &info.id == id)
    }
}
