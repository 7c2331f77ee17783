use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::MmapOptions;
use serde::Serialize;

use crate::dialogue::{DialInfo, Dialogue};
use crate::esm::{self, RecordWriter, Tag, read_records};

const AUTHOR_LEN: usize = 32;
const DESCRIPTION_LEN: usize = 256;
const HEDR_SIZE: usize = 4 + 4 + AUTHOR_LEN + DESCRIPTION_LEN + 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginHeader {
    pub version: f32,
    pub flags: u32,
    pub author: String,
    pub description: String,
    pub record_count: u32,
    pub masters: Vec<String>,
}

impl Default for PluginHeader {
    fn default() -> Self {
        PluginHeader {
            version: 1.3,
            flags: 0,
            author: String::new(),
            description: String::new(),
            record_count: 0,
            masters: Vec::new(),
        }
    }
}

/// Dialogue content of a single `.esm`/`.esp` file, in file order.
#[derive(Debug, Clone, Serialize)]
pub struct PluginFile {
    pub path: Option<PathBuf>,
    pub header: PluginHeader,
    pub dialogues: Vec<Dialogue>,
    /// Records other than `DIAL`/`INFO` that were skipped.
    pub skipped_records: usize,
}

impl PluginFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening plugin at {}", path_buf.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("reading metadata of {}", path_buf.display()))?
            .len();
        ensure!(len > 0, "plugin {} is empty", path_buf.display());
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping plugin {}", path_buf.display()))?;

        let mut plugin = Self::parse(&mmap)
            .with_context(|| format!("parsing plugin {}", path_buf.display()))?;
        plugin.path = Some(path_buf);
        Ok(plugin)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let records = read_records(bytes)?;
        let Some((first, rest)) = records.split_first() else {
            bail!("plugin contains no records");
        };
        if first.tag != Tag::TES3 {
            bail!("plugin must start with TES3, found {}", first.tag.as_str());
        }
        let header = parse_header(first)?;

        let mut dialogues: Vec<Dialogue> = Vec::new();
        let mut skipped_records = 0;
        for (offset, record) in rest.iter().enumerate() {
            let index = offset + 1;
            match record.tag {
                Tag::DIAL => {
                    let dialogue = Dialogue::load(record)
                        .with_context(|| format!("decoding DIAL record {index}"))?;
                    dialogues.push(dialogue);
                }
                Tag::INFO => {
                    let info = DialInfo::load(record)
                        .with_context(|| format!("decoding INFO record {index}"))?;
                    let Some(dialogue) = dialogues.last_mut() else {
                        bail!("INFO record {index} appears before any DIAL record");
                    };
                    dialogue.infos.push(info);
                }
                _ => skipped_records += 1,
            }
        }

        Ok(PluginFile {
            path: None,
            header,
            dialogues,
            skipped_records,
        })
    }

    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    pub fn info_count(&self) -> usize {
        self.dialogues.iter().map(|dialogue| dialogue.infos.len()).sum()
    }
}

fn parse_header(record: &esm::Record<'_>) -> Result<PluginHeader> {
    let mut header = PluginHeader::default();
    let mut saw_hedr = false;
    for sub in &record.subrecords {
        match &sub.tag.0 {
            b"HEDR" => {
                ensure!(
                    sub.data.len() >= HEDR_SIZE,
                    "HEDR holds {} bytes, expected {HEDR_SIZE}",
                    sub.data.len()
                );
                let mut cursor = Cursor::new(sub.data);
                header.version = cursor.read_f32::<LittleEndian>()?;
                header.flags = cursor.read_u32::<LittleEndian>()?;
                let author_start = 8;
                let description_start = author_start + AUTHOR_LEN;
                let count_start = description_start + DESCRIPTION_LEN;
                header.author = esm::zstring(&sub.data[author_start..description_start]);
                header.description = esm::zstring(&sub.data[description_start..count_start]);
                cursor.set_position(count_start as u64);
                header.record_count = cursor.read_u32::<LittleEndian>()?;
                saw_hedr = true;
            }
            b"MAST" => header.masters.push(sub.zstring()),
            _ => {}
        }
    }
    ensure!(saw_hedr, "TES3 record is missing HEDR");
    Ok(header)
}

/// Serialises a header and dialogue records into plugin bytes.
#[derive(Debug, Default)]
pub struct PluginWriter {
    header: PluginHeader,
    dialogues: Vec<Dialogue>,
}

impl PluginWriter {
    pub fn new(header: PluginHeader) -> Self {
        PluginWriter {
            header,
            dialogues: Vec::new(),
        }
    }

    pub fn push(&mut self, dialogue: Dialogue) -> &mut Self {
        self.dialogues.push(dialogue);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let record_count: usize = self
            .dialogues
            .iter()
            .map(|dialogue| 1 + dialogue.infos.len())
            .sum();

        let mut hedr = Vec::with_capacity(HEDR_SIZE);
        hedr.extend_from_slice(&self.header.version.to_le_bytes());
        hedr.extend_from_slice(&self.header.flags.to_le_bytes());
        hedr.extend_from_slice(&esm::fixed_string(&self.header.author, AUTHOR_LEN));
        hedr.extend_from_slice(&esm::fixed_string(
            &self.header.description,
            DESCRIPTION_LEN,
        ));
        hedr.extend_from_slice(&u32::try_from(record_count)?.to_le_bytes());

        let mut out = Vec::new();
        let mut tes3 = RecordWriter::new(Tag::TES3);
        tes3.raw(b"HEDR", &hedr)?;
        for master in &self.header.masters {
            tes3.zstring(b"MAST", master)?;
            tes3.raw(b"DATA", &0u64.to_le_bytes())?;
        }
        tes3.finish(&mut out)?;

        for dialogue in &self.dialogues {
            dialogue
                .save(&mut out)
                .with_context(|| format!("writing dialogue {}", dialogue.string_id))?;
        }
        Ok(out)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path.as_ref(), bytes)
            .with_context(|| format!("writing plugin {}", path.as_ref().display()))
    }
}
