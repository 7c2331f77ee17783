use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a record inside the content files.
///
/// String identifiers keep the spelling found in the plugin but compare,
/// order and hash without regard to ASCII case, matching how the game
/// resolves them.
#[derive(Debug, Clone, Default)]
pub enum RefId {
    #[default]
    Empty,
    String(String),
    FormId(u32),
    Generated(u64),
    Index { tag: [u8; 4], value: u32 },
}

const FORM_ID_PREFIX: &str = "FormId:0x";
const GENERATED_PREFIX: &str = "Generated:0x";
const INDEX_PREFIX: &str = "Index:";

impl RefId {
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            RefId::Empty
        } else {
            RefId::String(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RefId::Empty)
    }

    pub fn serialize_text(&self) -> String {
        match self {
            RefId::Empty => String::new(),
            RefId::String(value) => value.clone(),
            RefId::FormId(value) => format!("{FORM_ID_PREFIX}{value:x}"),
            RefId::Generated(value) => format!("{GENERATED_PREFIX}{value:x}"),
            RefId::Index { tag, value } => {
                format!("{INDEX_PREFIX}{}:0x{value:x}", String::from_utf8_lossy(tag))
            }
        }
    }

    /// Parses the text produced by [`RefId::serialize_text`]. Anything that
    /// is not one of the prefixed forms is taken as a plain string id.
    pub fn deserialize_text(text: &str) -> Self {
        if text.is_empty() {
            return RefId::Empty;
        }
        if let Some(hex) = text.strip_prefix(FORM_ID_PREFIX) {
            if let Some(value) = parse_hex_u32(hex) {
                return RefId::FormId(value);
            }
        }
        if let Some(hex) = text.strip_prefix(GENERATED_PREFIX) {
            if let Ok(value) = u64::from_str_radix(hex, 16) {
                return RefId::Generated(value);
            }
        }
        if let Some(rest) = text.strip_prefix(INDEX_PREFIX) {
            if let Some(index) = parse_index(rest) {
                return index;
            }
        }
        RefId::String(text.to_string())
    }

    pub fn to_debug_string(&self) -> String {
        match self {
            RefId::Empty => "Empty{}".to_string(),
            RefId::String(value) => quote_debug(value),
            other => other.serialize_text(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            RefId::Empty => 0,
            RefId::String(_) => 1,
            RefId::FormId(_) => 2,
            RefId::Generated(_) => 3,
            RefId::Index { .. } => 4,
        }
    }
}

fn parse_hex_u32(hex: &str) -> Option<u32> {
    if hex.is_empty() {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn parse_index(rest: &str) -> Option<RefId> {
    let (tag, hex) = rest.split_once(":0x")?;
    let tag: [u8; 4] = tag.as_bytes().try_into().ok()?;
    let value = parse_hex_u32(hex)?;
    Some(RefId::Index { tag, value })
}

fn quote_debug(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02X}")),
        }
    }
    out.push('"');
    out
}

impl PartialEq for RefId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefId::Empty, RefId::Empty) => true,
            (RefId::String(a), RefId::String(b)) => a.eq_ignore_ascii_case(b),
            (RefId::FormId(a), RefId::FormId(b)) => a == b,
            (RefId::Generated(a), RefId::Generated(b)) => a == b,
            (
                RefId::Index { tag: ta, value: va },
                RefId::Index { tag: tb, value: vb },
            ) => ta == tb && va == vb,
            _ => false,
        }
    }
}

impl Eq for RefId {}

impl PartialOrd for RefId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RefId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RefId::String(a), RefId::String(b)) => a
                .bytes()
                .map(|b| b.to_ascii_lowercase())
                .cmp(b.bytes().map(|b| b.to_ascii_lowercase())),
            (RefId::FormId(a), RefId::FormId(b)) => a.cmp(b),
            (RefId::Generated(a), RefId::Generated(b)) => a.cmp(b),
            (
                RefId::Index { tag: ta, value: va },
                RefId::Index { tag: tb, value: vb },
            ) => ta.cmp(tb).then(va.cmp(vb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for RefId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            RefId::Empty => {}
            RefId::String(value) => {
                for byte in value.bytes() {
                    state.write_u8(byte.to_ascii_lowercase());
                }
            }
            RefId::FormId(value) => value.hash(state),
            RefId::Generated(value) => value.hash(state),
            RefId::Index { tag, value } => {
                tag.hash(state);
                value.hash(state);
            }
        }
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_text())
    }
}

impl Serialize for RefId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.serialize_text())
    }
}

impl<'de> Deserialize<'de> for RefId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(RefId::deserialize_text(&text))
    }
}
