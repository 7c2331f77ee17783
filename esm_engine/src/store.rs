use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::path::Path;
use std::rc::Rc;
use std::slice;

use anyhow::{Context, Result};
use esm_formats::{DialInfo, Dialogue, DialogueType, PluginFile, RefId};
use log::{debug, info};

/// All dialogue records of the loaded content files, merged in load order
/// and kept sorted by id.
#[derive(Debug, Default)]
pub struct DialogueStore {
    records: Vec<Rc<Dialogue>>,
}

impl DialogueStore {
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut plugins = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let plugin = PluginFile::open(path)
                .with_context(|| format!("loading content file {}", path.display()))?;
            info!(
                "loaded {}: {} dialogues, {} infos",
                plugin.name(),
                plugin.dialogues.len(),
                plugin.info_count()
            );
            plugins.push(plugin);
        }
        Ok(Self::from_plugins(&plugins))
    }

    pub fn from_plugins(plugins: &[PluginFile]) -> Self {
        Self::from_dialogues(plugins.iter().flat_map(|plugin| plugin.dialogues.iter()))
    }

    /// Later dialogues override earlier ones with the same id; their infos
    /// are merged into the existing list rather than replacing it.
    pub fn from_dialogues<'a>(dialogues: impl IntoIterator<Item = &'a Dialogue>) -> Self {
        let mut merged: BTreeMap<RefId, Dialogue> = BTreeMap::new();
        for incoming in dialogues {
            if incoming.deleted {
                if merged.remove(&incoming.id).is_some() {
                    debug!("dialogue {} deleted", incoming.id.to_debug_string());
                }
                continue;
            }
            let target = merged.entry(incoming.id.clone()).or_insert_with(|| {
                let mut fresh = incoming.clone();
                fresh.infos.clear();
                fresh
            });
            target.string_id = incoming.string_id.clone();
            target.kind = incoming.kind;
            merge_infos(target, &incoming.infos);
        }
        DialogueStore {
            records: merged.into_values().map(Rc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Dialogue>> {
        self.records.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Rc<Dialogue>> {
        self.records.iter()
    }

    pub fn search(&self, id: &RefId) -> Option<&Rc<Dialogue>> {
        self.records
            .binary_search_by(|record| record.id.cmp(id))
            .ok()
            .map(|index| &self.records[index])
    }

    pub fn filtered(&self, kind: DialogueType) -> FilteredDialogueStore<'_> {
        FilteredDialogueStore { store: self, kind }
    }

    pub fn counts_by_type(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.kind.as_raw()).or_insert(0) += 1;
        }
        counts
    }
}

fn merge_infos(target: &mut Dialogue, incoming: &[DialInfo]) {
    for info in incoming {
        let existing = target.find_info(&info.id);
        if info.deleted {
            if let Some(position) = existing {
                target.infos.remove(position);
            }
            continue;
        }
        match existing {
            Some(position) => target.infos[position] = info.clone(),
            None => {
                let position = if info.prev.is_empty() {
                    0
                } else {
                    target
                        .find_info(&info.prev)
                        .map(|prev| prev + 1)
                        .unwrap_or(target.infos.len())
                };
                target.infos.insert(position, info.clone());
            }
        }
    }
}

/// View over the records of one dialogue type.
#[derive(Debug, Clone, Copy)]
pub struct FilteredDialogueStore<'a> {
    store: &'a DialogueStore,
    kind: DialogueType,
}

impl<'a> FilteredDialogueStore<'a> {
    pub fn search(&self, id: &RefId) -> Option<&'a Rc<Dialogue>> {
        self.store
            .search(id)
            .filter(|record| record.kind == self.kind)
    }

    /// Zero-based position among the records of this type.
    pub fn at(&self, index: usize) -> Option<&'a Rc<Dialogue>> {
        self.iter().nth(index)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> FilteredDialogueIter<'a> {
        FilteredDialogueIter {
            inner: self.store.records.iter(),
            kind: self.kind,
        }
    }
}

impl<'a> IntoIterator for FilteredDialogueStore<'a> {
    type Item = &'a Rc<Dialogue>;
    type IntoIter = FilteredDialogueIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct FilteredDialogueIter<'a> {
    inner: slice::Iter<'a, Rc<Dialogue>>,
    kind: DialogueType,
}

impl<'a> Iterator for FilteredDialogueIter<'a> {
    type Item = &'a Rc<Dialogue>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kind;
        self.inner.by_ref().find(|record| record.kind == kind)
    }
}

impl FusedIterator for FilteredDialogueIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use esm_formats::InfoData;

    fn dialogue(id: &str, kind: DialogueType, infos: &[(&str, &str)]) -> Dialogue {
        let mut dialogue = Dialogue::new(id, kind);
        for (info_id, prev) in infos {
            dialogue.infos.push(DialInfo {
                id: RefId::string(*info_id),
                prev: RefId::string(*prev),
                data: InfoData {
                    kind,
                    ..InfoData::default()
                },
                response: format!("{id}/{info_id}"),
                ..DialInfo::default()
            });
        }
        dialogue
    }

    fn info_ids(record: &Dialogue) -> Vec<String> {
        record
            .infos
            .iter()
            .map(|info| info.id.serialize_text())
            .collect()
    }

    fn sample_store() -> DialogueStore {
        let records = [
            dialogue("Greeting 0", DialogueType::Greeting, &[]),
            dialogue("Background", DialogueType::Topic, &[]),
            dialogue("A2_1_MeetSulMatuul", DialogueType::Journal, &[]),
            dialogue("little secret", DialogueType::Topic, &[]),
            dialogue("Admire Success", DialogueType::Persuasion, &[]),
        ];
        DialogueStore::from_dialogues(records.iter())
    }

    #[test]
    fn records_are_sorted_case_insensitively() {
        let store = sample_store();
        let ids: Vec<_> = store.iter().map(|record| record.string_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "A2_1_MeetSulMatuul",
                "Admire Success",
                "Background",
                "Greeting 0",
                "little secret"
            ]
        );
        assert!(store.search(&RefId::string("BACKGROUND")).is_some());
    }

    #[test]
    fn filtered_view_only_yields_its_type() {
        let store = sample_store();
        let topics = store.filtered(DialogueType::Topic);
        assert_eq!(topics.len(), 2);
        assert!(topics.iter().all(|record| record.kind == DialogueType::Topic));
        assert_eq!(topics.at(0).unwrap().string_id, "Background");
        assert_eq!(topics.at(1).unwrap().string_id, "little secret");
        assert!(topics.at(2).is_none());

        let voices = store.filtered(DialogueType::Voice);
        assert!(voices.is_empty());
        assert!(voices.at(0).is_none());
    }

    #[test]
    fn filtered_search_rejects_other_types() {
        let store = sample_store();
        let journal = store.filtered(DialogueType::Journal);
        assert!(journal.search(&RefId::string("a2_1_meetsulmatuul")).is_some());
        assert!(journal.search(&RefId::string("Background")).is_none());
        assert!(journal.search(&RefId::string("missing")).is_none());
    }

    #[test]
    fn exhausted_iterator_stays_exhausted() {
        let store = sample_store();
        let mut iter = store.filtered(DialogueType::Greeting).iter();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn later_plugins_merge_infos_by_predecessor() {
        let base = dialogue("Background", DialogueType::Topic, &[("1", ""), ("2", "1")]);
        let mut patch = dialogue("background", DialogueType::Topic, &[("3", "1"), ("0", "")]);
        let mut replaced = base.infos[1].clone();
        replaced.response = "patched".to_string();
        patch.infos.push(replaced);

        let store = DialogueStore::from_dialogues([&base, &patch]);
        let record = store.search(&RefId::string("Background")).unwrap();
        assert_eq!(record.string_id, "background");
        assert_eq!(info_ids(record), vec!["0", "1", "3", "2"]);
        assert_eq!(record.infos[3].response, "patched");
    }

    #[test]
    fn deleted_records_are_removed() {
        let base = dialogue("Background", DialogueType::Topic, &[("1", ""), ("2", "1")]);
        let mut patch = dialogue("Background", DialogueType::Topic, &[]);
        let mut gone = base.infos[0].clone();
        gone.deleted = true;
        patch.infos.push(gone);
        let store = DialogueStore::from_dialogues([&base, &patch]);
        let record = store.search(&RefId::string("Background")).unwrap();
        assert_eq!(info_ids(record), vec!["2"]);

        let mut removal = Dialogue::new("Background", DialogueType::Topic);
        removal.deleted = true;
        let store = DialogueStore::from_dialogues([&base, &removal]);
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_predecessor_appends() {
        let base = dialogue("Background", DialogueType::Topic, &[("1", "")]);
        let patch = dialogue("Background", DialogueType::Topic, &[("9", "missing")]);
        let store = DialogueStore::from_dialogues([&base, &patch]);
        let record = store.search(&RefId::string("Background")).unwrap();
        assert_eq!(info_ids(record), vec!["1", "9"]);
    }
}
