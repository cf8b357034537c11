//! In-memory segments and readers for the engine tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::index::{BinaryDocValues, DocValuesType, IndexReader, LeafReader, SortedSetDocValues};
use crate::{facet_path, DocumentId, Result};

#[derive(Debug, Default, Clone)]
pub(crate) struct TestDoc {
    sorted_set: Vec<(String, Vec<String>)>,
    binary: Vec<(String, Vec<u8>)>,
}

impl TestDoc {
    pub fn new() -> TestDoc {
        TestDoc::default()
    }

    /// Adds a flat `dim/value` label to a sorted-set field.
    pub fn flat(mut self, field: &str, dim: &str, value: &str) -> TestDoc {
        self.add_label(field, facet_path::path_to_string(&[dim, value]));
        self
    }

    /// Adds a hierarchical label and every ancestor prefix, which is what
    /// taxonomy writers produce.
    pub fn hierarchy(mut self, field: &str, path: &[&str]) -> TestDoc {
        for end in 1..=path.len() {
            self.add_label(field, facet_path::path_to_string(&path[..end]));
        }
        self
    }

    /// Sets the binary payload of a field.
    pub fn payload(mut self, field: &str, bytes: Vec<u8>) -> TestDoc {
        self.binary.push((field.to_string(), bytes));
        self
    }

    /// The `(dim, value)` pairs this doc carries on a flat field.
    pub fn flat_labels(&self, field: &str) -> Vec<(String, String)> {
        let Some((_, labels)) = self.sorted_set.iter().find(|(name, _)| name == field) else {
            return Vec::new();
        };
        labels
            .iter()
            .map(|label| {
                let mut components = facet_path::string_to_path(label);
                let value = components.pop().expect("flat labels have two components");
                let dim = components.pop().expect("flat labels have two components");
                (dim, value)
            })
            .collect()
    }

    fn add_label(&mut self, field: &str, label: String) {
        match self.sorted_set.iter_mut().find(|(name, _)| name == field) {
            Some((_, labels)) => labels.push(label),
            None => self.sorted_set.push((field.to_string(), vec![label])),
        }
    }
}

struct SortedSetField {
    dict: Vec<Vec<u8>>,
    doc_ords: Vec<Vec<u32>>,
}

struct BinaryField {
    docs: Vec<Option<Vec<u8>>>,
}

pub(crate) struct TestSegment {
    max_doc: u32,
    sorted_set: HashMap<String, SortedSetField>,
    binary: HashMap<String, BinaryField>,
}

impl TestSegment {
    fn build(docs: Vec<TestDoc>) -> TestSegment {
        let max_doc = docs.len() as u32;

        let mut dicts: BTreeMap<String, BTreeSet<Vec<u8>>> = BTreeMap::new();
        for doc in &docs {
            for (field, labels) in &doc.sorted_set {
                let dict = dicts.entry(field.clone()).or_default();
                for label in labels {
                    dict.insert(label.clone().into_bytes());
                }
            }
        }

        let mut sorted_set = HashMap::new();
        for (field, dict) in dicts {
            let dict: Vec<Vec<u8>> = dict.into_iter().collect();
            let mut doc_ords = vec![Vec::new(); docs.len()];
            for (doc_id, doc) in docs.iter().enumerate() {
                if let Some((_, labels)) = doc.sorted_set.iter().find(|(name, _)| *name == field) {
                    let mut ords: Vec<u32> = labels
                        .iter()
                        .map(|label| {
                            dict.binary_search_by(|entry| entry.as_slice().cmp(label.as_bytes()))
                                .expect("indexed labels are in the dictionary")
                                as u32
                        })
                        .collect();
                    ords.sort_unstable();
                    ords.dedup();
                    doc_ords[doc_id] = ords;
                }
            }
            sorted_set.insert(field, SortedSetField { dict, doc_ords });
        }

        let mut binary: HashMap<String, BinaryField> = HashMap::new();
        for (doc_id, doc) in docs.iter().enumerate() {
            for (field, bytes) in &doc.binary {
                let field = binary
                    .entry(field.clone())
                    .or_insert_with(|| BinaryField { docs: vec![None; docs.len()] });
                field.docs[doc_id] = Some(bytes.clone());
            }
        }

        TestSegment { max_doc, sorted_set, binary }
    }
}

impl LeafReader for TestSegment {
    fn max_doc(&self) -> u32 {
        self.max_doc
    }

    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedSetDocValues + '_>>> {
        Ok(self.sorted_set.get(field).map(|field| {
            Box::new(SortedSetCursor { field, current: None, pos: 0 })
                as Box<dyn SortedSetDocValues + '_>
        }))
    }

    fn binary_doc_values(&self, field: &str) -> Result<Option<Box<dyn BinaryDocValues + '_>>> {
        Ok(self.binary.get(field).map(|field| {
            Box::new(BinaryCursor { field, current: None }) as Box<dyn BinaryDocValues + '_>
        }))
    }

    fn doc_values_type(&self, field: &str) -> Option<DocValuesType> {
        if self.sorted_set.contains_key(field) {
            Some(DocValuesType::SortedSet)
        } else if self.binary.contains_key(field) {
            Some(DocValuesType::Binary)
        } else {
            None
        }
    }
}

struct SortedSetCursor<'a> {
    field: &'a SortedSetField,
    current: Option<&'a [u32]>,
    pos: usize,
}

impl SortedSetDocValues for SortedSetCursor<'_> {
    fn value_count(&self) -> u64 {
        self.field.dict.len() as u64
    }

    fn lookup_ord(&mut self, ord: u32) -> Result<Vec<u8>> {
        Ok(self.field.dict[ord as usize].clone())
    }

    fn lookup_term(&mut self, key: &[u8]) -> Result<Option<u32>> {
        Ok(self
            .field
            .dict
            .binary_search_by(|entry| entry.as_slice().cmp(key))
            .ok()
            .map(|ord| ord as u32))
    }

    fn advance_exact(&mut self, doc: DocumentId) -> Result<bool> {
        let ords = self.field.doc_ords[doc as usize].as_slice();
        self.pos = 0;
        self.current = (!ords.is_empty()).then_some(ords);
        Ok(self.current.is_some())
    }

    fn next_ord(&mut self) -> Result<Option<u32>> {
        match self.current {
            Some(ords) if self.pos < ords.len() => {
                let ord = ords[self.pos];
                self.pos += 1;
                Ok(Some(ord))
            }
            _ => Ok(None),
        }
    }
}

struct BinaryCursor<'a> {
    field: &'a BinaryField,
    current: Option<&'a [u8]>,
}

impl BinaryDocValues for BinaryCursor<'_> {
    fn advance_exact(&mut self, doc: DocumentId) -> Result<bool> {
        self.current = self.field.docs[doc as usize].as_deref();
        Ok(self.current.is_some())
    }

    fn binary_value(&self) -> Result<&[u8]> {
        Ok(self.current.expect("the current document has a value"))
    }
}

pub(crate) struct TestIndex {
    reader: IndexReader,
}

impl TestIndex {
    pub fn build(segments: Vec<Vec<TestDoc>>) -> TestIndex {
        let readers = segments
            .into_iter()
            .map(|docs| Arc::new(TestSegment::build(docs)) as Arc<dyn LeafReader>)
            .collect();
        TestIndex { reader: IndexReader::new(readers) }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// A single-segment index, one document per entry, each entry a list
    /// of `(dim, value)` flat labels on `field`.
    pub fn flat(field: &str, docs: &[&[(&str, &str)]]) -> TestIndex {
        TestIndex::build(vec![docs
            .iter()
            .map(|labels| {
                labels.iter().fold(TestDoc::new(), |doc, (dim, value)| doc.flat(field, dim, value))
            })
            .collect()])
    }

    /// A single-segment index, one document per path, ancestors included.
    pub fn hierarchical(field: &str, docs: &[&[&str]]) -> TestIndex {
        TestIndex::build(vec![docs
            .iter()
            .map(|path| TestDoc::new().hierarchy(field, path))
            .collect()])
    }
}
