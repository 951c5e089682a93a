//! Client-side document mirror
//!
//! One [`Collection`] per collection name, fed by `added`, `changed`,
//! `removed` and the ordered variants.

use livepool_network::{Fields, Message};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mirrored documents of one collection
#[derive(Debug, Clone)]
pub struct Collection {
    name: Arc<str>,
    docs: Arc<RwLock<BTreeMap<String, Fields>>>,
}

impl Collection {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            docs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Fields of document `id`
    pub fn get(&self, id: &str) -> Option<Fields> {
        self.docs.read().get(id).cloned()
    }

    /// Some document, in id order
    pub fn find_one(&self) -> Option<(String, Fields)> {
        self.docs
            .read()
            .iter()
            .next()
            .map(|(id, fields)| (id.clone(), fields.clone()))
    }

    /// All documents, in id order
    pub fn documents(&self) -> Vec<(String, Fields)> {
        self.docs
            .read()
            .iter()
            .map(|(id, fields)| (id.clone(), fields.clone()))
            .collect()
    }

    pub(crate) fn apply(&self, msg: &Message) {
        let mut docs = self.docs.write();
        match msg {
            Message::Added { id, fields, .. } | Message::AddedBefore { id, fields, .. } => {
                docs.insert(id.clone(), fields.clone().unwrap_or_default());
            }
            Message::Changed {
                id, fields, cleared, ..
            } => {
                let doc = docs.entry(id.clone()).or_default();
                if let Some(fields) = fields {
                    for (key, value) in fields {
                        doc.insert(key.clone(), value.clone());
                    }
                }
                if let Some(cleared) = cleared {
                    for key in cleared {
                        doc.remove(key);
                    }
                }
            }
            Message::Removed { id, .. } => {
                docs.remove(id);
            }
            // ordering is not mirrored
            _ => {}
        }
    }
}
