//! Id-keyed document set.

use std::collections::HashSet;

use ds_domain::model::Document;

/// Documents in first-seen order, at most one per `document_id`.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    docs: Vec<Document>,
    ids: HashSet<String>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `doc` unless its id is already present.  Returns whether it
    /// was added.
    pub fn add(&mut self, doc: Document) -> bool {
        if !self.ids.insert(doc.document_id.clone()) {
            return false;
        }
        self.docs.push(doc);
        true
    }

    /// Add every document; returns how many were new.
    pub fn extend<I>(&mut self, docs: I) -> usize
    where
        I: IntoIterator<Item = Document>,
    {
        let mut added = 0;
        for doc in docs {
            if self.add(doc) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }

    pub fn into_vec(self) -> Vec<Document> {
        self.docs
    }
}
