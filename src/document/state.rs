//! Open-document storage for the language server.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::text::TextDocument;

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<TextDocument>>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or replace a document.
    pub fn open(
        &self,
        uri: Url,
        language_id: String,
        text: String,
        version: i32,
    ) -> Arc<TextDocument> {
        let state = Arc::new(TextDocument::new(uri.clone(), language_id, version, text));
        self.documents.insert(uri, Arc::clone(&state));
        state
    }

    /// Replace the text of an open document, keeping its language id.
    ///
    /// Returns `None` if the document was never opened.
    pub fn update(&self, uri: &Url, text: String, version: i32) -> Option<Arc<TextDocument>> {
        let language_id = self.documents.get(uri)?.language_id().to_string();
        Some(self.open(uri.clone(), language_id, text, version))
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents.remove(uri).map(|(_, document)| document)
    }

    /// Get a document's state.
    pub fn get(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }
}
