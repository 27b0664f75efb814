use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Content, SectionContent, TableContent, TextContent};

/// An assembled document: an ordered list of content blocks plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub contents: Vec<Content>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            metadata: BTreeMap::new(),
            contents: Vec::new(),
        }
    }

    pub fn builder(id: impl Into<String>) -> DocumentBuilder {
        DocumentBuilder::new(id)
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// The first top-level table and its slot index.
    pub fn first_table(&self) -> Option<(usize, &TableContent)> {
        self.contents
            .iter()
            .enumerate()
            .find_map(|(idx, content)| content.as_table().map(|table| (idx, table)))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableContent> {
        self.contents.iter().filter_map(Content::as_table)
    }

    /// A new document identical to this one except for the block at `index`.
    ///
    /// Returns `None` if `index` is out of bounds.
    pub fn with_content_at(&self, index: usize, content: Content) -> Option<Self> {
        if index >= self.contents.len() {
            return None;
        }
        let mut contents = self.contents.clone();
        contents[index] = content;
        Some(Self {
            id: self.id.clone(),
            title: self.title.clone(),
            metadata: self.metadata.clone(),
            contents,
        })
    }
}

/// Minimal builder for assembling documents.
#[derive(Debug)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            document: Document::new(id),
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.document.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.document.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn table(self, table: TableContent) -> Self {
        self.content(table)
    }

    #[must_use]
    pub fn text(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.content(TextContent {
            id: id.into(),
            text: text.into(),
        })
    }

    #[must_use]
    pub fn section(self, section: SectionContent) -> Self {
        self.content(section)
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<Content>) -> Self {
        self.document.contents.push(content.into());
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}
