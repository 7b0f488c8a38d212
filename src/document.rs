//! Printable documents and the document-type print policy

use serde::{Deserialize, Serialize};

/// Document types whose print job is restricted to the first four pages.
const PAGE_LIMITED_TYPES: [&str; 2] = ["E-NIK", "E-Faktur"];

/// Page range used for page-limited document types.
pub const LIMITED_PAGE_RANGE: &str = "1-4";

/// Print priority used by [`DocumentOrder::ByDocumentType`].
pub const DOCUMENT_TYPE_PRIORITY: [&str; 7] = [
    "E-Faktur",
    "E-NIK",
    "SRUT",
    "Cek Fisik",
    "CBU - VIN",
    "CBU - Form A",
    "CBU - PIB",
];

/// One printable unit returned by the fetcher for a frame number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub payload: Vec<u8>,
    pub document_type: String,
    /// Frame number this document was fetched for.
    pub source_identifier: String,
}

impl Document {
    pub fn new(
        source_identifier: impl Into<String>,
        document_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            payload,
            document_type: document_type.into(),
            source_identifier: source_identifier.into(),
        }
    }

    /// Page range to pass to the printer, `None` for the whole document.
    pub fn page_range(&self) -> Option<&'static str> {
        if PAGE_LIMITED_TYPES.contains(&self.document_type.as_str()) {
            Some(LIMITED_PAGE_RANGE)
        } else {
            None
        }
    }

    /// Human-readable progress line, e.g. `[MH1234] E-Faktur.pdf`.
    pub fn display_entry(&self) -> String {
        format!("[{}] {}.pdf", self.source_identifier, self.document_type)
    }
}

/// Order in which the documents of one frame number are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrder {
    /// Print in the order the fetcher returned them.
    #[default]
    AsFetched,
    /// Print by [`DOCUMENT_TYPE_PRIORITY`]; unknown types go last in fetch order.
    ByDocumentType,
}

impl DocumentOrder {
    pub fn apply(self, mut documents: Vec<Document>) -> Vec<Document> {
        if self == DocumentOrder::ByDocumentType {
            // stable: equal priorities keep fetch order
            documents.sort_by_key(|doc| type_priority(&doc.document_type));
        }
        documents
    }
}

fn type_priority(document_type: &str) -> usize {
    DOCUMENT_TYPE_PRIORITY
        .iter()
        .position(|known| *known == document_type)
        .unwrap_or(DOCUMENT_TYPE_PRIORITY.len())
}
