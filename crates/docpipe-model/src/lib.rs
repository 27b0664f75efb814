//! Document and tabular data model for docpipe.
//!
//! - **value**: the [`Value`] tagged union held by every record field
//! - **record**: [`Record`], one table row
//! - **schema**: [`Field`] metadata and the [`Schema`] key order
//! - **content**: [`TableContent`] and the other [`Content`] blocks
//! - **document**: [`Document`] and its builder

pub mod content;
pub mod document;
pub mod error;
pub mod record;
pub mod schema;
pub mod value;

pub use content::{
    ChartContent, Content, ContentKind, SectionContent, TableContent, TextContent, TransformStep,
};
pub use document::{Document, DocumentBuilder};
pub use error::{ModelError, Result};
pub use record::Record;
pub use schema::{Field, FieldType, Formatter, Schema};
pub use value::{CustomValue, Value, ValueKind};
