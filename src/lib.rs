//! trenbase - training plan knowledge base
//!
//! Parses a weekly workout spreadsheet into a week → training → block →
//! exercise tree and searches it by exercises, intensity and set type.

pub mod classify;
pub mod db;
pub mod editor;
pub mod error;
pub mod model;
pub mod parser;
pub mod search;
pub mod sheet;

pub use db::Database;
pub use editor::{ChangeEvent, ChangeListener, Editor};
pub use error::{Error, Result};
pub use model::KnowledgeBase;
pub use parser::parse_rows;
pub use search::{SearchFilters, SearchIndex, SearchResponse, TrainingSource};
