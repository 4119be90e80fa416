/// Default database URL for local development
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./papers.db?mode=rwc";

pub mod authors;
pub mod core;
pub mod import;
pub mod papers;
pub mod tags;
pub mod types;
pub mod venues;

// Re-export main types
pub use import::{ColumnMapping, ImportPreview, ImportResult};
pub use papers::{PaperCreate, PaperUpdate};
pub use types::{Author, Database, PaperRecord, Tag, Venue};

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
