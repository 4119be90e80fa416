mod builder;
mod filters;

pub use builder::{build_sql, fold_text, validate_pagination, SqlValue, ORDER_AND_PAGE};
pub use filters::SearchFilters;

#[cfg(test)]
mod tests;
