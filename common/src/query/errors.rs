use super::types::{FilterField, FilterOperator};

/// Reasons a query is rejected before it reaches the store
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    InvalidOperator {
        condition_id: String,
        field: FilterField,
        operator: FilterOperator,
    },
    InvalidValue {
        condition_id: String,
        field: FilterField,
        reason: String,
    },
    TooDeep { max_depth: usize },
    Malformed(String),
    InvalidPagination(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidOperator {
                condition_id,
                field,
                operator,
            } => write!(
                f,
                "Operator '{}' is not valid for field '{}' (condition {})",
                operator, field, condition_id
            ),
            QueryError::InvalidValue {
                condition_id,
                field,
                reason,
            } => write!(
                f,
                "Invalid value for field '{}' (condition {}): {}",
                field, condition_id, reason
            ),
            QueryError::TooDeep { max_depth } => {
                write!(f, "Filter groups are nested deeper than {} levels", max_depth)
            }
            QueryError::Malformed(msg) => write!(f, "Malformed query: {}", msg),
            QueryError::InvalidPagination(msg) => write!(f, "Invalid pagination: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}
