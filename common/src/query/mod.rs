mod builder;
mod errors;
mod form;
mod tree;
mod types;

pub use builder::{AuthoredCondition, AuthoredGroup, QueryBuilder};
pub use errors::QueryError;
pub use form::{SearchForm, Submission, SubmitError, SubmitState};
pub use tree::{ConditionUpdate, MAX_GROUP_DEPTH};
pub use types::{
    new_id, ComplexSearchQuery, ConditionValue, FieldClass, FilterCondition, FilterField,
    FilterGroup, FilterOperator, LogicalOperator, ResolvedCondition, ResolvedValue,
    SearchRequest, DEFAULT_SEARCH_LIMIT,
};
