//! Wire types for the complex paper query

use super::errors::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generates a fresh opaque identifier for a condition or group.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    TitleKeyword,
    AuthorName,
    AbstractKeyword,
    YearFrom,
    YearTo,
    MinCitations,
    MaxCitations,
    VenueId,
    Tags,
}

/// Shape family of a field: decides which operators and value types apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    FreeText,
    Numeric,
    Identifier,
    MultiValued,
}

impl FilterField {
    pub const ALL: [FilterField; 9] = [
        FilterField::TitleKeyword,
        FilterField::AuthorName,
        FilterField::AbstractKeyword,
        FilterField::YearFrom,
        FilterField::YearTo,
        FilterField::MinCitations,
        FilterField::MaxCitations,
        FilterField::VenueId,
        FilterField::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TitleKeyword => "title_keyword",
            Self::AuthorName => "author_name",
            Self::AbstractKeyword => "abstract_keyword",
            Self::YearFrom => "year_from",
            Self::YearTo => "year_to",
            Self::MinCitations => "min_citations",
            Self::MaxCitations => "max_citations",
            Self::VenueId => "venue_id",
            Self::Tags => "tags",
        }
    }

    /// Human-readable label used by the query preview
    pub fn label(&self) -> &'static str {
        match self {
            Self::TitleKeyword => "Title",
            Self::AuthorName => "Author",
            Self::AbstractKeyword => "Abstract",
            Self::YearFrom => "Year from",
            Self::YearTo => "Year to",
            Self::MinCitations => "Min citations",
            Self::MaxCitations => "Max citations",
            Self::VenueId => "Venue",
            Self::Tags => "Tags",
        }
    }

    pub fn class(&self) -> FieldClass {
        match self {
            Self::TitleKeyword | Self::AuthorName | Self::AbstractKeyword => FieldClass::FreeText,
            Self::YearFrom | Self::YearTo | Self::MinCitations | Self::MaxCitations => {
                FieldClass::Numeric
            }
            Self::VenueId => FieldClass::Identifier,
            Self::Tags => FieldClass::MultiValued,
        }
    }

    pub fn valid_operators(&self) -> &'static [FilterOperator] {
        match self.class() {
            FieldClass::FreeText => &[FilterOperator::Contains, FilterOperator::Equals],
            FieldClass::Numeric => &[
                FilterOperator::GreaterThan,
                FilterOperator::LessThan,
                FilterOperator::GreaterEqual,
                FilterOperator::LessEqual,
                FilterOperator::Equals,
            ],
            FieldClass::Identifier => &[FilterOperator::Equals],
            FieldClass::MultiValued => &[FilterOperator::In],
        }
    }

    pub fn default_operator(&self) -> FilterOperator {
        match self {
            Self::TitleKeyword | Self::AuthorName | Self::AbstractKeyword => {
                FilterOperator::Contains
            }
            Self::YearFrom | Self::MinCitations => FilterOperator::GreaterEqual,
            Self::YearTo | Self::MaxCitations => FilterOperator::LessEqual,
            Self::VenueId => FilterOperator::Equals,
            Self::Tags => FilterOperator::In,
        }
    }

    /// The unset value matching this field's value shape
    pub fn default_value(&self) -> ConditionValue {
        match self.class() {
            FieldClass::MultiValued => ConditionValue::List(Vec::new()),
            _ => ConditionValue::Text(String::new()),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    Equals,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    In,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterEqual => "greater_equal",
            Self::LessEqual => "less_equal",
            Self::In => "in",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::In => "in",
        }
    }

    pub fn is_valid_for(&self, field: FilterField) -> bool {
        field.valid_operators().contains(self)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combinator of a group, or the relation of an authored condition to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw condition value as it travels on the wire: `number | string | string[]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl ConditionValue {
    /// Empty text, an empty set, or a set holding only blank names
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl Default for ConditionValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub id: String,
    pub field: FilterField,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: ConditionValue,
}

/// Typed value of a condition that passed validation and is not inert
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Text(String),
    Number(i64),
    Set(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    pub field: FilterField,
    pub operator: FilterOperator,
    pub value: ResolvedValue,
}

impl FilterCondition {
    /// A condition on `field` with a fresh id, the field's default operator and an unset value
    pub fn new(field: FilterField) -> Self {
        Self {
            id: new_id(),
            field,
            operator: field.default_operator(),
            value: field.default_value(),
        }
    }

    pub fn with_value(mut self, value: ConditionValue) -> Self {
        self.value = value;
        self
    }

    pub fn with_operator(mut self, operator: FilterOperator) -> Self {
        self.operator = operator;
        self
    }

    /// True when the condition carries no effective value and must be left out of compilation.
    /// Numeric text that does not parse is inert as well: it never turns into `= 0`.
    pub fn is_inert(&self) -> bool {
        matches!(self.resolve(), Ok(None))
    }

    /// Validates operator and value shape against the field class.
    ///
    /// Returns `Ok(None)` for an inert condition, `Err` for a condition that can never be
    /// compiled (operator not allowed for the field, value of the wrong JSON shape).
    pub fn resolve(&self) -> Result<Option<ResolvedCondition>, QueryError> {
        if !self.operator.is_valid_for(self.field) {
            return Err(QueryError::InvalidOperator {
                condition_id: self.id.clone(),
                field: self.field,
                operator: self.operator,
            });
        }
        if self.value.is_unset() {
            return Ok(None);
        }

        let value = match (self.field.class(), &self.value) {
            (FieldClass::FreeText, ConditionValue::Text(s)) => {
                ResolvedValue::Text(s.trim().to_string())
            }
            (FieldClass::Numeric | FieldClass::Identifier, ConditionValue::Number(n)) => {
                ResolvedValue::Number(*n)
            }
            (FieldClass::Numeric | FieldClass::Identifier, ConditionValue::Text(s)) => {
                match s.trim().parse::<i64>() {
                    Ok(n) => ResolvedValue::Number(n),
                    Err(_) => return Ok(None),
                }
            }
            (FieldClass::MultiValued, ConditionValue::List(items)) => {
                let mut names: Vec<String> = Vec::new();
                for item in items {
                    let name = item.trim();
                    if !name.is_empty() && !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
                ResolvedValue::Set(names)
            }
            (FieldClass::MultiValued, ConditionValue::Text(s)) => {
                ResolvedValue::Set(vec![s.trim().to_string()])
            }
            (_, value) => {
                return Err(QueryError::InvalidValue {
                    condition_id: self.id.clone(),
                    field: self.field,
                    reason: format!("a {} value is not accepted", value.kind()),
                })
            }
        };

        Ok(Some(ResolvedCondition {
            field: self.field,
            operator: self.operator,
            value,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    pub operator: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            id: new_id(),
            operator,
            conditions: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }
}

/// Complete search request body apart from pagination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexSearchQuery {
    pub root: FilterGroup,
}

impl ComplexSearchQuery {
    pub fn new(root: FilterGroup) -> Self {
        Self { root }
    }

    /// Query over an empty `AND` root, matching every paper
    pub fn match_all() -> Self {
        Self::new(FilterGroup::new(LogicalOperator::And))
    }
}

pub const DEFAULT_SEARCH_LIMIT: i64 = 100;

fn default_search_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

/// Body of `POST /papers/search/complex`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub root: FilterGroup,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

impl SearchRequest {
    pub fn new(query: ComplexSearchQuery, skip: i64, limit: i64) -> Self {
        Self {
            root: query.root,
            skip,
            limit,
        }
    }

    pub fn query(&self) -> ComplexSearchQuery {
        ComplexSearchQuery::new(self.root.clone())
    }
}
