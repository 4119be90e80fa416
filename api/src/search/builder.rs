use paper_common::{
    FilterField, FilterGroup, FilterOperator, LogicalOperator, QueryError, ResolvedCondition,
    ResolvedValue, MAX_GROUP_DEPTH,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Integer(i64),
}

/// A WHERE fragment over the `papers p` alias with its bind values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

impl SqlPredicate {
    fn new(sql: String, binds: Vec<SqlValue>) -> Self {
        Self { sql, binds }
    }
}

pub const MAX_PAGE_SIZE: i64 = 1000;

/// Stable order of complex search results; the id tiebreak keeps pages disjoint
pub const ORDER_AND_PAGE: &str = "ORDER BY p.publication_year DESC, p.id ASC LIMIT ? OFFSET ?";

/// Compiles a filter tree into a SQLite predicate.
///
/// Returns `Ok(None)` when nothing in the tree constrains the result (empty groups, inert
/// conditions); the caller then matches every paper. Placeholders are positional `?` and the
/// bind values follow their textual order.
pub fn build_sql(root: &FilterGroup) -> Result<Option<SqlPredicate>, QueryError> {
    build_group(root, 1)
}

fn build_group(group: &FilterGroup, depth: usize) -> Result<Option<SqlPredicate>, QueryError> {
    if depth > MAX_GROUP_DEPTH {
        return Err(QueryError::TooDeep {
            max_depth: MAX_GROUP_DEPTH,
        });
    }

    let mut parts = Vec::new();
    for condition in &group.conditions {
        if let Some(resolved) = condition.resolve()? {
            parts.push(build_condition(&condition.id, &resolved)?);
        }
    }
    for child in &group.groups {
        if let Some(predicate) = build_group(child, depth + 1)? {
            parts.push(predicate);
        }
    }

    Ok(combine(parts, group.operator))
}

fn combine(mut parts: Vec<SqlPredicate>, operator: LogicalOperator) -> Option<SqlPredicate> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => {
            let joiner = format!(" {} ", operator.as_str());
            let sql = parts
                .iter()
                .map(|p| p.sql.as_str())
                .collect::<Vec<_>>()
                .join(&joiner);
            let binds = parts.into_iter().flat_map(|p| p.binds).collect();
            Some(SqlPredicate::new(format!("({})", sql), binds))
        }
    }
}

fn build_condition(
    condition_id: &str,
    condition: &ResolvedCondition,
) -> Result<SqlPredicate, QueryError> {
    let predicate = match (&condition.field, &condition.value) {
        (FilterField::TitleKeyword, ResolvedValue::Text(text)) => {
            build_text_clause("p.title", condition.operator, text)
        }
        (FilterField::AbstractKeyword, ResolvedValue::Text(text)) => {
            build_text_clause("p.abstract", condition.operator, text)
        }
        (FilterField::AuthorName, ResolvedValue::Text(text)) => {
            let inner = build_text_clause("a.name", condition.operator, text);
            SqlPredicate::new(
                format!(
                    "EXISTS (SELECT 1 FROM paper_authors pa JOIN authors a ON a.id = pa.author_id \
                     WHERE pa.paper_id = p.id AND {})",
                    inner.sql
                ),
                inner.binds,
            )
        }
        (FilterField::YearFrom | FilterField::YearTo, ResolvedValue::Number(n)) => {
            build_comparison_clause("p.publication_year", condition.operator, *n)
        }
        (FilterField::MinCitations | FilterField::MaxCitations, ResolvedValue::Number(n)) => {
            build_comparison_clause("p.citation_count", condition.operator, *n)
        }
        (FilterField::VenueId, ResolvedValue::Number(n)) => {
            build_comparison_clause("p.venue_id", FilterOperator::Equals, *n)
        }
        (FilterField::Tags, ResolvedValue::Set(names)) => build_tags_clause(names),
        (field, _) => {
            return Err(QueryError::InvalidValue {
                condition_id: condition_id.to_string(),
                field: *field,
                reason: "value does not match the field".to_string(),
            })
        }
    };
    Ok(predicate)
}

/// Lowercases text the way the `*_folded` shadow columns are written
pub fn fold_text(text: &str) -> String {
    text.to_lowercase()
}

/// `contains` matches against the folded shadow column of `column`; `equals` is exact
fn build_text_clause(column: &str, operator: FilterOperator, text: &str) -> SqlPredicate {
    match operator {
        FilterOperator::Contains => SqlPredicate::new(
            format!("{}_folded LIKE ? ESCAPE '\\'", column),
            vec![SqlValue::String(format!("%{}%", escape_like(&fold_text(text))))],
        ),
        _ => SqlPredicate::new(
            format!("{} = ?", column),
            vec![SqlValue::String(text.to_string())],
        ),
    }
}

fn build_comparison_clause(column: &str, operator: FilterOperator, value: i64) -> SqlPredicate {
    let op = match operator {
        FilterOperator::GreaterThan => ">",
        FilterOperator::LessThan => "<",
        FilterOperator::GreaterEqual => ">=",
        FilterOperator::LessEqual => "<=",
        _ => "=",
    };
    SqlPredicate::new(
        format!("{} {} ?", column, op),
        vec![SqlValue::Integer(value)],
    )
}

fn build_tags_clause(names: &[String]) -> SqlPredicate {
    let placeholders = vec!["?"; names.len()].join(", ");
    SqlPredicate::new(
        format!(
            "EXISTS (SELECT 1 FROM paper_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.paper_id = p.id AND t.name IN ({}))",
            placeholders
        ),
        names.iter().cloned().map(SqlValue::String).collect(),
    )
}

/// Escapes LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Checks pagination bounds of a complex search request
pub fn validate_pagination(skip: i64, limit: i64) -> Result<(), QueryError> {
    if skip < 0 {
        return Err(QueryError::InvalidPagination(format!(
            "skip must be non-negative, got {}",
            skip
        )));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(QueryError::InvalidPagination(format!(
            "limit must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, limit
        )));
    }
    Ok(())
}
