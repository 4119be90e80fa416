use super::builder::{build_sql, validate_pagination, SqlValue, MAX_PAGE_SIZE};
use super::SearchFilters;
use paper_common::{
    ConditionValue, FilterCondition, FilterField, FilterGroup, FilterOperator, LogicalOperator,
    QueryError, MAX_GROUP_DEPTH,
};

fn text(field: FilterField, value: &str) -> FilterCondition {
    FilterCondition::new(field).with_value(ConditionValue::Text(value.to_string()))
}

fn number(field: FilterField, value: i64) -> FilterCondition {
    FilterCondition::new(field).with_value(ConditionValue::Number(value))
}

fn tags(names: &[&str]) -> FilterCondition {
    FilterCondition::new(FilterField::Tags).with_value(ConditionValue::List(
        names.iter().map(|n| n.to_string()).collect(),
    ))
}

#[test]
fn test_empty_root_is_noop() {
    let root = FilterGroup::new(LogicalOperator::And);
    assert_eq!(build_sql(&root).unwrap(), None);
}

#[test]
fn test_nested_empty_groups_are_noop() {
    let root = FilterGroup::new(LogicalOperator::Or)
        .with_group(FilterGroup::new(LogicalOperator::And))
        .with_group(
            FilterGroup::new(LogicalOperator::And)
                .with_condition(FilterCondition::new(FilterField::TitleKeyword)),
        );
    assert_eq!(build_sql(&root).unwrap(), None);
}

#[test]
fn test_title_contains() {
    let root =
        FilterGroup::new(LogicalOperator::And).with_condition(text(FilterField::TitleKeyword, "neural"));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.sql, "p.title_folded LIKE ? ESCAPE '\\'");
    assert_eq!(predicate.binds, vec![SqlValue::String("%neural%".into())]);
}

#[test]
fn test_contains_folds_non_ascii_case() {
    let root =
        FilterGroup::new(LogicalOperator::And).with_condition(text(FilterField::TitleKeyword, "ÜBER Straße"));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.binds, vec![SqlValue::String("%über straße%".into())]);
}

#[test]
fn test_contains_escapes_wildcards() {
    let root =
        FilterGroup::new(LogicalOperator::And).with_condition(text(FilterField::TitleKeyword, "100%_a\\b"));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(
        predicate.binds,
        vec![SqlValue::String("%100\\%\\_a\\\\b%".into())]
    );
}

#[test]
fn test_abstract_equals_trims_value() {
    let root = FilterGroup::new(LogicalOperator::And).with_condition(
        text(FilterField::AbstractKeyword, "  exact  ").with_operator(FilterOperator::Equals),
    );
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.sql, "p.abstract = ?");
    assert_eq!(predicate.binds, vec![SqlValue::String("exact".into())]);
}

#[test]
fn test_author_uses_exists_subquery() {
    let root =
        FilterGroup::new(LogicalOperator::And).with_condition(text(FilterField::AuthorName, "Lovelace"));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert!(predicate.sql.starts_with("EXISTS (SELECT 1 FROM paper_authors pa"));
    assert!(predicate.sql.contains("a.name_folded LIKE ? ESCAPE '\\'"));
    assert_eq!(predicate.binds, vec![SqlValue::String("%lovelace%".into())]);
}

#[test]
fn test_numeric_operators_map_directly() {
    let cases = [
        (FilterOperator::GreaterThan, ">"),
        (FilterOperator::LessThan, "<"),
        (FilterOperator::GreaterEqual, ">="),
        (FilterOperator::LessEqual, "<="),
        (FilterOperator::Equals, "="),
    ];
    for (operator, op) in cases {
        let root = FilterGroup::new(LogicalOperator::And)
            .with_condition(number(FilterField::MinCitations, 10).with_operator(operator));
        let predicate = build_sql(&root).unwrap().unwrap();
        assert_eq!(predicate.sql, format!("p.citation_count {} ?", op));
        assert_eq!(predicate.binds, vec![SqlValue::Integer(10)]);
    }
}

#[test]
fn test_year_range_and_group() {
    let root = FilterGroup::new(LogicalOperator::And)
        .with_condition(number(FilterField::YearFrom, 2020))
        .with_condition(number(FilterField::YearTo, 2022));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(
        predicate.sql,
        "(p.publication_year >= ? AND p.publication_year <= ?)"
    );
    assert_eq!(
        predicate.binds,
        vec![SqlValue::Integer(2020), SqlValue::Integer(2022)]
    );
}

#[test]
fn test_numeric_text_is_parsed() {
    let root = FilterGroup::new(LogicalOperator::And)
        .with_condition(text(FilterField::YearFrom, " 2021 "));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.binds, vec![SqlValue::Integer(2021)]);
}

#[test]
fn test_unparseable_numeric_text_is_dropped() {
    let root = FilterGroup::new(LogicalOperator::And)
        .with_condition(text(FilterField::YearFrom, "twenty"))
        .with_condition(text(FilterField::TitleKeyword, "graph"));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.sql, "p.title_folded LIKE ? ESCAPE '\\'");
}

#[test]
fn test_venue_equals() {
    let root =
        FilterGroup::new(LogicalOperator::And).with_condition(number(FilterField::VenueId, 7));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.sql, "p.venue_id = ?");
    assert_eq!(predicate.binds, vec![SqlValue::Integer(7)]);
}

#[test]
fn test_tags_in_dedupes_names() {
    let root = FilterGroup::new(LogicalOperator::And).with_condition(tags(&["ML", " NLP ", "ML", ""]));
    let predicate = build_sql(&root).unwrap().unwrap();
    assert!(predicate.sql.ends_with("t.name IN (?, ?))"));
    assert_eq!(
        predicate.binds,
        vec![SqlValue::String("ML".into()), SqlValue::String("NLP".into())]
    );
}

#[test]
fn test_empty_tag_set_is_dropped() {
    let root = FilterGroup::new(LogicalOperator::And).with_condition(tags(&[]));
    assert_eq!(build_sql(&root).unwrap(), None);
}

#[test]
fn test_or_of_groups_binds_in_textual_order() {
    let root = FilterGroup::new(LogicalOperator::Or)
        .with_condition(text(FilterField::TitleKeyword, "a"))
        .with_group(
            FilterGroup::new(LogicalOperator::And)
                .with_condition(number(FilterField::YearFrom, 2000))
                .with_condition(tags(&["x"])),
        );
    let predicate = build_sql(&root).unwrap().unwrap();
    assert!(predicate.sql.starts_with("(p.title_folded LIKE ? ESCAPE '\\' OR (p.publication_year >= ? AND EXISTS"));
    assert!(predicate.sql.ends_with("))"));
    assert_eq!(
        predicate.binds,
        vec![
            SqlValue::String("%a%".into()),
            SqlValue::Integer(2000),
            SqlValue::String("x".into()),
        ]
    );
}

#[test]
fn test_single_surviving_child_is_not_wrapped() {
    let root = FilterGroup::new(LogicalOperator::Or)
        .with_group(FilterGroup::new(LogicalOperator::And))
        .with_group(
            FilterGroup::new(LogicalOperator::And)
                .with_condition(number(FilterField::VenueId, 3)),
        );
    let predicate = build_sql(&root).unwrap().unwrap();
    assert_eq!(predicate.sql, "p.venue_id = ?");
}

#[test]
fn test_invalid_operator_is_rejected() {
    let root = FilterGroup::new(LogicalOperator::And).with_condition(
        text(FilterField::TitleKeyword, "x").with_operator(FilterOperator::GreaterThan),
    );
    assert!(matches!(
        build_sql(&root),
        Err(QueryError::InvalidOperator { .. })
    ));
}

#[test]
fn test_wrong_value_shape_is_rejected() {
    let root = FilterGroup::new(LogicalOperator::And).with_condition(
        FilterCondition::new(FilterField::YearFrom)
            .with_value(ConditionValue::List(vec!["2020".into()])),
    );
    assert!(matches!(
        build_sql(&root),
        Err(QueryError::InvalidValue { .. })
    ));
}

#[test]
fn test_too_deep_tree_is_rejected() {
    let mut group = FilterGroup::new(LogicalOperator::And);
    for _ in 0..MAX_GROUP_DEPTH {
        group = FilterGroup::new(LogicalOperator::And).with_group(group);
    }
    assert_eq!(
        build_sql(&group),
        Err(QueryError::TooDeep {
            max_depth: MAX_GROUP_DEPTH
        })
    );
}

#[test]
fn test_pagination_bounds() {
    assert!(validate_pagination(0, 1).is_ok());
    assert!(validate_pagination(50, MAX_PAGE_SIZE).is_ok());
    assert!(validate_pagination(-1, 10).is_err());
    assert!(validate_pagination(0, 0).is_err());
    assert!(validate_pagination(0, MAX_PAGE_SIZE + 1).is_err());
}

#[test]
fn test_search_filters_to_group() {
    let filters = SearchFilters {
        title_keyword: Some("graph".into()),
        year_from: Some(2019),
        tags: Some("ML, NLP".into()),
        ..Default::default()
    };
    let group = filters.to_group();
    assert_eq!(group.operator, LogicalOperator::And);
    assert_eq!(group.conditions.len(), 3);
    let predicate = build_sql(&group).unwrap().unwrap();
    assert_eq!(
        predicate.binds,
        vec![
            SqlValue::String("%graph%".into()),
            SqlValue::Integer(2019),
            SqlValue::String("ML".into()),
            SqlValue::String("NLP".into()),
        ]
    );
}

#[test]
fn test_empty_search_filters_match_all() {
    let group = SearchFilters::default().to_group();
    assert!(group.conditions.is_empty());
    assert_eq!(build_sql(&group).unwrap(), None);
}
