use paper_common::{ConditionValue, FilterCondition, FilterField, FilterGroup, LogicalOperator};
use serde::Deserialize;

/// Query string of the flat search form: every present field narrows the result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub title_keyword: Option<String>,
    pub author_name: Option<String>,
    pub abstract_keyword: Option<String>,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub min_citations: Option<i64>,
    pub max_citations: Option<i64>,
    pub venue_id: Option<i64>,
    /// Comma-separated tag names; a paper matches when it carries any of them
    pub tags: Option<String>,
}

impl SearchFilters {
    /// Converts the flat form into an `AND` group of conditions with default operators
    pub fn to_group(&self) -> FilterGroup {
        let text = |field: FilterField, value: &Option<String>| {
            value
                .as_ref()
                .map(|v| FilterCondition::new(field).with_value(ConditionValue::Text(v.clone())))
        };
        let number = |field: FilterField, value: Option<i64>| {
            value.map(|v| FilterCondition::new(field).with_value(ConditionValue::Number(v)))
        };
        let tags = self.tags.as_ref().map(|raw| {
            let names = raw.split(',').map(|name| name.trim().to_string()).collect();
            FilterCondition::new(FilterField::Tags).with_value(ConditionValue::List(names))
        });

        let conditions = [
            text(FilterField::TitleKeyword, &self.title_keyword),
            text(FilterField::AuthorName, &self.author_name),
            text(FilterField::AbstractKeyword, &self.abstract_keyword),
            number(FilterField::YearFrom, self.year_from),
            number(FilterField::YearTo, self.year_to),
            number(FilterField::MinCitations, self.min_citations),
            number(FilterField::MaxCitations, self.max_citations),
            number(FilterField::VenueId, self.venue_id),
            tags,
        ];

        conditions
            .into_iter()
            .flatten()
            .fold(FilterGroup::new(LogicalOperator::And), |group, condition| {
                group.with_condition(condition)
            })
    }
}
