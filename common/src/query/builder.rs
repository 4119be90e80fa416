//! Flat authoring model behind the search form.
//!
//! The form holds a list of named groups, each a single level of conditions. Every condition
//! declares how it relates to the next one (AND/OR); groups always relate to each other by AND.
//! `canonicalize` turns this into the recursive tree understood by the server.

use super::errors::QueryError;
use super::tree::ConditionUpdate;
use super::types::{
    new_id, ComplexSearchQuery, FilterCondition, FilterField, FilterGroup, LogicalOperator,
    ResolvedCondition, ResolvedValue,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredCondition {
    pub condition: FilterCondition,
    /// Relation to the next condition of the same group
    #[serde(default)]
    pub relation: LogicalOperator,
}

impl AuthoredCondition {
    pub fn new(condition: FilterCondition) -> Self {
        Self {
            condition,
            relation: LogicalOperator::And,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredGroup {
    pub id: String,
    pub name: String,
    pub conditions: Vec<AuthoredCondition>,
}

impl AuthoredGroup {
    /// A named group holding one default condition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            conditions: vec![AuthoredCondition::new(FilterCondition::new(
                FilterField::TitleKeyword,
            ))],
        }
    }

    /// Active conditions in authored order, with their validated values.
    /// Fails on the first condition that can never compile.
    fn active(&self) -> Result<Vec<(&AuthoredCondition, ResolvedCondition)>, QueryError> {
        let mut active = Vec::new();
        for authored in &self.conditions {
            if let Some(resolved) = authored.condition.resolve()? {
                active.push((authored, resolved));
            }
        }
        Ok(active)
    }

    /// OR as soon as one active condition declares OR towards the next active condition.
    /// Relations declared by inert conditions, and by the last active one, do not count.
    pub fn effective_operator(&self) -> Result<LogicalOperator, QueryError> {
        let active = self.active()?;
        Ok(effective_operator(&active))
    }
}

fn effective_operator(active: &[(&AuthoredCondition, ResolvedCondition)]) -> LogicalOperator {
    let linked = active.len().saturating_sub(1);
    if active[..linked]
        .iter()
        .any(|(authored, _)| authored.relation == LogicalOperator::Or)
    {
        LogicalOperator::Or
    } else {
        LogicalOperator::And
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBuilder {
    pub groups: Vec<AuthoredGroup>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            groups: vec![AuthoredGroup::new("Group 1")],
        }
    }

    pub fn find_group(&self, group_id: &str) -> Option<&AuthoredGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn find_condition(&self, condition_id: &str) -> Option<&AuthoredCondition> {
        self.groups
            .iter()
            .flat_map(|g| g.conditions.iter())
            .find(|c| c.condition.id == condition_id)
    }

    pub fn add_group(&self) -> Self {
        let mut next = self.clone();
        let name = format!("Group {}", next.groups.len() + 1);
        next.groups.push(AuthoredGroup::new(name));
        next
    }

    /// Drops a group; the form always keeps at least one
    pub fn remove_group(&self, group_id: &str) -> Self {
        let mut next = self.clone();
        if next.groups.len() > 1 {
            next.groups.retain(|g| g.id != group_id);
        }
        next
    }

    pub fn rename_group(&self, group_id: &str, name: &str) -> Self {
        let mut next = self.clone();
        if let Some(group) = next.groups.iter_mut().find(|g| g.id == group_id) {
            group.name = name.to_string();
        }
        next
    }

    pub fn add_condition(&self, group_id: &str) -> Self {
        let mut next = self.clone();
        if let Some(group) = next.groups.iter_mut().find(|g| g.id == group_id) {
            group
                .conditions
                .push(AuthoredCondition::new(FilterCondition::new(
                    FilterField::TitleKeyword,
                )));
        }
        next
    }

    pub fn remove_condition(&self, condition_id: &str) -> Self {
        let mut next = self.clone();
        for group in &mut next.groups {
            group.conditions.retain(|c| c.condition.id != condition_id);
        }
        next
    }

    pub fn update_condition(&self, condition_id: &str, update: &ConditionUpdate) -> Self {
        self.edit_condition(condition_id, |authored| {
            authored.condition = authored.condition.updated(update)
        })
    }

    pub fn set_relation(&self, condition_id: &str, relation: LogicalOperator) -> Self {
        self.edit_condition(condition_id, |authored| authored.relation = relation)
    }

    fn edit_condition(&self, condition_id: &str, edit: impl FnOnce(&mut AuthoredCondition)) -> Self {
        let mut next = self.clone();
        if let Some(authored) = next
            .groups
            .iter_mut()
            .flat_map(|g| g.conditions.iter_mut())
            .find(|c| c.condition.id == condition_id)
        {
            edit(authored);
        }
        next
    }

    pub fn active_condition_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.conditions.iter())
            .filter(|c| matches!(c.condition.resolve(), Ok(Some(_))))
            .count()
    }

    /// Builds the single-root tree sent to the server.
    ///
    /// Inert conditions and groups left without active conditions are dropped. One surviving
    /// group becomes the root itself; several are wrapped under a fresh `AND` root in authored
    /// order; none yields an empty `AND` root, which matches every paper.
    pub fn canonicalize(&self) -> Result<ComplexSearchQuery, QueryError> {
        let mut survivors = Vec::new();
        for group in &self.groups {
            let active = group.active()?;
            if active.is_empty() {
                continue;
            }
            survivors.push(FilterGroup {
                id: group.id.clone(),
                operator: effective_operator(&active),
                conditions: active
                    .iter()
                    .map(|(authored, _)| authored.condition.clone())
                    .collect(),
                groups: Vec::new(),
            });
        }

        let root = match survivors.len() {
            0 => FilterGroup::new(LogicalOperator::And),
            1 => survivors.remove(0),
            _ => FilterGroup {
                groups: survivors,
                ..FilterGroup::new(LogicalOperator::And)
            },
        };
        Ok(ComplexSearchQuery::new(root))
    }

    /// Human-readable rendering of the authored query, for display only.
    ///
    /// Conditions are joined by their declared relations, multi-condition groups are
    /// parenthesized and groups are joined by AND. Invalid and inert conditions are skipped.
    pub fn preview(&self) -> String {
        let mut parts = Vec::new();
        for group in &self.groups {
            let active: Vec<(&AuthoredCondition, ResolvedCondition)> = group
                .conditions
                .iter()
                .filter_map(|authored| {
                    authored
                        .condition
                        .resolve()
                        .ok()
                        .flatten()
                        .map(|resolved| (authored, resolved))
                })
                .collect();
            if active.is_empty() {
                continue;
            }

            let mut text = String::new();
            for (i, (_, resolved)) in active.iter().enumerate() {
                if i > 0 {
                    text.push(' ');
                    text.push_str(active[i - 1].0.relation.as_str());
                    text.push(' ');
                }
                text.push_str(&render_condition(resolved));
            }
            if active.len() > 1 {
                text = format!("({})", text);
            }
            parts.push(text);
        }
        parts.join(" AND ")
    }
}

fn render_condition(condition: &ResolvedCondition) -> String {
    let value = match &condition.value {
        ResolvedValue::Text(s) => format!("\"{}\"", s),
        ResolvedValue::Number(n) => format!("\"{}\"", n),
        ResolvedValue::Set(items) => {
            let quoted: Vec<String> = items.iter().map(|s| format!("\"{}\"", s)).collect();
            format!("[{}]", quoted.join(", "))
        }
    };
    format!(
        "{} {} {}",
        condition.field.label(),
        condition.operator.glyph(),
        value
    )
}
