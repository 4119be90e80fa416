//! Pure edits on the recursive filter tree.
//!
//! Every edit clones the tree and returns the new snapshot; the receiver is never touched.
//! Lookups walk the tree in pre-order (node, then children in list order).

use super::errors::QueryError;
use super::types::{
    ConditionValue, FilterCondition, FilterField, FilterGroup, FilterOperator, LogicalOperator,
};

/// Deepest nesting the server accepts, counting the root as level 1
pub const MAX_GROUP_DEPTH: usize = 32;

/// Partial update merged into one condition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionUpdate {
    pub field: Option<FilterField>,
    pub operator: Option<FilterOperator>,
    pub value: Option<ConditionValue>,
}

impl ConditionUpdate {
    pub fn field(field: FilterField) -> Self {
        Self {
            field: Some(field),
            ..Self::default()
        }
    }

    pub fn operator(operator: FilterOperator) -> Self {
        Self {
            operator: Some(operator),
            ..Self::default()
        }
    }

    pub fn value(value: ConditionValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }
}

impl FilterCondition {
    /// Applies `update`. A field change resets the value to the new field's unset shape, and the
    /// operator to the field default when the old one is not allowed there. Explicit operator and
    /// value in the same update are applied after that reset.
    pub fn updated(&self, update: &ConditionUpdate) -> FilterCondition {
        let mut next = self.clone();
        if let Some(field) = update.field {
            if field != next.field {
                next.field = field;
                next.value = field.default_value();
                if !next.operator.is_valid_for(field) {
                    next.operator = field.default_operator();
                }
            }
        }
        if let Some(operator) = update.operator {
            next.operator = operator;
        }
        if let Some(value) = &update.value {
            next.value = value.clone();
        }
        next
    }
}

impl FilterGroup {
    pub fn find_group(&self, group_id: &str) -> Option<&FilterGroup> {
        if self.id == group_id {
            return Some(self);
        }
        self.groups.iter().find_map(|g| g.find_group(group_id))
    }

    pub fn find_condition(&self, condition_id: &str) -> Option<&FilterCondition> {
        self.conditions
            .iter()
            .find(|c| c.id == condition_id)
            .or_else(|| {
                self.groups
                    .iter()
                    .find_map(|g| g.find_condition(condition_id))
            })
    }

    fn find_group_mut(&mut self, group_id: &str) -> Option<&mut FilterGroup> {
        if self.id == group_id {
            return Some(self);
        }
        self.groups
            .iter_mut()
            .find_map(|g| g.find_group_mut(group_id))
    }

    fn find_condition_mut(&mut self, condition_id: &str) -> Option<&mut FilterCondition> {
        if let Some(pos) = self.conditions.iter().position(|c| c.id == condition_id) {
            return self.conditions.get_mut(pos);
        }
        self.groups
            .iter_mut()
            .find_map(|g| g.find_condition_mut(condition_id))
    }

    fn edit_group(&self, group_id: &str, edit: impl FnOnce(&mut FilterGroup)) -> FilterGroup {
        let mut next = self.clone();
        if let Some(group) = next.find_group_mut(group_id) {
            edit(group);
        }
        next
    }

    /// Appends a default condition to the group `group_id`; no-op when the id is unknown
    pub fn add_condition(&self, group_id: &str) -> FilterGroup {
        self.edit_group(group_id, |g| {
            g.conditions
                .push(FilterCondition::new(FilterField::TitleKeyword))
        })
    }

    pub fn remove_condition(&self, condition_id: &str) -> FilterGroup {
        let mut next = self.clone();
        next.retain_conditions(condition_id);
        next
    }

    fn retain_conditions(&mut self, condition_id: &str) {
        self.conditions.retain(|c| c.id != condition_id);
        for group in &mut self.groups {
            group.retain_conditions(condition_id);
        }
    }

    pub fn update_condition(&self, condition_id: &str, update: &ConditionUpdate) -> FilterGroup {
        let mut next = self.clone();
        if let Some(condition) = next.find_condition_mut(condition_id) {
            *condition = condition.updated(update);
        }
        next
    }

    /// Appends an empty `AND` child group under `parent_id`
    pub fn add_sub_group(&self, parent_id: &str) -> FilterGroup {
        self.edit_group(parent_id, |g| g.groups.push(FilterGroup::new(LogicalOperator::And)))
    }

    /// Removes the group `group_id` with its whole subtree. Asking to remove the root returns the
    /// tree unchanged.
    pub fn remove_group(&self, group_id: &str) -> FilterGroup {
        let mut next = self.clone();
        if next.id != group_id {
            next.retain_groups(group_id);
        }
        next
    }

    fn retain_groups(&mut self, group_id: &str) {
        self.groups.retain(|g| g.id != group_id);
        for group in &mut self.groups {
            group.retain_groups(group_id);
        }
    }

    pub fn set_operator(&self, group_id: &str, operator: LogicalOperator) -> FilterGroup {
        self.edit_group(group_id, |g| g.operator = operator)
    }

    /// Levels of nesting, the node itself included
    pub fn depth(&self) -> usize {
        1 + self.groups.iter().map(|g| g.depth()).max().unwrap_or(0)
    }

    /// Non-inert conditions anywhere in the subtree
    pub fn active_condition_count(&self) -> usize {
        let own = self
            .conditions
            .iter()
            .filter(|c| matches!(c.resolve(), Ok(Some(_))))
            .count();
        own + self
            .groups
            .iter()
            .map(|g| g.active_condition_count())
            .sum::<usize>()
    }

    /// Rejects trees the compiler must not see: too deep, or holding an invalid condition
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.depth() > MAX_GROUP_DEPTH {
            return Err(QueryError::TooDeep {
                max_depth: MAX_GROUP_DEPTH,
            });
        }
        self.validate_conditions()
    }

    fn validate_conditions(&self) -> Result<(), QueryError> {
        for condition in &self.conditions {
            condition.resolve()?;
        }
        for group in &self.groups {
            group.validate_conditions()?;
        }
        Ok(())
    }
}
