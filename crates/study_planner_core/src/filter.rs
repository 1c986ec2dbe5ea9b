//! crates/study_planner_core/src/filter.rs
//!
//! Search and filter over an in-memory task list, as shown in the task view.

use serde::{Deserialize, Serialize};

use crate::domain::{AiTask, Priority, Task};

/// Anything that can be shown in a filtered task list.
pub trait Filterable {
    fn text(&self) -> &str;
    fn priority(&self) -> Priority;
    fn completed(&self) -> bool;
}

impl Filterable for Task {
    fn text(&self) -> &str {
        &self.text
    }
    fn priority(&self) -> Priority {
        self.priority
    }
    fn completed(&self) -> bool {
        self.completed
    }
}

impl Filterable for AiTask {
    fn text(&self) -> &str {
        &self.text
    }
    fn priority(&self) -> Priority {
        self.priority
    }
    fn completed(&self) -> bool {
        self.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl PriorityFilter {
    fn accepts(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Low => priority == Priority::Low,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::High => priority == Priority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    fn accepts(&self, completed: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Completed => completed,
            StatusFilter::Pending => !completed,
        }
    }
}

/// The three view-state predicates; an item is shown only if it passes all of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub priority: PriorityFilter,
    #[serde(default)]
    pub status: StatusFilter,
}

impl TaskFilter {
    pub fn is_active(&self) -> bool {
        !self.search.is_empty()
            || self.priority != PriorityFilter::All
            || self.status != StatusFilter::All
    }

    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        let matches_search = item
            .text()
            .to_lowercase()
            .contains(&self.search.to_lowercase());
        matches_search && self.priority.accepts(item.priority()) && self.status.accepts(item.completed())
    }

    /// Returns the matching items, keeping their original order.
    pub fn apply<'a, T: Filterable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }
}

/// Completion counters for the full list and for the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub completed: usize,
    pub total: usize,
    pub filtered_completed: usize,
    pub filtered_total: usize,
}

impl TaskCounts {
    pub fn compute<T: Filterable>(all: &[T], filtered: &[&T]) -> Self {
        Self {
            completed: all.iter().filter(|t| t.completed()).count(),
            total: all.len(),
            filtered_completed: filtered.iter().filter(|t| t.completed()).count(),
            filtered_total: filtered.len(),
        }
    }
}
