//! Core types for the task manager.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ids decodable from a raw wire integer.
pub trait RawId: Sized {
    fn from_raw(raw: i64) -> Option<Self>;
}

/// Deserialize an optional id where `0` (or below) means "unset", so the
/// wire sentinel never reaches the crate as `Some`.
fn unset_if_zero<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: RawId,
{
    Ok(Option::<i64>::deserialize(deserializer)?.and_then(T::from_raw))
}

/// Declares an integer surrogate key bound directly to SQL.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Decode a raw wire id, where zero (or below) means "unset".
            pub fn from_raw(raw: i64) -> Option<Self> {
                (raw > 0).then_some(Self(raw))
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl RawId for $name {
            fn from_raw(raw: i64) -> Option<Self> {
                $name::from_raw(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_type!(
    /// Task surrogate key.
    TaskId
);
id_type!(
    /// User surrogate key.
    UserId
);
id_type!(
    /// Group surrogate key.
    GroupId
);
id_type!(
    /// Priority label key. Lower ids rank as more important.
    PriorityId
);
id_type!(StatusId);
id_type!(CategoryId);

/// A persisted task. Subtasks are tasks with a parent reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub priority_id: Option<PriorityId>,
    pub status_id: Option<StatusId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attachments: Option<String>,
    pub category_id: Option<CategoryId>,
    pub parent_task_id: Option<TaskId>,
    pub group_id: Option<GroupId>,
}

impl Task {
    /// Group-ness is decided solely by the group reference.
    pub fn is_group_task(&self) -> bool {
        self.group_id.is_some()
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_task_id.is_some()
    }
}

/// Input for creating a task, optionally with one level of nested subtasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskSpec {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub priority_id: Option<PriorityId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub status_id: Option<StatusId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attachments: Option<String>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub category_id: Option<CategoryId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub group_id: Option<GroupId>,
    /// Users who must act on the task.
    #[serde(default)]
    pub responsible: Vec<UserId>,
    /// Children created together with the task. They inherit the parent's
    /// schedule, attachments, category, group and responsible users.
    #[serde(default)]
    pub subtasks: Vec<CreateTaskSpec>,
}

impl CreateTaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Full replacement of a task's mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub priority_id: Option<PriorityId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub status_id: Option<StatusId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attachments: Option<String>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub category_id: Option<CategoryId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, deserialize_with = "unset_if_zero")]
    pub group_id: Option<GroupId>,
}

impl From<Task> for TaskUpdate {
    fn from(task: Task) -> Self {
        Self {
            name: task.name,
            description: task.description,
            priority_id: task.priority_id,
            status_id: task.status_id,
            start_time: task.start_time,
            end_time: task.end_time,
            attachments: task.attachments,
            category_id: task.category_id,
            parent_task_id: task.parent_task_id,
            group_id: task.group_id,
        }
    }
}

/// A freshly created task with the subtasks created alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTask {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Task>,
}

/// Whose task list a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Group-less tasks assigned to the user.
    Personal(UserId),
    /// Every task of the group.
    Group(GroupId),
}

/// Where a task name must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    /// Top-level tasks assigned to the user, group tasks included.
    Personal(UserId),
    /// Every task of the group, subtasks included.
    Group(GroupId),
    /// Direct children of a task.
    Subtasks(TaskId),
}

impl NameScope {
    /// Human-readable scope used in conflict messages.
    pub fn label(&self) -> &'static str {
        match self {
            NameScope::Personal(_) => "your task list",
            NameScope::Group(_) => "this group",
            NameScope::Subtasks(_) => "this subtasks list",
        }
    }
}

/// Row counts removed by a task deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub comments: usize,
    pub chats: usize,
    pub subtasks: usize,
    pub assignments: usize,
}

/// Priority label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub id: PriorityId,
    pub name: String,
    pub color: Option<String>,
}

/// Status label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub name: String,
}

/// Category label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub info: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_raw_id_means_unset() {
        assert_eq!(StatusId::from_raw(0), None);
        assert_eq!(StatusId::from_raw(-3), None);
        assert_eq!(StatusId::from_raw(4), Some(StatusId(4)));
    }

    #[test]
    fn create_spec_defaults_lists_when_absent() {
        let spec: CreateTaskSpec =
            serde_json::from_str(r#"{"name": "Buy milk", "priority_id": 2}"#).unwrap();
        assert_eq!(spec.name, "Buy milk");
        assert_eq!(spec.priority_id, Some(PriorityId(2)));
        assert!(spec.responsible.is_empty());
        assert!(spec.subtasks.is_empty());
        assert!(spec.group_id.is_none());
    }

    #[test]
    fn zero_ids_in_json_decode_as_unset() {
        let spec: CreateTaskSpec = serde_json::from_str(
            r#"{"name": "Buy milk", "priority_id": 0, "status_id": 0, "group_id": 0,
                "category_id": 0, "parent_task_id": 0}"#,
        )
        .unwrap();
        assert!(spec.priority_id.is_none());
        assert!(spec.status_id.is_none());
        assert!(spec.group_id.is_none());
        assert!(spec.category_id.is_none());
        assert!(spec.parent_task_id.is_none());

        let update: TaskUpdate =
            serde_json::from_str(r#"{"name": "Buy milk", "status_id": 0, "group_id": 3}"#).unwrap();
        assert!(update.status_id.is_none());
        assert_eq!(update.group_id, Some(GroupId(3)));
    }

    #[test]
    fn null_and_missing_ids_are_unset() {
        let update: TaskUpdate =
            serde_json::from_str(r#"{"name": "Buy milk", "priority_id": null}"#).unwrap();
        assert!(update.priority_id.is_none());
        assert!(update.category_id.is_none());
    }

    #[test]
    fn ids_serialize_transparently() {
        let spec = CreateTaskSpec {
            responsible: vec![UserId(7), UserId(8)],
            ..CreateTaskSpec::new("Sprint review")
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["responsible"], serde_json::json!([7, 8]));
    }

    #[test]
    fn group_ness_follows_group_reference() {
        let mut task = Task {
            id: TaskId(1),
            name: "Plan".into(),
            description: None,
            priority_id: None,
            status_id: None,
            start_time: None,
            end_time: None,
            attachments: None,
            category_id: None,
            parent_task_id: None,
            group_id: None,
        };
        assert!(!task.is_group_task());
        assert!(!task.is_subtask());

        task.group_id = Some(GroupId(3));
        task.parent_task_id = Some(TaskId(9));
        assert!(task.is_group_task());
        assert!(task.is_subtask());
    }
}
