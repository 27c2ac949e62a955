//! Task repository: creation with nested subtasks, hierarchy reads,
//! status transitions and the cascading delete.
//!
//! The hierarchy is one level deep in every operation here. `finish_task`
//! and `delete_task` touch a task and its direct children only.

use super::Database;
use crate::error::{TaskError, TaskResult};
use crate::types::{
    CategoryId, CreateTaskSpec, CreatedTask, DeleteSummary, GroupId, NameScope, PriorityId,
    StatusId, Task, TaskId, TaskScope, TaskUpdate, UserId,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Params, Row, TransactionBehavior, params};
use tracing::{debug, info, warn};

/// Number of top-level tasks returned by the most-priority query.
pub const MOST_PRIORITY_LIMIT: usize = 3;

const INSERT_TASK: &str = "INSERT INTO tasks (
    task_name, task_description, priority_id, status_id, start_time, end_time,
    attachments, category_id, parent_task_id, group_id
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

fn to_millis(t: Option<DateTime<Utc>>) -> Option<i64> {
    t.map(|t| t.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("task_id")?,
        name: row.get("task_name")?,
        description: row.get("task_description")?,
        priority_id: row.get("priority_id")?,
        status_id: row.get("status_id")?,
        start_time: from_millis(row.get("start_time")?),
        end_time: from_millis(row.get("end_time")?),
        attachments: row.get("attachments")?,
        category_id: row.get("category_id")?,
        parent_task_id: row.get("parent_task_id")?,
        group_id: row.get("group_id")?,
    })
}

/// Column values for one inserted task row.
struct TaskRow<'a> {
    name: &'a str,
    description: Option<&'a str>,
    priority_id: Option<PriorityId>,
    status_id: Option<StatusId>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    attachments: Option<&'a str>,
    category_id: Option<CategoryId>,
    parent_task_id: Option<TaskId>,
    group_id: Option<GroupId>,
}

impl<'a> TaskRow<'a> {
    fn from_spec(spec: &'a CreateTaskSpec) -> Self {
        Self {
            name: &spec.name,
            description: non_empty(&spec.description),
            priority_id: spec.priority_id,
            status_id: spec.status_id,
            start_time: to_millis(spec.start_time),
            end_time: to_millis(spec.end_time),
            attachments: non_empty(&spec.attachments),
            category_id: spec.category_id,
            parent_task_id: spec.parent_task_id,
            group_id: spec.group_id,
        }
    }

    /// A nested subtask: its own name, description, priority and status;
    /// schedule, attachments, category and group come from the parent.
    fn child_of(child: &'a CreateTaskSpec, parent: &'a CreateTaskSpec, parent_id: TaskId) -> Self {
        Self {
            name: &child.name,
            description: non_empty(&child.description),
            priority_id: child.priority_id,
            status_id: child.status_id,
            parent_task_id: Some(parent_id),
            ..Self::from_spec(parent)
        }
    }

    fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            name: self.name.to_string(),
            description: self.description.map(str::to_string),
            priority_id: self.priority_id,
            status_id: self.status_id,
            start_time: from_millis(self.start_time),
            end_time: from_millis(self.end_time),
            attachments: self.attachments.map(str::to_string),
            category_id: self.category_id,
            parent_task_id: self.parent_task_id,
            group_id: self.group_id,
        }
    }
}

fn insert_task_row(conn: &Connection, row: TaskRow<'_>) -> TaskResult<Task> {
    conn.execute(
        INSERT_TASK,
        params![
            row.name,
            row.description,
            row.priority_id,
            row.status_id,
            row.start_time,
            row.end_time,
            row.attachments,
            row.category_id,
            row.parent_task_id,
            row.group_id,
        ],
    )?;
    let id = TaskId(conn.last_insert_rowid());
    Ok(row.into_task(id))
}

fn insert_assignees(conn: &Connection, task_id: TaskId, users: &[UserId]) -> TaskResult<()> {
    let mut stmt = conn.prepare("INSERT INTO task_assignees (task_id, user_id) VALUES (?1, ?2)")?;
    for user in users {
        stmt.execute(params![task_id, user])?;
    }
    Ok(())
}

/// Responsible users in first-seen order, without repeats.
fn dedup_users(users: &[UserId]) -> Vec<UserId> {
    let mut unique = Vec::with_capacity(users.len());
    for user in users {
        if !unique.contains(user) {
            unique.push(*user);
        }
    }
    unique
}

pub(crate) fn validate_name(name: &str) -> TaskResult<()> {
    if name.trim().is_empty() {
        return Err(TaskError::missing_field("name"));
    }
    Ok(())
}

fn validate_create(spec: &CreateTaskSpec) -> TaskResult<()> {
    validate_name(&spec.name)?;
    if spec.responsible.is_empty() {
        return Err(TaskError::invalid_value(
            "responsible",
            format!("Task: {} must have at least one responsible user", spec.name),
        ));
    }
    if spec.subtasks.iter().any(|sub| sub.name.trim().is_empty()) {
        return Err(TaskError::invalid_value("subtasks", "subtask name is required"));
    }
    Ok(())
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: TaskId) -> TaskResult<Option<Task>> {
    query_one(conn, "SELECT * FROM tasks WHERE task_id = ?1", params![task_id])
}

fn query_one<P: Params>(conn: &Connection, sql: &str, params: P) -> TaskResult<Option<Task>> {
    match conn.query_row(sql, params, parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_tasks<P: Params>(conn: &Connection, sql: &str, params: P) -> TaskResult<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let tasks = stmt
        .query_map(params, parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

fn subtasks_internal(conn: &Connection, parent_id: TaskId) -> TaskResult<Vec<Task>> {
    query_tasks(
        conn,
        "SELECT * FROM tasks WHERE parent_task_id = ?1 ORDER BY task_id",
        params![parent_id],
    )
}

/// Top-level task assigned to `owner`, group tasks included.
fn top_level_by_name_internal(conn: &Connection, owner: UserId, name: &str) -> TaskResult<Option<Task>> {
    query_one(
        conn,
        "SELECT t.* FROM tasks t
         JOIN task_assignees a ON a.task_id = t.task_id
         WHERE a.user_id = ?1 AND t.task_name = ?2 AND t.parent_task_id IS NULL
         ORDER BY t.task_id LIMIT 1",
        params![owner, name],
    )
}

fn group_task_by_name_internal(conn: &Connection, group_id: GroupId, name: &str) -> TaskResult<Option<Task>> {
    query_one(
        conn,
        "SELECT * FROM tasks WHERE group_id = ?1 AND task_name = ?2
         ORDER BY task_id LIMIT 1",
        params![group_id, name],
    )
}

fn subtask_by_name_internal(conn: &Connection, parent_id: TaskId, name: &str) -> TaskResult<Option<Task>> {
    query_one(
        conn,
        "SELECT * FROM tasks WHERE parent_task_id = ?1 AND task_name = ?2
         ORDER BY task_id LIMIT 1",
        params![parent_id, name],
    )
}

/// Fails with a conflict when `name` is already taken in `scope`. Must run
/// on the transaction that inserts the task.
fn ensure_unique_name(conn: &Connection, scope: NameScope, name: &str) -> TaskResult<()> {
    let existing = match scope {
        NameScope::Personal(owner) => top_level_by_name_internal(conn, owner, name)?,
        NameScope::Group(group_id) => group_task_by_name_internal(conn, group_id, name)?,
        NameScope::Subtasks(parent_id) => subtask_by_name_internal(conn, parent_id, name)?,
    };
    if let Some(task) = existing {
        warn!(?scope, task_name = name, existing = %task.id, "Rejected duplicate task name");
        return Err(TaskError::duplicate_name(name, scope.label()));
    }
    Ok(())
}

impl Database {
    /// Create a task, its responsible-user assignments and any nested
    /// subtasks in one transaction.
    ///
    /// Nested subtasks are assigned the parent's responsible users; any
    /// `responsible` list on a nested spec is ignored, as are the nested
    /// spec's own `subtasks`. No name uniqueness is enforced here; see
    /// [`Database::create_unique_task`].
    pub fn create_task(&self, spec: &CreateTaskSpec) -> TaskResult<CreatedTask> {
        self.create_task_in(spec, None)
    }

    /// Like [`Database::create_task`], but fails with a conflict when the
    /// name is already taken in `scope`. The check and the insert share one
    /// immediate transaction, so concurrent creates of the same name cannot
    /// both succeed.
    pub fn create_unique_task(&self, spec: &CreateTaskSpec, scope: NameScope) -> TaskResult<CreatedTask> {
        self.create_task_in(spec, Some(scope))
    }

    fn create_task_in(&self, spec: &CreateTaskSpec, unique_in: Option<NameScope>) -> TaskResult<CreatedTask> {
        validate_create(spec)?;
        let responsible = dedup_users(&spec.responsible);

        let created = self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(scope) = unique_in {
                ensure_unique_name(&tx, scope, &spec.name)?;
            }

            let task = insert_task_row(&tx, TaskRow::from_spec(spec))?;
            insert_assignees(&tx, task.id, &responsible)?;

            let mut subtasks = Vec::with_capacity(spec.subtasks.len());
            for sub in &spec.subtasks {
                let child = insert_task_row(&tx, TaskRow::child_of(sub, spec, task.id))?;
                insert_assignees(&tx, child.id, &responsible)?;
                subtasks.push(child);
            }

            tx.commit()?;
            Ok(CreatedTask { task, subtasks })
        })?;

        info!(
            task_id = %created.task.id,
            subtasks = created.subtasks.len(),
            responsible = responsible.len(),
            "Task created"
        );
        Ok(created)
    }

    /// Insert a single subtask under `spec.parent_task_id` with the given
    /// responsible users. The caller decides what the subtask inherits.
    /// Sibling names are unique; the check runs in the inserting transaction.
    pub fn add_subtask(&self, spec: &CreateTaskSpec) -> TaskResult<Task> {
        let parent_id = spec
            .parent_task_id
            .ok_or_else(|| TaskError::missing_field("parent_task_id"))?;
        validate_name(&spec.name)?;
        if spec.responsible.is_empty() {
            return Err(TaskError::invalid_value(
                "responsible",
                format!("Subtask: {} must have at least one responsible user", spec.name),
            ));
        }
        let responsible = dedup_users(&spec.responsible);

        let task = self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_unique_name(&tx, NameScope::Subtasks(parent_id), &spec.name)?;
            let task = insert_task_row(&tx, TaskRow::from_spec(spec))?;
            insert_assignees(&tx, task.id, &responsible)?;
            tx.commit()?;
            Ok(task)
        })?;

        info!(task_id = %task.id, parent_id = %parent_id, "Subtask created");
        Ok(task)
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: TaskId) -> TaskResult<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Tasks of a user's list (every task assigned to the user) or of a
    /// group, ordered by id.
    pub fn get_tasks_by_owner(&self, scope: TaskScope) -> TaskResult<Vec<Task>> {
        debug!(?scope, "Listing tasks by owner");
        self.with_conn(|conn| match scope {
            TaskScope::Personal(user_id) => query_tasks(
                conn,
                "SELECT t.* FROM tasks t
                 JOIN task_assignees a ON a.task_id = t.task_id
                 WHERE a.user_id = ?1
                 ORDER BY t.task_id",
                params![user_id],
            ),
            TaskScope::Group(group_id) => query_tasks(
                conn,
                "SELECT t.* FROM tasks t WHERE t.group_id = ?1 ORDER BY t.task_id",
                params![group_id],
            ),
        })
    }

    /// Every task the user is responsible for, personal and group alike.
    pub fn get_all_tasks_for_user(&self, user_id: UserId) -> TaskResult<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT t.* FROM tasks t
                 JOIN task_assignees a ON a.task_id = t.task_id
                 WHERE a.user_id = ?1
                 ORDER BY t.task_id",
                params![user_id],
            )
        })
    }

    /// Direct children of a task.
    pub fn get_subtasks(&self, parent_id: TaskId) -> TaskResult<Vec<Task>> {
        self.with_conn(|conn| subtasks_internal(conn, parent_id))
    }

    /// Up to [`MOST_PRIORITY_LIMIT`] top-level tasks of the user by ascending
    /// priority id, followed by all direct subtasks of those tasks.
    ///
    /// Tasks without a priority rank after every prioritised task. The
    /// subtasks are appended in parent order regardless of their own priority.
    pub fn get_most_priority_tasks(&self, user_id: UserId) -> TaskResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut tasks = query_tasks(
                conn,
                "SELECT t.* FROM tasks t
                 JOIN task_assignees a ON a.task_id = t.task_id
                 WHERE a.user_id = ?1 AND t.parent_task_id IS NULL
                 ORDER BY t.priority_id IS NULL, t.priority_id ASC, t.task_id ASC
                 LIMIT ?2",
                params![user_id, MOST_PRIORITY_LIMIT as i64],
            )?;

            let mut subtasks = Vec::new();
            for task in &tasks {
                subtasks.extend(subtasks_internal(conn, task.id)?);
            }
            tasks.extend(subtasks);

            Ok(tasks)
        })
    }

    /// Top-level task assigned to `owner` with the given name.
    pub fn find_top_level_by_name(&self, owner: UserId, name: &str) -> TaskResult<Option<Task>> {
        self.with_conn(|conn| top_level_by_name_internal(conn, owner, name))
    }

    /// Any task of the group with the given name, subtasks included.
    pub fn find_group_task_by_name(&self, group_id: GroupId, name: &str) -> TaskResult<Option<Task>> {
        self.with_conn(|conn| group_task_by_name_internal(conn, group_id, name))
    }

    pub fn find_subtask_by_name(&self, parent_id: TaskId, name: &str) -> TaskResult<Option<Task>> {
        self.with_conn(|conn| subtask_by_name_internal(conn, parent_id, name))
    }

    /// Users assigned to a task, ordered by id.
    pub fn get_responsible_users(&self, task_id: TaskId) -> TaskResult<Vec<UserId>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT user_id FROM task_assignees WHERE task_id = ?1 ORDER BY user_id")?;
            let users = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<Result<Vec<UserId>, _>>()?;
            Ok(users)
        })
    }

    /// Replace every mutable field of a task.
    pub fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> TaskResult<Task> {
        validate_name(&update.name)?;

        let task = self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET
                    task_name = ?1, task_description = ?2, priority_id = ?3, status_id = ?4,
                    start_time = ?5, end_time = ?6, attachments = ?7, category_id = ?8,
                    parent_task_id = ?9, group_id = ?10
                 WHERE task_id = ?11",
                params![
                    update.name,
                    non_empty(&update.description),
                    update.priority_id,
                    update.status_id,
                    to_millis(update.start_time),
                    to_millis(update.end_time),
                    non_empty(&update.attachments),
                    update.category_id,
                    update.parent_task_id,
                    update.group_id,
                    task_id,
                ],
            )?;
            if updated == 0 {
                return Err(TaskError::task_not_found(task_id));
            }
            get_task_internal(conn, task_id)?.ok_or_else(|| TaskError::task_not_found(task_id))
        })?;

        info!(task_id = %task_id, "Task updated");
        Ok(task)
    }

    /// Set a task's status. `None` clears the status reference.
    pub fn update_task_status(&self, task_id: TaskId, status_id: Option<StatusId>) -> TaskResult<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET status_id = ?1 WHERE task_id = ?2",
                params![status_id, task_id],
            )?;
            if updated == 0 {
                return Err(TaskError::task_not_found(task_id));
            }
            Ok(())
        })?;

        info!(task_id = %task_id, status_id = ?status_id.map(StatusId::get), "Task status updated");
        Ok(())
    }

    /// Mark a task and its direct children done. Returns the number of
    /// children updated; grandchildren keep their status.
    pub fn finish_task(&self, task_id: TaskId, done: StatusId) -> TaskResult<usize> {
        let children = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE tasks SET status_id = ?1 WHERE task_id = ?2",
                params![done, task_id],
            )?;
            if updated == 0 {
                return Err(TaskError::task_not_found(task_id));
            }

            let children = tx.execute(
                "UPDATE tasks SET status_id = ?1 WHERE parent_task_id = ?2",
                params![done, task_id],
            )?;

            tx.commit()?;
            Ok(children)
        })?;

        info!(task_id = %task_id, children, "Task finished");
        Ok(children)
    }

    /// Delete a task atomically: comments of its chats, its chats, its
    /// direct children, its assignments, then the task row.
    ///
    /// The children's own chats, comments and assignments are left in
    /// place, as are grandchildren.
    pub fn delete_task(&self, task_id: TaskId) -> TaskResult<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE task_id = ?1)",
                params![task_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(TaskError::task_not_found(task_id));
            }

            let comments = tx.execute(
                "DELETE FROM comments
                 WHERE chat_id IN (SELECT chat_id FROM chats WHERE task_id = ?1)",
                params![task_id],
            )?;
            let chats = tx.execute("DELETE FROM chats WHERE task_id = ?1", params![task_id])?;
            let subtasks =
                tx.execute("DELETE FROM tasks WHERE parent_task_id = ?1", params![task_id])?;
            let assignments =
                tx.execute("DELETE FROM task_assignees WHERE task_id = ?1", params![task_id])?;
            tx.execute("DELETE FROM tasks WHERE task_id = ?1", params![task_id])?;

            tx.commit()?;
            Ok(DeleteSummary {
                comments,
                chats,
                subtasks,
                assignments,
            })
        })?;

        info!(
            task_id = %task_id,
            comments = summary.comments,
            chats = summary.chats,
            subtasks = summary.subtasks,
            assignments = summary.assignments,
            "Task deleted"
        );
        Ok(summary)
    }
}
