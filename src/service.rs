//! Request-facing task operations.
//!
//! The service owns no state. It decides personal versus group semantics,
//! runs the responsibility and reference checks against the lookup
//! collaborators, and only then hands a complete spec to the repository.
//! Name uniqueness is checked by the repository inside the inserting
//! transaction, so every failure still happens before the first write.

use crate::config::StatusesConfig;
use crate::db::Database;
use crate::db::tasks::validate_name;
use crate::directory::{Lookups, Principal};
use crate::error::{TaskError, TaskResult};
use crate::types::{
    CategoryId, CreateTaskSpec, CreatedTask, DeleteSummary, GroupId, NameScope, PriorityId,
    StatusId, Task, TaskId, TaskScope, TaskUpdate, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Task operations over the repository and its collaborators.
#[derive(Clone)]
pub struct TaskService {
    db: Arc<Database>,
    lookups: Lookups,
    done_status: StatusId,
}

impl TaskService {
    pub fn new(db: Arc<Database>, lookups: Lookups, done_status: StatusId) -> Self {
        Self {
            db,
            lookups,
            done_status,
        }
    }

    /// Build the service, resolving the well-known "done" status by name once.
    pub fn bootstrap(
        db: Arc<Database>,
        lookups: Lookups,
        statuses: &StatusesConfig,
    ) -> TaskResult<Self> {
        let done = lookups.statuses.resolve_by_name(&statuses.done)?;
        info!(status_id = %done.id, status = %done.name, "Resolved done status");
        Ok(Self::new(db, lookups, done.id))
    }

    pub fn done_status(&self) -> StatusId {
        self.done_status
    }

    /// Create a task for the caller: a group task when the spec names a
    /// group, otherwise a personal task owned by the principal.
    pub fn create_task(&self, principal: &Principal, spec: CreateTaskSpec) -> TaskResult<CreatedTask> {
        match spec.group_id {
            Some(group_id) => self.create_group_task(group_id, spec),
            None => self.create_personal_task(principal.user_id(), spec),
        }
    }

    /// Create a task in the owner's personal list. The owner becomes the
    /// sole responsible user, whatever the spec lists.
    pub fn create_personal_task(&self, owner: UserId, mut spec: CreateTaskSpec) -> TaskResult<CreatedTask> {
        validate_name(&spec.name)?;
        if !self.lookups.users.exists(owner)? {
            return Err(TaskError::not_found("user", owner));
        }

        spec.group_id = None;
        spec.responsible = vec![owner];
        self.check_create_references(&spec)?;

        self.db.create_unique_task(&spec, NameScope::Personal(owner))
    }

    /// Create a task owned by a group with an explicit responsible-user set.
    pub fn create_group_task(&self, group_id: GroupId, mut spec: CreateTaskSpec) -> TaskResult<CreatedTask> {
        validate_name(&spec.name)?;
        self.lookups.groups.resolve_by_id(group_id)?;

        if spec.responsible.is_empty() {
            return Err(TaskError::invalid_value(
                "responsible",
                format!("Group task: {} must have responsible user", spec.name),
            ));
        }
        for user in &spec.responsible {
            if !self.lookups.users.exists(*user)? {
                return Err(TaskError::not_found("user", user));
            }
            if !self.lookups.members.is_member(group_id, *user)? {
                return Err(TaskError::invalid_value(
                    "responsible",
                    format!("user {} is not a member of group {}", user, group_id),
                ));
            }
        }

        spec.group_id = Some(group_id);
        self.check_create_references(&spec)?;

        self.db.create_unique_task(&spec, NameScope::Group(group_id))
    }

    /// Add a subtask under an existing task.
    ///
    /// The subtask keeps its own name, description, priority and status.
    /// Schedule, attachments, category and group are copied from the parent,
    /// and the responsible users are the parent's current assignees: a
    /// `responsible` list on the spec is ignored.
    pub fn create_subtask(&self, parent_id: TaskId, spec: CreateTaskSpec) -> TaskResult<Task> {
        validate_name(&spec.name)?;
        let parent = self
            .db
            .get_task(parent_id)?
            .ok_or_else(|| TaskError::task_not_found(parent_id))?;

        self.check_labels(spec.priority_id, spec.status_id, None)?;
        let responsible = self.db.get_responsible_users(parent.id)?;
        debug!(parent_id = %parent.id, inherited = responsible.len(), "Inheriting responsible users");

        let subtask = CreateTaskSpec {
            name: spec.name,
            description: spec.description,
            priority_id: spec.priority_id,
            status_id: spec.status_id,
            start_time: parent.start_time,
            end_time: parent.end_time,
            attachments: parent.attachments,
            category_id: parent.category_id,
            parent_task_id: Some(parent.id),
            group_id: parent.group_id,
            responsible,
            subtasks: Vec::new(),
        };

        self.db.add_subtask(&subtask)
    }

    pub fn get_task(&self, task_id: TaskId) -> TaskResult<Task> {
        self.db
            .get_task(task_id)?
            .ok_or_else(|| TaskError::task_not_found(task_id))
    }

    pub fn tasks_in_scope(&self, scope: TaskScope) -> TaskResult<Vec<Task>> {
        self.db.get_tasks_by_owner(scope)
    }

    pub fn all_tasks_for_user(&self, user_id: UserId) -> TaskResult<Vec<Task>> {
        self.db.get_all_tasks_for_user(user_id)
    }

    pub fn subtasks(&self, parent_id: TaskId) -> TaskResult<Vec<Task>> {
        self.db.get_subtasks(parent_id)
    }

    pub fn most_priority_tasks(&self, user_id: UserId) -> TaskResult<Vec<Task>> {
        self.db.get_most_priority_tasks(user_id)
    }

    pub fn responsible_users(&self, task_id: TaskId) -> TaskResult<Vec<UserId>> {
        self.get_task(task_id)?;
        self.db.get_responsible_users(task_id)
    }

    /// Replace every mutable field of a task after checking its references.
    pub fn update_task(&self, task_id: TaskId, update: TaskUpdate) -> TaskResult<Task> {
        validate_name(&update.name)?;
        self.check_labels(update.priority_id, update.status_id, update.category_id)?;
        if let Some(group_id) = update.group_id {
            self.lookups.groups.resolve_by_id(group_id)?;
        }
        if let Some(parent_id) = update.parent_task_id {
            if parent_id == task_id {
                return Err(TaskError::invalid_value(
                    "parent_task_id",
                    "a task cannot be its own parent",
                ));
            }
            self.get_task(parent_id)?;
        }

        self.db.update_task(task_id, &update)
    }

    /// Set or clear (`None`) a task's status.
    pub fn update_task_status(&self, task_id: TaskId, status_id: Option<StatusId>) -> TaskResult<()> {
        self.check_labels(None, status_id, None)?;
        self.db.update_task_status(task_id, status_id)
    }

    /// Mark the task and its direct children done.
    pub fn finish_task(&self, task_id: TaskId) -> TaskResult<usize> {
        self.db.finish_task(task_id, self.done_status)
    }

    pub fn delete_task(&self, task_id: TaskId) -> TaskResult<DeleteSummary> {
        self.db.delete_task(task_id)
    }

    fn check_labels(
        &self,
        priority_id: Option<PriorityId>,
        status_id: Option<StatusId>,
        category_id: Option<CategoryId>,
    ) -> TaskResult<()> {
        if let Some(id) = priority_id {
            self.lookups.priorities.resolve_by_id(id)?;
        }
        if let Some(id) = status_id {
            self.lookups.statuses.resolve_by_id(id)?;
        }
        if let Some(id) = category_id {
            self.lookups.categories.resolve_by_id(id)?;
        }
        Ok(())
    }

    fn check_create_references(&self, spec: &CreateTaskSpec) -> TaskResult<()> {
        self.check_labels(spec.priority_id, spec.status_id, spec.category_id)?;
        if let Some(parent_id) = spec.parent_task_id {
            self.get_task(parent_id)?;
        }
        for sub in &spec.subtasks {
            self.check_labels(sub.priority_id, sub.status_id, None)?;
        }
        Ok(())
    }
}
