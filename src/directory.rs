//! Lookup collaborators consumed by the task service.
//!
//! Label, group and user stores live outside the task engine; the service
//! only needs to resolve ids and names and to check membership. The traits
//! here are that narrow surface. [`Lookups::sqlite`] backs all of them with
//! the shared [`Database`].

use crate::db::Database;
use crate::error::{TaskError, TaskResult};
use crate::types::{Category, Group, GroupId, Priority, Status, UserId};
use std::fmt::Display;
use std::sync::Arc;

/// A record resolvable by id or by name.
pub trait Record {
    type Id: Copy + Display;

    /// Entity name used in not-found errors.
    const ENTITY: &'static str;
}

impl Record for Priority {
    type Id = crate::types::PriorityId;
    const ENTITY: &'static str = "priority";
}

impl Record for Status {
    type Id = crate::types::StatusId;
    const ENTITY: &'static str = "status";
}

impl Record for Category {
    type Id = crate::types::CategoryId;
    const ENTITY: &'static str = "category";
}

impl Record for Group {
    type Id = GroupId;
    const ENTITY: &'static str = "group";
}

/// Resolves records of one kind.
pub trait Directory<R: Record>: Send + Sync {
    fn find_by_id(&self, id: R::Id) -> TaskResult<Option<R>>;

    fn find_by_name(&self, name: &str) -> TaskResult<Option<R>>;

    fn resolve_by_id(&self, id: R::Id) -> TaskResult<R> {
        self.find_by_id(id)?
            .ok_or_else(|| TaskError::not_found(R::ENTITY, id))
    }

    fn resolve_by_name(&self, name: &str) -> TaskResult<R> {
        self.find_by_name(name)?
            .ok_or_else(|| TaskError::not_found(R::ENTITY, name))
    }
}

/// Group membership lookups.
pub trait GroupMembership: Send + Sync {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> TaskResult<bool>;
}

pub trait UserDirectory: Send + Sync {
    fn exists(&self, user_id: UserId) -> TaskResult<bool>;
}

/// The verified caller of a request, supplied by the authentication boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
}

impl Principal {
    /// Wrap a user id the authentication layer has already verified.
    pub fn authenticated(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// Bundle of every collaborator the task service calls.
#[derive(Clone)]
pub struct Lookups {
    pub priorities: Arc<dyn Directory<Priority>>,
    pub statuses: Arc<dyn Directory<Status>>,
    pub categories: Arc<dyn Directory<Category>>,
    pub groups: Arc<dyn Directory<Group>>,
    pub members: Arc<dyn GroupMembership>,
    pub users: Arc<dyn UserDirectory>,
}

impl Lookups {
    /// Back every collaborator with the task database.
    pub fn sqlite(db: &Arc<Database>) -> Self {
        Self {
            priorities: db.clone(),
            statuses: db.clone(),
            categories: db.clone(),
            groups: db.clone(),
            members: db.clone(),
            users: db.clone(),
        }
    }
}
