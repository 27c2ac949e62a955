//! Read-only lookups over the label, group and user tables.

use super::Database;
use crate::directory::{Directory, GroupMembership, UserDirectory};
use crate::error::TaskResult;
use crate::types::{
    Category, CategoryId, Group, GroupId, Priority, PriorityId, Status, StatusId, UserId,
};
use rusqlite::{Connection, Params, Row, params};

fn lookup<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> TaskResult<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    match conn.query_row(sql, params, map) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_priority_row(row: &Row) -> rusqlite::Result<Priority> {
    Ok(Priority {
        id: row.get("priority_id")?,
        name: row.get("priority_name")?,
        color: row.get("color")?,
    })
}

fn parse_status_row(row: &Row) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get("status_id")?,
        name: row.get("status")?,
    })
}

fn parse_category_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("category_id")?,
        name: row.get("category_name")?,
        description: row.get("description")?,
        color: row.get("color")?,
    })
}

fn parse_group_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("group_id")?,
        name: row.get("group_name")?,
        info: row.get("info")?,
    })
}

impl Directory<Priority> for Database {
    fn find_by_id(&self, id: PriorityId) -> TaskResult<Option<Priority>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM priorities WHERE priority_id = ?1",
                params![id],
                parse_priority_row,
            )
        })
    }

    fn find_by_name(&self, name: &str) -> TaskResult<Option<Priority>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM priorities WHERE priority_name = ?1",
                params![name],
                parse_priority_row,
            )
        })
    }
}

impl Directory<Status> for Database {
    fn find_by_id(&self, id: StatusId) -> TaskResult<Option<Status>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM statuses WHERE status_id = ?1",
                params![id],
                parse_status_row,
            )
        })
    }

    fn find_by_name(&self, name: &str) -> TaskResult<Option<Status>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM statuses WHERE status = ?1",
                params![name],
                parse_status_row,
            )
        })
    }
}

impl Directory<Category> for Database {
    fn find_by_id(&self, id: CategoryId) -> TaskResult<Option<Category>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM categories WHERE category_id = ?1",
                params![id],
                parse_category_row,
            )
        })
    }

    /// Category names are not unique; the oldest match wins.
    fn find_by_name(&self, name: &str) -> TaskResult<Option<Category>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM categories WHERE category_name = ?1 ORDER BY category_id LIMIT 1",
                params![name],
                parse_category_row,
            )
        })
    }
}

impl Directory<Group> for Database {
    fn find_by_id(&self, id: GroupId) -> TaskResult<Option<Group>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM user_groups WHERE group_id = ?1",
                params![id],
                parse_group_row,
            )
        })
    }

    fn find_by_name(&self, name: &str) -> TaskResult<Option<Group>> {
        self.with_conn(|conn| {
            lookup(
                conn,
                "SELECT * FROM user_groups WHERE group_name = ?1",
                params![name],
                parse_group_row,
            )
        })
    }
}

impl GroupMembership for Database {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> TaskResult<bool> {
        self.with_conn(|conn| {
            let member: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2)",
                params![group_id, user_id],
                |row| row.get(0),
            )?;
            Ok(member)
        })
    }
}

impl UserDirectory for Database {
    fn exists(&self, user_id: UserId) -> TaskResult<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }
}
