//! Subcommand execution against the task service.

use super::Command;
use crate::directory::Principal;
use crate::error::{TaskError, TaskResult};
use crate::service::TaskService;
use crate::types::{GroupId, StatusId, TaskId, TaskScope, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

fn to_value<T: Serialize>(value: T) -> TaskResult<Value> {
    serde_json::to_value(value).map_err(TaskError::storage)
}

fn parse_json<T: DeserializeOwned>(field: &'static str, text: &str) -> TaskResult<T> {
    serde_json::from_str(text).map_err(|e| TaskError::invalid_value(field, format!("invalid JSON: {}", e)))
}

fn require_principal(principal: Option<Principal>) -> TaskResult<Principal> {
    principal.ok_or_else(|| TaskError::missing_field("user"))
}

/// Run one subcommand and return its JSON result.
pub fn execute(service: &TaskService, principal: Option<Principal>, command: &Command) -> TaskResult<Value> {
    match command {
        Command::Create { spec } => {
            let principal = require_principal(principal)?;
            let spec = parse_json("spec", spec)?;
            to_value(service.create_task(&principal, spec)?)
        }
        Command::CreateSubtask { parent, spec } => {
            let spec = parse_json("spec", spec)?;
            to_value(service.create_subtask(TaskId(*parent), spec)?)
        }
        Command::Get { id } => to_value(service.get_task(TaskId(*id))?),
        Command::List { group } => {
            let scope = match group.and_then(GroupId::from_raw) {
                Some(group_id) => TaskScope::Group(group_id),
                None => TaskScope::Personal(require_principal(principal)?.user_id()),
            };
            to_value(service.tasks_in_scope(scope)?)
        }
        Command::ListAll => {
            let user = require_principal(principal)?.user_id();
            to_value(service.all_tasks_for_user(user)?)
        }
        Command::Subtasks { id } => to_value(service.subtasks(TaskId(*id))?),
        Command::Top => {
            let user = require_principal(principal)?.user_id();
            to_value(service.most_priority_tasks(user)?)
        }
        Command::Responsible { id } => to_value(service.responsible_users(TaskId(*id))?),
        Command::Update { id, fields } => {
            let update = parse_json("fields", fields)?;
            to_value(service.update_task(TaskId(*id), update)?)
        }
        Command::Status { id, status } => {
            let status_id = status.and_then(StatusId::from_raw);
            service.update_task_status(TaskId(*id), status_id)?;
            Ok(json!({ "task_id": id, "status_id": status_id }))
        }
        Command::Finish { id } => {
            let children = service.finish_task(TaskId(*id))?;
            Ok(json!({
                "task_id": id,
                "status_id": service.done_status(),
                "subtasks_finished": children,
            }))
        }
        Command::Delete { id } => {
            let summary = service.delete_task(TaskId(*id))?;
            Ok(json!({ "task_id": id, "deleted": summary }))
        }
        Command::Migrate => Ok(json!({ "migrated": true })),
    }
}

/// Principal from a raw `--user` value, where zero means "not given".
pub fn principal_from_raw(user: Option<i64>) -> Option<Principal> {
    user.and_then(UserId::from_raw).map(Principal::authenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::directory::Lookups;
    use std::sync::Arc;

    fn service() -> TaskService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO users (user_id, name, phone) VALUES (7, 'Ann', '555-0107');
                 INSERT INTO priorities (priority_id, priority_name) VALUES (2, 'high');",
            )?;
            Ok(())
        })
        .unwrap();
        let lookups = Lookups::sqlite(&db);
        TaskService::bootstrap(db, lookups, &Default::default()).unwrap()
    }

    #[test]
    fn create_requires_a_user() {
        let svc = service();
        let cmd = Command::Create {
            spec: r#"{"name": "Buy milk"}"#.into(),
        };
        let err = execute(&svc, None, &cmd).unwrap_err();
        assert!(matches!(err, TaskError::Validation { field: "user", .. }));
    }

    #[test]
    fn create_then_list_personal_tasks() {
        let svc = service();
        let principal = principal_from_raw(Some(7));
        let cmd = Command::Create {
            spec: r#"{"name": "Buy milk", "priority_id": 2}"#.into(),
        };
        let created = execute(&svc, principal, &cmd).unwrap();
        assert_eq!(created["name"], "Buy milk");
        assert_eq!(created["subtasks"], json!([]));

        let listed = execute(&svc, principal, &Command::List { group: None }).unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let svc = service();
        let cmd = Command::Update {
            id: 1,
            fields: "{not json".into(),
        };
        let err = execute(&svc, None, &cmd).unwrap_err();
        assert!(matches!(err, TaskError::Validation { field: "fields", .. }));
    }

    #[test]
    fn zero_ids_in_create_json_mean_unset() {
        let svc = service();
        let cmd = Command::Create {
            spec: r#"{"name": "Buy milk", "priority_id": 0, "status_id": 0, "group_id": 0,
                      "category_id": 0, "parent_task_id": 0}"#
                .into(),
        };

        let created = execute(&svc, principal_from_raw(Some(7)), &cmd).unwrap();

        assert_eq!(created["group_id"], Value::Null);
        assert_eq!(created["priority_id"], Value::Null);
        assert_eq!(created["parent_task_id"], Value::Null);
    }

    #[test]
    fn zero_status_in_update_json_clears_status() {
        let svc = service();
        let principal = principal_from_raw(Some(7));
        let created = execute(
            &svc,
            principal,
            &Command::Create {
                spec: r#"{"name": "Buy milk", "status_id": 1}"#.into(),
            },
        )
        .unwrap();
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["status_id"], json!(1));

        let updated = execute(
            &svc,
            principal,
            &Command::Update {
                id,
                fields: r#"{"name": "Buy milk", "status_id": 0, "group_id": 0}"#.into(),
            },
        )
        .unwrap();

        assert_eq!(updated["status_id"], Value::Null);
        assert_eq!(updated["group_id"], Value::Null);
    }

    #[test]
    fn zero_user_is_no_principal() {
        assert!(principal_from_raw(Some(0)).is_none());
        assert_eq!(
            principal_from_raw(Some(7)).map(|p| p.user_id()),
            Some(UserId(7))
        );
    }
}
