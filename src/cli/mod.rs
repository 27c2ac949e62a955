//! CLI command definitions for task-manager
//!
//! This module defines the CLI structure using clap's derive macros.
//! Every subcommand maps onto one task service operation and prints JSON.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Task manager over a local SQLite database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Authenticated user id the command runs as
    #[arg(short, long, global = true, env = "TASK_MANAGER_USER")]
    pub user: Option<i64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task from a JSON spec: a group task when it names a
    /// group_id, otherwise a personal task of --user
    Create {
        /// Task spec as JSON
        spec: String,
    },

    /// Add a subtask under an existing task
    CreateSubtask {
        /// Parent task id
        parent: i64,
        /// Subtask spec as JSON
        spec: String,
    },

    /// Show one task
    Get { id: i64 },

    /// List the personal tasks of --user, or the tasks of a group
    List {
        #[arg(short, long)]
        group: Option<i64>,
    },

    /// List every task --user is responsible for
    ListAll,

    /// List the direct subtasks of a task
    Subtasks { id: i64 },

    /// Most important top-level tasks of --user and their subtasks
    Top,

    /// List the users responsible for a task
    Responsible { id: i64 },

    /// Replace every mutable field of a task from a JSON document
    Update {
        id: i64,
        /// Full task fields as JSON
        fields: String,
    },

    /// Set a task's status; omit --status (or pass 0) to clear it
    Status {
        id: i64,
        #[arg(short, long)]
        status: Option<i64>,
    },

    /// Mark a task and its direct subtasks done
    Finish { id: i64 },

    /// Delete a task with its chats, comments, direct subtasks and assignments
    Delete { id: i64 },

    /// Create or upgrade the database schema and exit
    Migrate,
}
