//! Task Manager Library
//!
//! Task hierarchy and consistency engine: personal and group tasks, one
//! level of subtasks, cascading finish and delete over SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod logging;
pub mod service;
pub mod types;
