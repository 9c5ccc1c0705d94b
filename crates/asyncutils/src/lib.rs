//! Small async building blocks shared by the media crates.

mod group;

pub use crate::group::{Fatal, OnFatal, Policy, Summary, TaskGroup};
