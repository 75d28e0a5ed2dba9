//! CLI command implementations

pub(crate) mod common;
pub(crate) mod install;
pub(crate) mod plan;
pub(crate) mod probe;
pub(crate) mod verify;
