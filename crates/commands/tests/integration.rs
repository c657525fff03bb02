#![allow(unused_crate_dependencies)]

#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/enums.rs"]
mod enums;

#[path = "integration/registration.rs"]
mod registration;

#[path = "integration/execution.rs"]
mod execution;

#[path = "integration/lifecycle.rs"]
mod lifecycle;
