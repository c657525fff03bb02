//! Foreign function signatures shared by host and extension.

use std::ffi::c_void;

use crate::records::{
	CommandBase, CommandOrigin, CommandOutput, ParseToken, RegistryRaw,
};
use crate::{CxxString, CxxVector};

/// `bool CommandRegistry::parse<T>(void* storage, ParseToken const&, CommandOrigin const&,
/// int version, std::string& error, std::vector<std::string>& errorParams) const`.
///
/// The registry is passed as `this`, which the x64 convention places in the first
/// argument register.
pub type ParserFn = unsafe extern "C" fn(
	registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	origin: *const CommandOrigin,
	version: i32,
	error: *mut CxxString,
	error_params: *mut CxxVector<CxxString>,
) -> bool;

/// `std::unique_ptr<Command> (*)()`. The return slot is passed as the only
/// argument and returned back.
pub type AllocatorFn = unsafe extern "C" fn(out: *mut *mut CommandBase) -> *mut *mut CommandBase;

/// Scalar deleting destructor of `Command`. Bit 0 of `flags` requests the
/// storage to be released after destruction.
pub type CommandDestructorFn = unsafe extern "C" fn(this: *mut CommandBase, flags: u32) -> *mut c_void;

/// `void Command::execute(CommandOrigin const&, CommandOutput&) const`.
pub type CommandExecuteFn =
	unsafe extern "C" fn(this: *const CommandBase, origin: *const CommandOrigin, output: *mut CommandOutput);
