use std::fmt;
use std::ptr;

use super::{CommandSymbol, RegistryRaw};
use crate::CxxString;
use crate::fns::{CommandDestructorFn, CommandExecuteFn};

/// Virtual table of `Command`.
#[repr(C)]
pub struct CommandVFTable {
	pub destructor: CommandDestructorFn,
	pub execute: Option<CommandExecuteFn>,
}

/// Header shared by every command record (`Command`, 32 bytes).
#[repr(C)]
pub struct CommandBase {
	pub vftable: *const CommandVFTable,
	pub version: i32,
	pub registry: *mut RegistryRaw,
	pub command_symbol: CommandSymbol,
	pub permission_level: i16,
	pub flags: u8,
}

const _: () = assert!(size_of::<CommandBase>() == 32);

impl CommandBase {
	/// Header as `Command::Command` leaves it.
	pub const fn new(vftable: *const CommandVFTable) -> Self {
		Self {
			vftable,
			version: 0,
			registry: ptr::null_mut(),
			command_symbol: CommandSymbol::NONE,
			permission_level: 5,
			flags: 0,
		}
	}

	#[deprecated = "aliases `version`"]
	pub fn u1(&self) -> i32 {
		self.version
	}

	#[deprecated = "aliases `command_symbol`"]
	pub fn u3(&self) -> i32 {
		self.command_symbol.0
	}

	#[deprecated = "aliases `permission_level`"]
	pub fn u4(&self) -> i16 {
		self.permission_level
	}
}

impl fmt::Debug for CommandBase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CommandBase")
			.field("vftable", &self.vftable)
			.field("version", &self.version)
			.field("command_symbol", &self.command_symbol)
			.field("permission_level", &self.permission_level)
			.finish_non_exhaustive()
	}
}

/// Storage of an enum parameter.
///
/// The host's enum parsers write the matched value over the start of `value`:
/// an `int` for integer enums, a full string for string enums. `token` receives
/// the raw matched text through the parser hook.
#[repr(C)]
#[derive(Default)]
pub struct EnumResult {
	pub value: CxxString,
	pub token: CxxString,
}

const _: () = assert!(size_of::<EnumResult>() == 64);

impl EnumResult {
	/// Value written by an integer enum parser.
	pub fn int_value(&self) -> i32 {
		// SAFETY: the first four bytes of `value` are always initialised.
		unsafe { ptr::addr_of!(self.value).cast::<i32>().read() }
	}

	/// Raw 64-bit value written by the host.
	pub fn bin64_value(&self) -> u64 {
		// SAFETY: the first eight bytes of `value` are always initialised.
		unsafe { ptr::addr_of!(self.value).cast::<u64>().read() }
	}

	/// Value written by a string enum parser.
	pub fn string_value(&self) -> &CxxString {
		&self.value
	}
}

impl fmt::Debug for EnumResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnumResult")
			.field("bin64", &self.bin64_value())
			.field("token", &self.token)
			.finish()
	}
}

/// `CommandOutputParameter`: display text and an arity used for pluralisation.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutputParameter {
	pub text: CxxString,
	pub count: i32,
}

const _: () = assert!(size_of::<CommandOutputParameter>() == 0x28);

impl CommandOutputParameter {
	pub fn new(text: &str, count: i32) -> Self {
		Self {
			text: CxxString::from(text),
			count,
		}
	}
}
