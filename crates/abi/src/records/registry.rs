use std::ffi::{CStr, c_char};
use std::fmt;

use super::RegistryRaw;
use crate::flags::{ParamKind, ParamOptions};
use crate::fns::{AllocatorFn, ParserFn};
use crate::{CxxPair, CxxString, CxxVector};

/// `typeid_t<CommandRegistry>`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct HostTypeId {
	pub id: u16,
}

/// `CommandRegistry::Symbol`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSymbol(pub i32);

impl CommandSymbol {
	pub const NONE: Self = Self(-1);
}

/// Inclusive range of command versions an overload applies to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandVersion {
	pub from: i32,
	pub to: i32,
}

impl CommandVersion {
	/// Every host version.
	pub const ALL: Self = Self {
		from: 1,
		to: 0x7fff_ffff,
	};
}

/// `CommandParameterData`: one formal parameter of an overload (0x50 bytes).
#[repr(C)]
#[derive(Clone)]
pub struct ParameterData {
	pub tid: HostTypeId,
	/// Null for enum parameters; the host then uses the enum's own parser.
	pub parser: Option<ParserFn>,
	pub name: CxxString,
	/// NUL-terminated enum or postfix name, or null.
	pub enum_name_or_postfix: *const c_char,
	pub enum_or_postfix_symbol: CommandSymbol,
	pub kind: i32,
	/// Byte offset of the value inside the command record.
	pub offset: i32,
	/// Byte offset of the is-set flag, or [`ParameterData::NO_FLAG`].
	pub flag_offset: i32,
	pub optional: bool,
	pub options: u8,
}

const _: () = assert!(size_of::<ParameterData>() == 0x50);

impl ParameterData {
	pub const NO_FLAG: i32 = -1;

	/// Zero-initialised descriptor with no flag and no symbol.
	pub fn new() -> Self {
		Self {
			tid: HostTypeId::default(),
			parser: None,
			name: CxxString::new(),
			enum_name_or_postfix: std::ptr::null(),
			enum_or_postfix_symbol: CommandSymbol::NONE,
			kind: ParamKind::Normal as i32,
			offset: 0,
			flag_offset: Self::NO_FLAG,
			optional: false,
			options: 0,
		}
	}

	pub fn param_kind(&self) -> Option<ParamKind> {
		ParamKind::from_raw(self.kind)
	}

	pub fn param_options(&self) -> ParamOptions {
		ParamOptions::from_bits_retain(self.options)
	}

	/// Enum or postfix name, if set.
	pub fn enum_name(&self) -> Option<&CStr> {
		if self.enum_name_or_postfix.is_null() {
			return None;
		}
		// SAFETY: non-null names are NUL-terminated and outlive the descriptor.
		Some(unsafe { CStr::from_ptr(self.enum_name_or_postfix) })
	}

	#[deprecated = "aliases `enum_name_or_postfix`"]
	pub fn desc(&self) -> *const c_char {
		self.enum_name_or_postfix
	}

	#[deprecated = "aliases `enum_or_postfix_symbol`"]
	pub fn unk56(&self) -> i32 {
		self.enum_or_postfix_symbol.0
	}

	#[deprecated = "aliases `options`"]
	pub fn pad73(&self) -> bool {
		self.options != 0
	}
}

impl Default for ParameterData {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ParameterData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParameterData")
			.field("tid", &self.tid.id)
			.field("parser", &self.parser.map(|p| p as *const ()))
			.field("name", &self.name)
			.field("enum_name", &self.enum_name())
			.field("kind", &self.param_kind())
			.field("offset", &self.offset)
			.field("flag_offset", &self.flag_offset)
			.field("optional", &self.optional)
			.field("options", &self.param_options())
			.finish()
	}
}

/// `CommandRegistry::Overload` (0x48 bytes).
#[repr(C)]
pub struct Overload {
	pub version: CommandVersion,
	pub allocator: Option<AllocatorFn>,
	pub parameters: CxxVector<ParameterData>,
	pub version_offset: i32,
	pub symbols: CxxVector<CommandSymbol>,
}

const _: () = assert!(size_of::<Overload>() == 0x48);

impl Overload {
	pub fn new(allocator: AllocatorFn, parameters: CxxVector<ParameterData>) -> Self {
		Self {
			version: CommandVersion::ALL,
			allocator: Some(allocator),
			parameters,
			version_offset: -1,
			symbols: CxxVector::new(),
		}
	}

	#[deprecated = "aliases `version_offset`"]
	pub fn u6(&self) -> i32 {
		self.version_offset
	}
}

impl fmt::Debug for Overload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Overload")
			.field("version", &self.version)
			.field("allocator", &self.allocator.map(|p| p as *const ()))
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

/// `CommandRegistry::Signature`: one command name and its overloads.
#[repr(C)]
#[derive(Debug)]
pub struct Signature {
	pub command: CxxString,
	pub description: CxxString,
	pub overloads: CxxVector<Overload>,
	pub permission_level: i32,
	pub command_symbol: CommandSymbol,
	pub alias_enum: CommandSymbol,
	pub flags: i32,
}

const _: () = assert!(size_of::<Signature>() == 104);

/// `CommandRegistry::Enum`.
#[repr(C)]
pub struct EnumRecord {
	pub name: CxxString,
	pub tid: HostTypeId,
	pub parser: Option<ParserFn>,
	/// `(index into the registry's value table, value)` pairs.
	pub values: CxxVector<CxxPair<u64, u64>>,
}

const _: () = assert!(size_of::<EnumRecord>() == 72);

impl fmt::Debug for EnumRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnumRecord")
			.field("name", &self.name)
			.field("tid", &self.tid.id)
			.field("parser", &self.parser.map(|p| p as *const ()))
			.field("values", &self.values.len())
			.finish()
	}
}

/// `CommandRegistry::SoftEnum`.
#[repr(C)]
#[derive(Debug)]
pub struct SoftEnumRecord {
	pub name: CxxString,
	pub list: CxxVector<CxxString>,
}

const _: () = assert!(size_of::<SoftEnumRecord>() == 56);

/// `CommandRegistry::ParseToken`: a node of the host's parse tree.
#[repr(C)]
pub struct ParseToken {
	pub child: *mut ParseToken,
	pub next: *mut ParseToken,
	pub parent: *mut ParseToken,
	/// Start of the token inside the command line (not NUL-terminated).
	pub text: *const u8,
	pub length: u32,
	pub kind: CommandSymbol,
}

const _: () = assert!(size_of::<ParseToken>() == 0x28);

impl ParseToken {
	/// The `length` bytes this token covers.
	pub fn text(&self) -> &[u8] {
		if self.text.is_null() {
			return &[];
		}
		// SAFETY: the host keeps the command line alive while parsing.
		unsafe { std::slice::from_raw_parts(self.text, self.length as usize) }
	}
}

/// `CommandSoftEnumRegistry`: a holder of the registry pointer.
#[repr(C)]
#[derive(Debug)]
pub struct SoftEnumRegistry {
	pub registry: *mut RegistryRaw,
}
