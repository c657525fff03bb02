//! Host flag and tag vocabularies.
//!
//! Records store these as raw integers; typed accessors convert on read so an
//! unexpected value written by the host never produces an invalid enum.

use bitflags::bitflags;
use serde::Deserialize;

/// Parameter descriptor kind tag (`CommandParameterDataType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ParamKind {
	Normal = 0,
	Enum = 1,
	SoftEnum = 2,
	Postfix = 3,
}

impl ParamKind {
	pub fn from_raw(raw: i32) -> Option<Self> {
		Some(match raw {
			0 => Self::Normal,
			1 => Self::Enum,
			2 => Self::SoftEnum,
			3 => Self::Postfix,
			_ => return None,
		})
	}
}

bitflags! {
	/// `CommandParameterOption`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct ParamOptions: u8 {
		const ENUM_AUTOCOMPLETE_EXPANSION = 1;
		const HAS_SEMANTIC_CONSTRAINT = 2;
	}
}

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CommandPermissionLevel {
	#[default]
	Normal = 0,
	Operator = 1,
	Host = 2,
	Automation = 3,
	Admin = 4,
	Internal = 5,
}

impl CommandPermissionLevel {
	pub fn from_raw(raw: i32) -> Option<Self> {
		Some(match raw {
			0 => Self::Normal,
			1 => Self::Operator,
			2 => Self::Host,
			3 => Self::Automation,
			4 => Self::Admin,
			5 => Self::Internal,
			_ => return None,
		})
	}
}

bitflags! {
	/// Cheat, execution, sync, type, usage and visibility flags of a signature.
	///
	/// The host takes two flag words on registration; both are OR-ed together
	/// into the signature, so either word may carry any of these bits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct CommandFlags: i32 {
		const TEST = 0x01;
		const HIDDEN_FROM_COMMAND_BLOCK = 0x02;
		const HIDDEN_FROM_PLAYER = 0x04;
		const HIDDEN = Self::HIDDEN_FROM_COMMAND_BLOCK.bits() | Self::HIDDEN_FROM_PLAYER.bits();
		const LOCAL = 0x08;
		const DISALLOWED = 0x10;
		const MESSAGE = 0x20;
		const NOT_CHEAT = 0x40;
		const UNKNOWN_USAGE = 0x80;
	}
}

/// Update kind passed to `CommandSoftEnumRegistry::updateSoftEnum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SoftEnumUpdateType {
	Add = 0,
	Remove = 1,
	Replace = 2,
}

impl SoftEnumUpdateType {
	pub fn from_raw(raw: u8) -> Option<Self> {
		Some(match raw {
			0 => Self::Add,
			1 => Self::Remove,
			2 => Self::Replace,
			_ => return None,
		})
	}
}

/// Destination of a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandOutputType {
	None = 0,
	LastOutput = 1,
	Silent = 2,
	/// Player, server console or command block.
	Normal = 3,
	ScriptEngine = 4,
}

impl CommandOutputType {
	pub fn from_raw(raw: i32) -> Option<Self> {
		Some(match raw {
			0 => Self::None,
			1 => Self::LastOutput,
			2 => Self::Silent,
			3 => Self::Normal,
			4 => Self::ScriptEngine,
			_ => return None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hidden_is_both_visibility_bits() {
		assert_eq!(CommandFlags::HIDDEN.bits(), 6);
		assert!(CommandFlags::HIDDEN.contains(CommandFlags::HIDDEN_FROM_PLAYER));
	}

	#[test]
	fn raw_values_round_into_tags() {
		assert_eq!(ParamKind::from_raw(3), Some(ParamKind::Postfix));
		assert_eq!(ParamKind::from_raw(9), None);
		assert_eq!(SoftEnumUpdateType::from_raw(2), Some(SoftEnumUpdateType::Replace));
		assert_eq!(CommandPermissionLevel::from_raw(5), Some(CommandPermissionLevel::Internal));
		assert_eq!(CommandOutputType::from_raw(4), Some(CommandOutputType::ScriptEngine));
	}
}
