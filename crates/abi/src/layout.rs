//! Versioned layout profiles.
//!
//! Every host build has its own record layout. A [`LayoutProfile`] holds the
//! offsets expected for one build: the registry object, which is only reached
//! through offsets, and each mirrored record, which [`LayoutProfile::verify`]
//! compares against the compiled definitions so version drift fails loudly
//! instead of corrupting host memory.

use std::mem::offset_of;

use serde::Deserialize;
use thiserror::Error;

use crate::records::{
	CommandBase, CommandOutputParameter, EnumRecord, EnumResult, Overload, ParameterData,
	ParseToken, Signature, SoftEnumRecord,
};

/// A layout problem found by [`LayoutProfile::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutMismatch {
	#[error("{record}.{field}: profile expects {expected}, compiled layout has {actual}")]
	Drift {
		record: &'static str,
		field: &'static str,
		expected: usize,
		actual: usize,
	},
	#[error("registry fields `{first}` and `{second}` overlap")]
	Overlap {
		first: &'static str,
		second: &'static str,
	},
	#[error("registry field `{field}` at {offset} is not pointer-aligned")]
	Misaligned { field: &'static str, offset: usize },
}

macro_rules! record_layout {
	($(
		$(#[$meta:meta])*
		$name:ident for $record:ty as $label:literal { $($field:ident),* $(,)? }
	)*) => {$(
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
		pub struct $name {
			pub size: usize,
			$(pub $field: usize,)*
		}

		impl $name {
			/// Offsets of the compiled mirror type.
			pub const COMPILED: Self = Self {
				size: size_of::<$record>(),
				$($field: offset_of!($record, $field),)*
			};

			fn check(&self, out: &mut Vec<LayoutMismatch>) {
				let compiled = Self::COMPILED;
				if self.size != compiled.size {
					out.push(LayoutMismatch::Drift {
						record: $label,
						field: "size",
						expected: self.size,
						actual: compiled.size,
					});
				}
				$(
					if self.$field != compiled.$field {
						out.push(LayoutMismatch::Drift {
							record: $label,
							field: stringify!($field),
							expected: self.$field,
							actual: compiled.$field,
						});
					}
				)*
			}
		}
	)*};
}

record_layout! {
	/// `CommandParameterData`.
	ParameterDataLayout for ParameterData as "CommandParameterData" {
		tid, parser, name, enum_name_or_postfix, enum_or_postfix_symbol, kind, offset,
		flag_offset, optional, options,
	}
	/// `CommandRegistry::Overload`.
	OverloadLayout for Overload as "CommandRegistry::Overload" {
		version, allocator, parameters, version_offset, symbols,
	}
	/// `CommandRegistry::Signature`.
	SignatureLayout for Signature as "CommandRegistry::Signature" {
		command, description, overloads, permission_level, command_symbol, alias_enum, flags,
	}
	/// `CommandRegistry::Enum`.
	EnumLayout for EnumRecord as "CommandRegistry::Enum" {
		name, tid, parser, values,
	}
	/// `CommandRegistry::SoftEnum`.
	SoftEnumLayout for SoftEnumRecord as "CommandRegistry::SoftEnum" {
		name, list,
	}
	/// `CommandRegistry::ParseToken`.
	ParseTokenLayout for ParseToken as "CommandRegistry::ParseToken" {
		child, next, parent, text, length, kind,
	}
	/// Enum parameter storage.
	EnumResultLayout for EnumResult as "EnumResult" {
		value, token,
	}
	/// `Command`.
	CommandLayout for CommandBase as "Command" {
		vftable, version, registry, command_symbol, permission_level,
	}
	/// `CommandOutputParameter`.
	OutputParameterLayout for CommandOutputParameter as "CommandOutputParameter" {
		text, count,
	}
}

const VECTOR_SIZE: usize = 24;
const MAP_SIZE: usize = 16;

/// Offsets of the containers inside the host's `CommandRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegistryOffsets {
	/// `std::vector<std::string>` of every enum value.
	pub enum_values: usize,
	/// `std::vector<CommandRegistry::Enum>`.
	pub enums: usize,
	/// `std::map<std::string, uint32_t>` from enum name to index.
	pub enum_lookup: usize,
	/// `std::map<std::string, uint64_t>` from value text to value index.
	pub enum_value_lookup: usize,
	/// `std::vector<CommandRegistry::Symbol>`.
	pub command_symbols: usize,
	/// `std::map<std::string, CommandRegistry::Signature>`.
	pub signatures: usize,
	/// `std::vector<CommandRegistry::SoftEnum>`.
	pub soft_enums: usize,
	/// `std::map<std::string, uint32_t>` from soft enum name to index.
	pub soft_enum_lookup: usize,
}

impl RegistryOffsets {
	fn fields(&self) -> [(&'static str, usize, usize); 8] {
		[
			("enum_values", self.enum_values, VECTOR_SIZE),
			("enums", self.enums, VECTOR_SIZE),
			("enum_lookup", self.enum_lookup, MAP_SIZE),
			("enum_value_lookup", self.enum_value_lookup, MAP_SIZE),
			("command_symbols", self.command_symbols, VECTOR_SIZE),
			("signatures", self.signatures, MAP_SIZE),
			("soft_enums", self.soft_enums, VECTOR_SIZE),
			("soft_enum_lookup", self.soft_enum_lookup, MAP_SIZE),
		]
	}

	/// Smallest registry object these offsets fit in.
	pub fn extent(&self) -> usize {
		self.fields()
			.iter()
			.map(|(_, offset, size)| offset + size)
			.max()
			.unwrap_or(0)
	}

	fn check(&self, out: &mut Vec<LayoutMismatch>) {
		let mut fields = self.fields();
		for (field, offset, _) in fields {
			if offset % align_of::<usize>() != 0 {
				out.push(LayoutMismatch::Misaligned { field, offset });
			}
		}
		fields.sort_by_key(|(_, offset, _)| *offset);
		for pair in fields.windows(2) {
			let (first, start, size) = pair[0];
			let (second, next, _) = pair[1];
			if start + size > next {
				out.push(LayoutMismatch::Overlap { first, second });
			}
		}
	}

	/// Applies the fields set in `overrides`.
	pub fn apply(&mut self, overrides: &RegistryOverrides) {
		let RegistryOverrides {
			enum_values,
			enums,
			enum_lookup,
			enum_value_lookup,
			command_symbols,
			signatures,
			soft_enums,
			soft_enum_lookup,
		} = *overrides;
		let targets = [
			(&mut self.enum_values, enum_values),
			(&mut self.enums, enums),
			(&mut self.enum_lookup, enum_lookup),
			(&mut self.enum_value_lookup, enum_value_lookup),
			(&mut self.command_symbols, command_symbols),
			(&mut self.signatures, signatures),
			(&mut self.soft_enums, soft_enums),
			(&mut self.soft_enum_lookup, soft_enum_lookup),
		];
		for (slot, value) in targets {
			if let Some(value) = value {
				*slot = value;
			}
		}
	}
}

/// Partial [`RegistryOffsets`], as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryOverrides {
	pub enum_values: Option<usize>,
	pub enums: Option<usize>,
	pub enum_lookup: Option<usize>,
	pub enum_value_lookup: Option<usize>,
	pub command_symbols: Option<usize>,
	pub signatures: Option<usize>,
	pub soft_enums: Option<usize>,
	pub soft_enum_lookup: Option<usize>,
}

impl RegistryOverrides {
	/// Converts to full offsets when every field is present.
	pub fn complete(&self) -> Option<RegistryOffsets> {
		Some(RegistryOffsets {
			enum_values: self.enum_values?,
			enums: self.enums?,
			enum_lookup: self.enum_lookup?,
			enum_value_lookup: self.enum_value_lookup?,
			command_symbols: self.command_symbols?,
			signatures: self.signatures?,
			soft_enums: self.soft_enums?,
			soft_enum_lookup: self.soft_enum_lookup?,
		})
	}
}

/// Expected layout of one host build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutProfile {
	pub host_version: &'static str,
	pub registry: RegistryOffsets,
	pub parameter_data: ParameterDataLayout,
	pub overload: OverloadLayout,
	pub signature: SignatureLayout,
	pub enum_record: EnumLayout,
	pub soft_enum: SoftEnumLayout,
	pub parse_token: ParseTokenLayout,
	pub enum_result: EnumResultLayout,
	pub command: CommandLayout,
	pub output_parameter: OutputParameterLayout,
}

impl LayoutProfile {
	/// Host build 1.17.30.
	pub const V1_17_30: Self = Self {
		host_version: "1.17.30",
		registry: RegistryOffsets {
			enum_values: 192,
			enums: 216,
			enum_lookup: 288,
			enum_value_lookup: 304,
			command_symbols: 320,
			signatures: 344,
			soft_enums: 488,
			soft_enum_lookup: 512,
		},
		parameter_data: ParameterDataLayout {
			size: 0x50,
			tid: 0,
			parser: 8,
			name: 16,
			enum_name_or_postfix: 48,
			enum_or_postfix_symbol: 56,
			kind: 60,
			offset: 64,
			flag_offset: 68,
			optional: 72,
			options: 73,
		},
		overload: OverloadLayout {
			size: 0x48,
			version: 0,
			allocator: 8,
			parameters: 16,
			version_offset: 40,
			symbols: 48,
		},
		signature: SignatureLayout {
			size: 104,
			command: 0,
			description: 32,
			overloads: 64,
			permission_level: 88,
			command_symbol: 92,
			alias_enum: 96,
			flags: 100,
		},
		enum_record: EnumLayout {
			size: 72,
			name: 0,
			tid: 32,
			parser: 40,
			values: 48,
		},
		soft_enum: SoftEnumLayout {
			size: 56,
			name: 0,
			list: 32,
		},
		parse_token: ParseTokenLayout {
			size: 0x28,
			child: 0,
			next: 8,
			parent: 16,
			text: 0x18,
			length: 0x20,
			kind: 0x24,
		},
		enum_result: EnumResultLayout {
			size: 64,
			value: 0,
			token: 32,
		},
		command: CommandLayout {
			size: 32,
			vftable: 0,
			version: 8,
			registry: 16,
			command_symbol: 24,
			permission_level: 28,
		},
		output_parameter: OutputParameterLayout {
			size: 0x28,
			text: 0,
			count: 32,
		},
	};

	/// The newest built-in profile.
	pub const CURRENT: Self = Self::V1_17_30;

	/// Host versions with a built-in profile.
	pub const KNOWN_VERSIONS: &'static [&'static str] = &["1.17.30"];

	pub fn for_version(version: &str) -> Option<Self> {
		match version {
			"1.17.30" => Some(Self::V1_17_30),
			_ => None,
		}
	}

	/// Collects every mismatch between this profile and the compiled records.
	pub fn mismatches(&self) -> Vec<LayoutMismatch> {
		let mut out = Vec::new();
		self.registry.check(&mut out);
		self.parameter_data.check(&mut out);
		self.overload.check(&mut out);
		self.signature.check(&mut out);
		self.enum_record.check(&mut out);
		self.soft_enum.check(&mut out);
		self.parse_token.check(&mut out);
		self.enum_result.check(&mut out);
		self.command.check(&mut out);
		self.output_parameter.check(&mut out);
		out
	}

	/// Fails with the first mismatch, if any.
	pub fn verify(&self) -> Result<(), LayoutMismatch> {
		match self.mismatches().into_iter().next() {
			Some(mismatch) => Err(mismatch),
			None => Ok(()),
		}
	}
}

impl Default for LayoutProfile {
	fn default() -> Self {
		Self::CURRENT
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn builtin_profiles_match_compiled_records() {
		for version in LayoutProfile::KNOWN_VERSIONS {
			let profile = LayoutProfile::for_version(version).unwrap();
			assert_eq!(profile.mismatches(), vec![], "{version}");
		}
	}

	#[test]
	fn record_drift_is_reported_per_field() {
		let mut profile = LayoutProfile::CURRENT;
		profile.parameter_data.options = 74;
		assert_eq!(
			profile.verify(),
			Err(LayoutMismatch::Drift {
				record: "CommandParameterData",
				field: "options",
				expected: 74,
				actual: 73,
			})
		);
	}

	#[test]
	fn overlapping_registry_fields_are_rejected() {
		let mut profile = LayoutProfile::CURRENT;
		profile.registry.enums = 200;
		let problems = profile.mismatches();
		assert!(problems.contains(&LayoutMismatch::Overlap {
			first: "enum_values",
			second: "enums",
		}));
	}

	#[test]
	fn misaligned_registry_fields_are_rejected() {
		let mut profile = LayoutProfile::CURRENT;
		profile.registry.soft_enum_lookup = 514;
		assert!(profile.mismatches().contains(&LayoutMismatch::Misaligned {
			field: "soft_enum_lookup",
			offset: 514,
		}));
	}

	#[test]
	fn overrides_deserialize_and_apply() {
		let overrides: RegistryOverrides = toml::from_str("enums = 224\nsignatures = 352").unwrap();
		let mut offsets = LayoutProfile::CURRENT.registry;
		offsets.apply(&overrides);
		assert_eq!(offsets.enums, 224);
		assert_eq!(offsets.signatures, 352);
		assert_eq!(offsets.enum_values, 192);
		assert_eq!(overrides.complete(), None);
	}

	#[test]
	fn extent_covers_the_last_container() {
		assert_eq!(LayoutProfile::CURRENT.registry.extent(), 528);
	}
}
