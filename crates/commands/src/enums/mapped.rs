use std::fmt;

use rustc_hash::FxHashMap;
use splice_abi::records::EnumResult;
use strum::IntoEnumIterator;
use tracing::warn;

use super::{EnumRegistry, RawEnum};
use crate::error::{ConstructionError, Result};

const ALLOWED_PUNCTUATION: &str = "()-.?_";

/// Whether `c` may appear in an enum value.
pub fn is_allowed_enum_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(c) || !c.is_ascii()
}

/// Checks one enum value, reporting every offending character.
pub fn validate_enum_value(enum_name: &str, value: &str) -> Result<(), ConstructionError> {
	if value.is_empty() {
		return Err(ConstructionError::EmptyEnumValue {
			enum_name: enum_name.to_owned(),
		});
	}
	let invalid: String = value.chars().filter(|c| !is_allowed_enum_char(*c)).collect();
	if !invalid.is_empty() {
		return Err(ConstructionError::InvalidEnumCharacters {
			value: value.to_owned(),
			invalid,
		});
	}
	Ok(())
}

/// Result of [`MappedEnum::map_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumMapping<'a, V> {
	Mapped(&'a V),
	/// The token belongs to the host enum but not to this mapping. Happens when
	/// a mapped enum extends an enum other code also adds to.
	Unmapped(String),
}

impl<'a, V> EnumMapping<'a, V> {
	pub fn mapped(self) -> Option<&'a V> {
		match self {
			Self::Mapped(value) => Some(value),
			Self::Unmapped(_) => None,
		}
	}
}

/// An enum whose tokens map to typed values, backed by a [`RawEnum`].
pub struct MappedEnum<V> {
	raw: RawEnum,
	keys: Vec<String>,
	mapper: FxHashMap<String, V>,
}

impl<V> MappedEnum<V> {
	/// Validates every key, then adds them all to the raw enum `name`.
	///
	/// Nothing reaches the host unless every key is valid.
	pub fn new<S: Into<String>>(
		enums: &mut EnumRegistry,
		name: &str,
		entries: impl IntoIterator<Item = (S, V)>,
	) -> Result<Self> {
		let mut keys = Vec::new();
		let mut mapper = FxHashMap::default();
		for (key, value) in entries {
			let key = key.into();
			validate_enum_value(name, &key)?;
			let lower = key.to_lowercase();
			if mapper.contains_key(&lower) {
				return Err(ConstructionError::DuplicateEnumValue { value: key }.into());
			}
			mapper.insert(lower, value);
			keys.push(key);
		}

		let raw = enums.get_or_create_raw(name)?;
		raw.add_values(&keys)?;
		if raw.is_builtin() && enums.warns_on_builtin_extension() {
			warn!(enum_name = name, "built-in enum is extended");
		}
		Ok(Self { raw, keys, mapper })
	}

	pub fn name(&self) -> &str {
		self.raw.name()
	}

	pub fn raw(&self) -> &RawEnum {
		&self.raw
	}

	/// Keys as declared.
	pub fn keys(&self) -> &[String] {
		&self.keys
	}

	/// Looks up the captured token, ignoring case.
	pub fn map_value(&self, result: &EnumResult) -> EnumMapping<'_, V> {
		let token = result.token.to_string_lossy().to_lowercase();
		match self.mapper.get(&token) {
			Some(value) => EnumMapping::Mapped(value),
			None => EnumMapping::Unmapped(token),
		}
	}
}

impl MappedEnum<String> {
	/// A string enum: every token maps to its declared spelling.
	pub fn strings<S: AsRef<str>>(enums: &mut EnumRegistry, name: &str, values: &[S]) -> Result<Self> {
		Self::new(
			enums,
			name,
			values.iter().map(|value| (value.as_ref(), value.as_ref().to_owned())),
		)
	}
}

impl MappedEnum<usize> {
	/// An index enum: every token maps to its position.
	pub fn indexed<S: AsRef<str>>(enums: &mut EnumRegistry, name: &str, keys: &[S]) -> Result<Self> {
		Self::new(
			enums,
			name,
			keys.iter().enumerate().map(|(index, key)| (key.as_ref(), index)),
		)
	}
}

impl<E: IntoEnumIterator + AsRef<str>> MappedEnum<E> {
	/// An enum over the variants of `E`, keyed by their string form.
	pub fn from_variants(enums: &mut EnumRegistry, name: &str) -> Result<Self> {
		Self::new(
			enums,
			name,
			E::iter().map(|variant| (variant.as_ref().to_owned(), variant)),
		)
	}
}

impl<V: fmt::Debug> fmt::Debug for MappedEnum<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MappedEnum")
			.field("raw", &self.raw)
			.field("keys", &self.keys)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn allowed_characters() {
		for value in ["foo_bar-1.2(x)?", "§ection", "UPPER", "9"] {
			assert_eq!(validate_enum_value("e", value), Ok(()), "{value}");
		}
	}

	#[test]
	fn invalid_characters_are_listed() {
		assert_eq!(
			validate_enum_value("e", "a b,c!"),
			Err(ConstructionError::InvalidEnumCharacters {
				value: "a b,c!".into(),
				invalid: " ,!".into(),
			})
		);
		assert_eq!(
			validate_enum_value("colors", ""),
			Err(ConstructionError::EmptyEnumValue {
				enum_name: "colors".into()
			})
		);
	}
}
