//! Enum parameter types.
//!
//! * [`RawEnum`]: a host enum table entry, observed through a parser hook that
//!   records the matched token.
//! * [`MappedEnum`]: validated keys mapped to typed values, on top of a raw enum.
//! * [`SoftEnum`]: a mutable autocompletion list.

pub mod hook;
mod mapped;
mod raw;
mod soft;

use rustc_hash::FxHashMap;
use tracing::debug;

pub use mapped::{EnumMapping, MappedEnum, is_allowed_enum_char, validate_enum_value};
pub use raw::{ParserClassifier, ParserKind, RawEnum, RawValue, SharedClassifier};
pub use soft::SoftEnum;

use crate::error::{ConstructionError, Result};
use crate::registry::CommandRegistry;

/// Every enum wrapped by one runtime, by name.
#[derive(Debug)]
pub struct EnumRegistry {
	registry: CommandRegistry,
	classifier: SharedClassifier,
	warn_on_builtin_extension: bool,
	raw: FxHashMap<String, RawEnum>,
	soft: FxHashMap<String, SoftEnum>,
}

impl EnumRegistry {
	pub fn new(registry: CommandRegistry, classifier: SharedClassifier, warn_on_builtin_extension: bool) -> Self {
		Self {
			registry,
			classifier,
			warn_on_builtin_extension,
			raw: FxHashMap::default(),
			soft: FxHashMap::default(),
		}
	}

	pub fn warns_on_builtin_extension(&self) -> bool {
		self.warn_on_builtin_extension
	}

	/// Wraps the host enum `name`. Each name can be wrapped once.
	pub fn raw_enum(&mut self, name: &str) -> Result<RawEnum> {
		if self.raw.contains_key(name) {
			return Err(ConstructionError::DuplicateEnum(name.to_owned()).into());
		}
		self.create_raw(name)
	}

	/// The wrapper of `name`, creating it on first use.
	pub fn get_or_create_raw(&mut self, name: &str) -> Result<RawEnum> {
		match self.raw.get(name) {
			Some(raw) => Ok(raw.clone()),
			None => self.create_raw(name),
		}
	}

	fn create_raw(&mut self, name: &str) -> Result<RawEnum> {
		let raw = RawEnum::new(name, self.registry.clone(), self.classifier.clone())?;
		debug!(enum_name = name, bound = raw.is_bound(), builtin = raw.is_builtin(), "raw enum created");
		self.raw.insert(name.to_owned(), raw.clone());
		Ok(raw)
	}

	pub fn get_raw(&self, name: &str) -> Option<&RawEnum> {
		self.raw.get(name)
	}

	/// Wraps the soft enum `name`. Each name can be wrapped once.
	pub fn soft_enum(&mut self, name: &str) -> Result<SoftEnum> {
		if self.soft.contains_key(name) {
			return Err(ConstructionError::DuplicateSoftEnum(name.to_owned()).into());
		}
		let soft = SoftEnum::new(name, self.registry.clone());
		self.soft.insert(name.to_owned(), soft.clone());
		Ok(soft)
	}

	pub fn get_soft(&self, name: &str) -> Option<&SoftEnum> {
		self.soft.get(name)
	}

	/// Restores the original parser of every hooked enum.
	pub(crate) fn unhook_all(&self) {
		for raw in self.raw.values() {
			raw.unhook();
		}
	}
}
