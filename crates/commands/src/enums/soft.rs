use std::fmt;
use std::sync::Arc;

use splice_abi::flags::SoftEnumUpdateType;

use crate::registry::CommandRegistry;

struct SoftEnumInner {
	name: String,
	registry: CommandRegistry,
}

/// A mutable autocompletion list. Parses as a plain string.
///
/// Reads always go to the host table.
#[derive(Clone)]
pub struct SoftEnum(Arc<SoftEnumInner>);

impl SoftEnum {
	pub(crate) fn new(name: &str, registry: CommandRegistry) -> Self {
		Self(Arc::new(SoftEnumInner {
			name: name.to_owned(),
			registry,
		}))
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Whether the host table has an entry yet.
	pub fn exists(&self) -> bool {
		self.0.registry.has_soft_enum(&self.0.name)
	}

	/// Creates the entry on first use, otherwise adds to it.
	pub fn add_values<S: AsRef<str>>(&self, values: &[S]) {
		if self.exists() {
			self.update(SoftEnumUpdateType::Add, values);
		} else {
			self.0.registry.add_soft_enum(&self.0.name, values);
		}
	}

	pub fn remove_values<S: AsRef<str>>(&self, values: &[S]) {
		self.update(SoftEnumUpdateType::Remove, values);
	}

	/// Replaces the whole list, creating the entry if needed.
	pub fn set_values<S: AsRef<str>>(&self, values: &[S]) {
		if self.exists() {
			self.update(SoftEnumUpdateType::Replace, values);
		} else {
			self.0.registry.add_soft_enum(&self.0.name, values);
		}
	}

	fn update<S: AsRef<str>>(&self, kind: SoftEnumUpdateType, values: &[S]) {
		self.0.registry.update_soft_enum(kind, &self.0.name, values);
	}

	pub fn values(&self) -> Vec<String> {
		self.0.registry.get_soft_enum_values(&self.0.name).unwrap_or_default()
	}

	pub fn value_count(&self) -> usize {
		self.0
			.registry
			.get_soft_enum(&self.0.name)
			.map_or(0, |record| record.list.len())
	}
}

impl fmt::Debug for SoftEnum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SoftEnum").field(&self.0.name).finish()
	}
}
