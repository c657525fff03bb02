use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use splice_abi::fns::ParserFn;
use splice_abi::records::{EnumResult, HostTypeId};
use tracing::{debug, warn};

use super::hook::{self, ParserHook};
use crate::error::{ConstructionError, Result};
use crate::registry::CommandRegistry;

/// What a hooked enum's original parser writes into [`EnumResult::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
	/// `parseEnum<int>`: the value's `int`.
	Int,
	/// The string parser: the value text.
	String,
	/// Anything else; only the captured token is meaningful.
	Unknown,
}

/// The two parsers enum tables are recognised by.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserClassifier {
	pub string: Option<ParserFn>,
	pub int_enum: Option<ParserFn>,
}

/// A [`ParserClassifier`] shared between the type table and the raw enums,
/// read when an enum binds.
#[derive(Debug, Clone, Default)]
pub struct SharedClassifier(Arc<RwLock<ParserClassifier>>);

impl SharedClassifier {
	pub fn get(&self) -> ParserClassifier {
		*self.0.read()
	}

	pub(crate) fn update(&self, f: impl FnOnce(&mut ParserClassifier)) {
		f(&mut self.0.write());
	}
}

impl ParserClassifier {
	pub fn classify(&self, parser: ParserFn) -> ParserKind {
		let is = |known: Option<ParserFn>| known.is_some_and(|known| std::ptr::fn_addr_eq(known, parser));
		if is(self.string) {
			ParserKind::String
		} else if is(self.int_enum) {
			ParserKind::Int
		} else {
			ParserKind::Unknown
		}
	}
}

/// A resolved raw enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
	Int(i32),
	String(String),
	/// Lowercased token text.
	Token(String),
}

#[derive(Debug, Clone, Copy)]
struct Binding {
	index: u32,
	tid: HostTypeId,
	kind: ParserKind,
	hook: Option<ParserHook>,
}

struct RawEnumInner {
	name: String,
	registry: CommandRegistry,
	classifier: SharedClassifier,
	builtin: bool,
	binding: Mutex<Option<Binding>>,
}

/// A host enum table entry, observed through a parser hook.
///
/// Starts unbound when the host has no enum of this name yet; binds on the first
/// [`RawEnum::add_values`]. Binding is permanent. Each binding takes one of the
/// process's [`PARSER_SLOTS`](super::hook::PARSER_SLOTS) hook slots.
#[derive(Clone)]
pub struct RawEnum(Arc<RawEnumInner>);

impl RawEnum {
	pub(crate) fn new(name: &str, registry: CommandRegistry, classifier: SharedClassifier) -> Result<Self> {
		let builtin = registry.has_enum(name);
		let raw = Self(Arc::new(RawEnumInner {
			name: name.to_owned(),
			registry,
			classifier,
			builtin,
			binding: Mutex::new(None),
		}));
		raw.bind()?;
		Ok(raw)
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Whether the host defined this enum before it was wrapped.
	pub fn is_builtin(&self) -> bool {
		self.0.builtin
	}

	pub fn is_bound(&self) -> bool {
		self.0.binding.lock().is_some()
	}

	/// Position in the host's enum table, once bound.
	pub fn index(&self) -> Option<u32> {
		self.0.binding.lock().map(|b| b.index)
	}

	/// The type id of the host enum record, once bound.
	pub fn type_id(&self) -> Option<HostTypeId> {
		self.0.binding.lock().map(|b| b.tid)
	}

	pub fn parser_kind(&self) -> Option<ParserKind> {
		self.0.binding.lock().map(|b| b.kind)
	}

	/// Looks the enum up in the host table and hooks its parser.
	/// Returns whether the enum is bound.
	fn bind(&self) -> Result<bool> {
		let mut binding = self.0.binding.lock();
		if binding.is_some() {
			return Ok(true);
		}
		let registry = &self.0.registry;
		let Some(index) = registry.enum_index(&self.0.name) else {
			return Ok(false);
		};
		// SAFETY: registration is single-threaded and no table reference is held.
		let Some(record) = (unsafe { registry.enum_at_mut(index) }) else {
			return Ok(false);
		};
		let (kind, hook) = match record.parser {
			Some(original) => {
				let hook = hook::install(original)?;
				record.parser = Some(hook.replacement);
				(self.0.classifier.get().classify(original), Some(hook))
			}
			None => {
				warn!(enum_name = %self.0.name, "host enum has no parser; tokens are not captured");
				(ParserKind::Unknown, None)
			}
		};
		debug!(enum_name = %self.0.name, index, tid = record.tid.id, ?kind, "enum bound");
		*binding = Some(Binding {
			index,
			tid: record.tid,
			kind,
			hook,
		});
		Ok(true)
	}

	/// Puts the original parser back into the host table.
	pub(crate) fn unhook(&self) {
		let Some(Binding {
			index,
			hook: Some(hook),
			..
		}) = *self.0.binding.lock()
		else {
			return;
		};
		// SAFETY: registration is single-threaded and no table reference is held.
		if let Some(record) = unsafe { self.0.registry.enum_at_mut(index) } {
			let still_hooked = record
				.parser
				.is_some_and(|parser| std::ptr::fn_addr_eq(parser, hook.replacement));
			if still_hooked {
				record.parser = Some(hook.original);
			}
		}
	}

	/// Adds values to the host enum, creating it if needed.
	pub fn add_values<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
		self.0.registry.add_enum_values(&self.0.name, values);
		if !self.bind()? {
			return Err(ConstructionError::EnumNotGenerated(self.0.name.clone()).into());
		}
		Ok(())
	}

	/// Current values, read from the host table.
	pub fn values(&self) -> Vec<String> {
		let Some(index) = self.index() else {
			return Vec::new();
		};
		let registry = &self.0.registry;
		registry
			.enum_at(index)
			.map(|record| registry.enum_record_values(record))
			.unwrap_or_default()
	}

	pub fn value_count(&self) -> usize {
		self.index()
			.and_then(|index| self.0.registry.enum_at(index))
			.map_or(0, |record| record.values.len())
	}

	/// Interprets a parsed value according to the original parser.
	pub fn map_value(&self, result: &EnumResult) -> RawValue {
		match self.parser_kind().unwrap_or(ParserKind::Unknown) {
			ParserKind::Int => RawValue::Int(result.int_value()),
			ParserKind::String => RawValue::String(result.string_value().to_string()),
			ParserKind::Unknown => RawValue::Token(result.token.to_string_lossy().to_lowercase()),
		}
	}
}

impl fmt::Debug for RawEnum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RawEnum")
			.field("name", &self.0.name)
			.field("builtin", &self.0.builtin)
			.field("binding", &*self.0.binding.lock())
			.finish()
	}
}
