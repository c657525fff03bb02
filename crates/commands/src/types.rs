//! Parameter value types and the descriptor table.
//!
//! Each value type a command record can hold has a host parser, a host type id
//! and a storage layout. Enum types carry their own parser: raw and mapped enums
//! leave the descriptor's parser null so the host uses the enum table's entry,
//! and soft enums parse as plain strings.

use std::ptr;

use rustc_hash::FxHashMap;
use splice_abi::CxxString;
use splice_abi::fns::ParserFn;
use splice_abi::records::{
	ActorDefinitionIdentifierRef, BlockRef, CommandFilePath, CommandItem, CommandPosition,
	CommandPositionFloat, CommandRawText, CommandWildcardInt, EnumResult, HostTypeId, MobEffectRef,
	RelativeFloat,
};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{debug, trace};

use crate::enums::{MappedEnum, RawEnum, SharedClassifier, SoftEnum};
use crate::error::{LookupError, Result};
use crate::host::{self, HostStatic, symbol};
use crate::selector::{
	ActorCommandSelector, ActorWildcardCommandSelector, PlayerCommandSelector,
	PlayerWildcardCommandSelector,
};
use crate::storage::{CommandMessage, JsonValue};
use crate::symbols::SymbolResolver;
use crate::typeid::{TypeIdSource, TypeIds};

/// Value types with a host parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum NativeType {
	Int,
	Float,
	Bool,
	String,
	ActorSelector,
	PlayerSelector,
	ActorWildcardSelector,
	PlayerWildcardSelector,
	RelativeFloat,
	FilePath,
	Item,
	Message,
	Position,
	PositionFloat,
	RawText,
	WildcardInt,
	Json,
	Block,
	MobEffect,
	ActorDefinitionIdentifier,
}

impl NativeType {
	/// The C++ type name used in parser and type-id symbols.
	pub const fn cxx_name(self) -> &'static str {
		match self {
			Self::Int => "int",
			Self::Float => "float",
			Self::Bool => "bool",
			Self::String => "std::basic_string<char,std::char_traits<char>,std::allocator<char> >",
			Self::ActorSelector => "CommandSelector<Actor>",
			Self::PlayerSelector => "CommandSelector<Player>",
			Self::ActorWildcardSelector => "WildcardCommandSelector<Actor>",
			Self::PlayerWildcardSelector => "WildcardCommandSelector<Player>",
			Self::RelativeFloat => "RelativeFloat",
			Self::FilePath => "CommandFilePath",
			Self::Item => "CommandItem",
			Self::Message => "CommandMessage",
			Self::Position => "CommandPosition",
			Self::PositionFloat => "CommandPositionFloat",
			Self::RawText => "CommandRawText",
			Self::WildcardInt => "CommandWildcardInt",
			Self::Json => "Json::Value",
			Self::Block => "Block const * __ptr64",
			Self::MobEffect => "MobEffect const * __ptr64",
			Self::ActorDefinitionIdentifier => "ActorDefinitionIdentifier const * __ptr64",
		}
	}

	/// Layout and lifecycle of the storage this type parses into.
	pub fn descriptor(self) -> TypeDescriptor {
		match self {
			Self::Int => TypeDescriptor::of::<i32>(),
			Self::Float => TypeDescriptor::of::<f32>(),
			Self::Bool => TypeDescriptor::of::<bool>(),
			Self::String => TypeDescriptor::of::<CxxString>(),
			Self::ActorSelector => TypeDescriptor::of::<ActorCommandSelector>(),
			Self::PlayerSelector => TypeDescriptor::of::<PlayerCommandSelector>(),
			Self::ActorWildcardSelector => TypeDescriptor::of::<ActorWildcardCommandSelector>(),
			Self::PlayerWildcardSelector => TypeDescriptor::of::<PlayerWildcardCommandSelector>(),
			Self::RelativeFloat => TypeDescriptor::of::<RelativeFloat>(),
			Self::FilePath => TypeDescriptor::of::<CommandFilePath>(),
			Self::Item => TypeDescriptor::of::<CommandItem>(),
			Self::Message => TypeDescriptor::of::<CommandMessage>(),
			Self::Position => TypeDescriptor::of::<CommandPosition>(),
			Self::PositionFloat => TypeDescriptor::of::<CommandPositionFloat>(),
			Self::RawText => TypeDescriptor::of::<CommandRawText>(),
			Self::WildcardInt => TypeDescriptor::of::<CommandWildcardInt>(),
			Self::Json => TypeDescriptor::of::<JsonValue>(),
			Self::Block => TypeDescriptor::of::<BlockRef>(),
			Self::MobEffect => TypeDescriptor::of::<MobEffectRef>(),
			Self::ActorDefinitionIdentifier => TypeDescriptor::of::<ActorDefinitionIdentifierRef>(),
		}
	}

	/// Types whose id the host keeps only in a static.
	fn has_static_type_id(self) -> bool {
		matches!(self, Self::ActorDefinitionIdentifier)
	}
}

/// What a command record field holds, as far as descriptor building cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
	Native(NativeType),
	/// [`EnumResult`], written by raw and mapped enum parsers.
	Enum,
}

/// A type that can be stored in a command record field.
///
/// # Safety
///
/// The layout must be the host's layout for the storage named by `KIND`.
pub unsafe trait Storage: Sized + 'static {
	const KIND: StorageKind;

	/// Default-constructs a value at `slot`.
	///
	/// # Safety
	///
	/// `slot` must be valid for writes and suitably aligned.
	unsafe fn construct_in(slot: *mut Self);
}

macro_rules! default_storage {
	($($ty:ty => $kind:expr;)*) => {$(
		unsafe impl Storage for $ty {
			const KIND: StorageKind = $kind;

			unsafe fn construct_in(slot: *mut Self) {
				unsafe { slot.write(<$ty>::default()) }
			}
		}
	)*};
}

default_storage! {
	i32 => StorageKind::Native(NativeType::Int);
	f32 => StorageKind::Native(NativeType::Float);
	bool => StorageKind::Native(NativeType::Bool);
	CxxString => StorageKind::Native(NativeType::String);
	RelativeFloat => StorageKind::Native(NativeType::RelativeFloat);
	CommandFilePath => StorageKind::Native(NativeType::FilePath);
	CommandItem => StorageKind::Native(NativeType::Item);
	CommandMessage => StorageKind::Native(NativeType::Message);
	CommandPosition => StorageKind::Native(NativeType::Position);
	CommandPositionFloat => StorageKind::Native(NativeType::PositionFloat);
	CommandRawText => StorageKind::Native(NativeType::RawText);
	CommandWildcardInt => StorageKind::Native(NativeType::WildcardInt);
	JsonValue => StorageKind::Native(NativeType::Json);
	BlockRef => StorageKind::Native(NativeType::Block);
	MobEffectRef => StorageKind::Native(NativeType::MobEffect);
	ActorDefinitionIdentifierRef => StorageKind::Native(NativeType::ActorDefinitionIdentifier);
	EnumResult => StorageKind::Enum;
}

/// Size, alignment and in-place lifecycle of one storage type.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
	pub size: usize,
	pub align: usize,
	construct: unsafe fn(*mut u8),
	destroy: unsafe fn(*mut u8),
}

unsafe fn construct_erased<S: Storage>(slot: *mut u8) {
	unsafe { S::construct_in(slot.cast()) }
}

unsafe fn destroy_erased<S: Storage>(slot: *mut u8) {
	unsafe { ptr::drop_in_place(slot.cast::<S>()) }
}

impl TypeDescriptor {
	pub fn of<S: Storage>() -> Self {
		Self {
			size: size_of::<S>(),
			align: align_of::<S>(),
			construct: construct_erased::<S>,
			destroy: destroy_erased::<S>,
		}
	}

	/// # Safety
	///
	/// `slot` must be valid for `size` bytes and aligned to `align`.
	pub unsafe fn construct(&self, slot: *mut u8) {
		unsafe { (self.construct)(slot) }
	}

	/// # Safety
	///
	/// `slot` must hold a value constructed by [`Self::construct`].
	pub unsafe fn destroy(&self, slot: *mut u8) {
		unsafe { (self.destroy)(slot) }
	}
}

impl std::fmt::Debug for TypeDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeDescriptor")
			.field("size", &self.size)
			.field("align", &self.align)
			.finish_non_exhaustive()
	}
}

/// A parameter's semantic type.
#[derive(Debug, Clone)]
pub enum ParamType {
	Native(NativeType),
	/// A raw enum, or the raw enum behind a mapped one.
	Enum(RawEnum),
	SoftEnum(SoftEnum),
}

impl ParamType {
	/// The storage a field must have to hold this type.
	pub fn storage(&self) -> StorageKind {
		match self {
			Self::Native(ty) => StorageKind::Native(*ty),
			Self::Enum(_) => StorageKind::Enum,
			Self::SoftEnum(_) => StorageKind::Native(NativeType::String),
		}
	}

	pub fn descriptor(&self) -> TypeDescriptor {
		match self.storage() {
			StorageKind::Native(ty) => ty.descriptor(),
			StorageKind::Enum => TypeDescriptor::of::<EnumResult>(),
		}
	}
}

impl From<NativeType> for ParamType {
	fn from(value: NativeType) -> Self {
		Self::Native(value)
	}
}

impl From<RawEnum> for ParamType {
	fn from(value: RawEnum) -> Self {
		Self::Enum(value)
	}
}

impl<V> From<&MappedEnum<V>> for ParamType {
	fn from(value: &MappedEnum<V>) -> Self {
		Self::Enum(value.raw().clone())
	}
}

impl From<SoftEnum> for ParamType {
	fn from(value: SoftEnum) -> Self {
		Self::SoftEnum(value)
	}
}

/// Parser entry points per value type.
///
/// Raw enums classify their host parser through [`TypeTable::classifier`], so
/// overriding the string or enum parser affects every enum bound afterwards.
#[derive(Debug, Default)]
pub struct TypeTable {
	parsers: FxHashMap<NativeType, ParserFn>,
	enum_parser: Option<ParserFn>,
	classifier: SharedClassifier,
}

impl TypeTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolves `CommandRegistry::parse<T>` for every native type.
	///
	/// The player wildcard selector reuses the actor wildcard selector's parser.
	pub fn load(resolver: &dyn SymbolResolver) -> Self {
		let mut table = Self::new();
		for ty in NativeType::iter().filter(|ty| *ty != NativeType::PlayerWildcardSelector) {
			let name = symbol::parser(ty.cxx_name());
			match resolver.resolve(&name) {
				// SAFETY: `CommandRegistry::parse<T>` has the parser signature.
				Some(address) => {
					table.set_parser(ty, unsafe { host::cast_symbol(address) });
				}
				None => trace!(%ty, "no parser exported"),
			}
		}
		if let Some(parser) = table.parsers.get(&NativeType::ActorWildcardSelector).copied() {
			table.set_parser(NativeType::PlayerWildcardSelector, parser);
		}
		if let Some(address) = resolver.resolve(symbol::ENUM_PARSER) {
			// SAFETY: `parseEnum<int>` has the parser signature.
			table.set_enum_parser(unsafe { host::cast_symbol(address) });
		}
		debug!(parsers = table.parsers.len(), "loaded parser table");
		table
	}

	/// Parser for `ty`; `None` means the host picks the enum table's parser.
	pub fn get_parser(&self, ty: &ParamType) -> Result<Option<ParserFn>> {
		match ty {
			ParamType::Enum(_) => Ok(None),
			ParamType::SoftEnum(_) => self.native_parser(NativeType::String).map(Some),
			ParamType::Native(native) => self.native_parser(*native).map(Some),
		}
	}

	fn native_parser(&self, ty: NativeType) -> Result<ParserFn> {
		Ok(self
			.parsers
			.get(&ty)
			.copied()
			.ok_or(LookupError::ParserNotFound(ty))?)
	}

	/// Enum types always resolve their own parser.
	pub fn has_parser(&self, ty: &ParamType) -> bool {
		match ty {
			ParamType::Enum(_) | ParamType::SoftEnum(_) => true,
			ParamType::Native(native) => self.parsers.contains_key(native),
		}
	}

	/// Replaces the parser of `ty`.
	pub fn set_parser(&mut self, ty: NativeType, parser: ParserFn) {
		self.parsers.insert(ty, parser);
		if ty == NativeType::String {
			self.classifier.update(|classifier| classifier.string = Some(parser));
		}
	}

	/// Replaces the integer enum parser used to classify enum tables.
	pub fn set_enum_parser(&mut self, parser: ParserFn) {
		self.enum_parser = Some(parser);
		self.classifier.update(|classifier| classifier.int_enum = Some(parser));
	}

	/// A live view of the string and enum parsers.
	pub fn classifier(&self) -> SharedClassifier {
		self.classifier.clone()
	}

	pub fn enum_parser(&self) -> Option<ParserFn> {
		self.enum_parser
	}

	pub fn string_parser(&self) -> Option<ParserFn> {
		self.parsers.get(&NativeType::String).copied()
	}
}

/// Builds the command registry's type-id namespace from the host's symbols.
pub fn load_type_ids(resolver: &dyn SymbolResolver, counter: HostStatic<u16>) -> TypeIds<NativeType> {
	let mut ids = TypeIds::new(counter);
	for ty in NativeType::iter().filter(|ty| *ty != NativeType::PlayerWildcardSelector) {
		let source = if ty.has_static_type_id() {
			resolver
				.resolve(&symbol::type_id_static(ty.cxx_name()))
				// SAFETY: the static holds a `typeid_t<CommandRegistry>` for the process lifetime.
				.map(|address| TypeIdSource::Static(unsafe { HostStatic::new(address.cast::<HostTypeId>()) }))
		} else {
			resolver
				.resolve(&symbol::type_id_fn(ty.cxx_name()))
				// SAFETY: `type_id<CommandRegistry,T>` returns its id by structure return.
				.map(|address| TypeIdSource::Function(unsafe { host::cast_symbol(address) }))
		};
		if let Some(source) = source {
			ids.set_source(ty, source);
		}
	}
	ids.alias(NativeType::ActorWildcardSelector, NativeType::PlayerWildcardSelector);
	ids
}

#[cfg(test)]
mod tests {
	use splice_abi::records::CommandOutputParameter;

	use super::*;
	use crate::enums::ParserKind;

	#[test]
	fn descriptors_match_host_sizes() {
		assert_eq!(NativeType::String.descriptor().size, 32);
		assert_eq!(NativeType::ActorSelector.descriptor().size, 0xc8);
		assert_eq!(NativeType::Message.descriptor().size, 0x18);
		assert_eq!(NativeType::Json.descriptor().size, 16);
		assert_eq!(NativeType::Position.descriptor().align, 4);
		assert_eq!(TypeDescriptor::of::<EnumResult>().size, 64);
		assert_eq!(size_of::<CommandOutputParameter>(), 40);
	}

	#[test]
	fn string_descriptor_round_trips_in_place() {
		let desc = NativeType::String.descriptor();
		let mut slot = std::mem::MaybeUninit::<CxxString>::uninit();
		unsafe {
			desc.construct(slot.as_mut_ptr().cast());
			(*slot.as_mut_ptr()).assign(b"a string long enough to need the heap");
			desc.destroy(slot.as_mut_ptr().cast());
		}
	}

	#[test]
	fn missing_parsers_are_reported() {
		let table = TypeTable::new();
		let err = table.get_parser(&ParamType::Native(NativeType::Float)).unwrap_err();
		assert_eq!(err.to_string(), "Float parser not found");
		assert!(!table.has_parser(&NativeType::Float.into()));
	}

	unsafe extern "C" fn other_parser(
		_: *const splice_abi::records::RegistryRaw,
		_: *mut std::ffi::c_void,
		_: *const splice_abi::records::ParseToken,
		_: *const splice_abi::records::CommandOrigin,
		_: i32,
		_: *mut CxxString,
		_: *mut splice_abi::CxxVector<CxxString>,
	) -> bool {
		false
	}

	#[test]
	fn parser_overrides_reach_the_classifier() {
		let mut table = TypeTable::new();
		let classifier = table.classifier();
		assert_eq!(classifier.get().classify(other_parser), ParserKind::Unknown);

		table.set_enum_parser(other_parser);
		assert_eq!(classifier.get().classify(other_parser), ParserKind::Int);
		table.set_parser(NativeType::String, other_parser);
		assert_eq!(classifier.get().classify(other_parser), ParserKind::String);
		table.set_parser(NativeType::Int, other_parser);
		assert_eq!(classifier.get().classify(other_parser), ParserKind::String);
	}

	#[test]
	fn every_type_has_a_distinct_symbol() {
		let mut names: Vec<_> = NativeType::iter().map(NativeType::cxx_name).collect();
		names.sort_unstable();
		names.dedup();
		assert_eq!(names.len(), NativeType::iter().count());
	}
}
