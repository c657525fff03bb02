//! The simulated registry object and the bookkeeping around it.

use std::mem::offset_of;

use rustc_hash::FxHashMap;
use splice_abi::layout::{LayoutProfile, RegistryOffsets};
use splice_abi::records::{CommandSymbol, EnumRecord, HostTypeId, RegistryRaw, Signature, SoftEnumRecord};
use splice_abi::{CxxMap, CxxPair, CxxString, CxxVector};

use crate::parse;
use crate::tree::Tree;
use crate::world::SimActor;

/// Symbols of enum tokens carry this bit; the low bits are the enum index.
pub const ENUM_SYMBOL: i32 = 0x0020_0000;

/// First id the type-id counter hands out.
pub const FIRST_COUNTER_ID: u16 = 16;

/// The registry's containers, at the offsets of the current layout profile.
#[repr(C)]
pub(crate) struct RegistryObject {
	_head: [u8; 192],
	pub(crate) enum_values: CxxVector<CxxString>,
	pub(crate) enums: CxxVector<EnumRecord>,
	_gap0: [u8; 48],
	pub(crate) enum_lookup: CxxMap<CxxString, u32>,
	pub(crate) enum_value_lookup: CxxMap<CxxString, u64>,
	pub(crate) command_symbols: CxxVector<CommandSymbol>,
	pub(crate) signatures: CxxMap<CxxString, Signature>,
	_gap1: [u8; 128],
	pub(crate) soft_enums: CxxVector<SoftEnumRecord>,
	pub(crate) soft_enum_lookup: CxxMap<CxxString, u32>,
}

const OFFSETS: RegistryOffsets = LayoutProfile::CURRENT.registry;

const _: () = {
	assert!(offset_of!(RegistryObject, enum_values) == OFFSETS.enum_values);
	assert!(offset_of!(RegistryObject, enums) == OFFSETS.enums);
	assert!(offset_of!(RegistryObject, enum_lookup) == OFFSETS.enum_lookup);
	assert!(offset_of!(RegistryObject, enum_value_lookup) == OFFSETS.enum_value_lookup);
	assert!(offset_of!(RegistryObject, command_symbols) == OFFSETS.command_symbols);
	assert!(offset_of!(RegistryObject, signatures) == OFFSETS.signatures);
	assert!(offset_of!(RegistryObject, soft_enums) == OFFSETS.soft_enums);
	assert!(offset_of!(RegistryObject, soft_enum_lookup) == OFFSETS.soft_enum_lookup);
};

/// One call the host received through `registerOverloadInternal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadEvent {
	pub command: String,
	pub parameters: usize,
}

/// Everything the simulated host owns. The registry object comes first, so a
/// registry pointer is also a pointer to the whole state.
#[repr(C)]
pub(crate) struct HostState {
	pub(crate) registry: RegistryObject,
	signatures: Tree<Signature>,
	enum_lookup: Tree<u32>,
	enum_value_lookup: Tree<u64>,
	soft_enum_lookup: Tree<u32>,
	pub(crate) aliases: FxHashMap<String, String>,
	pub(crate) typeid_counter: u16,
	next_symbol: i32,
	pub(crate) actors: Vec<Box<SimActor>>,
	pub(crate) overload_events: Vec<OverloadEvent>,
}

impl HostState {
	pub(crate) fn new() -> Self {
		let signatures = Tree::new();
		let enum_lookup = Tree::new();
		let enum_value_lookup = Tree::new();
		let soft_enum_lookup = Tree::new();
		Self {
			registry: RegistryObject {
				_head: [0; 192],
				enum_values: CxxVector::new(),
				enums: CxxVector::new(),
				_gap0: [0; 48],
				enum_lookup: enum_lookup.view(),
				enum_value_lookup: enum_value_lookup.view(),
				command_symbols: CxxVector::new(),
				signatures: signatures.view(),
				_gap1: [0; 128],
				soft_enums: CxxVector::new(),
				soft_enum_lookup: soft_enum_lookup.view(),
			},
			signatures,
			enum_lookup,
			enum_value_lookup,
			soft_enum_lookup,
			aliases: FxHashMap::default(),
			typeid_counter: FIRST_COUNTER_ID,
			next_symbol: 1,
			actors: Vec::new(),
			overload_events: Vec::new(),
		}
	}

	/// # Safety
	///
	/// `registry` must point at the registry object of a live state, with no
	/// other reference to that state in use.
	pub(crate) unsafe fn from_registry<'a>(registry: *const RegistryRaw) -> &'a mut Self {
		unsafe { &mut *registry.cast_mut().cast::<Self>() }
	}

	/// Refreshes the registry's map headers after the trees changed.
	fn sync(&mut self) {
		self.registry.signatures = self.signatures.view();
		self.registry.enum_lookup = self.enum_lookup.view();
		self.registry.enum_value_lookup = self.enum_value_lookup.view();
		self.registry.soft_enum_lookup = self.soft_enum_lookup.view();
	}

	fn next_type_id(&mut self) -> HostTypeId {
		let id = self.typeid_counter;
		self.typeid_counter += 1;
		HostTypeId { id }
	}

	pub(crate) fn resolve_command<'a>(&'a self, name: &'a str) -> Option<&'a str> {
		if self.signatures.contains(name) {
			return Some(name);
		}
		self.aliases
			.get(name)
			.map(String::as_str)
			.filter(|target| self.signatures.contains(target))
	}

	pub(crate) fn signature_mut(&mut self, name: &str) -> Option<&mut Signature> {
		let name = self.resolve_command(name)?.to_owned();
		self.signatures.get_mut(&name)
	}

	pub(crate) fn signature(&self, name: &str) -> Option<&Signature> {
		self.signatures.get(self.resolve_command(name)?)
	}

	/// Adds a signature unless `name` is taken. Returns whether it was added.
	pub(crate) fn add_signature(&mut self, name: &str, description: &str, level: i32, flags: i32) -> bool {
		if self.resolve_command(name).is_some() {
			return false;
		}
		let symbol = CommandSymbol(self.next_symbol);
		self.next_symbol += 1;
		self.signatures.insert(
			name,
			Signature {
				command: CxxString::from(name),
				description: CxxString::from(description),
				overloads: CxxVector::new(),
				permission_level: level,
				command_symbol: symbol,
				alias_enum: CommandSymbol::NONE,
				flags,
			},
		);
		self.registry.command_symbols.push(symbol);
		self.sync();
		true
	}

	pub(crate) fn enum_index(&self, name: &str) -> Option<u32> {
		self.enum_lookup.get(name).copied()
	}

	/// Index of the enum `name`, creating an empty one with the integer parser.
	pub(crate) fn ensure_enum(&mut self, name: &str) -> u32 {
		if let Some(index) = self.enum_index(name) {
			return index;
		}
		let index = self.registry.enums.len() as u32;
		let tid = self.next_type_id();
		self.registry.enums.push(EnumRecord {
			name: CxxString::from(name),
			tid,
			parser: Some(parse::parse_enum),
			values: CxxVector::new(),
		});
		self.enum_lookup.insert(name, index);
		self.sync();
		index
	}

	pub(crate) fn add_enum_value(&mut self, index: u32, text: &str) {
		let value_index = match self.enum_value_lookup.get(text) {
			Some(existing) => *existing,
			None => {
				let value_index = self.registry.enum_values.len() as u64;
				self.registry.enum_values.push(CxxString::from(text));
				self.enum_value_lookup.insert(text, value_index);
				self.sync();
				value_index
			}
		};
		let Some(record) = self.registry.enums.get_mut(index as usize) else {
			return;
		};
		if record.values.iter().any(|pair| pair.first == value_index) {
			return;
		}
		let value = record.values.len() as u64;
		record.values.push(CxxPair {
			first: value_index,
			second: value,
		});
	}

	pub(crate) fn soft_enum_index(&self, name: &str) -> Option<u32> {
		self.soft_enum_lookup.get(name).copied()
	}

	pub(crate) fn add_soft_enum(&mut self, name: &str, list: CxxVector<CxxString>) -> u32 {
		if let Some(index) = self.soft_enum_index(name) {
			if let Some(record) = self.registry.soft_enums.get_mut(index as usize) {
				record.list = list;
			}
			return index;
		}
		let index = self.registry.soft_enums.len() as u32;
		self.registry.soft_enums.push(SoftEnumRecord {
			name: CxxString::from(name),
			list,
		});
		self.soft_enum_lookup.insert(name, index);
		self.sync();
		index
	}

	pub(crate) fn soft_enum_mut(&mut self, name: &str) -> Option<&mut SoftEnumRecord> {
		let index = self.soft_enum_index(name)?;
		self.registry.soft_enums.get_mut(index as usize)
	}
}
