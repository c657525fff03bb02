//! An in-process stand-in for the host's command registry.
//!
//! [`SimHost`] owns a registry object laid out like the host's, plus the
//! entry points the extension resolves by name: registration, enum tables,
//! parsers, selectors and command output. Tests drive a full registration and
//! then play the host's part: parsing arguments into a fresh command record and
//! executing it.

mod parse;
mod registry;
mod state;
mod tree;
mod world;

use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use rustc_hash::FxHashMap;
use splice_abi::fns::ParserFn;
use splice_abi::records::{Actor, CommandBase, EnumResult, RegistryRaw};
use splice_abi::symbol;
use tracing::debug;

pub use parse::enum_symbol;
pub use state::{ENUM_SYMBOL, FIRST_COUNTER_ID, OverloadEvent};
pub use world::{Channel, OutputMessage, PLAYER, SimActor, SimOrigin, SimOutput};

use state::HostState;

/// C++ type names the simulated host ships parsers for.
const INT: &str = "int";
const FLOAT: &str = "float";
const BOOL: &str = "bool";
const STRING: &str = "std::basic_string<char,std::char_traits<char>,std::allocator<char> >";
const SELECTORS: [&str; 3] = [
	"CommandSelector<Actor>",
	"CommandSelector<Player>",
	"WildcardCommandSelector<Actor>",
];

/// Addresses of every symbol the simulated host exports.
#[derive(Clone, Default)]
pub struct SymbolTable {
	symbols: FxHashMap<String, usize>,
}

impl SymbolTable {
	fn insert(&mut self, name: impl Into<String>, address: *const ()) {
		self.symbols.insert(name.into(), address as usize);
	}

	pub fn lookup(&self, name: &str) -> Option<NonNull<c_void>> {
		self.symbols
			.get(name)
			.and_then(|address| NonNull::new(*address as *mut c_void))
	}

	/// The same table with `name` unexported.
	pub fn without(mut self, name: &str) -> Self {
		self.symbols.remove(name);
		self
	}

	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}
}

impl fmt::Debug for SymbolTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.symbols.keys().collect();
		names.sort_unstable();
		f.debug_set().entries(names).finish()
	}
}

/// A simulated host. Its registry stays at a fixed address until dropped.
pub struct SimHost {
	state: NonNull<HostState>,
}

impl SimHost {
	pub fn new() -> Self {
		let state = NonNull::from(Box::leak(Box::new(HostState::new())));
		Self { state }
	}

	fn state(&self) -> &HostState {
		// SAFETY: the state is owned by `self` and freed only on drop.
		unsafe { self.state.as_ref() }
	}

	fn state_mut(&mut self) -> &mut HostState {
		// SAFETY: as above; `&mut self` rules out other borrows through the host.
		unsafe { self.state.as_mut() }
	}

	/// The registry object, as the extension receives it.
	pub fn registry(&self) -> NonNull<RegistryRaw> {
		self.state.cast()
	}

	/// Next id the type-id counter hands out.
	pub fn typeid_counter(&self) -> u16 {
		self.state().typeid_counter
	}

	/// Defines an enum the way the host does at startup, before any extension
	/// runs. Returns its index.
	pub fn add_builtin_enum(&mut self, name: &str, values: &[&str]) -> u32 {
		let state = self.state_mut();
		let index = state.ensure_enum(name);
		for value in values {
			state.add_enum_value(index, value);
		}
		index
	}

	pub fn enum_count(&self) -> usize {
		self.state().registry.enums.len()
	}

	/// Size of the shared enum value table.
	pub fn enum_value_count(&self) -> usize {
		self.state().registry.enum_values.len()
	}

	pub fn enum_values(&self, name: &str) -> Option<Vec<String>> {
		let state = self.state();
		let record = state.registry.enums.get(state.enum_index(name)? as usize)?;
		Some(
			record
				.values
				.iter()
				.filter_map(|pair| state.registry.enum_values.get(pair.first as usize))
				.map(ToString::to_string)
				.collect(),
		)
	}

	pub fn soft_enum_values(&self, name: &str) -> Option<Vec<String>> {
		let state = self.state();
		let record = state.registry.soft_enums.get(state.soft_enum_index(name)? as usize)?;
		Some(record.list.iter().map(ToString::to_string).collect())
	}

	/// Current parser of the enum `name`.
	pub fn enum_parser(&self, name: &str) -> Option<ParserFn> {
		let state = self.state();
		state.registry.enums.get(state.enum_index(name)? as usize)?.parser
	}

	/// The parser every enum starts with.
	pub fn default_enum_parser() -> ParserFn {
		parse::parse_enum
	}

	pub fn has_command(&self, name: &str) -> bool {
		self.state().signature(name).is_some()
	}

	pub fn overload_count(&self, command: &str) -> usize {
		self.state()
			.signature(command)
			.map_or(0, |signature| signature.overloads.len())
	}

	/// Every overload registration the host was told about, in order.
	pub fn overload_events(&self) -> &[OverloadEvent] {
		&self.state().overload_events
	}

	/// Adds an actor to the world. The pointer stays valid while the host lives.
	pub fn spawn(&mut self, name: &str, entity_type: i32) -> *mut Actor {
		let actor = Box::new(SimActor {
			name: name.into(),
			entity_type,
		});
		let address = actor.as_actor();
		self.state_mut().actors.push(actor);
		address
	}

	/// Runs the current parser of the enum `name` over `text`, as the host does
	/// for an enum argument.
	pub fn parse_enum(&self, name: &str, text: &str) -> Option<EnumResult> {
		let state = self.state();
		let index = state.enum_index(name)?;
		let parser = state.registry.enums.get(index as usize)?.parser?;
		let mut result = EnumResult::default();
		let mut error = splice_abi::CxxString::new();
		let mut error_params = splice_abi::CxxVector::new();
		let registry = self.registry().as_ptr().cast_const();
		let matched = parse::with_token(text, enum_symbol(index), |token| unsafe {
			parser(
				registry,
				ptr::from_mut(&mut result).cast(),
				token,
				ptr::null(),
				0,
				&mut error,
				&mut error_params,
			)
		});
		matched.then_some(result)
	}

	/// Allocates a record for overload `overload` of `command` and parses
	/// `args` into it, one per parameter in order. Missing trailing arguments
	/// leave optional parameters unset.
	pub fn instantiate(&self, command: &str, overload: usize, args: &[&str]) -> Result<CommandInstance, String> {
		let state = self.state();
		let signature = state
			.signature(command)
			.ok_or_else(|| format!("unknown command {command}"))?;
		let overload = signature
			.overloads
			.get(overload)
			.ok_or_else(|| format!("{command} has no overload {overload}"))?;
		let allocator = overload.allocator.ok_or("overload without allocator")?;
		let mut record: *mut CommandBase = ptr::null_mut();
		// SAFETY: allocators fill the slot with a fresh record.
		unsafe { allocator(&mut record) };
		if record.is_null() {
			return Err(format!("allocator of {command} returned no record"));
		}
		let instance = CommandInstance { record };
		let registry = self.registry().as_ptr().cast_const();

		for (position, param) in overload.parameters.iter().enumerate() {
			let Some(text) = args.get(position) else {
				if param.optional {
					continue;
				}
				return Err(format!("missing argument {}", param.name));
			};
			let (parser, kind) = match param.parser {
				Some(parser) => (parser, param.enum_or_postfix_symbol),
				None => {
					let name = param
						.enum_name()
						.ok_or_else(|| format!("{} has neither parser nor enum", param.name))?
						.to_string_lossy();
					let index = state
						.enum_index(&name)
						.ok_or_else(|| format!("unknown enum {name}"))?;
					let parser = state.registry.enums.get(index as usize).and_then(|record| record.parser);
					(parser.ok_or_else(|| format!("enum {name} has no parser"))?, enum_symbol(index))
				}
			};
			let mut error = splice_abi::CxxString::new();
			let mut error_params = splice_abi::CxxVector::new();
			// SAFETY: offsets come from the overload the record was allocated for.
			let matched = parse::with_token(text, kind, |token| unsafe {
				let storage = record.cast::<u8>().add(param.offset as usize);
				parser(
					registry,
					storage.cast::<c_void>(),
					token,
					ptr::null(),
					0,
					&mut error,
					&mut error_params,
				)
			});
			if !matched {
				return Err(format!("{}: {}", param.name, error.to_string_lossy()));
			}
			if param.flag_offset >= 0 {
				// SAFETY: as above.
				unsafe { record.cast::<u8>().add(param.flag_offset as usize).cast::<bool>().write(true) };
			}
		}
		debug!(command, args = args.len(), "command instantiated");
		Ok(instance)
	}

	/// Resolvable symbols of this host.
	pub fn symbols(&self) -> SymbolTable {
		let mut table = SymbolTable::default();
		table.insert(symbol::REGISTER_COMMAND, registry::register_command as *const ());
		table.insert(symbol::REGISTER_ALIAS, registry::register_alias as *const ());
		table.insert(symbol::FIND_COMMAND, registry::find_command as *const ());
		table.insert(
			symbol::REGISTER_OVERLOAD_INTERNAL,
			registry::register_overload_internal as *const (),
		);
		table.insert(symbol::ADD_ENUM_VALUES, registry::add_enum_values as *const ());
		table.insert(symbol::ADD_SOFT_ENUM, registry::add_soft_enum as *const ());
		table.insert(symbol::UPDATE_SOFT_ENUM, registry::update_soft_enum as *const ());

		table.insert(symbol::SELECTOR_CTOR, world::selector_ctor as *const ());
		table.insert(symbol::SELECTOR_DTOR, world::selector_dtor as *const ());
		table.insert(symbol::SELECTOR_NEW_RESULTS, world::selector_new_results as *const ());
		table.insert(symbol::SELECTOR_GET_NAME, world::selector_get_name as *const ());
		table.insert(symbol::IS_WILDCARD, world::is_wildcard as *const ());

		table.insert(symbol::OUTPUT_SUCCESS_NO_MESSAGE, world::output_success_no_message as *const ());
		table.insert(symbol::OUTPUT_SUCCESS, world::output_success as *const ());
		table.insert(symbol::OUTPUT_ERROR, world::output_error as *const ());
		table.insert(symbol::OUTPUT_ADD_MESSAGE, world::output_add_message as *const ());
		table.insert(symbol::OUTPUT_GET_SUCCESS_COUNT, world::output_get_success_count as *const ());
		table.insert(symbol::OUTPUT_GET_TYPE, world::output_get_type as *const ());
		table.insert(symbol::OUTPUT_EMPTY, world::output_empty as *const ());

		table.insert(symbol::ACTOR_GET_NAME, world::actor_get_name as *const ());
		table.insert(symbol::ACTOR_GET_ENTITY_TYPE_ID, world::actor_get_entity_type_id as *const ());
		table.insert(symbol::JSON_VALUE_DTOR, world::json_value_dtor as *const ());

		table.insert(symbol::TYPEID_COUNTER, ptr::from_ref(&self.state().typeid_counter).cast());
		table.insert(symbol::ENUM_PARSER, parse::parse_enum as *const ());

		table.insert(symbol::parser(INT), parse::parse_int as *const ());
		table.insert(symbol::parser(FLOAT), parse::parse_float as *const ());
		table.insert(symbol::parser(BOOL), parse::parse_bool as *const ());
		table.insert(symbol::parser(STRING), parse::parse_string as *const ());
		for selector in SELECTORS {
			table.insert(symbol::parser(selector), parse::parse_selector as *const ());
		}

		table.insert(symbol::type_id_fn(INT), parse::type_id::<1> as *const ());
		table.insert(symbol::type_id_fn(FLOAT), parse::type_id::<2> as *const ());
		table.insert(symbol::type_id_fn(BOOL), parse::type_id::<3> as *const ());
		table.insert(symbol::type_id_fn(STRING), parse::type_id::<4> as *const ());
		table
	}
}

impl Default for SimHost {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for SimHost {
	fn drop(&mut self) {
		// SAFETY: the state was leaked from a box in `new` and is freed once.
		drop(unsafe { Box::from_raw(self.state.as_ptr()) });
	}
}

impl fmt::Debug for SimHost {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state();
		f.debug_struct("SimHost")
			.field("enums", &state.registry.enums.len())
			.field("soft_enums", &state.registry.soft_enums.len())
			.field("actors", &state.actors.len())
			.finish_non_exhaustive()
	}
}

/// A command record the host allocated and filled. Destroyed on drop.
pub struct CommandInstance {
	record: *mut CommandBase,
}

impl CommandInstance {
	pub fn as_ptr(&self) -> *mut CommandBase {
		self.record
	}

	/// Calls the record's `execute` entry.
	pub fn execute(&self, origin: &SimOrigin, output: &mut SimOutput) {
		// SAFETY: the record is live and its vftable was set by its allocator.
		unsafe {
			let vftable = &*(*self.record).vftable;
			if let Some(execute) = vftable.execute {
				execute(self.record, origin.as_origin(), output.as_mut_ptr());
			}
		}
	}
}

impl Drop for CommandInstance {
	fn drop(&mut self) {
		// SAFETY: the record is live; flag bit 0 releases its storage.
		unsafe {
			let destructor = (*(*self.record).vftable).destructor;
			destructor(self.record, 1);
		}
	}
}

impl fmt::Debug for CommandInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("CommandInstance").field(&self.record).finish()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn builtin_enums_parse_without_case() {
		let mut host = SimHost::new();
		let index = host.add_builtin_enum("Color", &["Red", "Green"]);
		assert_eq!(index, 0);
		assert_eq!(host.enum_values("Color").unwrap(), ["Red", "Green"]);
		let parsed = host.parse_enum("Color", "green").unwrap();
		assert_eq!(parsed.int_value(), 1);
		assert!(host.parse_enum("Color", "blue").is_none());
	}

	#[test]
	fn enum_values_are_shared_between_enums() {
		let mut host = SimHost::new();
		host.add_builtin_enum("A", &["x", "y"]);
		host.add_builtin_enum("B", &["y", "z"]);
		assert_eq!(host.enum_value_count(), 3);
		assert_eq!(host.enum_count(), 2);
		assert_eq!(host.typeid_counter(), FIRST_COUNTER_ID + 2);
	}

	#[test]
	fn symbol_table_exports_the_counter_address() {
		let host = SimHost::new();
		let symbols = host.symbols();
		let counter = symbols.lookup(symbol::TYPEID_COUNTER).unwrap();
		assert_eq!(unsafe { counter.cast::<u16>().read() }, FIRST_COUNTER_ID);
		assert!(symbols.lookup(symbol::MALLOC).is_none());
		assert!(symbols.clone().without(symbol::FIND_COMMAND).lookup(symbol::FIND_COMMAND).is_none());
	}
}
