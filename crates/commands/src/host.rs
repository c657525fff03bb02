//! The host's entry points, resolved once per runtime.
//!
//! Foreign-callable thunks (allocators, destructors, execute and parser hooks)
//! receive no context pointer, so the table of the live runtime is published
//! process-wide while that runtime exists.

use std::ffi::{c_char, c_void};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use splice_abi::heap::HostHeap;
use splice_abi::records::{
	Actor, CommandOrigin, CommandOutput, CommandOutputParameter, HostTypeId, Overload, RegistryRaw,
	Signature, SoftEnumRegistry,
};
use splice_abi::{CxxSharedPtr, CxxString, CxxVector};
use tracing::debug;

use crate::error::{CommandError, LookupError, Result};
use crate::selector::CommandSelectorBase;
use crate::storage::JsonValue;
use crate::symbols::SymbolResolver;

pub use splice_abi::symbol;

pub type RegisterCommandFn = unsafe extern "C" fn(
	this: *mut RegistryRaw,
	name: *const CxxString,
	description: *const c_char,
	level: i32,
	flag1: i32,
	flag2: i32,
);
/// Both strings are taken by value: the callee destroys them.
pub type RegisterAliasFn = unsafe extern "C" fn(this: *mut RegistryRaw, name: *mut CxxString, alias: *mut CxxString);
pub type FindCommandFn = unsafe extern "C" fn(this: *mut RegistryRaw, name: *const CxxString) -> *mut Signature;
pub type RegisterOverloadInternalFn =
	unsafe extern "C" fn(this: *mut RegistryRaw, signature: *mut Signature, overload: *mut Overload);
pub type AddEnumValuesFn =
	unsafe extern "C" fn(this: *mut RegistryRaw, name: *const CxxString, values: *const CxxVector<CxxString>) -> i32;
/// The value list is taken by value: the callee destroys it.
pub type AddSoftEnumFn =
	unsafe extern "C" fn(this: *mut RegistryRaw, name: *const CxxString, values: *mut CxxVector<CxxString>) -> i32;
/// The value list is taken by value: the callee destroys it.
pub type UpdateSoftEnumFn = unsafe extern "C" fn(
	this: *mut SoftEnumRegistry,
	kind: u8,
	name: *const CxxString,
	values: *mut CxxVector<CxxString>,
);

pub type SelectorCtorFn =
	unsafe extern "C" fn(this: *mut CommandSelectorBase, force_player: bool) -> *mut CommandSelectorBase;
pub type SelectorDtorFn = unsafe extern "C" fn(this: *mut CommandSelectorBase);
pub type ActorList = CxxSharedPtr<CxxVector<*mut Actor>>;
/// Returns through `out` (structure return).
pub type SelectorNewResultsFn = unsafe extern "C" fn(
	this: *const CommandSelectorBase,
	out: *mut ActorList,
	origin: *const CommandOrigin,
) -> *mut ActorList;
/// Returns through `out` (structure return).
pub type SelectorGetNameFn = unsafe extern "C" fn(this: *const CommandSelectorBase, out: *mut CxxString) -> *mut CxxString;
pub type IsWildcardFn = unsafe extern "C" fn(selector: *const CommandSelectorBase) -> bool;

pub type OutputNoMessageFn = unsafe extern "C" fn(this: *mut CommandOutput);
pub type OutputMessageFn = unsafe extern "C" fn(
	this: *mut CommandOutput,
	message: *const CxxString,
	params: *const CxxVector<CommandOutputParameter>,
);
pub type OutputCountFn = unsafe extern "C" fn(this: *const CommandOutput) -> i32;
pub type OutputEmptyFn = unsafe extern "C" fn(this: *const CommandOutput) -> bool;

pub type ActorGetNameFn = unsafe extern "C" fn(this: *const Actor) -> *const CxxString;
pub type ActorGetEntityTypeIdFn = unsafe extern "C" fn(this: *const Actor) -> i32;
pub type JsonValueDtorFn = unsafe extern "C" fn(this: *mut JsonValue);

/// `typeid_t<CommandRegistry> type_id<CommandRegistry, T>()` (structure return).
pub type TypeIdFn = unsafe extern "C" fn(out: *mut HostTypeId) -> *mut HostTypeId;

/// Address of a host static. Host statics live as long as the process.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HostStatic<T>(NonNull<T>);

// SAFETY: the address is shared, not the data; access goes through unsafe reads.
unsafe impl<T> Send for HostStatic<T> {}
unsafe impl<T> Sync for HostStatic<T> {}

impl<T> HostStatic<T> {
	/// # Safety
	///
	/// `ptr` must point at a `T` that lives for the rest of the process.
	pub unsafe fn new(ptr: NonNull<T>) -> Self {
		Self(ptr)
	}

	pub fn as_ptr(&self) -> *mut T {
		self.0.as_ptr()
	}
}

impl<T> fmt::Debug for HostStatic<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "HostStatic({:p})", self.0)
	}
}

/// Every host entry point the subsystem calls.
#[derive(Clone)]
pub struct HostFunctions {
	pub register_command: RegisterCommandFn,
	pub register_alias: RegisterAliasFn,
	pub find_command: FindCommandFn,
	pub register_overload_internal: RegisterOverloadInternalFn,
	pub add_enum_values: AddEnumValuesFn,
	pub add_soft_enum: AddSoftEnumFn,
	pub update_soft_enum: UpdateSoftEnumFn,

	pub selector_ctor: SelectorCtorFn,
	pub selector_dtor: SelectorDtorFn,
	pub selector_new_results: SelectorNewResultsFn,
	pub selector_get_name: SelectorGetNameFn,
	pub is_wildcard: IsWildcardFn,

	pub output_success_no_message: OutputNoMessageFn,
	pub output_success: OutputMessageFn,
	pub output_error: OutputMessageFn,
	pub output_add_message: OutputMessageFn,
	pub output_get_success_count: OutputCountFn,
	pub output_get_type: OutputCountFn,
	pub output_empty: OutputEmptyFn,

	pub actor_get_name: ActorGetNameFn,
	pub actor_get_entity_type_id: ActorGetEntityTypeIdFn,
	pub json_value_dtor: JsonValueDtorFn,

	/// `typeid_t<CommandRegistry>::count`, the next free id.
	pub typeid_counter: HostStatic<u16>,
	/// The host's allocator, when it exports one.
	pub heap: Option<HostHeap>,
}

impl fmt::Debug for HostFunctions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HostFunctions")
			.field("typeid_counter", &self.typeid_counter)
			.field("heap", &self.heap.is_some())
			.finish_non_exhaustive()
	}
}

/// Reinterprets a resolved address as `F`.
///
/// # Safety
///
/// The symbol must have the type `F` describes.
pub(crate) unsafe fn cast_symbol<F: Copy>(address: NonNull<c_void>) -> F {
	const { assert!(size_of::<F>() == size_of::<*mut c_void>()) };
	unsafe { std::mem::transmute_copy(&address) }
}

/// # Safety
///
/// The symbol must have the type `F` describes.
unsafe fn required<F: Copy>(resolver: &dyn SymbolResolver, name: &str) -> Result<F> {
	let address = resolver
		.resolve(name)
		.ok_or_else(|| LookupError::SymbolNotFound(name.to_owned()))?;
	Ok(unsafe { cast_symbol(address) })
}

impl HostFunctions {
	/// Resolves every required entry point; fails on the first missing one.
	pub fn resolve(resolver: &dyn SymbolResolver) -> Result<Self> {
		use symbol::*;

		// SAFETY: every symbol name is paired with the signature the host declares.
		unsafe {
			let heap = match (resolver.resolve(MALLOC), resolver.resolve(FREE)) {
				(Some(alloc), Some(free)) => Some(HostHeap {
					alloc: cast_symbol(alloc),
					free: cast_symbol(free),
				}),
				_ => None,
			};
			let counter = resolver
				.resolve(TYPEID_COUNTER)
				.ok_or_else(|| LookupError::SymbolNotFound(TYPEID_COUNTER.to_owned()))?;

			let table = Self {
				register_command: required(resolver, REGISTER_COMMAND)?,
				register_alias: required(resolver, REGISTER_ALIAS)?,
				find_command: required(resolver, FIND_COMMAND)?,
				register_overload_internal: required(resolver, REGISTER_OVERLOAD_INTERNAL)?,
				add_enum_values: required(resolver, ADD_ENUM_VALUES)?,
				add_soft_enum: required(resolver, ADD_SOFT_ENUM)?,
				update_soft_enum: required(resolver, UPDATE_SOFT_ENUM)?,
				selector_ctor: required(resolver, SELECTOR_CTOR)?,
				selector_dtor: required(resolver, SELECTOR_DTOR)?,
				selector_new_results: required(resolver, SELECTOR_NEW_RESULTS)?,
				selector_get_name: required(resolver, SELECTOR_GET_NAME)?,
				is_wildcard: required(resolver, IS_WILDCARD)?,
				output_success_no_message: required(resolver, OUTPUT_SUCCESS_NO_MESSAGE)?,
				output_success: required(resolver, OUTPUT_SUCCESS)?,
				output_error: required(resolver, OUTPUT_ERROR)?,
				output_add_message: required(resolver, OUTPUT_ADD_MESSAGE)?,
				output_get_success_count: required(resolver, OUTPUT_GET_SUCCESS_COUNT)?,
				output_get_type: required(resolver, OUTPUT_GET_TYPE)?,
				output_empty: required(resolver, OUTPUT_EMPTY)?,
				actor_get_name: required(resolver, ACTOR_GET_NAME)?,
				actor_get_entity_type_id: required(resolver, ACTOR_GET_ENTITY_TYPE_ID)?,
				json_value_dtor: required(resolver, JSON_VALUE_DTOR)?,
				typeid_counter: HostStatic::new(counter.cast()),
				heap,
			};
			debug!(host_heap = table.heap.is_some(), "resolved host functions");
			Ok(table)
		}
	}
}

static HOST: ArcSwapOption<HostFunctions> = ArcSwapOption::const_empty();

/// The host table of the live runtime, if any.
pub fn current() -> Option<Arc<HostFunctions>> {
	HOST.load_full()
}

/// The host table of the live runtime.
pub fn require() -> Result<Arc<HostFunctions>> {
	current().ok_or(CommandError::NotInitialized)
}

pub(crate) fn publish(table: Option<Arc<HostFunctions>>) {
	HOST.store(table);
}
