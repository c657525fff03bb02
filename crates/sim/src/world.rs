//! Actors, selectors, origins and command output.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr;

use splice_abi::records::{Actor, CommandOrigin, CommandOutput, CommandOutputParameter};
use splice_abi::{CxxSharedPtr, CxxString, CxxVector, RefCountBase, RefCountVTable};

use crate::state::HostState;

/// Entity type id of players.
pub const PLAYER: i32 = 0x13f;

/// An entity the simulated world knows.
#[repr(C)]
#[derive(Debug)]
pub struct SimActor {
	pub name: CxxString,
	pub entity_type: i32,
}

impl SimActor {
	pub fn as_actor(&self) -> *mut Actor {
		ptr::from_ref(self).cast_mut().cast()
	}
}

/// Actors `pattern` matches: `@a` players, `@e` everything, otherwise by name.
pub(crate) fn select(state: &HostState, pattern: &str, force_player: bool) -> Vec<*mut Actor> {
	state
		.actors
		.iter()
		.filter(|actor| !force_player || actor.entity_type == PLAYER)
		.filter(|actor| match pattern {
			"@e" => true,
			"@a" | "@p" => actor.entity_type == PLAYER,
			name => actor.name == name,
		})
		.map(|actor| actor.as_actor())
		.collect()
}

pub(crate) unsafe extern "C" fn actor_get_name(this: *const Actor) -> *const CxxString {
	unsafe { &(*this.cast::<SimActor>()).name }
}

pub(crate) unsafe extern "C" fn actor_get_entity_type_id(this: *const Actor) -> i32 {
	unsafe { (*this.cast::<SimActor>()).entity_type }
}

/// What the simulated host keeps inside a selector's storage.
#[repr(C)]
pub(crate) struct SelectorState {
	pub(crate) force_player: bool,
	pub(crate) pattern: CxxString,
	pub(crate) targets: Vec<*mut Actor>,
}

const _: () = assert!(size_of::<SelectorState>() <= 0xc8 && align_of::<SelectorState>() <= 8);

pub(crate) unsafe extern "C" fn selector_ctor(this: *mut c_void, force_player: bool) -> *mut c_void {
	unsafe {
		this.cast::<SelectorState>().write(SelectorState {
			force_player,
			pattern: CxxString::new(),
			targets: Vec::new(),
		});
	}
	this
}

pub(crate) unsafe extern "C" fn selector_dtor(this: *mut c_void) {
	unsafe { ptr::drop_in_place(this.cast::<SelectorState>()) };
}

#[repr(C)]
struct ListBlock {
	base: RefCountBase,
	list: CxxVector<*mut Actor>,
}

unsafe extern "C" fn destroy_list(rep: *mut RefCountBase) {
	unsafe { ptr::drop_in_place(&raw mut (*rep.cast::<ListBlock>()).list) };
}

unsafe extern "C" fn delete_list_block(rep: *mut RefCountBase) {
	// The list was already destroyed.
	drop(unsafe { Box::from_raw(rep.cast::<ManuallyDrop<ListBlock>>()) });
}

static LIST_VTABLE: RefCountVTable = RefCountVTable {
	destroy: destroy_list,
	delete_this: delete_list_block,
};

pub(crate) unsafe extern "C" fn selector_new_results(
	this: *const c_void,
	out: *mut CxxSharedPtr<CxxVector<*mut Actor>>,
	_origin: *const CommandOrigin,
) -> *mut CxxSharedPtr<CxxVector<*mut Actor>> {
	let selector = unsafe { &*this.cast::<SelectorState>() };
	let block = Box::into_raw(Box::new(ManuallyDrop::new(ListBlock {
		base: RefCountBase::new(&LIST_VTABLE),
		list: selector.targets.iter().copied().collect(),
	})))
	.cast::<ListBlock>();
	unsafe { out.write(CxxSharedPtr::from_raw_parts(&raw mut (*block).list, block.cast())) };
	out
}

pub(crate) unsafe extern "C" fn selector_get_name(this: *const c_void, out: *mut CxxString) -> *mut CxxString {
	let selector = unsafe { &*this.cast::<SelectorState>() };
	unsafe { out.write(selector.pattern.clone()) };
	out
}

pub(crate) unsafe extern "C" fn is_wildcard(selector: *const c_void) -> bool {
	let selector = unsafe { &*selector.cast::<SelectorState>() };
	matches!(selector.pattern.to_str(), Ok("@a" | "@e"))
}

pub(crate) unsafe extern "C" fn json_value_dtor(_this: *mut c_void) {}

/// `CommandOrigin` of the simulated host.
#[repr(C)]
#[derive(Debug, Default)]
pub struct SimOrigin {
	pub name: CxxString,
}

impl SimOrigin {
	pub fn new(name: &str) -> Self {
		Self {
			name: CxxString::from(name),
		}
	}

	pub fn as_origin(&self) -> &CommandOrigin {
		// SAFETY: origins are opaque to everything but the host.
		unsafe { &*ptr::from_ref(self).cast::<CommandOrigin>() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
	Success,
	Error,
	Info,
}

/// One message a command sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage {
	pub channel: Channel,
	pub text: String,
	pub params: Vec<(String, i32)>,
}

#[derive(Debug, Default)]
struct OutputLog {
	messages: Vec<OutputMessage>,
	success_count: i32,
}

/// A `CommandOutput` whose messages are recorded.
pub struct SimOutput {
	raw: Box<CommandOutput>,
	log: Box<OutputLog>,
}

impl SimOutput {
	pub fn new() -> Self {
		let mut log = Box::<OutputLog>::default();
		let mut raw = Box::new(CommandOutput::zeroed());
		let address = ptr::from_mut::<OutputLog>(&mut *log) as usize;
		raw.bytes[..size_of::<usize>()].copy_from_slice(&address.to_ne_bytes());
		Self { raw, log }
	}

	pub fn as_mut_ptr(&mut self) -> *mut CommandOutput {
		&mut *self.raw
	}

	pub fn messages(&self) -> &[OutputMessage] {
		&self.log.messages
	}

	pub fn success_count(&self) -> i32 {
		self.log.success_count
	}
}

impl Default for SimOutput {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for SimOutput {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SimOutput").field("log", &self.log).finish()
	}
}

unsafe fn log_of<'a>(output: *const CommandOutput) -> &'a mut OutputLog {
	let mut address = [0u8; size_of::<usize>()];
	address.copy_from_slice(unsafe { &(&(*output).bytes)[..size_of::<usize>()] });
	unsafe { &mut *(usize::from_ne_bytes(address) as *mut OutputLog) }
}

unsafe fn record(
	output: *mut CommandOutput,
	channel: Channel,
	message: *const CxxString,
	params: *const CxxVector<CommandOutputParameter>,
) {
	let log = unsafe { log_of(output) };
	let params = unsafe { &*params }
		.iter()
		.map(|param| (param.text.to_string(), param.count))
		.collect();
	log.messages.push(OutputMessage {
		channel,
		text: unsafe { (*message).to_string() },
		params,
	});
	if channel == Channel::Success {
		log.success_count += 1;
	}
}

pub(crate) unsafe extern "C" fn output_success_no_message(this: *mut CommandOutput) {
	unsafe { log_of(this) }.success_count += 1;
}

pub(crate) unsafe extern "C" fn output_success(
	this: *mut CommandOutput,
	message: *const CxxString,
	params: *const CxxVector<CommandOutputParameter>,
) {
	unsafe { record(this, Channel::Success, message, params) };
}

pub(crate) unsafe extern "C" fn output_error(
	this: *mut CommandOutput,
	message: *const CxxString,
	params: *const CxxVector<CommandOutputParameter>,
) {
	unsafe { record(this, Channel::Error, message, params) };
}

pub(crate) unsafe extern "C" fn output_add_message(
	this: *mut CommandOutput,
	message: *const CxxString,
	params: *const CxxVector<CommandOutputParameter>,
) {
	unsafe { record(this, Channel::Info, message, params) };
}

pub(crate) unsafe extern "C" fn output_get_success_count(this: *const CommandOutput) -> i32 {
	unsafe { log_of(this) }.success_count
}

pub(crate) unsafe extern "C" fn output_get_type(_this: *const CommandOutput) -> i32 {
	3
}

pub(crate) unsafe extern "C" fn output_empty(this: *const CommandOutput) -> bool {
	unsafe { log_of(this) }.messages.is_empty()
}
