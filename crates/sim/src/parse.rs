//! Parsers and type ids for the value types the simulated host supports.

use std::ffi::c_void;
use std::ptr;

use splice_abi::records::{CommandOrigin, CommandSymbol, HostTypeId, ParseToken, RegistryRaw};
use splice_abi::{CxxString, CxxVector};

use crate::state::{ENUM_SYMBOL, HostState};
use crate::world::{self, SelectorState};

/// Builds a token for `text`: a node whose single child covers the text, the
/// way the host shapes argument nodes.
pub(crate) fn with_token<R>(text: &str, kind: CommandSymbol, f: impl FnOnce(*const ParseToken) -> R) -> R {
	let mut child = ParseToken {
		child: ptr::null_mut(),
		next: ptr::null_mut(),
		parent: ptr::null_mut(),
		text: text.as_ptr(),
		length: text.len() as u32,
		kind,
	};
	let node = ParseToken {
		child: &mut child,
		next: ptr::null_mut(),
		parent: ptr::null_mut(),
		text: text.as_ptr(),
		length: text.len() as u32,
		kind,
	};
	f(&node)
}

/// Symbol of tokens matched against enum `index`.
pub fn enum_symbol(index: u32) -> CommandSymbol {
	CommandSymbol(ENUM_SYMBOL | index as i32)
}

unsafe fn token_text(token: *const ParseToken) -> String {
	let token = unsafe { &*token };
	let source = unsafe { token.child.as_ref() }.unwrap_or(token);
	String::from_utf8_lossy(source.text()).into_owned()
}

unsafe fn finish(outcome: Result<(), &str>, error: *mut CxxString) -> bool {
	match outcome {
		Ok(()) => true,
		Err(message) => {
			if let Some(error) = unsafe { error.as_mut() } {
				error.assign(message.as_bytes());
			}
			false
		}
	}
}

pub(crate) unsafe extern "C" fn parse_int(
	_registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let outcome = match unsafe { token_text(token) }.parse::<i32>() {
		Ok(value) => {
			unsafe { storage.cast::<i32>().write(value) };
			Ok(())
		}
		Err(_) => Err("commands.generic.num.invalid"),
	};
	unsafe { finish(outcome, error) }
}

pub(crate) unsafe extern "C" fn parse_float(
	_registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let outcome = match unsafe { token_text(token) }.parse::<f32>() {
		Ok(value) => {
			unsafe { storage.cast::<f32>().write(value) };
			Ok(())
		}
		Err(_) => Err("commands.generic.num.invalid"),
	};
	unsafe { finish(outcome, error) }
}

pub(crate) unsafe extern "C" fn parse_bool(
	_registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let outcome = match unsafe { token_text(token) }.as_str() {
		"true" => Ok(true),
		"false" => Ok(false),
		_ => Err("commands.generic.boolean.invalid"),
	}
	.map(|value| unsafe { storage.cast::<bool>().write(value) });
	unsafe { finish(outcome, error) }
}

pub(crate) unsafe extern "C" fn parse_string(
	_registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	_error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let text = unsafe { token_text(token) };
	unsafe { (*storage.cast::<CxxString>()).assign(text.as_bytes()) };
	true
}

pub(crate) unsafe extern "C" fn parse_selector(
	registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let text = unsafe { token_text(token) };
	let state = unsafe { HostState::from_registry(registry) };
	let selector = unsafe { &mut *storage.cast::<SelectorState>() };
	selector.pattern.assign(text.as_bytes());
	selector.targets = world::select(state, &text, selector.force_player);
	let outcome = if selector.targets.is_empty() && !text.starts_with('@') {
		Err("commands.generic.noTargetMatch")
	} else {
		Ok(())
	};
	unsafe { finish(outcome, error) }
}

/// `parseEnum<int>`: matches the token, without case, against the values of
/// the enum its symbol names and writes the value's ordinal.
pub(crate) unsafe extern "C" fn parse_enum(
	registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	_origin: *const CommandOrigin,
	_version: i32,
	error: *mut CxxString,
	_error_params: *mut CxxVector<CxxString>,
) -> bool {
	let text = unsafe { token_text(token) };
	let symbol = unsafe { (*token).kind.0 };
	let state = unsafe { HostState::from_registry(registry) };
	let value = (symbol & ENUM_SYMBOL != 0)
		.then(|| enum_value(state, (symbol & !ENUM_SYMBOL) as u32, &text))
		.flatten();
	let outcome = match value {
		Some(value) => {
			unsafe { storage.cast::<i32>().write(value) };
			Ok(())
		}
		None => Err("commands.generic.parameter.invalid"),
	};
	unsafe { finish(outcome, error) }
}

fn enum_value(state: &HostState, index: u32, text: &str) -> Option<i32> {
	let registry = &state.registry;
	let record = registry.enums.get(index as usize)?;
	record.values.iter().find_map(|pair| {
		let value = registry.enum_values.get(pair.first as usize)?;
		value
			.to_string_lossy()
			.eq_ignore_ascii_case(text)
			.then_some(pair.second as i32)
	})
}

pub(crate) unsafe extern "C" fn type_id<const ID: u16>(out: *mut HostTypeId) -> *mut HostTypeId {
	unsafe { out.write(HostTypeId { id: ID }) };
	out
}
