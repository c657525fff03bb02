//! `CommandRegistry` entry points.

use std::ffi::{CStr, c_char};
use std::ptr;

use splice_abi::flags::SoftEnumUpdateType;
use splice_abi::records::{Overload, RegistryRaw, Signature, SoftEnumRegistry};
use splice_abi::{CxxString, CxxVector};
use tracing::debug;

use crate::state::{ENUM_SYMBOL, HostState, OverloadEvent};

pub(crate) unsafe extern "C" fn register_command(
	this: *mut RegistryRaw,
	name: *const CxxString,
	description: *const c_char,
	level: i32,
	flag1: i32,
	flag2: i32,
) {
	let state = unsafe { HostState::from_registry(this) };
	let name = unsafe { (*name).to_string() };
	let description = if description.is_null() {
		String::new()
	} else {
		unsafe { CStr::from_ptr(description) }.to_string_lossy().into_owned()
	};
	if !state.add_signature(&name, &description, level, flag1 | flag2) {
		debug!(command = %name, "duplicate command ignored");
	}
}

pub(crate) unsafe extern "C" fn register_alias(this: *mut RegistryRaw, name: *mut CxxString, alias: *mut CxxString) {
	let state = unsafe { HostState::from_registry(this) };
	// Taken by value.
	let (name, alias) = unsafe { (ptr::read(name), ptr::read(alias)) };
	let (name, alias) = (name.to_string(), alias.to_string());
	if state.signature(&name).is_none() {
		return;
	}
	let enum_name = format!("{name}CommandAliases");
	let index = state.ensure_enum(&enum_name);
	state.add_enum_value(index, &alias);
	if let Some(signature) = state.signature_mut(&name) {
		signature.alias_enum.0 = ENUM_SYMBOL | index as i32;
	}
	state.aliases.insert(alias, name);
}

pub(crate) unsafe extern "C" fn find_command(this: *mut RegistryRaw, name: *const CxxString) -> *mut Signature {
	let state = unsafe { HostState::from_registry(this) };
	let name = unsafe { (*name).to_string() };
	state
		.signature_mut(&name)
		.map_or(ptr::null_mut(), |signature| signature as *mut Signature)
}

pub(crate) unsafe extern "C" fn register_overload_internal(
	this: *mut RegistryRaw,
	signature: *mut Signature,
	overload: *mut Overload,
) {
	let state = unsafe { HostState::from_registry(this) };
	let (command, parameters) = unsafe { ((*signature).command.to_string(), (*overload).parameters.len()) };
	state.overload_events.push(OverloadEvent { command, parameters });
}

pub(crate) unsafe extern "C" fn add_enum_values(
	this: *mut RegistryRaw,
	name: *const CxxString,
	values: *const CxxVector<CxxString>,
) -> i32 {
	let state = unsafe { HostState::from_registry(this) };
	let name = unsafe { (*name).to_string() };
	let index = state.ensure_enum(&name);
	for value in unsafe { (*values).iter() } {
		state.add_enum_value(index, &value.to_string());
	}
	index as i32
}

pub(crate) unsafe extern "C" fn add_soft_enum(
	this: *mut RegistryRaw,
	name: *const CxxString,
	values: *mut CxxVector<CxxString>,
) -> i32 {
	let state = unsafe { HostState::from_registry(this) };
	let name = unsafe { (*name).to_string() };
	// Taken by value.
	let values = unsafe { ptr::read(values) };
	state.add_soft_enum(&name, values) as i32
}

pub(crate) unsafe extern "C" fn update_soft_enum(
	this: *mut SoftEnumRegistry,
	kind: u8,
	name: *const CxxString,
	values: *mut CxxVector<CxxString>,
) {
	let state = unsafe { HostState::from_registry((*this).registry) };
	let name = unsafe { (*name).to_string() };
	// Taken by value.
	let values = unsafe { ptr::read(values) };
	let Some(record) = state.soft_enum_mut(&name) else {
		debug!(enum_name = %name, "update of a missing soft enum ignored");
		return;
	};
	match SoftEnumUpdateType::from_raw(kind) {
		Some(SoftEnumUpdateType::Add) => {
			for value in &values {
				if !record.list.iter().any(|existing| existing == value) {
					record.list.push(value.clone());
				}
			}
		}
		Some(SoftEnumUpdateType::Remove) => {
			record.list = record
				.list
				.iter()
				.filter(|existing| !values.iter().any(|value| value == *existing))
				.cloned()
				.collect();
		}
		Some(SoftEnumUpdateType::Replace) => record.list = values,
		None => debug!(kind, "unknown soft enum update ignored"),
	}
}
