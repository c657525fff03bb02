//! Facade over the host's live `CommandRegistry`.
//!
//! Containers are reached through the [`RegistryOffsets`] of the active layout
//! profile. The host owns every container; the facade reads them in place and
//! mutates them only through host entry points, except for appending overloads,
//! which the host expects its caller to do.

use std::ffi::CString;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::Arc;

use splice_abi::flags::{CommandFlags, CommandPermissionLevel, SoftEnumUpdateType};
use splice_abi::fns::AllocatorFn;
use splice_abi::layout::RegistryOffsets;
use splice_abi::records::{
	EnumRecord, Overload, ParameterData, RegistryRaw, Signature, SoftEnumRecord, SoftEnumRegistry,
};
use splice_abi::{CxxMap, CxxString, CxxVector};
use tracing::debug;

use crate::error::{ConstructionError, LookupError, Result};
use crate::host::HostFunctions;

/// Handle to the host registry. Cheap to clone.
#[derive(Clone)]
pub struct CommandRegistry {
	raw: NonNull<RegistryRaw>,
	offsets: RegistryOffsets,
	host: Arc<HostFunctions>,
}

// SAFETY: the registry is a process singleton of the host. Mutation is confined
// to the registration phase, which callers serialise.
unsafe impl Send for CommandRegistry {}
unsafe impl Sync for CommandRegistry {}

impl fmt::Debug for CommandRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CommandRegistry")
			.field("raw", &self.raw)
			.field("offsets", &self.offsets)
			.finish_non_exhaustive()
	}
}

fn cxx_strings<S: AsRef<str>>(values: &[S]) -> CxxVector<CxxString> {
	values.iter().map(|value| CxxString::from(value.as_ref())).collect()
}

impl CommandRegistry {
	/// # Safety
	///
	/// `raw` must be the host's registry, laid out as `offsets` describe, and
	/// must outlive every clone of the facade.
	pub unsafe fn from_raw(raw: NonNull<RegistryRaw>, offsets: RegistryOffsets, host: Arc<HostFunctions>) -> Self {
		Self { raw, offsets, host }
	}

	pub fn as_ptr(&self) -> *mut RegistryRaw {
		self.raw.as_ptr()
	}

	pub fn offsets(&self) -> &RegistryOffsets {
		&self.offsets
	}

	fn field<T>(&self, offset: usize) -> *mut T {
		// SAFETY: offsets were verified to lie within the registry object.
		unsafe { self.raw.as_ptr().cast::<u8>().add(offset).cast() }
	}

	fn view<T>(&self, offset: usize) -> &T {
		// SAFETY: the field holds a live `T` for as long as the registry lives.
		unsafe { &*self.field::<T>(offset) }
	}

	/// Every enum value text, indexed by enum records.
	pub fn enum_values(&self) -> &CxxVector<CxxString> {
		self.view(self.offsets.enum_values)
	}

	pub fn enums(&self) -> &CxxVector<EnumRecord> {
		self.view(self.offsets.enums)
	}

	pub fn enum_lookup(&self) -> &CxxMap<CxxString, u32> {
		self.view(self.offsets.enum_lookup)
	}

	pub fn enum_value_lookup(&self) -> &CxxMap<CxxString, u64> {
		self.view(self.offsets.enum_value_lookup)
	}

	pub fn signatures(&self) -> &CxxMap<CxxString, Signature> {
		self.view(self.offsets.signatures)
	}

	pub fn soft_enums(&self) -> &CxxVector<SoftEnumRecord> {
		self.view(self.offsets.soft_enums)
	}

	pub fn soft_enum_lookup(&self) -> &CxxMap<CxxString, u32> {
		self.view(self.offsets.soft_enum_lookup)
	}

	/// Registers a command with no overloads.
	///
	/// The host silently ignores a name it already knows, so the name is checked
	/// first, and the registration is confirmed afterwards.
	pub fn register_command(
		&self,
		name: &str,
		description: &str,
		level: CommandPermissionLevel,
		flags1: CommandFlags,
		flags2: CommandFlags,
	) -> Result<()> {
		if self.find_command(name).is_some() {
			return Err(ConstructionError::DuplicateCommand(name.to_owned()).into());
		}
		let description = CString::new(description).map_err(|_| ConstructionError::InteriorNul {
			value: description.to_owned(),
		})?;
		let command = CxxString::from(name);
		// SAFETY: the host copies both strings; `description` outlives the call.
		unsafe {
			(self.host.register_command)(
				self.as_ptr(),
				&command,
				description.as_ptr(),
				level as i32,
				flags1.bits(),
				flags2.bits(),
			)
		};
		if self.find_command(name).is_none() {
			return Err(ConstructionError::CommandRejected(name.to_owned()).into());
		}
		debug!(command = name, ?level, "command registered");
		Ok(())
	}

	/// Binds `alias` as another name of `name`.
	pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
		if self.find_command(name).is_none() {
			return Err(LookupError::CommandNotFound(name.to_owned()).into());
		}
		let mut command = ManuallyDrop::new(CxxString::from(name));
		let mut alias_text = ManuallyDrop::new(CxxString::from(alias));
		// SAFETY: both strings are passed by value; the host destroys them.
		unsafe { (self.host.register_alias)(self.as_ptr(), &mut *command, &mut *alias_text) };
		debug!(command = name, alias, "alias registered");
		Ok(())
	}

	fn find_signature(&self, name: &str) -> Option<NonNull<Signature>> {
		let name = CxxString::from(name);
		// SAFETY: `findCommand` only reads the name.
		NonNull::new(unsafe { (self.host.find_command)(self.as_ptr(), &name) })
	}

	/// The live signature of `name`, following aliases.
	pub fn find_command(&self, name: &str) -> Option<&Signature> {
		// SAFETY: signatures live as long as the registry.
		self.find_signature(name).map(|sig| unsafe { sig.as_ref() })
	}

	/// Appends an overload to `name` and has the host register it.
	///
	/// `parameters` move into the overload the host keeps.
	pub fn register_overload(&self, name: &str, allocator: AllocatorFn, parameters: Vec<ParameterData>) -> Result<()> {
		let mut signature = self
			.find_signature(name)
			.ok_or_else(|| LookupError::CommandNotFound(name.to_owned()))?;
		let parameter_count = parameters.len();
		let overload = Overload::new(allocator, parameters.into_iter().collect());
		// SAFETY: the signature belongs to the host registry and nothing else
		// references its overload list during registration.
		unsafe {
			let signature = signature.as_mut();
			signature.overloads.push(overload);
			if let Some(back) = signature.overloads.back_mut() {
				let back: *mut Overload = back;
				(self.host.register_overload_internal)(self.as_ptr(), signature, back);
			}
		}
		debug!(command = name, parameters = parameter_count, "overload registered");
		Ok(())
	}

	/// Adds `values` to the enum `name`, creating it if needed. Returns the
	/// registration index the host reports.
	pub fn add_enum_values<S: AsRef<str>>(&self, name: &str, values: &[S]) -> u32 {
		let enum_name = CxxString::from(name);
		let list = cxx_strings(values);
		// SAFETY: both arguments are borrowed for the call.
		let index = unsafe { (self.host.add_enum_values)(self.as_ptr(), &enum_name, &list) };
		debug!(enum_name = name, values = values.len(), index, "enum values added");
		index as u32
	}

	/// Creates the soft enum `name`. Returns the host's registration index.
	pub fn add_soft_enum<S: AsRef<str>>(&self, name: &str, values: &[S]) -> u32 {
		let enum_name = CxxString::from(name);
		let mut list = ManuallyDrop::new(cxx_strings(values));
		// SAFETY: the list is passed by value; the host destroys it.
		let index = unsafe { (self.host.add_soft_enum)(self.as_ptr(), &enum_name, &mut *list) };
		debug!(enum_name = name, values = values.len(), index, "soft enum added");
		index as u32
	}

	/// Sends one update to the soft enum `name`.
	pub fn update_soft_enum<S: AsRef<str>>(&self, kind: SoftEnumUpdateType, name: &str, values: &[S]) {
		let mut soft_registry = SoftEnumRegistry { registry: self.as_ptr() };
		let enum_name = CxxString::from(name);
		let mut list = ManuallyDrop::new(cxx_strings(values));
		// SAFETY: the list is passed by value; the host destroys it.
		unsafe { (self.host.update_soft_enum)(&mut soft_registry, kind as u8, &enum_name, &mut *list) };
		debug!(enum_name = name, ?kind, values = values.len(), "soft enum updated");
	}

	pub fn has_enum(&self, name: &str) -> bool {
		self.enum_lookup().contains_key(name)
	}

	/// Position of the enum `name` in the enum table.
	pub fn enum_index(&self, name: &str) -> Option<u32> {
		self.enum_lookup().get(name).copied()
	}

	pub fn get_enum(&self, name: &str) -> Option<&EnumRecord> {
		self.enum_at(self.enum_index(name)?)
	}

	pub fn enum_at(&self, index: u32) -> Option<&EnumRecord> {
		self.enums().get(index as usize)
	}

	/// # Safety
	///
	/// No other reference into the enum table may be alive.
	pub(crate) unsafe fn enum_at_mut(&self, index: u32) -> Option<&mut EnumRecord> {
		let enums = self.field::<CxxVector<EnumRecord>>(self.offsets.enums);
		unsafe { (*enums).get_mut(index as usize) }
	}

	/// Value texts of `record`, in declaration order.
	pub fn enum_record_values(&self, record: &EnumRecord) -> Vec<String> {
		let texts = self.enum_values();
		record
			.values
			.iter()
			.filter_map(|pair| texts.get(pair.first as usize))
			.map(|text| text.to_string())
			.collect()
	}

	pub fn get_enum_values(&self, name: &str) -> Option<Vec<String>> {
		self.get_enum(name).map(|record| self.enum_record_values(record))
	}

	pub fn has_soft_enum(&self, name: &str) -> bool {
		self.soft_enum_lookup().contains_key(name)
	}

	pub fn get_soft_enum(&self, name: &str) -> Option<&SoftEnumRecord> {
		let index = *self.soft_enum_lookup().get(name)?;
		self.soft_enums().get(index as usize)
	}

	pub fn get_soft_enum_values(&self, name: &str) -> Option<Vec<String>> {
		self.get_soft_enum(name)
			.map(|record| record.list.iter().map(|value| value.to_string()).collect())
	}
}
