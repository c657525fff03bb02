//! Parameter descriptor construction.
//!
//! A [`ParamSpec`] names one field of a command record and the type it parses
//! as. [`ParamSpec::prepare`] checks it against the record; once every
//! parameter of an overload has passed, [`PreparedParam::finish`] assigns type
//! ids and yields the host's `CommandParameterData`. A failing overload never
//! draws from the host's type-id counter.

use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use splice_abi::CxxString;
use splice_abi::flags::{ParamKind, ParamOptions};
use splice_abi::records::{CommandBase, CommandSymbol, HostTypeId, ParameterData};
use tracing::warn;

use crate::error::{ConstructionError, LayoutError, LookupError, Result};
use crate::types::{NativeType, ParamType, Storage, StorageKind, TypeTable};
use crate::typeid::TypeIds;

/// A field of record `R` holding an `S`.
///
/// Build one with [`field!`](crate::field).
pub struct Field<R, S> {
	offset: usize,
	name: &'static str,
	_marker: PhantomData<fn(&R) -> &S>,
}

impl<R, S> Field<R, S> {
	/// `project` only pins the field's type.
	pub fn new(offset: usize, name: &'static str, _project: fn(&R) -> &S) -> Self {
		Self {
			offset,
			name,
			_marker: PhantomData,
		}
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl<R, S> Clone for Field<R, S> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<R, S> Copy for Field<R, S> {}

/// `field!(Record, member)`: a typed handle to one field of a command record.
#[macro_export]
macro_rules! field {
	($record:ty, $member:ident) => {
		$crate::param::Field::<$record, _>::new(
			::std::mem::offset_of!($record, $member),
			stringify!($member),
			|record: &$record| &record.$member,
		)
	};
}

/// One formal parameter of an overload on records of type `R`.
pub struct ParamSpec<R> {
	name: String,
	ty: ParamType,
	storage: StorageKind,
	offset: usize,
	flag_offset: Option<usize>,
	optional: bool,
	enum_or_postfix: Option<String>,
	kind: ParamKind,
	options: ParamOptions,
	_record: PhantomData<fn() -> R>,
}

impl<R> ParamSpec<R> {
	/// A parameter that must be given, named after its field.
	pub fn mandatory<S: Storage>(ty: impl Into<ParamType>, field: Field<R, S>) -> Self {
		Self::manual(field.name, ty, S::KIND, field.offset, None, false)
	}

	/// A parameter that may be omitted, named after its field.
	pub fn optional<S: Storage>(ty: impl Into<ParamType>, field: Field<R, S>) -> Self {
		Self::manual(field.name, ty, S::KIND, field.offset, None, true)
	}

	/// A parameter at a raw offset. The offset is checked by [`Self::build`].
	pub fn manual(
		name: &str,
		ty: impl Into<ParamType>,
		storage: StorageKind,
		offset: usize,
		flag_offset: Option<usize>,
		optional: bool,
	) -> Self {
		Self {
			name: name.to_owned(),
			ty: ty.into(),
			storage,
			offset,
			flag_offset,
			optional,
			enum_or_postfix: None,
			kind: ParamKind::Normal,
			options: ParamOptions::empty(),
			_record: PhantomData,
		}
	}

	/// The bool field the host sets when the parameter was given.
	pub fn is_set(mut self, flag: Field<R, bool>) -> Self {
		self.flag_offset = Some(flag.offset);
		self
	}

	/// Display name, if it differs from the field name.
	pub fn named(mut self, name: &str) -> Self {
		self.name = name.to_owned();
		self
	}

	/// Suffix written after the value, e.g. `L` in `10L`. Integer parameters only.
	pub fn postfix(mut self, postfix: &str) -> Self {
		self.enum_or_postfix = Some(postfix.to_owned());
		self
	}

	pub fn kind(mut self, kind: ParamKind) -> Self {
		self.kind = kind;
		self
	}

	pub fn options(mut self, options: ParamOptions) -> Self {
		self.options = options;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn param_type(&self) -> &ParamType {
		&self.ty
	}

	pub fn is_optional(&self) -> bool {
		self.optional
	}

	fn check_offset(&self, offset: usize, size: usize, record_size: usize) -> Result<i32> {
		let header = size_of::<CommandBase>();
		let raw = i32::try_from(offset).unwrap_or(i32::MAX);
		if offset < header || offset + size > record_size {
			return Err(LayoutError::InvalidFieldOffset {
				param: self.name.clone(),
				offset: raw,
			}
			.into());
		}
		Ok(raw)
	}

	/// Checks and builds in one step.
	pub fn build(
		&self,
		record_size: usize,
		types: &TypeTable,
		ids: &mut TypeIds<NativeType>,
	) -> Result<ParameterData> {
		Ok(self.prepare(record_size, types)?.finish(ids))
	}

	/// Checks the parameter against a record of `record_size` bytes without
	/// touching any type id.
	pub fn prepare(&self, record_size: usize, types: &TypeTable) -> Result<PreparedParam> {
		let offset = self.check_offset(self.offset, self.ty.descriptor().size, record_size)?;
		let flag_offset = match self.flag_offset {
			Some(flag) => self.check_offset(flag, size_of::<bool>(), record_size)?,
			None => ParameterData::NO_FLAG,
		};
		let expected = self.ty.storage();
		if self.storage != expected {
			return Err(ConstructionError::StorageMismatch {
				param: self.name.clone(),
				expected: storage_name(expected),
			}
			.into());
		}

		let mut kind = self.kind;
		let enum_or_postfix = match &self.ty {
			ParamType::Enum(raw) => Some(self.enum_name(raw.name())?),
			ParamType::SoftEnum(soft) => Some(self.enum_name(soft.name())?),
			ParamType::Native(native) => match self.enum_or_postfix.as_deref() {
				None | Some("") => None,
				Some(postfix) if *native == NativeType::Int => {
					kind = ParamKind::Postfix;
					Some(postfix)
				}
				Some(_) => {
					warn!(param = %self.name, ty = %native, "postfix is only supported on integers; dropped");
					None
				}
			},
		};

		let parser = types.get_parser(&self.ty)?;
		let tid = match &self.ty {
			ParamType::Native(native) => PendingTypeId::Issue(*native),
			ParamType::SoftEnum(_) => PendingTypeId::Issue(NativeType::String),
			ParamType::Enum(raw) => PendingTypeId::Known(
				raw.type_id()
					.ok_or_else(|| ConstructionError::EnumNotGenerated(raw.name().to_owned()))?,
			),
		};

		let data = ParameterData {
			tid: HostTypeId::default(),
			parser,
			name: CxxString::from(self.name.as_str()),
			enum_name_or_postfix: match enum_or_postfix {
				Some(name) => intern(name)?.as_ptr(),
				None => std::ptr::null(),
			},
			enum_or_postfix_symbol: CommandSymbol::NONE,
			kind: kind as i32,
			offset,
			flag_offset,
			optional: self.optional,
			options: self.options.bits(),
		};
		Ok(PreparedParam { data, tid })
	}

	fn enum_name<'a>(&self, enum_name: &'a str) -> Result<&'a str> {
		if self.enum_or_postfix.is_some() {
			return Err(ConstructionError::ConflictingEnumAndPostfix {
				param: self.name.clone(),
				enum_name: enum_name.to_owned(),
			}
			.into());
		}
		Ok(enum_name)
	}
}

#[derive(Debug, Clone, Copy)]
enum PendingTypeId {
	Issue(NativeType),
	Known(HostTypeId),
}

/// A descriptor that passed every check and only lacks its type id.
#[derive(Debug)]
pub struct PreparedParam {
	data: ParameterData,
	tid: PendingTypeId,
}

impl PreparedParam {
	pub fn finish(self, ids: &mut TypeIds<NativeType>) -> ParameterData {
		let tid = match self.tid {
			PendingTypeId::Issue(native) => ids.get(native),
			PendingTypeId::Known(tid) => tid,
		};
		ParameterData { tid, ..self.data }
	}
}

impl<R> Clone for ParamSpec<R> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			ty: self.ty.clone(),
			enum_or_postfix: self.enum_or_postfix.clone(),
			..*self
		}
	}
}

impl<R> fmt::Debug for ParamSpec<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParamSpec")
			.field("name", &self.name)
			.field("ty", &self.ty)
			.field("offset", &self.offset)
			.field("flag_offset", &self.flag_offset)
			.field("optional", &self.optional)
			.field("enum_or_postfix", &self.enum_or_postfix)
			.field("kind", &self.kind)
			.finish()
	}
}

fn storage_name(storage: StorageKind) -> &'static str {
	match storage {
		StorageKind::Native(native) => native.cxx_name(),
		StorageKind::Enum => "EnumResult",
	}
}

/// Type id of `ty`, without building a descriptor.
pub fn type_id_of(ty: &ParamType, ids: &mut TypeIds<NativeType>) -> Result<HostTypeId> {
	match ty {
		ParamType::Native(native) => Ok(ids.get(*native)),
		ParamType::SoftEnum(_) => Ok(ids.get(NativeType::String)),
		ParamType::Enum(raw) => raw
			.type_id()
			.ok_or_else(|| LookupError::TypeIdUnavailable(raw.name().to_owned()).into()),
	}
}

static NAMES: Mutex<Option<FxHashMap<String, &'static CStr>>> = Mutex::new(None);

/// NUL-terminated copy of `name` that lives for the rest of the process; the
/// host keeps the pointer in its overload tables.
fn intern(name: &str) -> Result<&'static CStr> {
	let mut names = NAMES.lock();
	let names = names.get_or_insert_with(FxHashMap::default);
	if let Some(interned) = names.get(name) {
		return Ok(interned);
	}
	let owned = CString::new(name).map_err(|_| ConstructionError::InteriorNul { value: name.to_owned() })?;
	let interned: &'static CStr = Box::leak(owned.into_boxed_c_str());
	names.insert(name.to_owned(), interned);
	Ok(interned)
}

#[cfg(test)]
mod tests {
	use std::ptr::NonNull;

	use pretty_assertions::assert_eq;
	use splice_abi::fns::ParserFn;
	use splice_abi::records::{CommandOrigin, CommandPosition, ParseToken, RegistryRaw};
	use splice_abi::CxxVector;

	use super::*;
	use crate::host::HostStatic;

	#[repr(C)]
	struct Record {
		header: CommandBase,
		count: i32,
		has_count: bool,
		label: CxxString,
		at: CommandPosition,
	}

	unsafe extern "C" fn never(
		_: *const RegistryRaw,
		_: *mut std::ffi::c_void,
		_: *const ParseToken,
		_: *const CommandOrigin,
		_: i32,
		_: *mut CxxString,
		_: *mut CxxVector<CxxString>,
	) -> bool {
		false
	}

	fn table() -> TypeTable {
		let mut table = TypeTable::new();
		for ty in [NativeType::Int, NativeType::String, NativeType::Position] {
			table.set_parser(ty, never as ParserFn);
		}
		table
	}

	fn build(spec: &ParamSpec<Record>, counter: &mut u16) -> Result<ParameterData> {
		let mut ids = TypeIds::new(unsafe { HostStatic::new(NonNull::from(counter)) });
		spec.build(size_of::<Record>(), &table(), &mut ids)
	}

	#[test]
	fn integer_keeps_its_postfix() {
		let mut counter = 10;
		let spec = ParamSpec::optional(NativeType::Int, crate::field!(Record, count))
			.is_set(crate::field!(Record, has_count))
			.postfix("L");
		let data = build(&spec, &mut counter).unwrap();
		assert_eq!(data.offset, 32);
		assert_eq!(data.flag_offset, 36);
		assert!(data.optional);
		assert_eq!(data.kind, ParamKind::Postfix as i32);
		assert_eq!(data.enum_name().unwrap().to_str().unwrap(), "L");
		assert_eq!(data.name, "count");
		assert_eq!(data.tid.id, 10);
	}

	#[test]
	fn postfix_on_other_types_is_dropped() {
		let mut counter = 0;
		let spec = ParamSpec::mandatory(NativeType::String, crate::field!(Record, label))
			.named("text")
			.postfix("blocks");
		let data = build(&spec, &mut counter).unwrap();
		assert!(data.enum_name().is_none());
		assert_eq!(data.kind, ParamKind::Normal as i32);
		assert_eq!(data.flag_offset, ParameterData::NO_FLAG);
		assert_eq!(data.name, "text");
	}

	#[test]
	fn storage_must_match_the_type() {
		let mut counter = 0;
		let spec = ParamSpec::mandatory(NativeType::Float, crate::field!(Record, count));
		let err = build(&spec, &mut counter).unwrap_err();
		assert_eq!(err.to_string(), "parameter `count`: field storage does not hold a float");
	}

	#[test]
	fn offsets_inside_the_header_are_rejected() {
		let mut counter = 0;
		let spec = ParamSpec::<Record>::manual("x", NativeType::Int, StorageKind::Native(NativeType::Int), 8, None, false);
		assert!(matches!(
			build(&spec, &mut counter),
			Err(crate::CommandError::Layout(LayoutError::InvalidFieldOffset { offset: 8, .. }))
		));
		let past_end = ParamSpec::<Record>::manual(
			"y",
			NativeType::Position,
			StorageKind::Native(NativeType::Position),
			size_of::<Record>() - 4,
			None,
			false,
		);
		assert!(build(&past_end, &mut counter).is_err());
	}

	#[test]
	fn missing_parsers_fail_the_build() {
		let mut counter = 0;
		let spec = ParamSpec::<Record>::manual("f", NativeType::Float, StorageKind::Native(NativeType::Float), 32, None, false);
		assert!(matches!(
			build(&spec, &mut counter),
			Err(crate::CommandError::Lookup(LookupError::ParserNotFound(NativeType::Float)))
		));
	}

	#[test]
	fn failed_checks_draw_no_type_ids() {
		let mut counter = 40;
		let specs = [
			ParamSpec::optional(NativeType::Int, crate::field!(Record, count)),
			ParamSpec::<Record>::manual("f", NativeType::Float, StorageKind::Native(NativeType::Float), 32, None, false),
		];
		let prepared: Result<Vec<_>> = specs.iter().map(|spec| spec.prepare(size_of::<Record>(), &table())).collect();
		assert!(prepared.is_err());
		assert_eq!(counter, 40);

		let mut ids = TypeIds::new(unsafe { HostStatic::new(NonNull::from(&mut counter)) });
		let data = specs[0].prepare(size_of::<Record>(), &table()).unwrap().finish(&mut ids);
		assert_eq!(data.tid.id, 40);
		assert_eq!(counter, 41);
	}

	#[test]
	fn names_are_interned_once() {
		let a = intern("gamemode").unwrap();
		let b = intern("gamemode").unwrap();
		assert_eq!(a.as_ptr(), b.as_ptr());
		assert!(intern("bad\0name").is_err());
	}
}
