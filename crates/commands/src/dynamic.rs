//! Overloads whose record layout is computed at run time.
//!
//! Each overload gets an [`OverloadContext`] holding its layout and handler.
//! The context starts with the record's virtual table, so a record's vftable
//! pointer leads back to its context. Allocators receive no context at all and
//! are drawn from a fixed table of per-slot trampolines.

use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use splice_abi::flags::{ParamKind, ParamOptions};
use splice_abi::fns::AllocatorFn;
use splice_abi::heap;
use splice_abi::records::{CommandBase, CommandOrigin, CommandOutput as RawOutput, CommandVFTable, EnumResult};
use splice_abi::CxxString;
use tracing::{debug, error};

use crate::enums::{EnumMapping, MappedEnum, RawValue, hook};
use crate::error::{ConstructionError, Result};
use crate::output::CommandOutput;
use crate::param::ParamSpec;
use crate::record::run_guarded;
use crate::types::{ParamType, Storage, TypeDescriptor};

/// Marker record type of dynamic overloads.
pub enum DynamicRecord {}

/// Handler of a dynamic overload.
pub type DynHandler = dyn Fn(&ParamValues<'_>, &CommandOrigin, &mut CommandOutput<'_>) + Send + Sync;

/// One parameter of a dynamic overload.
#[derive(Debug, Clone)]
pub struct DynParam {
	name: String,
	ty: ParamType,
	optional: bool,
	postfix: Option<String>,
	kind: ParamKind,
	options: ParamOptions,
}

impl DynParam {
	pub fn mandatory(name: &str, ty: impl Into<ParamType>) -> Self {
		Self {
			name: name.to_owned(),
			ty: ty.into(),
			optional: false,
			postfix: None,
			kind: ParamKind::Normal,
			options: ParamOptions::empty(),
		}
	}

	pub fn optional(name: &str, ty: impl Into<ParamType>) -> Self {
		Self {
			optional: true,
			..Self::mandatory(name, ty)
		}
	}

	pub fn postfix(mut self, postfix: &str) -> Self {
		self.postfix = Some(postfix.to_owned());
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
}

#[derive(Debug)]
struct DynField {
	name: String,
	ty: ParamType,
	descriptor: TypeDescriptor,
	offset: usize,
	flag_offset: Option<usize>,
}

/// Field placement of a dynamic record: the header, then each value at its
/// alignment, then one is-set flag per optional parameter.
#[derive(Debug)]
pub struct DynamicLayout {
	size: usize,
	fields: Vec<DynField>,
}

impl DynamicLayout {
	pub fn compute(params: &[DynParam]) -> Self {
		let mut offset = size_of::<CommandBase>();
		let mut align = align_of::<CommandBase>();
		let mut fields = Vec::with_capacity(params.len());
		for param in params {
			let descriptor = param.ty.descriptor();
			offset = offset.next_multiple_of(descriptor.align);
			fields.push(DynField {
				name: param.name.clone(),
				ty: param.ty.clone(),
				descriptor,
				offset,
				flag_offset: None,
			});
			offset += descriptor.size;
			align = align.max(descriptor.align);
		}
		for (field, param) in fields.iter_mut().zip(params) {
			if param.optional {
				field.flag_offset = Some(offset);
				offset += size_of::<bool>();
			}
		}
		Self {
			size: offset.next_multiple_of(align),
			fields,
		}
	}

	pub fn size(&self) -> usize {
		self.size
	}

	/// Offset of the value of `name`.
	pub fn offset_of(&self, name: &str) -> Option<usize> {
		self.field(name).map(|field| field.offset)
	}

	fn field(&self, name: &str) -> Option<&DynField> {
		self.fields.iter().find(|field| field.name == name)
	}

	/// Descriptor specs for `params`, which must be the list this layout was
	/// computed from.
	pub fn specs(&self, params: &[DynParam]) -> Vec<ParamSpec<DynamicRecord>> {
		self.fields
			.iter()
			.zip(params)
			.map(|(field, param)| {
				let spec = ParamSpec::manual(
					&field.name,
					field.ty.clone(),
					field.ty.storage(),
					field.offset,
					field.flag_offset,
					param.optional,
				)
				.kind(param.kind)
				.options(param.options);
				match &param.postfix {
					Some(postfix) => spec.postfix(postfix),
					None => spec,
				}
			})
			.collect()
	}

	/// # Safety
	///
	/// `record` must point at a zeroed block of `self.size()` bytes.
	unsafe fn construct(&self, record: *mut u8) {
		for field in &self.fields {
			unsafe { field.descriptor.construct(record.add(field.offset)) };
		}
	}

	/// # Safety
	///
	/// `record` must hold fields built by [`Self::construct`].
	unsafe fn destroy(&self, record: *mut u8) {
		for field in &self.fields {
			unsafe { field.descriptor.destroy(record.add(field.offset)) };
		}
	}
}

/// Parsed parameters of one dynamic command execution.
pub struct ParamValues<'a> {
	record: *const u8,
	layout: &'a DynamicLayout,
}

impl<'a> ParamValues<'a> {
	/// # Safety
	///
	/// `record` must hold fields laid out and constructed per `layout`.
	pub unsafe fn new(record: *const u8, layout: &'a DynamicLayout) -> Self {
		Self { record, layout }
	}

	/// Whether the parameter was given. Mandatory parameters always are.
	pub fn is_set(&self, name: &str) -> bool {
		match self.layout.field(name) {
			Some(DynField {
				flag_offset: Some(flag),
				..
			}) => unsafe { self.record.add(*flag).cast::<bool>().read() },
			Some(_) => true,
			None => false,
		}
	}

	/// Value of `name`; `None` when it is absent, unset or stored as another type.
	pub fn get<S: Storage>(&self, name: &str) -> Option<&S> {
		let field = self.layout.field(name)?;
		if field.ty.storage() != S::KIND || !self.is_set(name) {
			return None;
		}
		// SAFETY: the storage kind matches and the field was constructed.
		Some(unsafe { &*self.record.add(field.offset).cast::<S>() })
	}

	/// Text of a string or soft enum parameter.
	pub fn string(&self, name: &str) -> Option<String> {
		self.get::<CxxString>(name).map(ToString::to_string)
	}

	/// Value of a raw enum parameter.
	pub fn raw_enum(&self, name: &str) -> Option<RawValue> {
		let ParamType::Enum(raw) = &self.layout.field(name)?.ty else {
			return None;
		};
		self.get::<EnumResult>(name).map(|result| raw.map_value(result))
	}

	/// Value of a mapped enum parameter.
	pub fn enum_value<'m, V>(&self, name: &str, mapped: &'m MappedEnum<V>) -> Option<EnumMapping<'m, V>> {
		self.get::<EnumResult>(name).map(|result| mapped.map_value(result))
	}
}

impl fmt::Debug for ParamValues<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParamValues")
			.field("record", &self.record)
			.field("fields", &self.layout.fields.len())
			.finish()
	}
}

/// Per-overload state reached from a record's vftable pointer.
#[repr(C)]
pub(crate) struct OverloadContext {
	vftable: CommandVFTable,
	command: String,
	layout: DynamicLayout,
	handler: Box<DynHandler>,
}

impl OverloadContext {
	/// Leaks a context; records referencing it may outlive any runtime.
	pub(crate) fn leak(command: &str, layout: DynamicLayout, handler: Box<DynHandler>) -> &'static Self {
		Box::leak(Box::new(Self {
			vftable: CommandVFTable {
				destructor: destroy_dynamic,
				execute: Some(execute_dynamic),
			},
			command: command.to_owned(),
			layout,
			handler,
		}))
	}
}

/// # Safety
///
/// `this` must be a record allocated by a dynamic allocator.
unsafe fn context_of<'a>(this: *const CommandBase) -> &'a OverloadContext {
	unsafe { &*(*this).vftable.cast::<OverloadContext>() }
}

unsafe extern "C" fn destroy_dynamic(this: *mut CommandBase, flags: u32) -> *mut c_void {
	let context = unsafe { context_of(this) };
	unsafe { context.layout.destroy(this.cast()) };
	if flags & 1 != 0 {
		if let Some(block) = NonNull::new(this.cast::<u8>()) {
			// SAFETY: the block came from a dynamic allocator with this size.
			unsafe { heap::deallocate(block, context.layout.size) };
		}
	}
	this.cast()
}

unsafe extern "C" fn execute_dynamic(this: *const CommandBase, origin: *const CommandOrigin, output: *mut RawOutput) {
	let Some(origin) = (unsafe { origin.as_ref() }) else {
		return;
	};
	let context = unsafe { context_of(this) };
	let values = ParamValues {
		record: this.cast(),
		layout: &context.layout,
	};
	unsafe {
		run_guarded(&context.command, output, |output| (context.handler)(&values, origin, output));
	}
}

/// Dynamic overloads that can be registered over the life of the process.
/// Slots are never reused: the host keeps a retired allocator after shutdown.
pub const ALLOCATOR_SLOTS: usize = 256;

static CONTEXTS: [AtomicPtr<OverloadContext>; ALLOCATOR_SLOTS] =
	[const { AtomicPtr::new(ptr::null_mut()) }; ALLOCATOR_SLOTS];
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn allocate_dynamic<const SLOT: usize>(out: *mut *mut CommandBase) -> *mut *mut CommandBase {
	let Some(context) = (unsafe { CONTEXTS[SLOT].load(Ordering::Acquire).as_ref() }) else {
		error!(slot = SLOT, "command allocated after its runtime shut down");
		unsafe { out.write(ptr::null_mut()) };
		return out;
	};
	let record = heap::allocate_zeroed(context.layout.size).as_ptr();
	// SAFETY: the block is zeroed and sized for the layout; the vftable is the
	// context's first field.
	unsafe {
		record
			.cast::<CommandBase>()
			.write(CommandBase::new(&context.vftable));
		context.layout.construct(record);
		out.write(record.cast());
	}
	out
}

macro_rules! allocators {
	($($slot:literal)*) => {
		[$(allocate_dynamic::<$slot> as AllocatorFn),*]
	};
}

static ALLOCATORS: [AllocatorFn; ALLOCATOR_SLOTS] = allocators!(
	0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
	16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
	32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
	48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
	64 65 66 67 68 69 70 71 72 73 74 75 76 77 78 79
	80 81 82 83 84 85 86 87 88 89 90 91 92 93 94 95
	96 97 98 99 100 101 102 103 104 105 106 107 108 109 110 111
	112 113 114 115 116 117 118 119 120 121 122 123 124 125 126 127
	128 129 130 131 132 133 134 135 136 137 138 139 140 141 142 143
	144 145 146 147 148 149 150 151 152 153 154 155 156 157 158 159
	160 161 162 163 164 165 166 167 168 169 170 171 172 173 174 175
	176 177 178 179 180 181 182 183 184 185 186 187 188 189 190 191
	192 193 194 195 196 197 198 199 200 201 202 203 204 205 206 207
	208 209 210 211 212 213 214 215 216 217 218 219 220 221 222 223
	224 225 226 227 228 229 230 231 232 233 234 235 236 237 238 239
	240 241 242 243 244 245 246 247 248 249 250 251 252 253 254 255
);

/// Binds `context` to a free allocator slot.
pub(crate) fn claim_allocator(context: &'static OverloadContext) -> Result<AllocatorFn> {
	let slot = hook::claim_slot(&NEXT_SLOT, ALLOCATOR_SLOTS).ok_or(ConstructionError::SlotsExhausted {
		kind: "command allocator",
		capacity: ALLOCATOR_SLOTS,
	})?;
	CONTEXTS[slot].store(ptr::from_ref(context).cast_mut(), Ordering::Release);
	debug!(slot, command = %context.command, "allocator slot claimed");
	Ok(ALLOCATORS[slot])
}

/// Whether another dynamic overload can be registered.
pub(crate) fn has_free_allocator() -> bool {
	NEXT_SLOT.load(Ordering::Acquire) < ALLOCATOR_SLOTS
}

/// Disarms every claimed allocator. The slots stay retired.
pub(crate) fn reset() {
	let claimed = NEXT_SLOT.load(Ordering::Acquire).min(ALLOCATOR_SLOTS);
	for context in &CONTEXTS[..claimed] {
		context.store(ptr::null_mut(), Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::types::NativeType;

	fn params() -> Vec<DynParam> {
		vec![
			DynParam::optional("count", NativeType::Int),
			DynParam::mandatory("label", NativeType::String),
			DynParam::optional("loud", NativeType::Bool),
		]
	}

	#[test]
	fn fields_follow_the_header_then_flags() {
		let layout = DynamicLayout::compute(&params());
		assert_eq!(layout.offset_of("count"), Some(32));
		assert_eq!(layout.offset_of("label"), Some(40));
		assert_eq!(layout.offset_of("loud"), Some(72));
		assert_eq!(layout.field("count").unwrap().flag_offset, Some(73));
		assert_eq!(layout.field("label").unwrap().flag_offset, None);
		assert_eq!(layout.field("loud").unwrap().flag_offset, Some(74));
		assert_eq!(layout.size(), 80);
	}

	#[test]
	fn specs_carry_offsets_and_flags() {
		let params = params();
		let layout = DynamicLayout::compute(&params);
		let specs = layout.specs(&params);
		assert_eq!(specs.len(), 3);
		assert_eq!(specs[0].name(), "count");
		assert!(specs[0].is_optional());
		assert!(!specs[1].is_optional());
	}

	#[test]
	fn values_respect_flags_and_storage() {
		let layout = DynamicLayout::compute(&params());
		let mut block = vec![0u64; layout.size() / 8];
		let record = block.as_mut_ptr().cast::<u8>();
		unsafe {
			layout.construct(record);
			record.add(32).cast::<i32>().write(12);
			(*record.add(40).cast::<CxxString>()).assign(b"hello");
		}
		let values = unsafe { ParamValues::new(record, &layout) };

		assert!(!values.is_set("count"));
		assert_eq!(values.get::<i32>("count"), None);
		unsafe { record.add(73).cast::<bool>().write(true) };
		assert_eq!(values.get::<i32>("count"), Some(&12));
		assert_eq!(values.string("label").as_deref(), Some("hello"));
		assert!(values.get::<f32>("count").is_none());
		assert!(values.get::<i32>("missing").is_none());

		unsafe { layout.destroy(record) };
	}
}
