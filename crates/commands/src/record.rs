//! Command records: allocation, destruction and execution on the host's behalf.
//!
//! A typed record is a `#[repr(C)]` struct that starts with a [`CommandBase`]
//! and implements [`CommandHandler`]; [`command_record!`](crate::command_record)
//! declares one. Its allocator, scalar deleting destructor and execute entry
//! are monomorphised per type.

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use splice_abi::heap;
use splice_abi::records::{CommandBase, CommandOrigin, CommandOutput as RawOutput, CommandVFTable};
use tracing::{error, warn};

use crate::host;
use crate::output::CommandOutput;

/// A command record laid out for the host.
///
/// # Safety
///
/// The type must be `#[repr(C)]` with a [`CommandBase`] as its first field.
/// `construct_fields` must initialise every field after the header.
pub unsafe trait CommandRecord: Sized + 'static {
	/// Initialises every field after the header in place.
	///
	/// # Safety
	///
	/// `this` points at a zeroed block of `size_of::<Self>()` bytes whose header
	/// is already written.
	unsafe fn construct_fields(this: *mut Self);

	fn header(&self) -> &CommandBase {
		// SAFETY: the header is the first field.
		unsafe { &*ptr::from_ref(self).cast::<CommandBase>() }
	}
}

/// What a command does when the host runs it.
pub trait CommandHandler: CommandRecord {
	fn execute(&self, origin: &CommandOrigin, output: &mut CommandOutput<'_>);
}

/// Declares a command record: a `#[repr(C)]` struct with a `header` field
/// followed by parameter storage, each field constructed in place.
///
/// ```ignore
/// command_record! {
///     pub struct Teleport {
///         target: ActorCommandSelector,
///         destination: CommandPosition,
///     }
/// }
/// ```
#[macro_export]
macro_rules! command_record {
	($(#[$meta:meta])* $vis:vis struct $name:ident { $($field_vis:vis $field:ident : $ty:ty),* $(,)? }) => {
		$(#[$meta])*
		#[repr(C)]
		$vis struct $name {
			pub header: $crate::abi::records::CommandBase,
			$($field_vis $field: $ty,)*
		}

		unsafe impl $crate::record::CommandRecord for $name {
			unsafe fn construct_fields(this: *mut Self) {
				$(unsafe {
					<$ty as $crate::types::Storage>::construct_in(::std::ptr::addr_of_mut!((*this).$field));
				})*
			}
		}
	};
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message
	} else {
		"command handler panicked"
	}
}

/// Runs `body` with the output of the running command, reporting a panic
/// through the output's error channel.
///
/// # Safety
///
/// `output` must be the host's live output for this execution.
pub(crate) unsafe fn run_guarded(command: &str, output: *mut RawOutput, body: impl FnOnce(&mut CommandOutput<'_>)) {
	let Some(host) = host::current() else {
		warn!(command, "command executed while no host is installed");
		return;
	};
	let Some(raw) = (unsafe { output.as_mut() }) else {
		return;
	};
	let mut output = CommandOutput::new(raw, host);
	let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut output)));
	if let Err(payload) = outcome {
		let message = panic_message(payload.as_ref());
		error!(command, panic = message, "command handler panicked");
		if let Err(err) = output.error(message, &[]) {
			error!(command, %err, "failed to report panic");
		}
	}
}

/// Virtual table of record type `R`.
pub struct VTable<R>(PhantomData<R>);

impl<R: CommandHandler> VTable<R> {
	pub const VALUE: CommandVFTable = CommandVFTable {
		destructor: destroy::<R>,
		execute: Some(execute::<R>),
	};
}

/// `CommandRegistry::allocateCommand<R>`.
pub unsafe extern "C" fn allocate<R: CommandHandler>(out: *mut *mut CommandBase) -> *mut *mut CommandBase {
	const { assert!(align_of::<R>() <= 16) };
	let vftable: &'static CommandVFTable = &VTable::<R>::VALUE;
	let record = heap::allocate_zeroed(size_of::<R>()).cast::<R>().as_ptr();
	// SAFETY: the block is zeroed, large enough and aligned for `R`.
	unsafe {
		record.cast::<CommandBase>().write(CommandBase::new(vftable));
		R::construct_fields(record);
		out.write(record.cast());
	}
	out
}

unsafe extern "C" fn destroy<R: CommandHandler>(this: *mut CommandBase, flags: u32) -> *mut std::ffi::c_void {
	// SAFETY: `this` was produced by `allocate::<R>`.
	unsafe { ptr::drop_in_place(this.cast::<R>()) };
	if flags & 1 != 0 {
		if let Some(block) = NonNull::new(this.cast::<u8>()) {
			// SAFETY: the block came from `allocate::<R>`.
			unsafe { heap::deallocate(block, size_of::<R>()) };
		}
	}
	this.cast()
}

unsafe extern "C" fn execute<R: CommandHandler>(
	this: *const CommandBase,
	origin: *const CommandOrigin,
	output: *mut RawOutput,
) {
	// SAFETY: the host passes a record of this type and its live origin.
	let (Some(record), Some(origin)) = (unsafe { this.cast::<R>().as_ref() }, unsafe { origin.as_ref() }) else {
		return;
	};
	unsafe { run_guarded(std::any::type_name::<R>(), output, |output| record.execute(origin, output)) };
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::mem::MaybeUninit;

	use splice_abi::CxxString;
	use splice_abi::records::{CommandSymbol, EnumResult};

	use super::*;

	thread_local! {
		static DROPS: Cell<usize> = const { Cell::new(0) };
	}

	command_record! {
		struct Sample {
			count: i32,
			label: CxxString,
			choice: EnumResult,
		}
	}

	impl CommandHandler for Sample {
		fn execute(&self, _: &CommandOrigin, _: &mut CommandOutput<'_>) {}
	}

	impl Drop for Sample {
		fn drop(&mut self) {
			DROPS.with(|n| n.set(n.get() + 1));
		}
	}

	#[test]
	fn allocate_constructs_the_header_and_fields() {
		let mut slot = MaybeUninit::<*mut CommandBase>::uninit();
		let out = unsafe { allocate::<Sample>(slot.as_mut_ptr()) };
		let record = unsafe { &*(*out).cast::<Sample>() };

		assert_eq!(record.header.command_symbol, CommandSymbol::NONE);
		assert_eq!(record.header.permission_level, 5);
		assert!(unsafe { (*record.header.vftable).execute }.is_some());
		assert_eq!(record.label.capacity(), splice_abi::INLINE_CAPACITY);
		assert_eq!(record.count, 0);

		let destructor = unsafe { (*record.header.vftable).destructor };
		DROPS.with(|n| n.set(0));
		let returned = unsafe { destructor(*out, 1) };
		assert_eq!(returned, unsafe { *out }.cast());
		assert_eq!(DROPS.with(Cell::get), 1);
	}

	#[test]
	fn panic_payloads_become_messages() {
		let payload: Box<dyn Any + Send> = Box::new(String::from("boom"));
		assert_eq!(panic_message(payload.as_ref()), "boom");
		let payload: Box<dyn Any + Send> = Box::new(7u8);
		assert_eq!(panic_message(payload.as_ref()), "command handler panicked");
	}
}
