//! `std::shared_ptr` as laid out by MSVC x64.

use std::ffi::c_void;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

/// Virtual table of `std::_Ref_count_base`.
#[repr(C)]
pub struct RefCountVTable {
	/// Destroys the managed object.
	pub destroy: unsafe extern "C" fn(*mut RefCountBase),
	/// Releases the control block itself.
	pub delete_this: unsafe extern "C" fn(*mut RefCountBase),
}

/// `std::_Ref_count_base`: the control block header.
#[repr(C)]
pub struct RefCountBase {
	pub vftable: *const RefCountVTable,
	pub uses: AtomicI32,
	pub weaks: AtomicI32,
}

impl RefCountBase {
	/// Control block header with one strong and one weak reference.
	pub const fn new(vftable: &'static RefCountVTable) -> Self {
		Self {
			vftable,
			uses: AtomicI32::new(1),
			weaks: AtomicI32::new(1),
		}
	}
}

/// Mirror of `std::shared_ptr<T>`.
#[repr(C)]
pub struct CxxSharedPtr<T> {
	ptr: *mut T,
	rep: *mut RefCountBase,
}

const _: () = assert!(size_of::<CxxSharedPtr<c_void>>() == 16);

impl<T> CxxSharedPtr<T> {
	pub const fn null() -> Self {
		Self {
			ptr: ptr::null_mut(),
			rep: ptr::null_mut(),
		}
	}

	/// Adopts an object and its control block, taking over one strong reference.
	///
	/// # Safety
	///
	/// `rep` must be null or a control block whose strong count includes this
	/// reference, and `ptr` must stay valid while that count is non-zero.
	pub unsafe fn from_raw_parts(ptr: *mut T, rep: *mut RefCountBase) -> Self {
		Self { ptr, rep }
	}

	pub fn is_null(&self) -> bool {
		self.ptr.is_null()
	}

	pub fn get(&self) -> Option<&T> {
		// SAFETY: a live strong reference keeps the object alive.
		unsafe { self.ptr.as_ref() }
	}

	pub fn as_ptr(&self) -> *mut T {
		self.ptr
	}

	pub fn use_count(&self) -> i32 {
		// SAFETY: a non-null control block outlives our strong reference.
		unsafe { self.rep.as_ref() }.map_or(0, |rep| rep.uses.load(Ordering::Acquire))
	}

	/// Drops the strong reference, leaving a null pointer behind.
	pub fn reset(&mut self) {
		let rep = std::mem::replace(&mut self.rep, ptr::null_mut());
		self.ptr = ptr::null_mut();
		if rep.is_null() {
			return;
		}
		// SAFETY: we held one strong reference on `rep`.
		unsafe {
			if (*rep).uses.fetch_sub(1, Ordering::AcqRel) == 1 {
				let vftable = &*(*rep).vftable;
				(vftable.destroy)(rep);
				if (*rep).weaks.fetch_sub(1, Ordering::AcqRel) == 1 {
					(vftable.delete_this)(rep);
				}
			}
		}
	}
}

impl<T> Clone for CxxSharedPtr<T> {
	fn clone(&self) -> Self {
		// SAFETY: a non-null control block outlives our strong reference.
		if let Some(rep) = unsafe { self.rep.as_ref() } {
			rep.uses.fetch_add(1, Ordering::Relaxed);
		}
		Self {
			ptr: self.ptr,
			rep: self.rep,
		}
	}
}

impl<T> Drop for CxxSharedPtr<T> {
	fn drop(&mut self) {
		self.reset();
	}
}

impl<T> Default for CxxSharedPtr<T> {
	fn default() -> Self {
		Self::null()
	}
}

impl<T> fmt::Debug for CxxSharedPtr<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CxxSharedPtr")
			.field("ptr", &self.ptr)
			.field("uses", &self.use_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	thread_local! {
		static DESTROYED: Cell<u32> = const { Cell::new(0) };
		static DELETED: Cell<u32> = const { Cell::new(0) };
	}

	#[repr(C)]
	struct Block {
		base: RefCountBase,
		value: u64,
	}

	unsafe extern "C" fn destroy(_: *mut RefCountBase) {
		DESTROYED.with(|n| n.set(n.get() + 1));
	}

	unsafe extern "C" fn delete_this(rep: *mut RefCountBase) {
		DELETED.with(|n| n.set(n.get() + 1));
		drop(unsafe { Box::from_raw(rep.cast::<Block>()) });
	}

	static VTABLE: RefCountVTable = RefCountVTable {
		destroy,
		delete_this,
	};

	#[test]
	fn last_release_destroys_then_deletes() {
		let block = Box::into_raw(Box::new(Block {
			base: RefCountBase::new(&VTABLE),
			value: 7,
		}));
		let first = unsafe {
			CxxSharedPtr::from_raw_parts(ptr::addr_of_mut!((*block).value), block.cast())
		};
		let second = first.clone();
		assert_eq!(second.use_count(), 2);
		assert_eq!(second.get(), Some(&7));

		drop(first);
		assert_eq!(DESTROYED.with(Cell::get), 0);
		drop(second);
		assert_eq!(DESTROYED.with(Cell::get), 1);
		assert_eq!(DELETED.with(Cell::get), 1);
	}

	#[test]
	fn null_pointer_is_inert() {
		let mut p = CxxSharedPtr::<u8>::null();
		assert!(p.is_null());
		assert_eq!(p.use_count(), 0);
		p.reset();
	}
}
