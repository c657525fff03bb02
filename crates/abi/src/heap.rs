//! Host heap access.
//!
//! Every container mirrored by this crate allocates through the host's
//! allocator, so buffers handed across the boundary can be released by either
//! side. Until a runtime installs the host's own entry points the C runtime
//! heap is used, which is the same heap for hosts linked against the shared CRT.
//!
//! Allocation sizes follow MSVC's `std::allocator`: blocks of 4 KiB and more are
//! over-allocated and aligned to 32 bytes, with the original block address
//! stored immediately before the user pointer.

use std::alloc::{Layout, handle_alloc_error};
use std::ffi::c_void;
use std::ptr::NonNull;

use parking_lot::RwLock;

/// `void* malloc(size_t)`.
pub type AllocFn = unsafe extern "C" fn(usize) -> *mut c_void;
/// `void free(void*)`.
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// Pair of heap entry points shared with the host.
#[derive(Debug, Clone, Copy)]
pub struct HostHeap {
	pub alloc: AllocFn,
	pub free: FreeFn,
}

impl HostHeap {
	/// The C runtime heap of this process.
	pub const CRT: Self = Self {
		alloc: libc::malloc,
		free: libc::free,
	};
}

impl Default for HostHeap {
	fn default() -> Self {
		Self::CRT
	}
}

static HEAP: RwLock<HostHeap> = RwLock::new(HostHeap::CRT);

/// Installs `heap` for all subsequent allocations, returning the previous one.
///
/// Buffers allocated under the previous heap must not outlive the switch
/// unless both heaps are the same underlying allocator.
pub fn install(heap: HostHeap) -> HostHeap {
	std::mem::replace(&mut *HEAP.write(), heap)
}

/// Restores the C runtime heap.
pub fn reset() -> HostHeap {
	install(HostHeap::CRT)
}

/// Returns the heap currently in use.
pub fn current() -> HostHeap {
	*HEAP.read()
}

const BIG_ALLOCATION_THRESHOLD: usize = 4096;
const BIG_ALLOCATION_ALIGNMENT: usize = 32;
const NON_USER_SIZE: usize = 2 * size_of::<*mut c_void>() + BIG_ALLOCATION_ALIGNMENT - 1;

/// Allocates `size` bytes on the host heap.
///
/// Zero-sized requests return a dangling pointer that [`deallocate`] ignores.
/// Aborts through [`handle_alloc_error`] when the host heap is exhausted.
pub fn allocate(size: usize) -> NonNull<u8> {
	if size == 0 {
		return NonNull::dangling();
	}
	let heap = current();
	if size < BIG_ALLOCATION_THRESHOLD {
		let raw = unsafe { (heap.alloc)(size) }.cast::<u8>();
		return NonNull::new(raw).unwrap_or_else(|| alloc_failed(size));
	}

	let block = size
		.checked_add(NON_USER_SIZE)
		.unwrap_or_else(|| panic!("host allocation of {size} bytes overflows"));
	let container = unsafe { (heap.alloc)(block) }.cast::<u8>();
	if container.is_null() {
		alloc_failed(block);
	}
	let addr = container as usize;
	let user_addr = (addr + NON_USER_SIZE) & !(BIG_ALLOCATION_ALIGNMENT - 1);
	// SAFETY: user_addr lies within the block, at least one pointer past its start.
	unsafe {
		let user = container.add(user_addr - addr);
		user.cast::<*mut u8>().sub(1).write(container);
		NonNull::new_unchecked(user)
	}
}

/// Allocates `size` zeroed bytes on the host heap.
pub fn allocate_zeroed(size: usize) -> NonNull<u8> {
	let ptr = allocate(size);
	// SAFETY: the block is at least `size` bytes long.
	unsafe { ptr.as_ptr().write_bytes(0, size) };
	ptr
}

/// Releases a block obtained from [`allocate`].
///
/// # Safety
///
/// `ptr` must come from [`allocate`] (or the host's `std::allocator`) with the
/// same `size`, and must not be used afterwards.
pub unsafe fn deallocate(ptr: NonNull<u8>, size: usize) {
	if size == 0 {
		return;
	}
	let heap = current();
	let block = if size < BIG_ALLOCATION_THRESHOLD {
		ptr.as_ptr()
	} else {
		// SAFETY: big allocations store their container pointer one slot below.
		unsafe { ptr.as_ptr().cast::<*mut u8>().sub(1).read() }
	};
	unsafe { (heap.free)(block.cast()) };
}

fn alloc_failed(size: usize) -> ! {
	match Layout::from_size_align(size, 16) {
		Ok(layout) => handle_alloc_error(layout),
		Err(_) => panic!("host allocation of {size} bytes failed"),
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use serial_test::serial;

	use super::*;

	thread_local! {
		static ALLOCS: Cell<usize> = const { Cell::new(0) };
		static FREES: Cell<usize> = const { Cell::new(0) };
	}

	unsafe extern "C" fn counting_alloc(size: usize) -> *mut c_void {
		ALLOCS.with(|n| n.set(n.get() + 1));
		unsafe { libc::malloc(size) }
	}

	unsafe extern "C" fn counting_free(ptr: *mut c_void) {
		FREES.with(|n| n.set(n.get() + 1));
		unsafe { libc::free(ptr) }
	}

	#[test]
	fn big_blocks_are_aligned_and_released_through_container() {
		let ptr = allocate(8192);
		assert_eq!(ptr.as_ptr() as usize % BIG_ALLOCATION_ALIGNMENT, 0);
		unsafe {
			ptr.as_ptr().write_bytes(0xAB, 8192);
			deallocate(ptr, 8192);
		}
	}

	#[test]
	#[serial(heap)]
	fn installed_heap_receives_every_call() {
		let previous = install(HostHeap {
			alloc: counting_alloc,
			free: counting_free,
		});

		let small = allocate_zeroed(24);
		assert!(
			unsafe { std::slice::from_raw_parts(small.as_ptr(), 24) }
				.iter()
				.all(|b| *b == 0)
		);
		let big = allocate(5000);
		unsafe {
			deallocate(small, 24);
			deallocate(big, 5000);
		}
		install(previous);

		assert_eq!(ALLOCS.with(Cell::get), 2);
		assert_eq!(FREES.with(Cell::get), 2);
	}

	#[test]
	fn zero_sized_requests_do_not_touch_the_heap() {
		let ptr = allocate(0);
		unsafe { deallocate(ptr, 0) };
	}
}
