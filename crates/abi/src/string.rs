//! `std::string` as laid out by MSVC x64.

use std::borrow::Cow;
use std::fmt;
use std::ptr::NonNull;
use std::str::Utf8Error;

use crate::heap;

/// Longest string stored inline (the small-string buffer holds a terminator too).
pub const INLINE_CAPACITY: usize = 15;

#[repr(C)]
#[derive(Clone, Copy)]
union StringBuf {
	inline: [u8; INLINE_CAPACITY + 1],
	heap: *mut u8,
}

/// Mirror of `std::basic_string<char>` (32 bytes).
///
/// Owned values free their buffer on the host heap when dropped. Strings living
/// inside host memory are only ever accessed through references.
#[repr(C)]
pub struct CxxString {
	buf: StringBuf,
	size: usize,
	capacity: usize,
}

const _: () = assert!(size_of::<CxxString>() == 32);

impl CxxString {
	/// Creates an empty string using the inline buffer.
	pub const fn new() -> Self {
		Self {
			buf: StringBuf {
				inline: [0; INLINE_CAPACITY + 1],
			},
			size: 0,
			capacity: INLINE_CAPACITY,
		}
	}

	/// Creates a string holding a copy of `bytes`.
	pub fn from_bytes(bytes: &[u8]) -> Self {
		let mut out = Self::new();
		out.assign(bytes);
		out
	}

	pub fn len(&self) -> usize {
		self.size
	}

	pub fn is_empty(&self) -> bool {
		self.size == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	fn is_inline(&self) -> bool {
		self.capacity <= INLINE_CAPACITY
	}

	fn data(&self) -> *const u8 {
		// SAFETY: the active member is selected by `capacity`.
		unsafe {
			if self.is_inline() {
				self.buf.inline.as_ptr()
			} else {
				self.buf.heap
			}
		}
	}

	fn data_mut(&mut self) -> *mut u8 {
		// SAFETY: the active member is selected by `capacity`.
		unsafe {
			if self.is_inline() {
				self.buf.inline.as_mut_ptr()
			} else {
				self.buf.heap
			}
		}
	}

	pub fn as_bytes(&self) -> &[u8] {
		// SAFETY: `size` bytes of the active buffer are initialised.
		unsafe { std::slice::from_raw_parts(self.data(), self.size) }
	}

	pub fn to_str(&self) -> Result<&str, Utf8Error> {
		std::str::from_utf8(self.as_bytes())
	}

	pub fn to_string_lossy(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(self.as_bytes())
	}

	/// Replaces the contents with `bytes`, reallocating on the host heap if needed.
	pub fn assign(&mut self, bytes: &[u8]) {
		let len = bytes.len();
		if len > self.capacity {
			let capacity = grown_capacity(self.capacity, len);
			let fresh = heap::allocate(capacity + 1);
			self.release();
			self.buf = StringBuf {
				heap: fresh.as_ptr(),
			};
			self.capacity = capacity;
		}
		let data = self.data_mut();
		// SAFETY: the buffer holds at least `capacity + 1 >= len + 1` bytes.
		unsafe {
			std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, len);
			data.add(len).write(0);
		}
		self.size = len;
	}

	pub fn clear(&mut self) {
		self.assign(b"");
	}

	fn release(&mut self) {
		if !self.is_inline() {
			// SAFETY: heap buffers are `capacity + 1` bytes from `heap::allocate`.
			unsafe {
				if let Some(ptr) = NonNull::new(self.buf.heap) {
					heap::deallocate(ptr, self.capacity + 1);
				}
			}
		}
		self.buf = StringBuf {
			inline: [0; INLINE_CAPACITY + 1],
		};
		self.capacity = INLINE_CAPACITY;
		self.size = 0;
	}
}

/// `_Calculate_growth` of MSVC's `basic_string`.
fn grown_capacity(old: usize, requested: usize) -> usize {
	let masked = requested | INLINE_CAPACITY;
	masked.max(old + old / 2)
}

impl Drop for CxxString {
	fn drop(&mut self) {
		self.release();
	}
}

impl Default for CxxString {
	fn default() -> Self {
		Self::new()
	}
}

impl Clone for CxxString {
	fn clone(&self) -> Self {
		Self::from_bytes(self.as_bytes())
	}
}

impl From<&str> for CxxString {
	fn from(value: &str) -> Self {
		Self::from_bytes(value.as_bytes())
	}
}

impl From<&String> for CxxString {
	fn from(value: &String) -> Self {
		Self::from_bytes(value.as_bytes())
	}
}

impl PartialEq for CxxString {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes() == other.as_bytes()
	}
}

impl Eq for CxxString {}

impl PartialEq<str> for CxxString {
	fn eq(&self, other: &str) -> bool {
		self.as_bytes() == other.as_bytes()
	}
}

impl PartialEq<&str> for CxxString {
	fn eq(&self, other: &&str) -> bool {
		self.as_bytes() == other.as_bytes()
	}
}

impl fmt::Debug for CxxString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.to_string_lossy(), f)
	}
}

impl fmt::Display for CxxString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_string_lossy())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn short_strings_stay_inline() {
		let s = CxxString::from("tp");
		assert_eq!(s.capacity(), INLINE_CAPACITY);
		assert_eq!(s.as_bytes(), b"tp");
		assert_eq!(unsafe { *s.data().add(2) }, 0);
	}

	#[test]
	fn long_strings_move_to_the_heap_and_back() {
		let mut s = CxxString::from("a value longer than fifteen bytes");
		assert!(s.capacity() > INLINE_CAPACITY);
		assert_eq!(s, "a value longer than fifteen bytes");

		s.assign(b"short");
		assert_eq!(s, "short");
		assert!(s.capacity() > INLINE_CAPACITY, "capacity is kept after shrinking");

		s.clear();
		assert!(s.is_empty());
	}

	#[test]
	fn growth_matches_msvc_rounding() {
		assert_eq!(grown_capacity(15, 16), 31);
		assert_eq!(grown_capacity(31, 40), 47);
		assert_eq!(grown_capacity(100, 101), 150);
	}

	proptest! {
		#[test]
		fn assign_preserves_contents(a in ".{0,64}", b in ".{0,64}") {
			let mut s = CxxString::from(a.as_str());
			prop_assert_eq!(s.to_str().unwrap(), a.as_str());
			s.assign(b.as_bytes());
			prop_assert_eq!(s.to_str().unwrap(), b.as_str());
			let copy = s.clone();
			prop_assert_eq!(copy, s);
		}
	}
}
