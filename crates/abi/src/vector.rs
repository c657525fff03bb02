//! `std::vector` as laid out by MSVC x64.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::heap;

/// Mirror of `std::vector<T>`: three pointers delimiting the live elements and
/// the allocated storage.
#[repr(C)]
pub struct CxxVector<T> {
	first: *mut T,
	last: *mut T,
	end: *mut T,
	_marker: PhantomData<T>,
}

const _: () = assert!(size_of::<CxxVector<u8>>() == 24);

impl<T> CxxVector<T> {
	pub const fn new() -> Self {
		Self {
			first: ptr::null_mut(),
			last: ptr::null_mut(),
			end: ptr::null_mut(),
			_marker: PhantomData,
		}
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let mut out = Self::new();
		out.reserve_exact(capacity);
		out
	}

	pub fn len(&self) -> usize {
		if self.first.is_null() {
			return 0;
		}
		// SAFETY: both pointers belong to the same allocation.
		unsafe { self.last.offset_from(self.first) as usize }
	}

	pub fn is_empty(&self) -> bool {
		self.first == self.last
	}

	pub fn capacity(&self) -> usize {
		if self.first.is_null() {
			return 0;
		}
		// SAFETY: both pointers belong to the same allocation.
		unsafe { self.end.offset_from(self.first) as usize }
	}

	pub fn as_slice(&self) -> &[T] {
		if self.first.is_null() {
			return &[];
		}
		// SAFETY: `[first, last)` holds initialised elements.
		unsafe { std::slice::from_raw_parts(self.first, self.len()) }
	}

	pub fn as_mut_slice(&mut self) -> &mut [T] {
		if self.first.is_null() {
			return &mut [];
		}
		// SAFETY: `[first, last)` holds initialised elements.
		unsafe { std::slice::from_raw_parts_mut(self.first, self.len()) }
	}

	pub fn iter(&self) -> std::slice::Iter<'_, T> {
		self.as_slice().iter()
	}

	pub fn get(&self, index: usize) -> Option<&T> {
		self.as_slice().get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
		self.as_mut_slice().get_mut(index)
	}

	/// Last element, as returned by `vector::back`.
	pub fn back(&self) -> Option<&T> {
		self.as_slice().last()
	}

	pub fn back_mut(&mut self) -> Option<&mut T> {
		self.as_mut_slice().last_mut()
	}

	pub fn as_ptr(&self) -> *const T {
		self.first
	}

	/// Appends `value`, growing by half of the current capacity when full.
	pub fn push(&mut self, value: T) {
		if self.last == self.end {
			let len = self.len();
			let grown = self.capacity() + self.capacity() / 2;
			self.reserve_exact(grown.max(len + 1));
		}
		// SAFETY: capacity was ensured above.
		unsafe {
			self.last.write(value);
			self.last = self.last.add(1);
		}
	}

	/// Removes and returns the last element.
	pub fn pop(&mut self) -> Option<T> {
		if self.is_empty() {
			return None;
		}
		// SAFETY: the vector is non-empty, so `last - 1` is initialised.
		unsafe {
			self.last = self.last.sub(1);
			Some(self.last.read())
		}
	}

	pub fn reserve(&mut self, additional: usize) {
		let needed = self.len() + additional;
		if needed > self.capacity() {
			let grown = self.capacity() + self.capacity() / 2;
			self.reserve_exact(grown.max(needed));
		}
	}

	fn reserve_exact(&mut self, capacity: usize) {
		if capacity <= self.capacity() || size_of::<T>() == 0 {
			return;
		}
		let len = self.len();
		let bytes = capacity
			.checked_mul(size_of::<T>())
			.unwrap_or_else(|| panic!("vector capacity {capacity} overflows"));
		let fresh = heap::allocate(bytes).cast::<T>().as_ptr();
		if !self.first.is_null() {
			// SAFETY: elements are moved bitwise into the new block; the old block
			// is released without running destructors.
			unsafe {
				ptr::copy_nonoverlapping(self.first, fresh, len);
				self.free_storage();
			}
		}
		self.first = fresh;
		// SAFETY: `len <= capacity` elements fit in the new block.
		unsafe {
			self.last = fresh.add(len);
			self.end = fresh.add(capacity);
		}
	}

	/// Drops every element, keeping the storage.
	pub fn clear(&mut self) {
		let elems: *mut [T] = self.as_mut_slice();
		self.last = self.first;
		// SAFETY: the elements are no longer reachable through `self`.
		unsafe { ptr::drop_in_place(elems) };
	}

	unsafe fn free_storage(&mut self) {
		let bytes = self.capacity() * size_of::<T>();
		if let Some(first) = NonNull::new(self.first) {
			// SAFETY: storage came from `heap::allocate` with this size.
			unsafe { heap::deallocate(first.cast(), bytes) };
		}
		self.first = ptr::null_mut();
		self.last = ptr::null_mut();
		self.end = ptr::null_mut();
	}
}

impl<T> Drop for CxxVector<T> {
	fn drop(&mut self) {
		self.clear();
		// SAFETY: no element is alive any more.
		unsafe { self.free_storage() };
	}
}

impl<T> Default for CxxVector<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Clone> Clone for CxxVector<T> {
	fn clone(&self) -> Self {
		self.iter().cloned().collect()
	}
}

impl<T> FromIterator<T> for CxxVector<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		let mut out = Self::new();
		out.extend(iter);
		out
	}
}

impl<T> Extend<T> for CxxVector<T> {
	fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
		let iter = iter.into_iter();
		self.reserve(iter.size_hint().0);
		for item in iter {
			self.push(item);
		}
	}
}

impl<'a, T> IntoIterator for &'a CxxVector<T> {
	type Item = &'a T;
	type IntoIter = std::slice::Iter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

impl<T: fmt::Debug> fmt::Debug for CxxVector<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

impl<T: PartialEq> PartialEq for CxxVector<T> {
	fn eq(&self, other: &Self) -> bool {
		self.as_slice() == other.as_slice()
	}
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use pretty_assertions::assert_eq;

	use super::*;
	use crate::CxxString;

	#[test]
	fn push_grows_by_half() {
		let mut v = CxxVector::new();
		let mut capacities = Vec::new();
		for i in 0..10 {
			v.push(i);
			capacities.push(v.capacity());
		}
		assert_eq!(capacities, vec![1, 2, 3, 4, 6, 6, 9, 9, 9, 13]);
		assert_eq!(v.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
		assert_eq!(v.back(), Some(&9));
	}

	#[test]
	fn drop_runs_element_destructors() {
		let marker = Rc::new(());
		{
			let v: CxxVector<Rc<()>> = (0..5).map(|_| marker.clone()).collect();
			assert_eq!(Rc::strong_count(&marker), 6);
			assert_eq!(v.len(), 5);
		}
		assert_eq!(Rc::strong_count(&marker), 1);
	}

	#[test]
	fn strings_survive_reallocation() {
		let v: CxxVector<CxxString> = ["a", "a much longer string than the inline buffer", "c"]
			.into_iter()
			.map(CxxString::from)
			.collect();
		let got: Vec<String> = v.iter().map(|s| s.to_string()).collect();
		assert_eq!(got, ["a", "a much longer string than the inline buffer", "c"]);
	}

	#[test]
	fn empty_vector_has_null_pointers() {
		let v = CxxVector::<u64>::new();
		assert!(v.as_ptr().is_null());
		assert!(v.is_empty());
		assert_eq!(v.as_slice(), &[] as &[u64]);
	}
}
