//! `std::map` as laid out by MSVC x64.
//!
//! Maps are only ever owned by the host, so the mirror is a read-only view over
//! the red-black tree: in-order iteration and key lookup. The head node is a
//! sentinel whose `parent` is the root and whose `left`/`right` point at the
//! smallest and largest nodes.

use std::fmt;
use std::marker::PhantomData;

use crate::CxxString;

/// `std::pair<K, V>`.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CxxPair<K, V> {
	pub first: K,
	pub second: V,
}

/// `std::_Tree_node<std::pair<const K, V>, void*>`.
#[repr(C)]
pub struct MapNode<K, V> {
	pub left: *mut MapNode<K, V>,
	pub parent: *mut MapNode<K, V>,
	pub right: *mut MapNode<K, V>,
	pub color: u8,
	pub is_nil: u8,
	pub value: CxxPair<K, V>,
}

/// Node colour: red.
pub const RED: u8 = 0;
/// Node colour: black.
pub const BLACK: u8 = 1;

/// Mirror of `std::map<K, V>`: the sentinel head node and the element count.
#[repr(C)]
pub struct CxxMap<K, V> {
	head: *mut MapNode<K, V>,
	size: usize,
	_marker: PhantomData<(K, V)>,
}

const _: () = assert!(size_of::<CxxMap<u8, u8>>() == 16);

impl<K, V> CxxMap<K, V> {
	/// Builds a view over an existing tree.
	///
	/// # Safety
	///
	/// `head` must be the sentinel of a well-formed tree holding `size` nodes,
	/// and must stay valid while the map is read.
	pub unsafe fn from_raw_parts(head: *mut MapNode<K, V>, size: usize) -> Self {
		Self {
			head,
			size,
			_marker: PhantomData,
		}
	}

	/// Sentinel head node.
	pub fn head(&self) -> *mut MapNode<K, V> {
		self.head
	}

	/// Overwrites the element count after the tree was modified in place.
	///
	/// # Safety
	///
	/// `size` must match the number of nodes reachable from the head.
	pub unsafe fn set_len(&mut self, size: usize) {
		self.size = size;
	}

	pub fn len(&self) -> usize {
		self.size
	}

	pub fn is_empty(&self) -> bool {
		self.size == 0
	}

	fn root(&self) -> *mut MapNode<K, V> {
		if self.head.is_null() {
			return std::ptr::null_mut();
		}
		// SAFETY: a non-null head is a live sentinel.
		unsafe { (*self.head).parent }
	}

	/// Iterates entries in key order.
	pub fn iter(&self) -> Iter<'_, K, V> {
		let next = if self.head.is_null() || self.size == 0 {
			std::ptr::null_mut()
		} else {
			// SAFETY: a non-null head is a live sentinel.
			unsafe { (*self.head).left }
		};
		Iter {
			next,
			remaining: self.size,
			_map: PhantomData,
		}
	}

	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.iter().map(|(k, _)| k)
	}

	pub fn values(&self) -> impl Iterator<Item = &V> {
		self.iter().map(|(_, v)| v)
	}
}

impl<V> CxxMap<CxxString, V> {
	fn find_node(&self, key: &str) -> *mut MapNode<CxxString, V> {
		let key = key.as_bytes();
		let mut node = self.root();
		// SAFETY: every non-nil node reached from the root is live.
		unsafe {
			while !node.is_null() && (*node).is_nil == 0 {
				let here = (*node).value.first.as_bytes();
				node = match key.cmp(here) {
					std::cmp::Ordering::Less => (*node).left,
					std::cmp::Ordering::Greater => (*node).right,
					std::cmp::Ordering::Equal => return node,
				};
			}
		}
		std::ptr::null_mut()
	}

	/// Looks up `key` using `std::less<std::string>` ordering.
	pub fn get(&self, key: &str) -> Option<&V> {
		let node = self.find_node(key);
		// SAFETY: non-null results of `find_node` are live nodes.
		unsafe { node.as_ref().map(|n| &n.value.second) }
	}

	pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
		let node = self.find_node(key);
		// SAFETY: non-null results of `find_node` are live nodes.
		unsafe { node.as_mut().map(|n| &mut n.value.second) }
	}

	pub fn contains_key(&self, key: &str) -> bool {
		!self.find_node(key).is_null()
	}
}

/// In-order iterator over a [`CxxMap`].
pub struct Iter<'a, K, V> {
	next: *mut MapNode<K, V>,
	remaining: usize,
	_map: PhantomData<&'a CxxMap<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
	type Item = (&'a K, &'a V);

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 || self.next.is_null() {
			return None;
		}
		let node = self.next;
		self.remaining -= 1;
		// SAFETY: `node` is a live non-nil node; successors stay within the tree.
		unsafe {
			self.next = successor(node);
			Some((&(*node).value.first, &(*node).value.second))
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

/// In-order successor (`_Tree_unchecked_const_iterator::operator++`).
unsafe fn successor<K, V>(node: *mut MapNode<K, V>) -> *mut MapNode<K, V> {
	// SAFETY: the caller passes a live non-nil node of a well-formed tree.
	unsafe {
		let right = (*node).right;
		if (*right).is_nil == 0 {
			let mut next = right;
			while (*(*next).left).is_nil == 0 {
				next = (*next).left;
			}
			return next;
		}
		let mut child = node;
		let mut parent = (*node).parent;
		while (*parent).is_nil == 0 && child == (*parent).right {
			child = parent;
			parent = (*parent).parent;
		}
		parent
	}
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CxxMap<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::ptr;

	use pretty_assertions::assert_eq;

	use super::*;

	type Node = MapNode<CxxString, u32>;

	fn alloc(head: *mut Node, key: &str, value: u32) -> *mut Node {
		Box::into_raw(Box::new(Node {
			left: head,
			parent: head,
			right: head,
			color: RED,
			is_nil: 0,
			value: CxxPair {
				first: CxxString::from(key),
				second: value,
			},
		}))
	}

	/// Hand-built tree: "b" at the root with "a" and "c" children.
	fn three_node_map() -> (CxxMap<CxxString, u32>, Vec<*mut Node>) {
		let head = Box::into_raw(Box::new(Node {
			left: ptr::null_mut(),
			parent: ptr::null_mut(),
			right: ptr::null_mut(),
			color: BLACK,
			is_nil: 1,
			value: CxxPair::default(),
		}));
		let b = alloc(head, "b", 2);
		let a = alloc(head, "a", 1);
		let c = alloc(head, "c", 3);
		unsafe {
			(*b).left = a;
			(*b).right = c;
			(*a).parent = b;
			(*c).parent = b;
			(*head).parent = b;
			(*head).left = a;
			(*head).right = c;
		}
		(unsafe { CxxMap::from_raw_parts(head, 3) }, vec![head, a, b, c])
	}

	fn free(nodes: Vec<*mut Node>) {
		for node in nodes {
			drop(unsafe { Box::from_raw(node) });
		}
	}

	#[test]
	fn iterates_in_key_order_and_finds_keys() {
		let (mut map, nodes) = three_node_map();
		let keys: Vec<String> = map.keys().map(|k| k.to_string()).collect();
		assert_eq!(keys, ["a", "b", "c"]);
		assert_eq!(map.get("c"), Some(&3));
		assert_eq!(map.get("d"), None);
		*map.get_mut("a").unwrap() = 10;
		assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![10, 2, 3]);
		assert!(map.contains_key("b"));
		free(nodes);
	}

	#[test]
	fn null_head_reads_as_empty() {
		let map: CxxMap<CxxString, u32> = unsafe { CxxMap::from_raw_parts(ptr::null_mut(), 0) };
		assert!(map.is_empty());
		assert_eq!(map.iter().count(), 0);
		assert!(!map.contains_key("a"));
	}
}
