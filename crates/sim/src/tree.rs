//! `std::map` trees owned by the simulated registry.

use std::alloc::{self, Layout};
use std::ptr;

use splice_abi::{BLACK, CxxMap, CxxPair, CxxString, MapNode, RED};

type Node<V> = MapNode<CxxString, V>;

/// Node storage behind one registry map.
///
/// Nodes keep their address until the tree is dropped; every insertion relinks
/// them into a balanced shape. Colours are set but never consulted by readers.
pub(crate) struct Tree<V> {
	head: *mut Node<V>,
	/// Sorted by key bytes, as `std::less<std::string>` orders them.
	nodes: Vec<*mut Node<V>>,
}

impl<V> Tree<V> {
	pub(crate) fn new() -> Self {
		let layout = Layout::new::<Node<V>>();
		// SAFETY: nodes are never zero-sized. The sentinel's value is never read
		// or dropped, so zeroed bytes are fine.
		let head = unsafe { alloc::alloc_zeroed(layout) }.cast::<Node<V>>();
		if head.is_null() {
			alloc::handle_alloc_error(layout);
		}
		unsafe {
			(*head).left = head;
			(*head).parent = head;
			(*head).right = head;
			(*head).color = BLACK;
			(*head).is_nil = 1;
		}
		Self {
			head,
			nodes: Vec::new(),
		}
	}

	/// A map header for the registry field.
	pub(crate) fn view(&self) -> CxxMap<CxxString, V> {
		// SAFETY: the tree is well formed and outlives the registry fields.
		unsafe { CxxMap::from_raw_parts(self.head, self.nodes.len()) }
	}

	pub(crate) fn len(&self) -> usize {
		self.nodes.len()
	}

	fn position(&self, key: &str) -> Result<usize, usize> {
		self.nodes
			// SAFETY: every stored node is live.
			.binary_search_by(|node| unsafe { (**node).value.first.as_bytes() }.cmp(key.as_bytes()))
	}

	pub(crate) fn contains(&self, key: &str) -> bool {
		self.position(key).is_ok()
	}

	pub(crate) fn get(&self, key: &str) -> Option<&V> {
		let index = self.position(key).ok()?;
		// SAFETY: the node is live while `self` is.
		Some(unsafe { &(*self.nodes[index]).value.second })
	}

	pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut V> {
		let index = self.position(key).ok()?;
		// SAFETY: the node is live while `self` is.
		Some(unsafe { &mut (*self.nodes[index]).value.second })
	}

	/// Inserts `key` unless present. Returns whether it was inserted.
	pub(crate) fn insert(&mut self, key: &str, value: V) -> bool {
		let Err(index) = self.position(key) else {
			return false;
		};
		let node = Box::into_raw(Box::new(Node {
			left: self.head,
			parent: self.head,
			right: self.head,
			color: RED,
			is_nil: 0,
			value: CxxPair {
				first: CxxString::from(key),
				second: value,
			},
		}));
		self.nodes.insert(index, node);
		self.relink();
		true
	}

	fn relink(&mut self) {
		let head = self.head;
		// SAFETY: all nodes and the sentinel are live and owned by this tree.
		unsafe {
			let root = link(&self.nodes, head, head);
			(*head).parent = root;
			(*head).left = self.nodes.first().copied().unwrap_or(head);
			(*head).right = self.nodes.last().copied().unwrap_or(head);
		}
	}
}

/// Links `nodes` as a balanced subtree under `parent` and returns its root.
unsafe fn link<V>(nodes: &[*mut Node<V>], parent: *mut Node<V>, head: *mut Node<V>) -> *mut Node<V> {
	if nodes.is_empty() {
		return head;
	}
	let mid = nodes.len() / 2;
	let node = nodes[mid];
	unsafe {
		(*node).parent = parent;
		(*node).color = BLACK;
		(*node).left = link(&nodes[..mid], node, head);
		(*node).right = link(&nodes[mid + 1..], node, head);
	}
	node
}

impl<V> Drop for Tree<V> {
	fn drop(&mut self) {
		for node in self.nodes.drain(..) {
			// SAFETY: nodes were allocated by `insert` and are dropped once.
			drop(unsafe { Box::from_raw(node) });
		}
		// SAFETY: the sentinel was allocated in `new` with this layout.
		unsafe { alloc::dealloc(self.head.cast(), Layout::new::<Node<V>>()) };
		self.head = ptr::null_mut();
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn views_read_back_in_order() {
		let mut tree = Tree::new();
		for (i, key) in ["m", "c", "x", "a", "e", "z", "b"].into_iter().enumerate() {
			assert!(tree.insert(key, i as u32));
		}
		assert!(!tree.insert("m", 99));
		let map = tree.view();
		let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
		assert_eq!(keys, ["a", "b", "c", "e", "m", "x", "z"]);
		assert_eq!(map.get("x"), Some(&2));
		assert_eq!(map.get("y"), None);
		*tree.get_mut("a").unwrap() = 30;
		assert_eq!(tree.view().get("a"), Some(&30));
	}

	#[test]
	fn empty_tree_reads_as_empty() {
		let tree = Tree::<u32>::new();
		let map = tree.view();
		assert!(map.is_empty());
		assert!(!map.contains_key("a"));
		assert_eq!(tree.len(), 0);
	}
}
