//! Type-id namespaces.
//!
//! The host numbers every parameter type with a small id per namespace. Ids the
//! host already assigned are read from its `type_id` functions or statics;
//! anything else takes the next value of the namespace counter. Either way an
//! id is fetched once and then cached, so repeated lookups agree.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use splice_abi::records::HostTypeId;
use tracing::trace;

use crate::host::{HostStatic, TypeIdFn};

/// Where the id of one type comes from.
#[derive(Debug, Clone, Copy)]
pub enum TypeIdSource {
	Resolved(HostTypeId),
	/// `type_id<Namespace, T>()`.
	Function(TypeIdFn),
	/// The static behind an inlined `type_id<Namespace, T>()`.
	Static(HostStatic<HostTypeId>),
}

/// One namespace: ids issued by a single counter.
#[derive(Debug)]
pub struct TypeIds<K> {
	entries: FxHashMap<K, TypeIdSource>,
	counter: HostStatic<u16>,
}

impl<K: Hash + Eq + Clone + std::fmt::Debug> TypeIds<K> {
	pub fn new(counter: HostStatic<u16>) -> Self {
		Self {
			entries: FxHashMap::default(),
			counter,
		}
	}

	/// Records where the id of `key` can be read.
	pub fn set_source(&mut self, key: K, source: TypeIdSource) {
		self.entries.insert(key, source);
	}

	/// Records an id the host assigned.
	pub fn register(&mut self, key: K, id: HostTypeId) {
		self.entries.insert(key, TypeIdSource::Resolved(id));
	}

	/// Makes `to` share the id of `from`.
	pub fn alias(&mut self, from: K, to: K) {
		let id = self.get(from);
		self.register(to, id);
	}

	pub fn contains(&self, key: &K) -> bool {
		self.entries.contains_key(key)
	}

	/// Id of `key`, issuing one from the counter if the host never assigned it.
	pub fn get(&mut self, key: K) -> HostTypeId {
		let id = match self.entries.get(&key).copied() {
			Some(TypeIdSource::Resolved(id)) => return id,
			// SAFETY: sources were resolved from the host's own symbols.
			Some(TypeIdSource::Function(f)) => unsafe {
				let mut out = HostTypeId::default();
				f(&mut out);
				out
			},
			Some(TypeIdSource::Static(id)) => unsafe { id.as_ptr().read() },
			None => self.next_from_counter(),
		};
		trace!(?key, id = id.id, "type id resolved");
		self.entries.insert(key, TypeIdSource::Resolved(id));
		id
	}

	fn next_from_counter(&mut self) -> HostTypeId {
		let counter = self.counter.as_ptr();
		// SAFETY: the counter is a host static; registration is single-threaded.
		unsafe {
			let id = counter.read();
			counter.write(id.wrapping_add(1));
			HostTypeId { id }
		}
	}
}

#[cfg(test)]
mod tests {
	use std::ptr::NonNull;

	use pretty_assertions::assert_eq;

	use super::*;

	unsafe extern "C" fn fixed_id(out: *mut HostTypeId) -> *mut HostTypeId {
		unsafe { out.write(HostTypeId { id: 42 }) };
		out
	}

	fn namespace(counter: &mut u16) -> TypeIds<&'static str> {
		TypeIds::new(unsafe { HostStatic::new(NonNull::from(counter)) })
	}

	#[test]
	fn counter_ids_are_issued_once() {
		let mut counter = 7u16;
		let mut ids = namespace(&mut counter);
		let a = ids.get("a");
		let b = ids.get("b");
		assert_eq!((a.id, b.id), (7, 8));
		assert_eq!(ids.get("a"), a);
		drop(ids);
		assert_eq!(counter, 9);
	}

	#[test]
	fn host_sources_are_read_and_cached() {
		let mut counter = 0u16;
		let mut stored = HostTypeId { id: 99 };
		let mut ids = namespace(&mut counter);
		ids.set_source("f", TypeIdSource::Function(fixed_id));
		ids.set_source(
			"s",
			TypeIdSource::Static(unsafe { HostStatic::new(NonNull::from(&mut stored)) }),
		);
		assert_eq!(ids.get("f").id, 42);
		assert_eq!(ids.get("s").id, 99);
		stored.id = 5;
		assert_eq!(ids.get("s").id, 99);
		drop(ids);
		assert_eq!(counter, 0);
	}

	#[test]
	fn alias_shares_the_id() {
		let mut counter = 3u16;
		let mut ids = namespace(&mut counter);
		ids.alias("actor", "player");
		assert_eq!(ids.get("player"), ids.get("actor"));
		drop(ids);
		assert_eq!(counter, 4);
	}
}
