//! Entity selectors (`@a`, `@e[type=cow]`, player names).

use std::mem::MaybeUninit;
use std::ops::Deref;
use std::ptr::NonNull;

use splice_abi::CxxString;
use splice_abi::records::{Actor, CommandOrigin};
use tracing::warn;

use crate::error::Result;
use crate::host::{self, ActorList, HostFunctions};
use crate::types::{NativeType, Storage, StorageKind};

/// Entity type id the host gives players.
pub const PLAYER_TYPE_ID: i32 = 0x13f;

/// `CommandSelectorBase`: 0xc1 bytes of host state, 8-aligned.
#[repr(C, align(8))]
pub struct CommandSelectorBase {
	bytes: [u8; 0xc1],
}

const _: () = assert!(size_of::<CommandSelectorBase>() == 0xc8);

impl CommandSelectorBase {
	/// Runs the host constructor at `slot`.
	///
	/// # Safety
	///
	/// `slot` must be valid for writes of `size_of::<Self>()` bytes.
	unsafe fn construct(slot: *mut Self, force_player: bool) {
		match host::current() {
			Some(host) => unsafe {
				(host.selector_ctor)(slot, force_player);
			},
			None => {
				warn!("selector constructed while no host is installed");
				unsafe { slot.write_bytes(0, 1) };
			}
		}
	}

	/// Resolves the selector against `origin`, keeping actors `filter` accepts.
	///
	/// Filtering happens here, after the host has resolved every match.
	pub fn new_results(&self, origin: &CommandOrigin, filter: ActorFilter) -> Result<Vec<ActorRef>> {
		let host = host::require()?;
		let mut list = ActorList::null();
		// SAFETY: `list` is a valid return slot; the host fills it.
		unsafe { (host.selector_new_results)(self, &mut list, origin) };
		let actors = list
			.get()
			.map(|actors| {
				actors
					.iter()
					.filter_map(|actor| NonNull::new(*actor).map(ActorRef))
					.filter(|actor| filter.accepts(*actor, &host))
					.collect()
			})
			.unwrap_or_default();
		drop(list);
		Ok(actors)
	}

	/// The selector as written, e.g. `@a` or a player name.
	pub fn name(&self) -> Result<String> {
		let host = host::require()?;
		let mut out = MaybeUninit::<CxxString>::uninit();
		// SAFETY: the host constructs the string in the return slot.
		let name = unsafe {
			(host.selector_get_name)(self, out.as_mut_ptr());
			out.assume_init()
		};
		Ok(name.to_string())
	}

	/// `Command::isWildcard`: whether the selector may match many entities.
	pub fn is_wildcard(&self) -> Result<bool> {
		let host = host::require()?;
		// SAFETY: `self` is a constructed selector.
		Ok(unsafe { (host.is_wildcard)(self) })
	}
}

impl Drop for CommandSelectorBase {
	fn drop(&mut self) {
		match host::current() {
			// SAFETY: the selector was constructed by the host.
			Some(host) => unsafe { (host.selector_dtor)(self) },
			None => warn!("selector dropped while no host is installed; its contents leak"),
		}
	}
}

macro_rules! selector {
	($($(#[$meta:meta])* $name:ident => $native:ident, force_player = $force:literal;)*) => {$(
		$(#[$meta])*
		#[repr(transparent)]
		pub struct $name(CommandSelectorBase);

		impl Deref for $name {
			type Target = CommandSelectorBase;

			fn deref(&self) -> &CommandSelectorBase {
				&self.0
			}
		}

		unsafe impl Storage for $name {
			const KIND: StorageKind = StorageKind::Native(NativeType::$native);

			unsafe fn construct_in(slot: *mut Self) {
				unsafe { CommandSelectorBase::construct(slot.cast(), $force) }
			}
		}
	)*};
}

selector! {
	/// `CommandSelector<Actor>`.
	ActorCommandSelector => ActorSelector, force_player = false;
	/// `CommandSelector<Player>`.
	PlayerCommandSelector => PlayerSelector, force_player = true;
	/// `WildcardCommandSelector<Actor>`.
	ActorWildcardCommandSelector => ActorWildcardSelector, force_player = false;
	/// `WildcardCommandSelector<Player>`.
	PlayerWildcardCommandSelector => PlayerWildcardSelector, force_player = true;
}

/// Run-time filter over resolved actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorFilter {
	#[default]
	Any,
	Players,
	EntityType(i32),
}

impl ActorFilter {
	fn accepts(self, actor: ActorRef, host: &HostFunctions) -> bool {
		let type_id = || unsafe { (host.actor_get_entity_type_id)(actor.as_ptr()) };
		match self {
			Self::Any => true,
			Self::Players => type_id() == PLAYER_TYPE_ID,
			Self::EntityType(expected) => type_id() == expected,
		}
	}
}

/// A host actor, valid while the host keeps it alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorRef(NonNull<Actor>);

impl ActorRef {
	/// # Safety
	///
	/// `actor` must point at a live host actor whenever this handle is used.
	pub unsafe fn from_raw(actor: NonNull<Actor>) -> Self {
		Self(actor)
	}

	pub fn as_ptr(&self) -> *const Actor {
		self.0.as_ptr()
	}

	/// `Actor::getName`.
	pub fn name(&self) -> Result<String> {
		let host = host::require()?;
		// SAFETY: the host returns a reference to the actor's own name.
		let name = unsafe { (host.actor_get_name)(self.as_ptr()).as_ref() };
		Ok(name.map(|n| n.to_string()).unwrap_or_default())
	}

	/// `Actor::getEntityTypeId`.
	pub fn entity_type_id(&self) -> Result<i32> {
		let host = host::require()?;
		Ok(unsafe { (host.actor_get_entity_type_id)(self.as_ptr()) })
	}

	pub fn is_player(&self) -> Result<bool> {
		Ok(self.entity_type_id()? == PLAYER_TYPE_ID)
	}
}
