//! Host records touched by command registration and dispatch.
//!
//! Field names follow the layout tables in [`crate::layout`], which check them
//! against these definitions with `offset_of!`.

mod command;
mod registry;
mod storage;

use std::marker::{PhantomData, PhantomPinned};

pub use command::{
	CommandBase, CommandOutputParameter, CommandVFTable, EnumResult,
};
pub use registry::{
	CommandSymbol, CommandVersion, EnumRecord, HostTypeId, Overload, ParameterData, ParseToken,
	Signature, SoftEnumRecord, SoftEnumRegistry,
};
pub use storage::{
	ActorDefinitionIdentifierRef, BlockRef, CommandFilePath, CommandItem, CommandPosition,
	CommandPositionFloat, CommandRawText, CommandWildcardInt, MobEffectRef, RelativeFloat,
};

macro_rules! opaque {
	($($(#[$meta:meta])* $name:ident;)*) => {$(
		$(#[$meta])*
		#[repr(C)]
		pub struct $name {
			_private: [u8; 0],
			_marker: PhantomData<(*mut u8, PhantomPinned)>,
		}
	)*};
}

opaque! {
	/// The host's live `CommandRegistry`. Its fields are reached through
	/// [`crate::layout::RegistryOffsets`].
	RegistryRaw;
	/// `CommandOrigin`: who or what issued a command.
	CommandOrigin;
	/// `Actor`.
	Actor;
}

/// `CommandOutput` storage. The host constructs and owns its contents.
#[repr(C, align(8))]
pub struct CommandOutput {
	pub bytes: [u8; 0x30],
}

impl CommandOutput {
	pub const fn zeroed() -> Self {
		Self { bytes: [0; 0x30] }
	}
}
