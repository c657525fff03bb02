//! Parameter storage types that need no host calls to construct or destroy.

use std::ffi::c_void;

use crate::CxxString;

/// `CommandPosition`: block coordinates, each optionally relative (`~`) or local (`^`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandPosition {
	pub x: f32,
	pub y: f32,
	pub z: f32,
	pub is_x_relative: bool,
	pub is_y_relative: bool,
	pub is_z_relative: bool,
	pub local: bool,
}

const _: () = assert!(size_of::<CommandPosition>() == 16);

impl CommandPosition {
	pub fn absolute(x: f32, y: f32, z: f32) -> Self {
		Self {
			x,
			y,
			z,
			..Self::default()
		}
	}
}

/// `CommandPositionFloat`: same storage, parsed without snapping to block centres.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandPositionFloat(pub CommandPosition);

/// `CommandRawText`: the rest of the command line.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandRawText {
	pub text: CxxString,
}

/// `CommandFilePath`.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandFilePath {
	pub text: CxxString,
}

/// `CommandWildcardInt`: an integer or `*`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandWildcardInt {
	pub is_wildcard: bool,
	pub value: i32,
}

/// `CommandItem`: an item id and its data version.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandItem {
	pub version: i32,
	pub id: i32,
}

/// `RelativeFloat`: a number optionally prefixed with `~`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelativeFloat {
	pub value: f32,
	pub is_relative: bool,
}

impl RelativeFloat {
	/// Resolves against `base` when relative.
	pub fn resolve(&self, base: f32) -> f32 {
		if self.is_relative {
			base + self.value
		} else {
			self.value
		}
	}
}

macro_rules! const_ref {
	($($(#[$meta:meta])* $name:ident;)*) => {$(
		$(#[$meta])*
		#[repr(transparent)]
		#[derive(Debug, Clone, Copy, PartialEq, Eq)]
		pub struct $name(pub *const c_void);

		impl $name {
			pub fn is_null(&self) -> bool {
				self.0.is_null()
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self(std::ptr::null())
			}
		}
	)*};
}

const_ref! {
	/// `Block const*`.
	BlockRef;
	/// `MobEffect const*`.
	MobEffectRef;
	/// `ActorDefinitionIdentifier const*`.
	ActorDefinitionIdentifierRef;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn storage_sizes_match_host() {
		assert_eq!(size_of::<CommandWildcardInt>(), 8);
		assert_eq!(size_of::<CommandItem>(), 8);
		assert_eq!(size_of::<RelativeFloat>(), 8);
		assert_eq!(size_of::<CommandRawText>(), 32);
		assert_eq!(size_of::<BlockRef>(), 8);
	}

	#[test]
	fn relative_float_resolves_against_base() {
		let rel = RelativeFloat {
			value: 2.5,
			is_relative: true,
		};
		assert_eq!(rel.resolve(10.0), 12.5);
		let abs = RelativeFloat {
			value: 2.5,
			is_relative: false,
		};
		assert_eq!(abs.resolve(10.0), 2.5);
	}
}
