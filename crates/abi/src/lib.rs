//! Binary mirrors of the host's command registry.
//!
//! Everything here is `#[repr(C)]` and laid out exactly as the host's MSVC x64
//! build lays it out: the standard containers the registry is built from, the
//! records it stores, and the function signatures it calls through. Layout
//! expectations per host build live in [`layout`].

pub mod flags;
pub mod fns;
pub mod heap;
pub mod layout;
mod map;
pub mod records;
mod shared_ptr;
mod string;
pub mod symbol;
mod vector;

pub use map::{BLACK, CxxMap, CxxPair, Iter as MapIter, MapNode, RED};
pub use shared_ptr::{CxxSharedPtr, RefCountBase, RefCountVTable};
pub use string::{CxxString, INLINE_CAPACITY};
pub use vector::CxxVector;
