//! Parser hook slots.
//!
//! A hooked enum's parser is replaced by a trampoline that forwards to the
//! original parser and then copies the matched token text into
//! [`EnumResult::token`]. Foreign parsers receive no context pointer, so each
//! trampoline is monomorphised over its slot and reads its original from a
//! static table.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use splice_abi::fns::ParserFn;
use splice_abi::records::{CommandOrigin, EnumResult, ParseToken, RegistryRaw};
use splice_abi::{CxxString, CxxVector};
use tracing::{debug, warn};

use crate::error::{ConstructionError, Result};

/// Enum parsers that can be hooked over the life of the process. Slots are
/// never reused: a host table may keep a retired trampoline after shutdown.
pub const PARSER_SLOTS: usize = 256;

static ORIGINALS: [AtomicPtr<()>; PARSER_SLOTS] = [const { AtomicPtr::new(ptr::null_mut()) }; PARSER_SLOTS];
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

/// An installed hook: `replacement` forwards to `original`.
#[derive(Debug, Clone, Copy)]
pub struct ParserHook {
	pub slot: usize,
	pub original: ParserFn,
	pub replacement: ParserFn,
}

/// Claims a slot for `original` and returns its trampoline.
pub fn install(original: ParserFn) -> Result<ParserHook> {
	let slot = claim_slot(&NEXT_SLOT, PARSER_SLOTS).ok_or(ConstructionError::SlotsExhausted {
		kind: "enum parser",
		capacity: PARSER_SLOTS,
	})?;
	ORIGINALS[slot].store(original as *mut (), Ordering::Release);
	debug!(slot, "enum parser hook installed");
	Ok(ParserHook {
		slot,
		original,
		replacement: TRAMPOLINES[slot],
	})
}

/// Takes the next never-used index below `capacity`.
pub(crate) fn claim_slot(next: &AtomicUsize, capacity: usize) -> Option<usize> {
	next.fetch_update(Ordering::AcqRel, Ordering::Acquire, |slot| (slot < capacity).then_some(slot + 1))
		.ok()
}

/// Disarms every claimed slot. Hooks still referenced by a host table fail their
/// parse afterwards instead of calling a stale original; the slots stay retired.
pub(crate) fn reset() {
	let claimed = NEXT_SLOT.load(Ordering::Acquire).min(PARSER_SLOTS);
	for original in &ORIGINALS[..claimed] {
		original.store(ptr::null_mut(), Ordering::Release);
	}
}

/// Copies the text of the matched token into `result.token`.
///
/// The enum parser is handed the enum's node; the matched word is its child.
///
/// # Safety
///
/// `result` must be null or point at a live [`EnumResult`], and `token` must be
/// null or point at a live parse token.
unsafe fn capture_token(result: *mut EnumResult, token: *const ParseToken) {
	let (Some(result), Some(token)) = (unsafe { result.as_mut() }, unsafe { token.as_ref() }) else {
		return;
	};
	let matched = unsafe { token.child.as_ref() }.unwrap_or(token);
	result.token.assign(matched.text());
}

unsafe extern "C" fn parse_enum_trampoline<const SLOT: usize>(
	registry: *const RegistryRaw,
	storage: *mut c_void,
	token: *const ParseToken,
	origin: *const CommandOrigin,
	version: i32,
	error: *mut CxxString,
	error_params: *mut CxxVector<CxxString>,
) -> bool {
	let original = ORIGINALS[SLOT].load(Ordering::Acquire);
	if original.is_null() {
		warn!(slot = SLOT, "enum parser hook called after its runtime shut down");
		return false;
	}
	// SAFETY: the slot was filled from a `ParserFn` in `install`.
	let original = unsafe { std::mem::transmute::<*mut (), ParserFn>(original) };
	let matched = unsafe { original(registry, storage, token, origin, version, error, error_params) };
	unsafe { capture_token(storage.cast(), token) };
	matched
}

macro_rules! trampolines {
	($($slot:literal)*) => {
		[$(parse_enum_trampoline::<$slot> as ParserFn),*]
	};
}

static TRAMPOLINES: [ParserFn; PARSER_SLOTS] = trampolines!(
	0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
	16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
	32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
	48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
	64 65 66 67 68 69 70 71 72 73 74 75 76 77 78 79
	80 81 82 83 84 85 86 87 88 89 90 91 92 93 94 95
	96 97 98 99 100 101 102 103 104 105 106 107 108 109 110 111
	112 113 114 115 116 117 118 119 120 121 122 123 124 125 126 127
	128 129 130 131 132 133 134 135 136 137 138 139 140 141 142 143
	144 145 146 147 148 149 150 151 152 153 154 155 156 157 158 159
	160 161 162 163 164 165 166 167 168 169 170 171 172 173 174 175
	176 177 178 179 180 181 182 183 184 185 186 187 188 189 190 191
	192 193 194 195 196 197 198 199 200 201 202 203 204 205 206 207
	208 209 210 211 212 213 214 215 216 217 218 219 220 221 222 223
	224 225 226 227 228 229 230 231 232 233 234 235 236 237 238 239
	240 241 242 243 244 245 246 247 248 249 250 251 252 253 254 255
);

#[cfg(test)]
mod tests {
	use serial_test::serial;

	use super::*;

	unsafe extern "C" fn accept_all(
		_: *const RegistryRaw,
		storage: *mut c_void,
		_: *const ParseToken,
		_: *const CommandOrigin,
		_: i32,
		_: *mut CxxString,
		_: *mut CxxVector<CxxString>,
	) -> bool {
		unsafe { storage.cast::<i32>().write(7) };
		true
	}

	fn token(text: &'static str, child: *mut ParseToken) -> ParseToken {
		ParseToken {
			child,
			next: ptr::null_mut(),
			parent: ptr::null_mut(),
			text: text.as_ptr(),
			length: text.len() as u32,
			kind: splice_abi::records::CommandSymbol(0),
		}
	}

	unsafe fn call(parser: ParserFn, result: &mut EnumResult, token: &ParseToken) -> bool {
		unsafe {
			parser(
				ptr::null(),
				ptr::from_mut(result).cast(),
				token,
				ptr::null(),
				0,
				ptr::null_mut(),
				ptr::null_mut(),
			)
		}
	}

	#[test]
	#[serial(host)]
	fn trampoline_forwards_and_captures_the_child_token() {
		reset();
		let hook = install(accept_all).unwrap();
		let mut child = token("Blue extra", ptr::null_mut());
		child.length = 4;
		let parent = token("ignored", &mut child);
		let mut result = EnumResult::default();

		assert!(unsafe { call(hook.replacement, &mut result, &parent) });
		assert_eq!(result.int_value(), 7);
		assert_eq!(result.token, "Blue");
		reset();
	}

	#[test]
	#[serial(host)]
	fn reset_disarms_installed_trampolines() {
		reset();
		let hook = install(accept_all).unwrap();
		reset();
		let leaf = token("x", ptr::null_mut());
		let mut result = EnumResult::default();
		assert!(!unsafe { call(hook.replacement, &mut result, &leaf) });
		assert!(result.token.is_empty());
	}

	#[test]
	fn slots_run_out_and_are_never_reused() {
		let next = AtomicUsize::new(0);
		let claimed: Vec<_> = std::iter::from_fn(|| claim_slot(&next, 3)).collect();
		assert_eq!(claimed, [0, 1, 2]);
		assert_eq!(claim_slot(&next, 3), None);
		assert_eq!(next.load(Ordering::Relaxed), 3);
	}

	#[test]
	#[serial(host)]
	fn reset_keeps_claimed_slots_retired() {
		let first = install(accept_all).unwrap();
		reset();
		let second = install(accept_all).unwrap();
		assert!(second.slot > first.slot);
		assert!(!std::ptr::fn_addr_eq(first.replacement, second.replacement));
		reset();
	}
}
