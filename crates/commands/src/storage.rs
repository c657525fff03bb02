//! Parameter storage types whose lifecycle involves the host.

use std::fmt;

use splice_abi::records::CommandOrigin;
use splice_abi::{CxxString, CxxVector, heap};
use tracing::warn;

use crate::error::Result;
use crate::host;
use crate::selector::{ActorFilter, ActorRef, ActorWildcardCommandSelector};

/// One piece of a `CommandMessage`: literal text or an owned selector.
#[repr(C)]
pub struct MessageComponent {
	pub text: CxxString,
	/// `std::unique_ptr<WildcardCommandSelector<Actor>>`.
	pub selection: *mut ActorWildcardCommandSelector,
}

const _: () = assert!(size_of::<MessageComponent>() == 0x28);

impl MessageComponent {
	pub fn selection(&self) -> Option<&ActorWildcardCommandSelector> {
		// SAFETY: a non-null selection is owned by this component.
		unsafe { self.selection.as_ref() }
	}
}

impl Drop for MessageComponent {
	fn drop(&mut self) {
		if self.selection.is_null() {
			return;
		}
		// SAFETY: the selector was allocated on the host heap and is owned here.
		unsafe {
			std::ptr::drop_in_place(self.selection);
			if let Some(block) = std::ptr::NonNull::new(self.selection.cast::<u8>()) {
				heap::deallocate(block, size_of::<ActorWildcardCommandSelector>());
			}
		}
	}
}

impl fmt::Debug for MessageComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MessageComponent")
			.field("text", &self.text)
			.field("has_selection", &!self.selection.is_null())
			.finish()
	}
}

/// `CommandMessage`: free text that may embed selectors.
#[repr(C)]
#[derive(Debug, Default)]
pub struct CommandMessage {
	pub data: CxxVector<MessageComponent>,
}

const _: () = assert!(size_of::<CommandMessage>() == 0x18);

impl CommandMessage {
	/// Text with each selector replaced by the names of the actors it matches.
	pub fn resolve(&self, origin: &CommandOrigin) -> Result<String> {
		let mut out = String::new();
		for component in self.data.iter() {
			match component.selection() {
				Some(selector) => {
					let names = selector
						.new_results(origin, ActorFilter::Any)?
						.iter()
						.map(ActorRef::name)
						.collect::<Result<Vec<_>>>()?;
					out.push_str(&names.join(", "));
				}
				None => out.push_str(&component.text.to_string_lossy()),
			}
		}
		Ok(out)
	}
}

/// `Json::Value`: a value union followed by its type tag.
#[repr(C, align(8))]
pub struct JsonValue {
	bytes: [u8; 16],
}

const _: () = assert!(size_of::<JsonValue>() == 16);

impl JsonValue {
	/// Whether the tag is `nullValue`.
	pub fn is_null(&self) -> bool {
		self.bytes[8] == 0
	}
}

impl Default for JsonValue {
	fn default() -> Self {
		Self { bytes: [0; 16] }
	}
}

impl Drop for JsonValue {
	fn drop(&mut self) {
		if self.is_null() {
			return;
		}
		match host::current() {
			// SAFETY: non-null values were written by the host's parser.
			Some(host) => unsafe { (host.json_value_dtor)(self) },
			None => warn!("json value dropped while no host is installed; its contents leak"),
		}
	}
}

impl fmt::Debug for JsonValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JsonValue").field("tag", &self.bytes[8]).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_values_need_no_host() {
		let json = JsonValue::default();
		assert!(json.is_null());
		drop(json);

		let mut message = CommandMessage::default();
		message.data.push(MessageComponent {
			text: CxxString::from("hello"),
			selection: std::ptr::null_mut(),
		});
		assert_eq!(message.data.len(), 1);
		assert!(message.data.get(0).unwrap().selection().is_none());
	}
}
