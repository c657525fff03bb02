//! Command output: the host's success, error and message channels.

use std::sync::Arc;

use splice_abi::flags::CommandOutputType;
use splice_abi::records::{CommandOutput as RawOutput, CommandOutputParameter};
use splice_abi::{CxxString, CxxVector};

use crate::error::Result;
use crate::host::{HostFunctions, OutputMessageFn};
use crate::selector::ActorRef;

/// A world position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

/// A block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos {
	pub x: i32,
	pub y: i32,
	pub z: i32,
}

/// A value substituted into an output message.
#[derive(Debug, Clone)]
pub enum OutputArg {
	Text(String),
	Bool(bool),
	Number(f64),
	Entity(ActorRef),
	Position(Vec3),
	Block(BlockPos),
	Entities(Vec<ActorRef>),
	Prebuilt(CommandOutputParameter),
}

fn format_number(value: f64) -> String {
	if value.is_finite() && value.fract() == 0.0 {
		// `+ 0.0` turns -0 into 0.
		format!("{:.0}", value + 0.0)
	} else {
		format!("{value:.2}")
	}
}

impl OutputArg {
	/// Display text and arity. `count` overrides the arity of text and
	/// positions, which default to zero.
	pub fn to_parameter(&self, count: Option<i32>) -> Result<CommandOutputParameter> {
		let plain = count.unwrap_or(0);
		Ok(match self {
			Self::Text(text) => CommandOutputParameter::new(text, plain),
			Self::Bool(value) => CommandOutputParameter::new(if *value { "true" } else { "false" }, 0),
			Self::Number(value) => CommandOutputParameter::new(&format_number(*value), 0),
			Self::Entity(actor) => CommandOutputParameter::new(&actor.name()?, 1),
			Self::Position(Vec3 { x, y, z }) => CommandOutputParameter::new(&format!("{x}, {y}, {z}"), plain),
			Self::Block(BlockPos { x, y, z }) => CommandOutputParameter::new(&format!("{x}, {y}, {z}"), plain),
			Self::Entities(actors) => {
				let names = actors.iter().map(ActorRef::name).collect::<Result<Vec<_>>>()?;
				CommandOutputParameter::new(&names.join(", "), actors.len() as i32)
			}
			Self::Prebuilt(param) => param.clone(),
		})
	}
}

macro_rules! output_arg_from {
	($($ty:ty => $variant:ident;)*) => {$(
		impl From<$ty> for OutputArg {
			fn from(value: $ty) -> Self {
				Self::$variant(value.into())
			}
		}
	)*};
}

output_arg_from! {
	String => Text;
	&str => Text;
	bool => Bool;
	f64 => Number;
	i32 => Number;
	ActorRef => Entity;
	Vec3 => Position;
	BlockPos => Block;
	Vec<ActorRef> => Entities;
	CommandOutputParameter => Prebuilt;
}

/// The output sink handed to a command's execute.
pub struct CommandOutput<'a> {
	raw: &'a mut RawOutput,
	host: Arc<HostFunctions>,
}

impl<'a> CommandOutput<'a> {
	pub fn new(raw: &'a mut RawOutput, host: Arc<HostFunctions>) -> Self {
		Self { raw, host }
	}

	pub fn as_raw(&mut self) -> &mut RawOutput {
		self.raw
	}

	fn send(&mut self, channel: OutputMessageFn, message: &str, args: &[OutputArg]) -> Result<()> {
		let params = args
			.iter()
			.map(|arg| arg.to_parameter(None))
			.collect::<Result<CxxVector<_>>>()?;
		let message = CxxString::from(message);
		// SAFETY: the host copies the message and parameters.
		unsafe { channel(&mut *self.raw, &message, &params) };
		Ok(())
	}

	/// Counts a success without printing anything.
	pub fn success_no_message(&mut self) {
		// SAFETY: `raw` is the output of the running command.
		unsafe { (self.host.output_success_no_message)(&mut *self.raw) };
	}

	pub fn success(&mut self, message: &str, args: &[OutputArg]) -> Result<()> {
		self.send(self.host.output_success, message, args)
	}

	pub fn error(&mut self, message: &str, args: &[OutputArg]) -> Result<()> {
		self.send(self.host.output_error, message, args)
	}

	pub fn add_message(&mut self, message: &str, args: &[OutputArg]) -> Result<()> {
		self.send(self.host.output_add_message, message, args)
	}

	pub fn success_count(&self) -> i32 {
		unsafe { (self.host.output_get_success_count)(&*self.raw) }
	}

	pub fn output_type(&self) -> Option<CommandOutputType> {
		CommandOutputType::from_raw(unsafe { (self.host.output_get_type)(&*self.raw) })
	}

	pub fn is_empty(&self) -> bool {
		unsafe { (self.host.output_empty)(&*self.raw) }
	}
}
