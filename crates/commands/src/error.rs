//! Error types.
//!
//! Every check that can fail runs before the host is touched, so an error
//! always means no host table was modified by the failing call.

use std::path::PathBuf;

use splice_abi::layout::LayoutMismatch;
use thiserror::Error;

use crate::types::NativeType;

pub type Result<T, E = CommandError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CommandError {
	#[error(transparent)]
	Construction(#[from] ConstructionError),
	#[error(transparent)]
	Lookup(#[from] LookupError),
	#[error(transparent)]
	Layout(#[from] LayoutError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("a command runtime is already initialized in this process")]
	AlreadyInitialized,
	#[error("no command runtime is initialized")]
	NotInitialized,
}

/// Invalid input rejected before any host mutation. Retrying with the same
/// input fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
	#[error("the enum parser already exists (name={0})")]
	DuplicateEnum(String),
	#[error("the soft enum already exists (name={0})")]
	DuplicateSoftEnum(String),
	#[error("enum `{enum_name}`: enum value cannot be empty")]
	EmptyEnumValue { enum_name: String },
	#[error("{value}: enum value contains invalid characters ({invalid})")]
	InvalidEnumCharacters { value: String, invalid: String },
	#[error("{value}: enum value duplicated")]
	DuplicateEnumValue { value: String },
	#[error("parameter `{param}`: enum `{enum_name}` does not support postfix")]
	ConflictingEnumAndPostfix { param: String, enum_name: String },
	#[error("parameter `{param}`: field storage does not hold a {expected}")]
	StorageMismatch { param: String, expected: &'static str },
	#[error("enum parser is not generated (name={0})")]
	EnumNotGenerated(String),
	#[error("{0}: command already registered")]
	DuplicateCommand(String),
	#[error("{0}: the host did not register the command")]
	CommandRejected(String),
	#[error("{value:?}: strings passed to the host cannot contain NUL")]
	InteriorNul { value: String },
	#[error("all {capacity} {kind} slots are in use")]
	SlotsExhausted { kind: &'static str, capacity: usize },
}

/// A name referenced before it exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
	#[error("{0} parser not found")]
	ParserNotFound(NativeType),
	#[error("{0}: command not found")]
	CommandNotFound(String),
	#[error("host symbol not found: {0}")]
	SymbolNotFound(String),
	#[error("no type id available for {0}")]
	TypeIdUnavailable(String),
}

/// The host's binary layout does not fit what a call needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
	#[error("{0}: size is not defined")]
	InvalidRecordSize(String),
	#[error("parameter `{param}`: offset {offset} is outside the command record")]
	InvalidFieldOffset { param: String, offset: i32 },
	#[error(transparent)]
	Mismatch(#[from] LayoutMismatch),
	#[error("no layout profile for host version {0}")]
	UnknownHostVersion(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid configuration: {0}")]
	Parse(#[from] toml::de::Error),
}

impl From<LayoutMismatch> for CommandError {
	fn from(value: LayoutMismatch) -> Self {
		Self::Layout(value.into())
	}
}
