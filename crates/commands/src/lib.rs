//! Command registration and enum extension for a host command registry.
//!
//! The host owns the command table, the parser and the execute path. This crate
//! writes into the host's tables through the layouts in [`splice_abi`], splices a
//! hook into enum parsing to observe matched tokens, and hands the host
//! allocators and virtual tables for command records defined on this side.
//!
//! Start with [`Runtime::init`], then register commands, enums and overloads:
//!
//! ```ignore
//! let mut runtime = unsafe { Runtime::init(&resolver, registry, &SpliceConfig::default())? };
//! let colors = runtime.string_enum("color", &["Red", "Blue"])?;
//! runtime
//!     .command("paint", "paints things", CommandPermissionLevel::Normal, CommandFlags::empty())?
//!     .dynamic(vec![DynParam::mandatory("color", &colors)], move |values, _, output| {
//!         let color = values.enum_value("color", &colors);
//!         let _ = output.success(&format!("{color:?}"), &[]);
//!     })?;
//! ```

pub use splice_abi as abi;

pub mod config;
pub mod dynamic;
pub mod enums;
mod error;
pub mod host;
pub mod output;
pub mod param;
pub mod record;
pub mod registry;
mod runtime;
pub mod selector;
pub mod storage;
pub mod symbols;
pub mod typeid;
pub mod types;

pub use config::SpliceConfig;
pub use dynamic::{DynParam, DynamicLayout, ParamValues};
pub use enums::{EnumMapping, EnumRegistry, MappedEnum, RawEnum, RawValue, SoftEnum};
pub use error::{CommandError, ConfigError, ConstructionError, LayoutError, LookupError, Result};
pub use output::{BlockPos, CommandOutput, OutputArg, Vec3};
pub use param::{Field, ParamSpec};
pub use record::{CommandHandler, CommandRecord};
pub use registry::CommandRegistry;
pub use runtime::{CommandHandle, Runtime};
pub use selector::{ActorFilter, ActorRef};
pub use symbols::{LibraryResolver, OverrideResolver, SymbolResolver};
pub use types::{NativeType, ParamType, Storage, TypeTable};
