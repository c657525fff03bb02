//! The explicitly initialised command runtime.
//!
//! One [`Runtime`] may be live per process. It owns the type descriptor table,
//! the type-id namespace and the enum registry, and publishes the host function
//! table for foreign-callable thunks. Dropping it tears all of that down.

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use splice_abi::flags::{CommandFlags, CommandPermissionLevel};
use splice_abi::heap::{self, HostHeap};
use splice_abi::layout::LayoutProfile;
use splice_abi::records::{CommandBase, CommandOrigin, ParameterData, RegistryRaw};
use tracing::{debug, info};

use crate::config::SpliceConfig;
use crate::dynamic::{self, DynParam, DynamicLayout, OverloadContext, ParamValues};
use crate::enums::{self, EnumRegistry, MappedEnum, RawEnum, SoftEnum};
use crate::error::{CommandError, ConstructionError, LayoutError, LookupError, Result};
use crate::host::{self, HostFunctions};
use crate::output::CommandOutput;
use crate::param::ParamSpec;
use crate::record::{self, CommandHandler};
use crate::registry::CommandRegistry;
use crate::symbols::{OverrideResolver, SymbolResolver};
use crate::typeid::TypeIds;
use crate::types::{self, NativeType, TypeTable};

static LIVE: AtomicBool = AtomicBool::new(false);

/// Command registration against one live host registry.
#[derive(Debug)]
pub struct Runtime {
	host: Arc<HostFunctions>,
	registry: CommandRegistry,
	types: TypeTable,
	type_ids: TypeIds<NativeType>,
	enums: EnumRegistry,
	profile: LayoutProfile,
	previous_heap: Option<HostHeap>,
	shut_down: bool,
}

impl Runtime {
	/// Resolves the host and wraps its registry.
	///
	/// Fails with [`CommandError::AlreadyInitialized`] while another runtime is
	/// live.
	///
	/// # Safety
	///
	/// `registry` must be the host's live registry, laid out as the configured
	/// profile describes, and the symbols `resolver` returns must have the
	/// signatures the host declares.
	pub unsafe fn init(
		resolver: &dyn SymbolResolver,
		registry: NonNull<RegistryRaw>,
		config: &SpliceConfig,
	) -> Result<Self> {
		if LIVE.swap(true, Ordering::AcqRel) {
			return Err(CommandError::AlreadyInitialized);
		}
		let runtime = unsafe { Self::build(resolver, registry, config) };
		if runtime.is_err() {
			LIVE.store(false, Ordering::Release);
		}
		runtime
	}

	unsafe fn build(resolver: &dyn SymbolResolver, registry: NonNull<RegistryRaw>, config: &SpliceConfig) -> Result<Self> {
		let profile = config.layout_profile()?;
		let resolver = OverrideResolver::new(resolver, config.symbols.clone());
		let host = Arc::new(HostFunctions::resolve(&resolver)?);
		let types = TypeTable::load(&resolver);
		let type_ids = types::load_type_ids(&resolver, host.typeid_counter);

		let previous_heap = host.heap.map(heap::install);
		// SAFETY: forwarded from the caller.
		let registry = unsafe { CommandRegistry::from_raw(registry, profile.registry, Arc::clone(&host)) };
		let enums = EnumRegistry::new(registry.clone(), types.classifier(), config.warn_on_builtin_enum_extension);

		host::publish(Some(Arc::clone(&host)));
		info!(host_version = profile.host_version, host_heap = previous_heap.is_some(), "command runtime initialized");
		Ok(Self {
			host,
			registry,
			types,
			type_ids,
			enums,
			profile,
			previous_heap,
			shut_down: false,
		})
	}

	pub fn registry(&self) -> &CommandRegistry {
		&self.registry
	}

	pub fn host(&self) -> &Arc<HostFunctions> {
		&self.host
	}

	pub fn enums(&self) -> &EnumRegistry {
		&self.enums
	}

	pub fn enums_mut(&mut self) -> &mut EnumRegistry {
		&mut self.enums
	}

	pub fn types(&self) -> &TypeTable {
		&self.types
	}

	/// Use to alias parsers, e.g. let one selector type parse as another.
	pub fn types_mut(&mut self) -> &mut TypeTable {
		&mut self.types
	}

	pub fn type_ids_mut(&mut self) -> &mut TypeIds<NativeType> {
		&mut self.type_ids
	}

	pub fn profile(&self) -> &LayoutProfile {
		&self.profile
	}

	pub fn register_command(
		&mut self,
		name: &str,
		description: &str,
		level: CommandPermissionLevel,
		flags1: CommandFlags,
		flags2: CommandFlags,
	) -> Result<()> {
		self.registry.register_command(name, description, level, flags1, flags2)
	}

	pub fn register_alias(&mut self, name: &str, alias: &str) -> Result<()> {
		self.registry.register_alias(name, alias)
	}

	/// Registers `R` as a new overload of `name`.
	pub fn register_overload<R: CommandHandler>(&mut self, name: &str, params: Vec<ParamSpec<R>>) -> Result<()> {
		let size = size_of::<R>();
		if size < size_of::<CommandBase>() {
			return Err(LayoutError::InvalidRecordSize(std::any::type_name::<R>().to_owned()).into());
		}
		self.require_command(name)?;
		let parameters = self.build_parameters(size, &params)?;
		self.registry.register_overload(name, record::allocate::<R>, parameters)
	}

	/// Registers an overload whose record is laid out from `params`.
	///
	/// At most [`ALLOCATOR_SLOTS`](dynamic::ALLOCATOR_SLOTS) dynamic overloads
	/// can be registered per process, across runtime restarts; past that this
	/// fails with [`ConstructionError::SlotsExhausted`].
	pub fn register_dynamic_overload<F>(&mut self, name: &str, params: Vec<DynParam>, handler: F) -> Result<()>
	where
		F: Fn(&ParamValues<'_>, &CommandOrigin, &mut CommandOutput<'_>) + Send + Sync + 'static,
	{
		self.require_command(name)?;
		if !dynamic::has_free_allocator() {
			return Err(ConstructionError::SlotsExhausted {
				kind: "command allocator",
				capacity: dynamic::ALLOCATOR_SLOTS,
			}
			.into());
		}
		let layout = DynamicLayout::compute(&params);
		let parameters = self.build_parameters(layout.size(), &layout.specs(&params))?;
		let context = OverloadContext::leak(name, layout, Box::new(handler));
		let allocator = dynamic::claim_allocator(context)?;
		self.registry.register_overload(name, allocator, parameters)
	}

	fn require_command(&self, name: &str) -> Result<()> {
		match self.registry.find_command(name) {
			Some(_) => Ok(()),
			None => Err(LookupError::CommandNotFound(name.to_owned()).into()),
		}
	}

	fn build_parameters<R>(&mut self, record_size: usize, specs: &[ParamSpec<R>]) -> Result<Vec<ParameterData>> {
		let prepared = specs
			.iter()
			.map(|spec| spec.prepare(record_size, &self.types))
			.collect::<Result<Vec<_>>>()?;
		Ok(prepared
			.into_iter()
			.map(|param| param.finish(&mut self.type_ids))
			.collect())
	}

	/// Registers `name` and returns a handle for adding overloads and aliases.
	pub fn command(
		&mut self,
		name: &str,
		description: &str,
		level: CommandPermissionLevel,
		flags: CommandFlags,
	) -> Result<CommandHandle<'_>> {
		self.register_command(name, description, level, flags, CommandFlags::empty())?;
		Ok(CommandHandle {
			runtime: self,
			name: name.to_owned(),
		})
	}

	pub fn raw_enum(&mut self, name: &str) -> Result<RawEnum> {
		self.enums.raw_enum(name)
	}

	pub fn soft_enum(&mut self, name: &str) -> Result<SoftEnum> {
		self.enums.soft_enum(name)
	}

	/// A string enum whose values map to themselves.
	pub fn string_enum<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> Result<MappedEnum<String>> {
		MappedEnum::strings(&mut self.enums, name, values)
	}

	/// Restores hooked parsers, forgets dynamic overload contexts and withdraws
	/// the published host table.
	pub fn shutdown(mut self) {
		self.teardown();
	}

	fn teardown(&mut self) {
		if self.shut_down {
			return;
		}
		self.shut_down = true;
		self.enums.unhook_all();
		enums::hook::reset();
		dynamic::reset();
		host::publish(None);
		if let Some(previous) = self.previous_heap.take() {
			heap::install(previous);
		}
		LIVE.store(false, Ordering::Release);
		debug!("command runtime shut down");
	}
}

impl Drop for Runtime {
	fn drop(&mut self) {
		self.teardown();
	}
}

/// A registered command, for chaining overloads and aliases.
#[derive(Debug)]
pub struct CommandHandle<'a> {
	runtime: &'a mut Runtime,
	name: String,
}

impl CommandHandle<'_> {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn overload<R: CommandHandler>(self, params: Vec<ParamSpec<R>>) -> Result<Self> {
		self.runtime.register_overload(&self.name, params)?;
		Ok(self)
	}

	pub fn dynamic<F>(self, params: Vec<DynParam>, handler: F) -> Result<Self>
	where
		F: Fn(&ParamValues<'_>, &CommandOrigin, &mut CommandOutput<'_>) + Send + Sync + 'static,
	{
		self.runtime.register_dynamic_overload(&self.name, params, handler)?;
		Ok(self)
	}

	pub fn alias(self, alias: &str) -> Result<Self> {
		self.runtime.register_alias(&self.name, alias)?;
		Ok(self)
	}
}
