//! A runtime wired to a simulated host.

use std::ffi::c_void;
use std::ptr::NonNull;

use splice_commands::abi::flags::{CommandFlags, CommandPermissionLevel};
use splice_commands::{Runtime, SpliceConfig, SymbolResolver};
use splice_sim::{SimHost, SymbolTable};

/// Resolves against a simulated host's exports.
pub struct SimResolver(pub SymbolTable);

impl SymbolResolver for SimResolver {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		self.0.lookup(symbol)
	}
}

/// A live runtime over a simulated host. The runtime drops first, so its
/// teardown still finds the host tables.
pub struct Harness {
	pub runtime: Runtime,
	pub host: SimHost,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_host(SimHost::new())
	}

	/// Starts a runtime over a host prepared by the caller.
	pub fn with_host(host: SimHost) -> Self {
		init_tracing();
		let runtime = start(&host).expect("runtime starts over the simulated host");
		Self { runtime, host }
	}

	/// Registers `name` with default level and flags.
	pub fn command(&mut self, name: &str) {
		self.runtime
			.register_command(
				name,
				"test command",
				CommandPermissionLevel::Normal,
				CommandFlags::empty(),
				CommandFlags::empty(),
			)
			.expect("command registers");
	}
}

pub fn start(host: &SimHost) -> splice_commands::Result<Runtime> {
	let resolver = SimResolver(host.symbols());
	// SAFETY: the simulated registry is laid out as the current profile and
	// outlives the runtime in every test.
	unsafe { Runtime::init(&resolver, host.registry(), &SpliceConfig::default()) }
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
