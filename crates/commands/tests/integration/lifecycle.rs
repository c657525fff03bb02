use serial_test::serial;
use splice_commands::abi::symbol;
use splice_commands::{CommandError, DynParam, LookupError, NativeType, Runtime, SpliceConfig, host};
use splice_sim::{SimHost, SimOrigin, SimOutput};

use crate::common::{self, Harness, SimResolver};

#[test]
#[serial]
fn one_runtime_per_process() {
	let h = Harness::new();
	let err = common::start(&h.host).unwrap_err();
	assert!(matches!(err, CommandError::AlreadyInitialized));

	h.runtime.shutdown();
	let again = common::start(&h.host).unwrap();
	drop(again);
}

#[test]
#[serial]
fn missing_symbol_fails_init_and_frees_the_slot() {
	common::init_tracing();
	let sim = SimHost::new();
	let resolver = SimResolver(sim.symbols().without(symbol::FIND_COMMAND));
	let err = unsafe { Runtime::init(&resolver, sim.registry(), &SpliceConfig::default()) }.unwrap_err();
	assert!(matches!(
		err,
		CommandError::Lookup(LookupError::SymbolNotFound(ref name)) if name == symbol::FIND_COMMAND
	));
	assert!(host::current().is_none());

	let runtime = common::start(&sim).unwrap();
	assert!(host::current().is_some());
	drop(runtime);
	assert!(host::current().is_none());
}

#[test]
#[serial]
fn shutdown_restores_hooked_parsers() {
	let mut host = SimHost::new();
	host.add_builtin_enum("Weather", &["Clear", "Rain"]);
	let mut h = Harness::with_host(host);

	let weather = h.runtime.raw_enum("Weather").unwrap();
	let hooked = h.host.enum_parser("Weather").unwrap();
	assert!(!std::ptr::fn_addr_eq(hooked, SimHost::default_enum_parser()));
	let parsed = h.host.parse_enum("Weather", "rain").unwrap();
	assert_eq!(parsed.token.to_string(), "rain");
	assert!(weather.is_bound());

	let Harness { runtime, host } = h;
	runtime.shutdown();
	let restored = host.enum_parser("Weather").unwrap();
	assert!(std::ptr::fn_addr_eq(restored, SimHost::default_enum_parser()));
	let parsed = host.parse_enum("Weather", "rain").unwrap();
	assert_eq!(parsed.int_value(), 1);
	assert!(parsed.token.is_empty());
}

#[test]
#[serial]
fn restarted_runtime_leaves_retired_overloads_disarmed() {
	let mut h = Harness::new();
	h.command("alpha");
	h.runtime
		.register_dynamic_overload("alpha", vec![DynParam::mandatory("n", NativeType::Int)], |_, _, output| {
			let _ = output.success("alpha ran", &[]);
		})
		.unwrap();

	let Harness { runtime, host } = h;
	runtime.shutdown();
	let mut h = Harness::with_host(host);
	h.command("beta");
	h.runtime
		.register_dynamic_overload("beta", vec![DynParam::mandatory("s", NativeType::String)], |_, _, output| {
			let _ = output.success("beta ran", &[]);
		})
		.unwrap();

	let err = h.host.instantiate("alpha", 0, &["5"]).unwrap_err();
	assert!(err.contains("no record"), "{err}");

	let mut output = SimOutput::new();
	h.host
		.instantiate("beta", 0, &["hi"])
		.unwrap()
		.execute(&SimOrigin::new("console"), &mut output);
	assert_eq!(output.messages()[0].text, "beta ran");
}
