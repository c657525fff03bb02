use std::cell::RefCell;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::test_runner::TestRunner;
use rstest::rstest;
use serial_test::serial;
use splice_commands::abi::flags::{CommandFlags, CommandPermissionLevel, ParamKind};
use splice_commands::{CommandError, ConstructionError, DynParam, LookupError, NativeType};

use crate::common::Harness;

#[test]
#[serial]
fn overload_needs_a_registered_command() {
	let mut h = Harness::new();
	let params = vec![DynParam::mandatory("amount", NativeType::Int)];

	let err = h
		.runtime
		.register_dynamic_overload("late", params.clone(), |_, _, _| {})
		.unwrap_err();
	assert!(matches!(
		err,
		CommandError::Lookup(LookupError::CommandNotFound(ref name)) if name == "late"
	));
	assert_eq!(h.host.overload_count("late"), 0);

	h.command("late");
	h.runtime.register_dynamic_overload("late", params, |_, _, _| {}).unwrap();
	assert_eq!(h.host.overload_count("late"), 1);
	assert_eq!(h.host.overload_events().len(), 1);
	assert_eq!(h.host.overload_events()[0].parameters, 1);
}

#[test]
#[serial]
fn duplicate_command_is_rejected_before_the_host() {
	let mut h = Harness::new();
	h.command("twice");
	let err = h
		.runtime
		.register_command(
			"twice",
			"again",
			CommandPermissionLevel::Operator,
			CommandFlags::empty(),
			CommandFlags::empty(),
		)
		.unwrap_err();
	assert!(matches!(
		err,
		CommandError::Construction(ConstructionError::DuplicateCommand(_))
	));
	let signature = h.runtime.registry().find_command("twice").unwrap();
	assert_eq!(signature.description.to_string(), "test command");
}

#[test]
#[serial]
fn alias_resolves_to_the_command() {
	let mut h = Harness::new();
	h.runtime
		.command("teleport", "moves things", CommandPermissionLevel::Operator, CommandFlags::empty())
		.unwrap()
		.alias("tp")
		.unwrap();

	assert!(h.host.has_command("tp"));
	assert_eq!(h.host.enum_values("teleportCommandAliases").unwrap(), ["tp"]);
	let signature = h.runtime.registry().find_command("tp").unwrap();
	assert_eq!(signature.command.to_string(), "teleport");
	assert_eq!(signature.permission_level, CommandPermissionLevel::Operator as i32);
}

#[test]
#[serial]
fn postfix_marks_integers_and_drops_elsewhere() {
	let mut h = Harness::new();
	h.command("post");
	h.runtime
		.register_dynamic_overload(
			"post",
			vec![
				DynParam::mandatory("levels", NativeType::Int).postfix("L"),
				DynParam::mandatory("scale", NativeType::Float).postfix("x"),
				DynParam::optional("plain", NativeType::Int).postfix(""),
			],
			|_, _, _| {},
		)
		.unwrap();

	let signature = h.runtime.registry().find_command("post").unwrap();
	let params: Vec<_> = signature.overloads.get(0).unwrap().parameters.iter().collect();
	assert_eq!(params[0].param_kind(), Some(ParamKind::Postfix));
	assert_eq!(params[0].enum_name().unwrap().to_str().unwrap(), "L");
	assert_eq!(params[1].param_kind(), Some(ParamKind::Normal));
	assert!(params[1].enum_name().is_none());
	assert_eq!(params[2].param_kind(), Some(ParamKind::Normal));
	assert!(params[2].optional);
}

#[test]
#[serial]
fn enum_parameters_reject_any_postfix() {
	let mut h = Harness::new();
	let tints = h.runtime.string_enum("tint", &["Red"]).unwrap();
	h.command("tint");
	let runtime = RefCell::new(&mut h.runtime);

	let mut runner = TestRunner::default();
	runner
		.run(&"[a-zA-Z]{0,8}", |postfix| {
			let err = runtime
				.borrow_mut()
				.register_dynamic_overload(
					"tint",
					vec![DynParam::mandatory("tint", &tints).postfix(&postfix)],
					|_, _, _| {},
				)
				.unwrap_err();
			let conflicting = matches!(
				err,
				CommandError::Construction(ConstructionError::ConflictingEnumAndPostfix { .. })
			);
			prop_assert!(conflicting);
			Ok(())
		})
		.unwrap();
	assert_eq!(h.host.overload_count("tint"), 0);
}

#[rstest]
#[case("")]
#[case("L")]
#[case("warps")]
#[serial]
fn soft_enum_parameters_reject_any_postfix(#[case] postfix: &str) {
	let mut h = Harness::new();
	let warps = h.runtime.soft_enum("warps").unwrap();
	warps.set_values(&["spawn"]);
	h.command("warp");

	let err = h
		.runtime
		.register_dynamic_overload("warp", vec![DynParam::mandatory("to", warps).postfix(postfix)], |_, _, _| {})
		.unwrap_err();
	assert!(matches!(
		err,
		CommandError::Construction(ConstructionError::ConflictingEnumAndPostfix { .. })
	));
	assert_eq!(h.host.overload_count("warp"), 0);
}

#[test]
#[serial]
fn enum_parameters_carry_the_enum_type_id() {
	let mut h = Harness::new();
	let sizes = h.runtime.string_enum("size", &["Small", "Large"]).unwrap();
	let names = h.runtime.soft_enum("who").unwrap();
	names.set_values(&["alice"]);
	h.command("pick");
	h.runtime
		.register_dynamic_overload(
			"pick",
			vec![DynParam::mandatory("size", &sizes), DynParam::mandatory("who", names)],
			|_, _, _| {},
		)
		.unwrap();

	let signature = h.runtime.registry().find_command("pick").unwrap();
	let overload = signature.overloads.get(0).unwrap();
	let size = overload.parameters.get(0).unwrap();
	assert_eq!(Some(size.tid), sizes.raw().type_id());
	assert!(size.parser.is_none());
	assert_eq!(size.enum_name().unwrap().to_str().unwrap(), "size");
	let who = overload.parameters.get(1).unwrap();
	assert!(who.parser.is_some());
	assert_eq!(who.enum_name().unwrap().to_str().unwrap(), "who");
}
