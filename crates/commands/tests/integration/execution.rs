use pretty_assertions::assert_eq;
use serial_test::serial;
use splice_commands::abi::records::CommandOrigin;
use splice_commands::selector::ActorCommandSelector;
use splice_commands::{
	ActorFilter, CommandHandler, CommandOutput, DynParam, EnumMapping, NativeType, OutputArg, ParamSpec, command_record,
	field,
};
use splice_sim::{Channel, OutputMessage, PLAYER, SimOrigin, SimOutput};

use crate::common::Harness;

command_record! {
	struct Give {
		target: ActorCommandSelector,
		count: i32,
		count_set: bool,
	}
}

impl CommandHandler for Give {
	fn execute(&self, origin: &CommandOrigin, output: &mut CommandOutput<'_>) {
		let players = match self.target.new_results(origin, ActorFilter::Players) {
			Ok(players) => players,
			Err(err) => {
				let _ = output.error(&err.to_string(), &[]);
				return;
			}
		};
		if players.is_empty() {
			let _ = output.error("commands.generic.noTargetMatch", &[]);
			return;
		}
		let count = if self.count_set { self.count } else { 1 };
		let _ = output.success("gave %1$s to %2$s", &[count.into(), OutputArg::Entities(players)]);
	}
}

fn give_harness() -> Harness {
	let mut h = Harness::new();
	h.host.spawn("Steve", PLAYER);
	h.host.spawn("Alex", PLAYER);
	h.host.spawn("Bessie", 0x0b);
	h.command("give");
	h.runtime
		.register_overload::<Give>(
			"give",
			vec![
				ParamSpec::mandatory(NativeType::ActorSelector, field!(Give, target)),
				ParamSpec::optional(NativeType::Int, field!(Give, count)).is_set(field!(Give, count_set)),
			],
		)
		.unwrap();
	h
}

#[test]
#[serial]
fn typed_record_parses_and_executes() {
	let h = give_harness();
	let origin = SimOrigin::new("console");
	let mut output = SimOutput::new();

	let instance = h.host.instantiate("give", 0, &["@e", "5"]).unwrap();
	instance.execute(&origin, &mut output);

	assert_eq!(
		output.messages(),
		[OutputMessage {
			channel: Channel::Success,
			text: "gave %1$s to %2$s".to_owned(),
			params: vec![("5".to_owned(), 0), ("Steve, Alex".to_owned(), 2)],
		}]
	);
	assert_eq!(output.success_count(), 1);
}

#[test]
#[serial]
fn unset_optional_keeps_its_default() {
	let h = give_harness();
	let mut output = SimOutput::new();

	let instance = h.host.instantiate("give", 0, &["Alex"]).unwrap();
	instance.execute(&SimOrigin::new("console"), &mut output);

	let message = &output.messages()[0];
	assert_eq!(message.params[0], ("1".to_owned(), 0));
	assert_eq!(message.params[1], ("Alex".to_owned(), 1));
}

#[test]
#[serial]
fn selector_filter_runs_after_resolution() {
	let h = give_harness();
	let mut output = SimOutput::new();

	let instance = h.host.instantiate("give", 0, &["Bessie"]).unwrap();
	instance.execute(&SimOrigin::new("console"), &mut output);

	assert_eq!(output.messages()[0].channel, Channel::Error);
	assert_eq!(output.success_count(), 0);
}

#[test]
#[serial]
fn dynamic_overload_reads_its_values() {
	let mut h = Harness::new();
	let colors = h.runtime.string_enum("paint_color", &["Red", "Blue"]).unwrap();
	let params = vec![
		DynParam::mandatory("color", &colors),
		DynParam::optional("times", NativeType::Int),
	];
	h.command("paint");
	h.runtime
		.register_dynamic_overload("paint", params, move |values, _, output| {
			let color = values
				.enum_value("color", &colors)
				.and_then(EnumMapping::mapped)
				.cloned()
				.unwrap_or_default();
			let times = values.get::<i32>("times").copied().unwrap_or(1);
			let _ = output.success(&format!("painted {color} x{times}"), &[]);
		})
		.unwrap();

	let origin = SimOrigin::new("console");
	let mut output = SimOutput::new();
	h.host.instantiate("paint", 0, &["BLUE"]).unwrap().execute(&origin, &mut output);
	h.host.instantiate("paint", 0, &["red", "3"]).unwrap().execute(&origin, &mut output);

	let texts: Vec<_> = output.messages().iter().map(|message| message.text.as_str()).collect();
	assert_eq!(texts, ["painted Blue x1", "painted Red x3"]);
}

#[test]
#[serial]
fn unknown_enum_token_fails_to_parse() {
	let mut h = Harness::new();
	let colors = h.runtime.string_enum("lamp", &["On", "Off"]).unwrap();
	h.command("lamp");
	h.runtime
		.register_dynamic_overload("lamp", vec![DynParam::mandatory("state", &colors)], |_, _, _| {})
		.unwrap();

	let err = h.host.instantiate("lamp", 0, &["dim"]).unwrap_err();
	assert!(err.starts_with("state:"), "{err}");
}

#[test]
#[serial]
fn soft_enum_parameters_parse_as_strings() {
	let mut h = Harness::new();
	let warps = h.runtime.soft_enum("warps").unwrap();
	warps.set_values(&["spawn", "nether"]);
	h.command("warp");
	h.runtime
		.register_dynamic_overload("warp", vec![DynParam::mandatory("to", warps)], |values, _, output| {
			let to = values.string("to").unwrap_or_default();
			let _ = output.success("warping to %1$s", &[to.into()]);
		})
		.unwrap();

	let mut output = SimOutput::new();
	h.host
		.instantiate("warp", 0, &["nether"])
		.unwrap()
		.execute(&SimOrigin::new("console"), &mut output);
	assert_eq!(output.messages()[0].params, [("nether".to_owned(), 0)]);
}

#[test]
#[serial]
fn handler_panic_becomes_an_error_message() {
	let mut h = Harness::new();
	h.command("explode");
	h.runtime
		.register_dynamic_overload("explode", Vec::new(), |_, _, _| panic!("boom"))
		.unwrap();

	let mut output = SimOutput::new();
	h.host
		.instantiate("explode", 0, &[])
		.unwrap()
		.execute(&SimOrigin::new("console"), &mut output);

	assert_eq!(output.messages().len(), 1);
	assert_eq!(output.messages()[0].channel, Channel::Error);
	assert_eq!(output.messages()[0].text, "boom");
}
