use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use splice_commands::enums::ParserKind;
use splice_commands::{CommandError, ConstructionError, EnumMapping, NativeType, RawValue};
use splice_sim::SimHost;

use crate::common::Harness;

#[test]
#[serial]
fn raw_enum_wraps_each_name_once() {
	let mut h = Harness::new();
	h.runtime.raw_enum("Things").unwrap();
	let err = h.runtime.raw_enum("Things").unwrap_err();
	assert!(matches!(
		err,
		CommandError::Construction(ConstructionError::DuplicateEnum(ref name)) if name == "Things"
	));
}

#[test]
#[serial]
fn raw_enum_binds_on_first_values() {
	let mut h = Harness::new();
	let raw = h.runtime.raw_enum("Shapes").unwrap();
	assert!(!raw.is_bound());
	assert!(!raw.is_builtin());

	raw.add_values(&["Cube", "Sphere"]).unwrap();
	assert!(raw.is_bound());
	assert_eq!(raw.values(), ["Cube", "Sphere"]);
	assert_eq!(raw.parser_kind(), Some(ParserKind::Int));

	let parsed = h.host.parse_enum("Shapes", "SPHERE").unwrap();
	assert_eq!(raw.map_value(&parsed), RawValue::Int(1));
	assert_eq!(parsed.token.to_string(), "SPHERE");
}

#[test]
#[serial]
fn builtin_enum_keeps_its_type_id() {
	let mut host = SimHost::new();
	host.add_builtin_enum("Difficulty", &["Peaceful", "Hard"]);
	let expected = host.typeid_counter() - 1;
	let mut h = Harness::with_host(host);

	let raw = h.runtime.raw_enum("Difficulty").unwrap();
	assert!(raw.is_builtin());
	assert_eq!(raw.type_id().map(|tid| tid.id), Some(expected));
}

#[test]
#[serial]
fn string_enum_maps_tokens_without_case() {
	let mut h = Harness::new();
	let colors = h.runtime.string_enum("color", &["Red", "Blue"]).unwrap();

	let parsed = h.host.parse_enum("color", "red").unwrap();
	assert_eq!(colors.map_value(&parsed), EnumMapping::Mapped(&"Red".to_owned()));
	assert!(h.host.parse_enum("color", "green").is_none());
}

#[test]
#[serial]
fn duplicate_key_leaves_host_untouched() {
	let mut h = Harness::new();
	let values_before = h.host.enum_value_count();

	let err = h.runtime.string_enum("dup", &["a", "A"]).unwrap_err();
	assert!(matches!(
		err,
		CommandError::Construction(ConstructionError::DuplicateEnumValue { ref value }) if value == "A"
	));
	assert_eq!(h.host.enum_values("dup"), None);
	assert_eq!(h.host.enum_value_count(), values_before);
}

#[rstest]
#[case("foo bar", false)]
#[case("a,b", false)]
#[case("foo_bar-1.2(x)?", true)]
#[case("größe", true)]
#[serial]
fn enum_values_are_checked_for_characters(#[case] value: &str, #[case] accepted: bool) {
	let mut h = Harness::new();
	let result = h.runtime.string_enum("charset", &[value]);
	assert_eq!(result.is_ok(), accepted, "{value:?}: {result:?}");
	if !accepted {
		assert_eq!(h.host.enum_values("charset"), None);
	}
}

#[test]
#[serial]
fn extending_builtin_enum_keeps_other_values_unmapped() {
	let mut host = SimHost::new();
	host.add_builtin_enum("Mode", &["Survival"]);
	let mut h = Harness::with_host(host);

	let modes = h.runtime.string_enum("Mode", &["Arcade"]).unwrap();
	assert!(modes.raw().is_builtin());
	assert_eq!(h.host.enum_values("Mode").unwrap(), ["Survival", "Arcade"]);

	let parsed = h.host.parse_enum("Mode", "survival").unwrap();
	assert_eq!(modes.map_value(&parsed), EnumMapping::Unmapped("survival".to_owned()));
}

#[test]
#[serial]
fn soft_enum_set_values_replaces() {
	let mut h = Harness::new();
	let names = h.runtime.soft_enum("names").unwrap();
	assert!(!names.exists());

	names.set_values(&["x", "y"]);
	assert!(names.exists());
	names.set_values(&["a", "b"]);
	assert_eq!(h.host.soft_enum_values("names").unwrap(), ["a", "b"]);
	assert_eq!(names.values(), ["a", "b"]);
}

#[test]
#[serial]
fn soft_enum_add_and_remove() {
	let mut h = Harness::new();
	let names = h.runtime.soft_enum("targets").unwrap();
	names.set_values(&["a"]);
	names.add_values(&["b", "a", "c"]);
	names.remove_values(&["a"]);
	assert_eq!(names.values(), ["b", "c"]);
	assert_eq!(names.value_count(), 2);

	let err = h.runtime.soft_enum("targets").unwrap_err();
	assert!(matches!(
		err,
		CommandError::Construction(ConstructionError::DuplicateSoftEnum(_))
	));
}

#[test]
#[serial]
fn parser_overrides_classify_later_bindings() {
	let mut h = Harness::new();
	let early = h.runtime.raw_enum("Early").unwrap();
	early.add_values(&["A"]).unwrap();

	let string_parser = h.runtime.types().string_parser().unwrap();
	h.runtime.types_mut().set_enum_parser(string_parser);
	let late = h.runtime.raw_enum("Late").unwrap();
	late.add_values(&["B"]).unwrap();

	h.runtime
		.types_mut()
		.set_parser(NativeType::String, SimHost::default_enum_parser());
	let last = h.runtime.raw_enum("Last").unwrap();
	last.add_values(&["C"]).unwrap();

	assert_eq!(early.parser_kind(), Some(ParserKind::Int));
	assert_eq!(late.parser_kind(), Some(ParserKind::Unknown));
	assert_eq!(last.parser_kind(), Some(ParserKind::String));
	let parsed = h.host.parse_enum("Late", "b").unwrap();
	assert_eq!(late.map_value(&parsed), RawValue::Token("b".to_owned()));
}
