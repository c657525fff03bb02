//! Runtime configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use splice_abi::layout::{LayoutProfile, RegistryOverrides};
use tracing::debug;

use crate::error::{ConfigError, LayoutError, Result};

/// Settings read from TOML.
///
/// ```toml
/// host_version = "1.17.30"
/// warn_on_builtin_enum_extension = true
///
/// [layout.registry]
/// enums = 216
///
/// [symbols]
/// "CommandRegistry::registerCommand" = "?registerCommand@CommandRegistry@@..."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpliceConfig {
	/// Selects the built-in layout profile.
	pub host_version: String,
	/// Log a warning when a mapped enum adds values to an enum the host defined.
	pub warn_on_builtin_enum_extension: bool,
	pub layout: LayoutConfig,
	/// Symbol renames, from the name this crate asks for to the name the host exports.
	pub symbols: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
	pub registry: RegistryOverrides,
}

impl Default for SpliceConfig {
	fn default() -> Self {
		Self {
			host_version: LayoutProfile::CURRENT.host_version.to_owned(),
			warn_on_builtin_enum_extension: true,
			layout: LayoutConfig::default(),
			symbols: BTreeMap::new(),
		}
	}
}

impl SpliceConfig {
	pub fn from_toml_str(source: &str) -> Result<Self> {
		Ok(toml::from_str(source).map_err(ConfigError::from)?)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_owned(),
			source,
		})?;
		debug!(path = %path.display(), "loading splice config");
		Self::from_toml_str(&source)
	}

	/// Built-in profile for `host_version` with registry overrides applied, verified
	/// against the compiled records.
	///
	/// An unknown version is accepted only when the overrides name every registry
	/// field; record layouts then come from the current profile.
	pub fn layout_profile(&self) -> Result<LayoutProfile> {
		let overrides = &self.layout.registry;
		let profile = match LayoutProfile::for_version(&self.host_version) {
			Some(mut profile) => {
				profile.registry.apply(overrides);
				profile
			}
			None => {
				let registry = overrides
					.complete()
					.ok_or_else(|| LayoutError::UnknownHostVersion(self.host_version.clone()))?;
				LayoutProfile {
					host_version: "custom",
					registry,
					..LayoutProfile::CURRENT
				}
			}
		};
		profile.verify()?;
		Ok(profile)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;
	use crate::CommandError;

	#[test]
	fn empty_source_is_the_default() {
		assert_eq!(SpliceConfig::from_toml_str("").unwrap(), SpliceConfig::default());
	}

	#[test]
	fn overrides_and_renames_are_read() {
		let config = SpliceConfig::from_toml_str(
			r#"
			host_version = "1.17.30"
			warn_on_builtin_enum_extension = false

			[layout.registry]
			soft_enums = 496
			soft_enum_lookup = 520

			[symbols]
			"CommandRegistry::findCommand" = "?findCommand@CommandRegistry@@QEAAPEAUSignature@1@AEBV?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@@Z"
			"#,
		)
		.unwrap();
		assert!(!config.warn_on_builtin_enum_extension);
		assert_eq!(config.symbols.len(), 1);
		let profile = config.layout_profile().unwrap();
		assert_eq!(profile.registry.soft_enums, 496);
		assert_eq!(profile.registry.enums, 216);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = SpliceConfig::from_toml_str("host_versoin = \"1.17.30\"").unwrap_err();
		assert!(matches!(err, CommandError::Config(ConfigError::Parse(_))));
	}

	#[test]
	fn unknown_version_needs_full_registry_table() {
		let config = SpliceConfig {
			host_version: "9.9.9".into(),
			..SpliceConfig::default()
		};
		assert!(matches!(
			config.layout_profile(),
			Err(CommandError::Layout(LayoutError::UnknownHostVersion(v))) if v == "9.9.9"
		));

		let mut config = config;
		config.layout.registry = RegistryOverrides {
			enum_values: Some(0),
			enums: Some(24),
			enum_lookup: Some(48),
			enum_value_lookup: Some(64),
			command_symbols: Some(80),
			signatures: Some(104),
			soft_enums: Some(120),
			soft_enum_lookup: Some(144),
		};
		assert_eq!(config.layout_profile().unwrap().registry.extent(), 160);
	}

	#[test]
	fn overlapping_overrides_fail_verification() {
		let mut config = SpliceConfig::default();
		config.layout.registry.enums = Some(200);
		assert!(matches!(config.layout_profile(), Err(CommandError::Layout(LayoutError::Mismatch(_)))));
	}

	#[test]
	fn load_reads_from_disk() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "warn_on_builtin_enum_extension = false").unwrap();
		let config = SpliceConfig::load(file.path()).unwrap();
		assert!(!config.warn_on_builtin_enum_extension);

		let missing = SpliceConfig::load(file.path().with_extension("missing"));
		assert!(matches!(missing, Err(CommandError::Config(ConfigError::Io { .. }))));
	}
}
