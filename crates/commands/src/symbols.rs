//! Symbol resolution: given a symbol name, find the host's entry point.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::Library;
use tracing::trace;

/// Looks up host entry points and statics by name.
pub trait SymbolResolver {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>>;
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for &R {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		(**self).resolve(symbol)
	}
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for Box<R> {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		(**self).resolve(symbol)
	}
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for Arc<R> {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		(**self).resolve(symbol)
	}
}

/// Resolves the exported symbols of a loaded module.
pub struct LibraryResolver {
	library: Library,
}

impl LibraryResolver {
	/// Loads the module at `path`.
	///
	/// # Safety
	///
	/// Loading runs the module's initialisers; see [`Library::new`].
	pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self, libloading::Error> {
		let library = unsafe { Library::new(path.as_ref().as_os_str()) }?;
		Ok(Self { library })
	}

	/// Resolves symbols of the running executable.
	pub fn this_process() -> Result<Self, libloading::Error> {
		#[cfg(unix)]
		let library: Library = libloading::os::unix::Library::this().into();
		#[cfg(windows)]
		let library: Library = libloading::os::windows::Library::this()?.into();
		Ok(Self { library })
	}
}

impl From<Library> for LibraryResolver {
	fn from(library: Library) -> Self {
		Self { library }
	}
}

impl SymbolResolver for LibraryResolver {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		// SAFETY: the symbol is only read as an address, never called here.
		let found = unsafe { self.library.get::<*mut c_void>(symbol.as_bytes()) };
		match found {
			Ok(address) => NonNull::new(*address),
			Err(err) => {
				trace!(symbol, %err, "symbol not exported");
				None
			}
		}
	}
}

/// Renames symbols before handing them to another resolver.
pub struct OverrideResolver<R> {
	inner: R,
	renames: BTreeMap<String, String>,
}

impl<R: SymbolResolver> OverrideResolver<R> {
	pub fn new(inner: R, renames: BTreeMap<String, String>) -> Self {
		Self { inner, renames }
	}

	pub fn inner(&self) -> &R {
		&self.inner
	}
}

impl<R: SymbolResolver> SymbolResolver for OverrideResolver<R> {
	fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
		let target = self.renames.get(symbol).map_or(symbol, String::as_str);
		self.inner.resolve(target)
	}
}

#[cfg(test)]
mod tests {
	use rustc_hash::FxHashMap;

	use super::*;

	struct Table(FxHashMap<&'static str, usize>);

	impl SymbolResolver for Table {
		fn resolve(&self, symbol: &str) -> Option<NonNull<c_void>> {
			self.0.get(symbol).and_then(|addr| NonNull::new(*addr as *mut c_void))
		}
	}

	#[test]
	fn renames_apply_before_lookup() {
		let table = Table(FxHashMap::from_iter([("?mangled@@", 0x1000), ("plain", 0x2000)]));
		let resolver = OverrideResolver::new(
			table,
			BTreeMap::from([("friendly".to_owned(), "?mangled@@".to_owned())]),
		);
		assert_eq!(resolver.resolve("friendly").map(|p| p.as_ptr() as usize), Some(0x1000));
		assert_eq!(resolver.resolve("plain").map(|p| p.as_ptr() as usize), Some(0x2000));
		assert!(resolver.resolve("?mangled@@").is_some());
		assert!(resolver.resolve("missing").is_none());
	}

	#[test]
	fn this_process_misses_unknown_symbols() {
		let resolver = LibraryResolver::this_process().unwrap();
		assert!(resolver.resolve("splice_definitely_not_exported_symbol").is_none());
	}
}
