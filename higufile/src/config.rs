use std::path::PathBuf;

/// Options for a single conversion.
#[derive(Clone, Debug)]
pub struct Config {
	/// Directory receiving every decoded chunk, plain and masked.
	pub debug_images: Option<PathBuf>,
	/// Write portraits as separate parts plus a JSON manifest instead of composited images.
	pub bup_parts: bool,
	/// Worker threads used for saving images.
	pub threads: usize,
	/// Name of the input. Used in diagnostics, and its stem prefixes atlas tile replacements.
	pub file_name: String
}

impl Default for Config {
	fn default() -> Self {
		Self {
			debug_images: None,
			bup_parts: false,
			threads: num_cpus::get(),
			file_name: String::new()
		}
	}
}

impl Config {
	pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
		self.file_name = file_name.into();
		self
	}
}
