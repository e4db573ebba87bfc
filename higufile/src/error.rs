use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("unknown magic '{0}'")]
	UnknownMagic(String),
	#[error("{0}")]
	Format(String),
	#[error("unsupported: {0}")]
	Unsupported(&'static str),
	#[error("corrupt chunk stream: {0}")]
	CorruptStream(String),
	#[error("{name} has more than 256 distinct colors and the target format has no non-indexed fallback")]
	TooManyColors {
		name: String
	},
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("png encoding failed: {0}")]
	PngEncode(#[from] png::EncodingError),
	#[error("png decoding failed: {0}")]
	Image(#[from] image::ImageError),
	#[error("could not write parts manifest: {0}")]
	Json(#[from] serde_json::Error)
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	#[cold]
	pub(crate) fn format(msg: impl Into<String>) -> Self {
		Self::Format(msg.into())
	}

	#[cold]
	pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
		Self::CorruptStream(msg.into())
	}
}
