use std::io::{Read, Seek};
use encoding_rs::SHIFT_JIS;
use log::warn;
use crate::{error::{Error, Result}, source::Source};

pub mod pic;
pub mod bup;
pub mod txa;
pub mod msk;

/// Field arrangement of a container header. Switch files carry a version after the magic and
/// the file size after that; PS3 files put the size right after the magic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeaderLayout {
	Ps3,
	Switch {version: u32},
	/// Switch portraits with variable-length expression records.
	SwitchV4 {version: u32}
}

impl HeaderLayout {
	pub fn detect<R: Read + Seek>(src: &mut Source<R>, file_name: &str) -> Result<Self> {
		let first = src.get_u32_at(4, "size or version")?;
		let second = src.get_u32_at(8, "size")?;
		src.seek_to(0)?;
		let len = src.len();
		if second as u64 == len {
			Ok(Self::from_version(first))
		} else {
			if first as u64 != len {
				warn!("failed to autodetect file type of {file_name}, guessing PS3");
			}
			Ok(Self::Ps3)
		}
	}

	pub fn from_version(version: u32) -> Self {
		if version >= 4 {
			Self::SwitchV4 {version}
		} else {
			Self::Switch {version}
		}
	}

	pub fn is_switch(self) -> bool {
		!matches!(self, Self::Ps3)
	}

	pub fn version(self) -> Option<u32> {
		match self {
			Self::Ps3 => None,
			Self::Switch {version} | Self::SwitchV4 {version} => Some(version)
		}
	}
}

/// Shift-JIS bytes up to the first NUL.
pub fn decode_name(bytes: &[u8]) -> String {
	let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
	let (name, had_errors) = SHIFT_JIS.decode_without_bom_handling(&bytes[..end]);
	if had_errors {
		warn!("name {name:?} is not valid Shift-JIS, unknown characters were replaced");
	}
	name.into_owned()
}

pub fn encode_name(name: &str) -> Result<Vec<u8>> {
	let (bytes, _, had_errors) = SHIFT_JIS.encode(name);
	if had_errors {
		return Err(Error::format(format!("name {name:?} can not be represented in Shift-JIS")));
	}
	Ok(bytes.into_owned())
}

pub(crate) fn align_to(value: usize, alignment: usize) -> usize {
	value.next_multiple_of(alignment)
}
