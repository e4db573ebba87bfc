use std::io::{Read, Seek};
use log::debug;
use crate::{
	error::{Error, Result},
	image::Size,
	lz77,
	source::Source
};
use super::HeaderLayout;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Msk3Header {
	pub layout: HeaderLayout,
	pub width: u16,
	pub height: u16,
	pub compressed_size: u32
}

impl Msk3Header {
	pub fn read<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<Self> {
		src.seek_to(4)?;
		if layout.is_switch() {
			src.skip(4, "version")?;
		}
		src.skip(4, "file size")?;
		let width = src.read_u16("width")?;
		let height = src.read_u16("height")?;
		let compressed_size = src.read_u32("compressed size")?;
		if layout.is_switch() {
			src.skip(12, "unknown header words")?;
		}
		Ok(Self {layout, width, height, compressed_size})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Msk4Header {
	pub width: u16,
	pub height: u16,
	pub data_offset: u32,
	pub data_size: u32
}

impl Msk4Header {
	pub fn read<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<Self> {
		if !layout.is_switch() {
			return Err(Error::Unsupported("PS3 MSK4 decoding"));
		}
		src.seek_to(16)?;
		let width = src.read_u16("width")?;
		let height = src.read_u16("height")?;
		let data_offset = src.read_u32("data offset")?;
		let data_size = src.read_u32("data size")?;
		Ok(Self {width, height, data_offset, data_size})
	}
}

fn expand(packed: &[u8], size: Size, is_switch: bool) -> Result<Vec<u8>> {
	let mask = lz77::decompress(packed, is_switch)?;
	if mask.len() != size.area() {
		return Err(Error::corrupt(format!("expected {} mask bytes but got {}", size.area(), mask.len())));
	}
	Ok(mask)
}

/// Grayscale mask, one byte per pixel. The payload follows the header directly.
pub fn decode_msk3<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<(Size, Vec<u8>)> {
	let header = Msk3Header::read(src, layout)?;
	let size = Size::new(header.width as u32, header.height as u32);
	debug!("mask {}x{}, {} compressed bytes", size.width, size.height, header.compressed_size);
	let packed = src.read_vec(header.compressed_size as usize, "mask data")?;
	Ok((size, expand(&packed, size, layout.is_switch())?))
}

/// The payload sits at the data offset behind its own 4-byte length and always uses the Switch
/// nibble order.
pub fn decode_msk4<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<(Size, Vec<u8>)> {
	let header = Msk4Header::read(src, layout)?;
	let size = Size::new(header.width as u32, header.height as u32);
	let len = header.data_size.checked_sub(4).ok_or_else(|| {
		Error::format(format!("mask data size {} can not hold its length prefix", header.data_size))
	})?;
	debug!("mask {}x{} at {:#x}, {} compressed bytes", size.width, size.height, header.data_offset, len);
	let packed = src.read_vec_at(header.data_offset as u64 + 4, len as usize, "mask data")?;
	Ok((size, expand(&packed, size, true)?))
}
