use std::{collections::HashMap, io::{Read, Seek}};
use bytes::BufMut;
use log::debug;
use rayon::prelude::*;
use crate::{
	error::{Error, Result},
	image::{RawImage, Size},
	pixels::{encode_direct_tile, encode_indexed_tile, PALETTE_BYTES},
	source::Source
};
use super::{align_to, decode_name, encode_name, HeaderLayout};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxaTile {
	pub index: u16,
	pub width: u16,
	pub height: u16,
	pub offset: u32,
	/// Compressed length, or 0 for an uncompressed indexed tile.
	pub length: u32,
	/// Switch only.
	pub unk: u32,
	pub name: String
}

impl TxaTile {
	pub fn size(&self) -> Size {
		Size::new(self.width as u32, self.height as u32)
	}

	/// Bytes the tile occupies in the file.
	pub fn stored_len(&self) -> usize {
		if self.length == 0 {
			PALETTE_BYTES + self.size().aligned().area()
		} else {
			self.length as usize
		}
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxaHeader {
	pub layout: HeaderLayout,
	pub size: u32,
	pub indexed: bool,
	/// Largest decompressed tile.
	pub dec_size: u32,
	/// Three words on PS3, two on Switch.
	pub unk: [u32; 3],
	pub tiles: Vec<TxaTile>
}

const HEADER_LEN: usize = 32;

impl TxaHeader {
	fn record_len(&self) -> usize {
		if self.layout.is_switch() {20} else {16}
	}

	pub fn read<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<Self> {
		src.seek_to(4)?;
		if layout.is_switch() {
			src.skip(4, "version")?;
		}
		let size = src.read_u32("file size")?;
		let indexed = src.read_u32("indexed flag")? != 0;
		let count = src.read_u32("tile count")?;
		let dec_size = src.read_u32("decompressed size")?;
		let mut unk = [0; 3];
		let unk_count = if layout.is_switch() {2} else {3};
		for word in &mut unk[..unk_count] {
			*word = src.read_u32("unknown header word")?;
		}
		let mut header = Self {layout, size, indexed, dec_size, unk, tiles: Vec::new()};
		for _ in 0..count {
			let header_len = src.read_u16("tile header length")? as usize;
			let index = src.read_u16("tile index")?;
			let width = src.read_u16("tile width")?;
			let height = src.read_u16("tile height")?;
			let offset = src.read_u32("tile offset")?;
			let length = src.read_u32("tile length")?;
			let unk = if layout.is_switch() {src.read_u32("tile unknown word")?} else {0};
			let name_len = header_len.checked_sub(header.record_len()).ok_or_else(|| {
				Error::format(format!("tile {index} header length {header_len} is shorter than its record"))
			})?;
			let name = decode_name(&src.read_vec(name_len, "tile name")?);
			header.tiles.push(TxaTile {index, width, height, offset, length, unk, name});
		}
		debug!("atlas with {count} tiles, indexed: {indexed}, {layout:?}");
		Ok(header)
	}

	pub fn write(&self, out: &mut impl BufMut) -> Result<()> {
		out.put_slice(b"TXA4");
		if let Some(version) = self.layout.version() {
			out.put_u32_le(version);
		}
		out.put_u32_le(self.size);
		out.put_u32_le(self.indexed as u32);
		out.put_u32_le(self.tiles.len() as u32);
		out.put_u32_le(self.dec_size);
		let unk_count = if self.layout.is_switch() {2} else {3};
		for word in &self.unk[..unk_count] {
			out.put_u32_le(*word);
		}
		for tile in &self.tiles {
			let name = padded_name(&tile.name)?;
			out.put_u16_le((self.record_len() + name.len()) as u16);
			out.put_u16_le(tile.index);
			out.put_u16_le(tile.width);
			out.put_u16_le(tile.height);
			out.put_u32_le(tile.offset);
			out.put_u32_le(tile.length);
			if self.layout.is_switch() {
				out.put_u32_le(tile.unk);
			}
			out.put_slice(&name);
		}
		Ok(())
	}

	pub fn table_end(&self) -> Result<usize> {
		let mut end = HEADER_LEN;
		for tile in &self.tiles {
			end += self.record_len() + padded_name(&tile.name)?.len();
		}
		Ok(end)
	}

	fn decompressed_len(&self, tile: &TxaTile) -> usize {
		let area = tile.size().aligned().area();
		if self.indexed {PALETTE_BYTES + area} else {area * 4}
	}
}

/// Shift-JIS name with a NUL terminator, padded to 4 bytes.
fn padded_name(name: &str) -> Result<Vec<u8>> {
	let mut bytes = encode_name(name)?;
	bytes.push(0);
	bytes.resize(align_to(bytes.len(), 4), 0);
	Ok(bytes)
}

/// Tiles decode at their 4-aligned width, so a replacement of exactly that size keeps the
/// recorded width.
fn replaced_size(tile: &TxaTile, image: &RawImage) -> Result<(u16, u16)> {
	if image.size() == tile.size().aligned() {
		return Ok((tile.width, tile.height));
	}
	let width = u16::try_from(image.width).map_err(|_| Error::format(format!("tile {} is too wide", tile.name)))?;
	let height = u16::try_from(image.height).map_err(|_| Error::format(format!("tile {} is too tall", tile.name)))?;
	Ok((width, height))
}

/// Re-encodes the tiles found in `replacements` (keyed by tile name) and keeps the stored bytes of
/// every other tile. Tiles are 16-byte aligned after the table.
pub fn rebuild<R: Read + Seek>(src: &mut Source<R>, header: &TxaHeader, replacements: &HashMap<String, RawImage>) -> Result<Vec<u8>> {
	let is_switch = header.layout.is_switch();
	let mut kept = Vec::with_capacity(header.tiles.len());
	for tile in &header.tiles {
		kept.push(if replacements.contains_key(&tile.name) {
			None
		} else {
			Some(src.read_vec_at(tile.offset as u64, tile.stored_len(), "tile data")?)
		});
	}
	let encoded = header.tiles.par_iter().zip(kept).map(|(tile, kept)| match kept {
		Some(bytes) => Ok((tile.length, bytes)),
		None => {
			let image = &replacements[&tile.name];
			if header.indexed {
				encode_indexed_tile(image, is_switch, &tile.name)
			} else {
				let packed = encode_direct_tile(image, is_switch);
				Ok((packed.len() as u32, packed))
			}
		}
	}).collect::<Result<Vec<_>>>()?;

	let mut new_header = header.clone();
	for tile in &mut new_header.tiles {
		if let Some(image) = replacements.get(&tile.name) {
			(tile.width, tile.height) = replaced_size(tile, image)?;
		}
	}
	let mut cursor = align_to(new_header.table_end()?, 16);
	for (tile, (length, bytes)) in new_header.tiles.iter_mut().zip(&encoded) {
		tile.offset = cursor as u32;
		tile.length = *length;
		cursor = align_to(cursor + bytes.len(), 16);
	}
	new_header.dec_size = new_header.tiles.iter().map(|t| new_header.decompressed_len(t)).max().unwrap_or(0) as u32;
	new_header.size = u32::try_from(cursor).map_err(|_| Error::format("rebuilt atlas does not fit in 4 GiB"))?;

	let mut out = Vec::with_capacity(cursor);
	new_header.write(&mut out)?;
	for (tile, (_, bytes)) in new_header.tiles.iter().zip(&encoded) {
		out.resize(tile.offset as usize, 0);
		out.extend_from_slice(bytes);
	}
	out.resize(cursor, 0);
	Ok(out)
}
