use std::{io::{Read, Seek}, path::Path};
use bytes::BufMut;
use log::debug;
use crate::{
	error::{Error, Result},
	image::{MaskRect, Point, RawImage, Size},
	lz77,
	pixels::{self, PALETTE_BYTES},
	png_io,
	source::Source
};

pub const CHUNK_HEADER_LEN: usize = 20;
const MASK_RECT_LEN: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum ChunkType {
	ColorAlt = 0,
	Color = 1,
	IndexedAlpha = 2,
	#[default]
	Indexed = 3
}

impl TryFrom<u16> for ChunkType {
	type Error = Error;

	fn try_from(value: u16) -> Result<Self> {
		Ok(match value {
			0 => Self::ColorAlt,
			1 => Self::Color,
			2 => Self::IndexedAlpha,
			3 => Self::Indexed,
			_ => return Err(Error::format(format!("unknown chunk type {value}")))
		})
	}
}

impl ChunkType {
	pub fn is_indexed(self) -> bool {
		matches!(self, Self::Indexed | Self::IndexedAlpha)
	}
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct ChunkHeader {
	pub kind: ChunkType,
	pub masks: Vec<MaskRect>,
	/// Regions that may contain partially transparent pixels.
	pub transparent_masks: Vec<MaskRect>,
	pub alignment_words: u16,
	pub x: u16,
	pub y: u16,
	pub w: u16,
	pub h: u16,
	/// Compressed payload length; 0 means stored uncompressed and indexed.
	pub size: u32
}

fn read_mask_rects<R: Read + Seek>(src: &mut Source<R>, count: u16) -> Result<Vec<MaskRect>> {
	let mut out = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let x1 = src.read_u16("mask x1")? as u32;
		let y1 = src.read_u16("mask y1")? as u32;
		let x2 = src.read_u16("mask x2")? as u32;
		let y2 = src.read_u16("mask y2")? as u32;
		out.push(MaskRect::new(x1, y1, x2, y2));
	}
	Ok(out)
}

impl ChunkHeader {
	pub fn read<R: Read + Seek>(src: &mut Source<R>) -> Result<Self> {
		let kind = src.read_u16("chunk type")?;
		let mask_count = src.read_u16("mask count")?;
		let transparent_mask_count = src.read_u16("transparent mask count")?;
		let alignment_words = src.read_u16("alignment words")?;
		let x = src.read_u16("chunk x")?;
		let y = src.read_u16("chunk y")?;
		let w = src.read_u16("chunk width")?;
		let h = src.read_u16("chunk height")?;
		let size = src.read_u32("chunk size")?;
		let masks = read_mask_rects(src, mask_count)?;
		let transparent_masks = read_mask_rects(src, transparent_mask_count)?;
		src.skip(alignment_words as u64 * 2, "chunk header padding")?;
		Ok(Self {
			kind: ChunkType::try_from(kind)?,
			masks, transparent_masks, alignment_words, x, y, w, h, size
		})
	}

	/// Sets `alignment_words` so the serialized header ends on a 16-byte boundary and returns
	/// that serialized length.
	pub fn calc_alignment_get_bin_size(&mut self) -> usize {
		let unpadded = CHUNK_HEADER_LEN + MASK_RECT_LEN * (self.masks.len() + self.transparent_masks.len());
		let padded = unpadded.next_multiple_of(16);
		self.alignment_words = ((padded - unpadded) / 2) as u16;
		padded
	}

	pub fn write(&self, out: &mut impl BufMut) {
		out.put_u16_le(self.kind as u16);
		out.put_u16_le(self.masks.len() as u16);
		out.put_u16_le(self.transparent_masks.len() as u16);
		out.put_u16_le(self.alignment_words);
		out.put_u16_le(self.x);
		out.put_u16_le(self.y);
		out.put_u16_le(self.w);
		out.put_u16_le(self.h);
		out.put_u32_le(self.size);
		for mask in self.masks.iter().chain(&self.transparent_masks) {
			out.put_u16_le(mask.x1 as u16);
			out.put_u16_le(mask.y1 as u16);
			out.put_u16_le(mask.x2 as u16);
			out.put_u16_le(mask.y2 as u16);
		}
		out.put_bytes(0, self.alignment_words as usize * 2);
	}

	pub fn size(&self) -> Size {
		Size::new(self.w as u32, self.h as u32)
	}

	pub fn position(&self) -> Point {
		Point::new(self.x as u32, self.y as u32)
	}

	/// Both mask lists, in the order they are drawn.
	pub fn all_masks(&self) -> Vec<MaskRect> {
		self.masks.iter().chain(&self.transparent_masks).cloned().collect()
	}
}

pub struct DecodedChunk {
	/// At the aligned size, so possibly wider than the header says.
	pub image: RawImage,
	pub masks: Vec<MaskRect>,
	pub position: Point
}

fn decode_body<R: Read + Seek>(src: &mut Source<R>, size: u32, kind: ChunkType, logical: Size, name: &str, is_switch: bool) -> Result<RawImage> {
	let aligned = logical.aligned();
	if size == 0 {
		if kind != ChunkType::Indexed {
			return Err(Error::corrupt(format!("{name} is stored uncompressed but has type {kind:?} instead of indexed")));
		}
		let raw = src.read_vec(PALETTE_BYTES + aligned.area(), "uncompressed chunk")?;
		return Ok(pixels::decode_indexed(&raw, aligned, is_switch)?.0);
	}
	let packed = src.read_vec(size as usize, "compressed chunk")?;
	let bytes = lz77::decompress(&packed, is_switch).map_err(|e| match e {
		Error::CorruptStream(msg) => Error::corrupt(format!("{name}: {msg}")),
		e => e
	})?;
	if kind.is_indexed() {
		Ok(pixels::decode_indexed(&bytes, aligned, is_switch)?.0)
	} else {
		Ok(pixels::decode_direct(&bytes, aligned, is_switch))
	}
}

fn write_debug_images(dir: &Path, name: &str, header: &ChunkHeader, chunk: &DecodedChunk) -> Result<()> {
	debug!(
		"{name}: type {:?}, {} masks, {} transparent masks, {} alignment words, at {},{} size {}x{}, {} bytes",
		header.kind, header.masks.len(), header.transparent_masks.len(), header.alignment_words, header.x, header.y, header.w, header.h, header.size
	);
	png_io::write_rgba(&dir.join(format!("{name}.png")), &chunk.image)?;
	let mut masked = RawImage::empty(chunk.image.size());
	chunk.image.draw_onto(&mut masked, Point::default(), &chunk.masks)?;
	png_io::write_rgba(&dir.join(format!("{name}_masked.png")), &masked)
}

/// Decodes the chunk whose header starts at `offset`.
pub fn decode_chunk<R: Read + Seek>(src: &mut Source<R>, offset: u64, name: &str, is_switch: bool, debug_images: Option<&Path>) -> Result<DecodedChunk> {
	src.seek_to(offset)?;
	let header = ChunkHeader::read(src)?;
	let image = decode_body(src, header.size, header.kind, header.size(), name, is_switch)?;
	let chunk = DecodedChunk {image, masks: header.all_masks(), position: header.position()};
	if let Some(dir) = debug_images {
		write_debug_images(dir, name, &header, &chunk)?;
	}
	Ok(chunk)
}

/// Decodes a chunk without a header, as atlas tiles are stored.
pub fn decode_headerless_chunk<R: Read + Seek>(src: &mut Source<R>, offset: u64, length: u32, indexed: bool, size: Size, name: &str, is_switch: bool) -> Result<RawImage> {
	src.seek_to(offset)?;
	let kind = if indexed {ChunkType::Indexed} else {ChunkType::Color};
	decode_body(src, length, kind, size, name, is_switch)
}
