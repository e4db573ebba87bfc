use std::io::{Read, Seek};
use bytes::BufMut;
use log::debug;
use rayon::prelude::*;
use crate::{
	chunk::ChunkHeader,
	error::{Error, Result},
	image::{MaskRect, Point, RawImage, Size},
	pixels::encode_chunk,
	source::Source
};
use super::{align_to, HeaderLayout};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct PicEntry {
	pub x: u16,
	pub y: u16,
	pub offset: u32,
	/// Only stored on Switch.
	pub size: u32
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PicHeader {
	pub layout: HeaderLayout,
	pub filesize: u32,
	pub ew: u16,
	pub eh: u16,
	pub width: u16,
	pub height: u16,
	pub unk1: u32,
	/// Switch only.
	pub unk2: u32,
	/// Switch version 3 and up have 4 more bytes before the table.
	pub extra: [u8; 4],
	pub chunks: Vec<PicEntry>
}

impl PicHeader {
	pub fn read<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<Self> {
		src.seek_to(4)?;
		if layout.is_switch() {
			src.skip(4, "version")?;
		}
		let filesize = src.read_u32("file size")?;
		let ew = src.read_u16("ew")?;
		let eh = src.read_u16("eh")?;
		let width = src.read_u16("width")?;
		let height = src.read_u16("height")?;
		let unk1 = src.read_u32("unk1")?;
		let count = src.read_u32("chunk count")?;
		let mut unk2 = 0;
		let mut extra = [0; 4];
		if layout.is_switch() {
			unk2 = src.read_u32("unk2")?;
			if layout.version().is_some_and(|v| v >= 3) {
				extra = src.read_array("extended header")?;
			}
		}
		let mut chunks = Vec::new();
		for _ in 0..count {
			let x = src.read_u16("chunk x")?;
			let y = src.read_u16("chunk y")?;
			let offset = src.read_u32("chunk offset")?;
			let size = if layout.is_switch() {src.read_u32("chunk size")?} else {0};
			chunks.push(PicEntry {x, y, offset, size});
		}
		debug!("picture {width}x{height} with {count} chunks, {layout:?}");
		Ok(Self {layout, filesize, ew, eh, width, height, unk1, unk2, extra, chunks})
	}

	pub fn size(&self) -> Size {
		Size::new(self.width as u32, self.height as u32)
	}

	fn has_extra(&self) -> bool {
		self.layout.version().is_some_and(|v| v >= 3)
	}

	pub fn table_end(&self) -> usize {
		let (header_len, entry_len) = if self.layout.is_switch() {(32, 12)} else {(24, 8)};
		let extra = if self.has_extra() {4} else {0};
		header_len + extra + entry_len * self.chunks.len()
	}

	pub fn write(&self, out: &mut impl BufMut) {
		out.put_slice(b"PIC4");
		if let Some(version) = self.layout.version() {
			out.put_u32_le(version);
		}
		out.put_u32_le(self.filesize);
		out.put_u16_le(self.ew);
		out.put_u16_le(self.eh);
		out.put_u16_le(self.width);
		out.put_u16_le(self.height);
		out.put_u32_le(self.unk1);
		out.put_u32_le(self.chunks.len() as u32);
		if self.layout.is_switch() {
			out.put_u32_le(self.unk2);
			if self.has_extra() {
				out.put_slice(&self.extra);
			}
		}
		for chunk in &self.chunks {
			out.put_u16_le(chunk.x);
			out.put_u16_le(chunk.y);
			out.put_u32_le(chunk.offset);
			if self.layout.is_switch() {
				out.put_u32_le(chunk.size);
			}
		}
	}
}

/// Re-encodes every chunk from `replacement`, which must match the canvas size, and lays the
/// file out again: chunks start at the first 16-byte boundary after the table and follow each
/// other directly.
pub fn rebuild<R: Read + Seek>(src: &mut Source<R>, header: &PicHeader, replacement: &RawImage) -> Result<Vec<u8>> {
	if replacement.size() != header.size() {
		return Err(Error::format(format!(
			"replacement is {}x{} but the picture is {}x{}", replacement.width, replacement.height, header.width, header.height
		)));
	}
	let mut originals = Vec::with_capacity(header.chunks.len());
	for entry in &header.chunks {
		src.seek_to(entry.offset as u64)?;
		originals.push(ChunkHeader::read(src)?);
	}
	let is_switch = header.layout.is_switch();
	let encoded = header.chunks.par_iter().zip(&originals).map(|(entry, original)| {
		let (x, y) = (entry.x as u32, entry.y as u32);
		let region = replacement.cropped(MaskRect::new(x, y, x + original.w as u32, y + original.h as u32));
		encode_chunk(&region, MaskRect::covering(region.size()), Point::new(original.x as u32, original.y as u32), is_switch)
	}).collect::<Result<Vec<_>>>()?;

	let mut new_header = header.clone();
	let mut body = Vec::new();
	let start = align_to(header.table_end(), 16);
	for (entry, (chunk_header, payload)) in new_header.chunks.iter_mut().zip(&encoded) {
		let offset = start + body.len();
		chunk_header.write(&mut body);
		body.extend_from_slice(payload);
		entry.offset = offset as u32;
		if is_switch {
			entry.size = (start + body.len() - offset) as u32;
		}
	}
	let total = start + body.len();
	new_header.filesize = u32::try_from(total).map_err(|_| Error::format("rebuilt picture does not fit in 4 GiB"))?;
	let mut out = Vec::with_capacity(total);
	new_header.write(&mut out);
	out.resize(start, 0);
	out.extend_from_slice(&body);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use rstest::rstest;
	use super::*;

	fn sample(layout: HeaderLayout) -> PicHeader {
		PicHeader {
			layout,
			filesize: 0,
			ew: 640, eh: 480, width: 320, height: 240,
			unk1: 7,
			unk2: if layout.is_switch() {9} else {0},
			extra: if layout.version().is_some_and(|v| v >= 3) {[1, 2, 3, 4]} else {[0; 4]},
			chunks: vec![
				PicEntry {x: 0, y: 0, offset: 64, size: if layout.is_switch() {100} else {0}},
				PicEntry {x: 256, y: 0, offset: 164, size: if layout.is_switch() {48} else {0}}
			]
		}
	}

	#[rstest]
	#[case::ps3(HeaderLayout::Ps3, 40)]
	#[case::switch(HeaderLayout::Switch {version: 2}, 56)]
	#[case::switch_extended(HeaderLayout::Switch {version: 3}, 60)]
	fn header_reads_back(#[case] layout: HeaderLayout, #[case] table_end: usize) {
		let header = sample(layout);
		let mut out = Vec::new();
		header.write(&mut out);
		assert_eq!(out.len(), table_end);
		assert_eq!(header.table_end(), table_end);
		let mut src = Source::new(Cursor::new(out)).unwrap();
		assert_eq!(PicHeader::read(&mut src, layout).unwrap(), header);
	}

	#[test]
	fn truncated_table_is_an_error() {
		let header = sample(HeaderLayout::Ps3);
		let mut out = Vec::new();
		header.write(&mut out);
		out.truncate(out.len() - 2);
		assert!(PicHeader::read(&mut Source::new(Cursor::new(out)).unwrap(), HeaderLayout::Ps3).is_err());
	}

	#[test]
	fn rebuild_rejects_wrong_size() {
		let header = sample(HeaderLayout::Ps3);
		let mut src = Source::new(Cursor::new(Vec::new())).unwrap();
		assert!(rebuild(&mut src, &header, &RawImage::empty(Size::new(2, 2))).is_err());
	}
}
