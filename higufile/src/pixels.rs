use std::collections::HashMap;
use log::warn;
use crate::{
	chunk::{ChunkHeader, ChunkType},
	error::{Error, Result},
	image::{MaskRect, Pixel, Point, RawImage, Size},
	lz77::Compressor
};

/// Entries in every stored palette, used or not.
pub const PALETTE_LEN: usize = 256;
pub const PALETTE_BYTES: usize = PALETTE_LEN * 4;

/// Palette lookup, then the optional alpha plane overrides. Returns whether that plane was present.
/// `size` must already be aligned.
pub fn decode_indexed(bytes: &[u8], size: Size, is_switch: bool) -> Result<(RawImage, bool)> {
	let area = size.area();
	if bytes.len() < PALETTE_BYTES + area {
		return Err(Error::corrupt(format!(
			"indexed {}x{} chunk needs at least {} bytes, got {}", size.width, size.height, PALETTE_BYTES + area, bytes.len()
		)));
	}
	let (palette, rest) = bytes.split_at(PALETTE_BYTES);
	let palette: &[Pixel] = bytemuck::cast_slice(palette);
	let (indices, alpha) = rest.split_at(area);
	let mut pixels: Vec<Pixel> = indices.iter().map(|i| palette[*i as usize]).collect();
	if alpha.len() > area {
		warn!("indexed chunk carries {} bytes past its alpha plane, ignoring them", alpha.len() - area);
	}
	for (p, a) in pixels.iter_mut().zip(alpha) {
		p.a = *a;
	}
	let mut image = RawImage::from_pixels(size, pixels);
	if !is_switch {
		image.swap_red_blue();
	}
	Ok((image, !alpha.is_empty()))
}

/// Every byte past the first scanline is a delta against the byte one scanline above it.
pub fn decode_direct(bytes: &[u8], size: Size, is_switch: bool) -> RawImage {
	let mut image = RawImage::empty(size);
	let out: &mut [u8] = bytemuck::cast_slice_mut(&mut image.pixels);
	if bytes.len() < out.len() {
		warn!("decompressed too little data for chunk, have {} but need {} bytes", bytes.len(), out.len());
	} else if bytes.len() > out.len() {
		warn!("decompressed too much data for chunk, have {} but only need {} bytes", bytes.len(), out.len());
	}
	let scanline = (size.width as usize * 4).min(out.len());
	let available = bytes.len().min(out.len());
	let first = scanline.min(available);
	out[..first].copy_from_slice(&bytes[..first]);
	for i in scanline..out.len() {
		let delta = if i < available {bytes[i]} else {0};
		out[i] = out[i - scanline].wrapping_add(delta);
	}
	if !is_switch {
		image.swap_red_blue();
	}
	image
}

pub fn encode_direct_deltas(image: &RawImage) -> Vec<u8> {
	let src = image.as_rgba_bytes();
	let scanline = image.width as usize * 4;
	let mut out = src.to_vec();
	for i in scanline..src.len() {
		out[i] = src[i].wrapping_sub(src[i - scanline]);
	}
	out
}

/// Colors in first-seen order, at most 256 of them.
pub struct Palette {
	colors: Vec<Pixel>,
	lookup: HashMap<Pixel, u8>,
	ignore_alpha: bool
}

impl Palette {
	fn build(image: &RawImage, ignore_alpha: bool) -> Option<Self> {
		let mut colors = Vec::new();
		let mut lookup = HashMap::new();
		for p in image.pixels.iter() {
			let key = if ignore_alpha {p.without_alpha()} else {*p};
			if !lookup.contains_key(&key) {
				if colors.len() == PALETTE_LEN {
					return None;
				}
				lookup.insert(key, colors.len() as u8);
				colors.push(key);
			}
		}
		Some(Self {colors, lookup, ignore_alpha})
	}

	/// Full RGBA palette, if the image has few enough distinct colors.
	pub fn exact(image: &RawImage) -> Option<Self> {
		Self::build(image, false)
	}

	/// Palette of colors compared without alpha, for use with a separate alpha plane.
	pub fn alpha_stripped(image: &RawImage) -> Option<Self> {
		Self::build(image, true)
	}

	pub fn len(&self) -> usize {
		self.colors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.colors.is_empty()
	}

	/// Palette table, index plane, then the alpha plane if this palette ignores alpha.
	pub fn write_indexed(&self, image: &RawImage) -> Vec<u8> {
		let area = image.pixels.len();
		let mut out = Vec::with_capacity(PALETTE_BYTES + area * if self.ignore_alpha {2} else {1});
		out.extend_from_slice(bytemuck::cast_slice(&self.colors));
		out.resize(PALETTE_BYTES, 0);
		out.extend(image.pixels.iter().map(|p| {
			let key = if self.ignore_alpha {p.without_alpha()} else {*p};
			self.lookup[&key]
		}));
		if self.ignore_alpha {
			out.extend(image.pixels.iter().map(|p| p.a));
		}
		out
	}
}

/// Widens to the aligned size and converts to the platform's channel order.
fn prepare(image: &RawImage, is_switch: bool) -> RawImage {
	let mut sized = image.resized_clamp_to_edge(image.size().aligned());
	if !is_switch {
		sized.swap_red_blue();
	}
	sized
}

fn to_u16(value: u32, what: &str) -> Result<u16> {
	u16::try_from(value).map_err(|_| Error::format(format!("{what} {value} does not fit a chunk header")))
}

/// Picks the smallest of the exact palette (stored or compressed), the alpha-stripped palette with
/// an alpha plane, and direct color.
pub fn encode_chunk(image: &RawImage, bounds: MaskRect, location: Point, is_switch: bool) -> Result<(ChunkHeader, Vec<u8>)> {
	let mut header = ChunkHeader {
		x: to_u16(location.x, "x")?,
		y: to_u16(location.y, "y")?,
		w: to_u16(image.width, "width")?,
		h: to_u16(image.height, "height")?,
		..ChunkHeader::default()
	};
	let has_transparency = image.has_transparency();
	if has_transparency {
		header.transparent_masks.push(bounds);
	} else {
		header.masks.push(bounds);
	}
	let sized = prepare(image, is_switch);
	let mut compressor = Compressor::default();
	let mut best: Option<Vec<u8>> = None;
	if let Some(palette) = Palette::exact(&sized) {
		let raw = palette.write_indexed(&sized);
		let packed = compressor.compress(&raw, is_switch);
		header.kind = ChunkType::Indexed;
		if raw.len() < packed.len() {
			header.size = 0;
			best = Some(raw);
		} else {
			header.size = packed.len() as u32;
			best = Some(packed);
		}
	}
	if has_transparency {
		if let Some(palette) = Palette::alpha_stripped(&sized) {
			let packed = compressor.compress(&palette.write_indexed(&sized), is_switch);
			if best.as_ref().is_none_or(|b| b.len() > packed.len()) {
				header.kind = ChunkType::IndexedAlpha;
				header.size = packed.len() as u32;
				best = Some(packed);
			}
		}
	}
	let payload = match best {
		Some(payload) => payload,
		None => {
			let packed = compressor.compress(&encode_direct_deltas(&sized), is_switch);
			header.kind = ChunkType::Color;
			header.size = packed.len() as u32;
			packed
		}
	};
	header.calc_alignment_get_bin_size();
	Ok((header, payload))
}

/// Atlas tile in indexed form: (stored length, payload). A stored length of 0 means the payload
/// is kept uncompressed because compressing it would only make it larger.
pub fn encode_indexed_tile(image: &RawImage, is_switch: bool, name: &str) -> Result<(u32, Vec<u8>)> {
	let sized = prepare(image, is_switch);
	let palette = Palette::exact(&sized).ok_or_else(|| Error::TooManyColors {name: name.to_string()})?;
	let raw = palette.write_indexed(&sized);
	let packed = Compressor::default().compress(&raw, is_switch);
	if packed.len() > raw.len() {
		Ok((0, raw))
	} else {
		Ok((packed.len() as u32, packed))
	}
}

/// Atlas tile in direct form, always compressed.
pub fn encode_direct_tile(image: &RawImage, is_switch: bool) -> Vec<u8> {
	let sized = prepare(image, is_switch);
	Compressor::default().compress(&encode_direct_deltas(&sized), is_switch)
}
