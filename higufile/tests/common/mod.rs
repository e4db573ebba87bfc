#![allow(dead_code)]

use bytes::BufMut;
use higufile::{
	container::{pic::{PicEntry, PicHeader}, txa::{TxaHeader, TxaTile}, HeaderLayout},
	image::{MaskRect, Pixel, Point, RawImage, Size},
	pixels::{encode_chunk, encode_direct_tile, encode_indexed_tile}
};

pub fn solid(size: Size, color: Pixel) -> RawImage {
	RawImage::from_pixels(size, vec![color; size.area()])
}

/// Plenty of colors, some of them translucent.
pub fn busy(size: Size) -> RawImage {
	let mut pixels = Vec::with_capacity(size.area());
	for y in 0..size.height {
		for x in 0..size.width {
			let a = if (x + y) % 5 == 0 {(x * 9) as u8} else {255};
			pixels.push(Pixel::new((x * 13 + y) as u8, (y * 7) as u8, (x * y) as u8, a));
		}
	}
	RawImage::from_pixels(size, pixels)
}

/// Few colors, fully opaque.
pub fn stripes(size: Size) -> RawImage {
	let colors = [Pixel::new(200, 10, 10, 255), Pixel::new(10, 200, 10, 255), Pixel::new(10, 10, 200, 255)];
	let mut pixels = Vec::with_capacity(size.area());
	for y in 0..size.height {
		for x in 0..size.width {
			pixels.push(colors[((x / 2 + y) % 3) as usize]);
		}
	}
	RawImage::from_pixels(size, pixels)
}

/// Picture cut into `tile`-sized chunks placed through the table.
pub fn picture(layout: HeaderLayout, image: &RawImage, tile: u32) -> Vec<u8> {
	let mut header = PicHeader {
		layout,
		filesize: 0,
		ew: image.width as u16, eh: image.height as u16,
		width: image.width as u16, height: image.height as u16,
		unk1: 0x1234,
		unk2: 0,
		extra: [0; 4],
		chunks: Vec::new()
	};
	for y in (0..image.height).step_by(tile as usize) {
		for x in (0..image.width).step_by(tile as usize) {
			header.chunks.push(PicEntry {x: x as u16, y: y as u16, offset: 0, size: 0});
		}
	}
	let start = header.table_end().next_multiple_of(16);
	let mut body = Vec::new();
	for entry in &mut header.chunks {
		let (x, y) = (entry.x as u32, entry.y as u32);
		let region = image.cropped(MaskRect::new(x, y, x + tile, y + tile));
		let (chunk, payload) = encode_chunk(&region, MaskRect::covering(region.size()), Point::default(), layout.is_switch()).unwrap();
		let offset = start + body.len();
		chunk.write(&mut body);
		body.put_slice(&payload);
		entry.offset = offset as u32;
		if layout.is_switch() {
			entry.size = (start + body.len() - offset) as u32;
		}
	}
	header.filesize = (start + body.len()) as u32;
	let mut out = Vec::new();
	header.write(&mut out);
	out.resize(start, 0);
	out.extend_from_slice(&body);
	out
}

/// Atlas holding `tiles` under the given names.
pub fn atlas(layout: HeaderLayout, indexed: bool, tiles: &[(&str, RawImage)]) -> Vec<u8> {
	let mut header = TxaHeader {layout, size: 0, indexed, dec_size: 0, unk: [0; 3], tiles: Vec::new()};
	let mut payloads = Vec::new();
	for (i, (name, image)) in tiles.iter().enumerate() {
		let (length, payload) = if indexed {
			encode_indexed_tile(image, layout.is_switch(), name).unwrap()
		} else {
			let packed = encode_direct_tile(image, layout.is_switch());
			(packed.len() as u32, packed)
		};
		header.tiles.push(TxaTile {
			index: i as u16,
			width: image.width as u16,
			height: image.height as u16,
			offset: 0,
			length,
			unk: 0,
			name: name.to_string()
		});
		payloads.push(payload);
	}
	let mut cursor = header.table_end().unwrap().next_multiple_of(16);
	for (tile, payload) in header.tiles.iter_mut().zip(&payloads) {
		tile.offset = cursor as u32;
		cursor = (cursor + payload.len()).next_multiple_of(16);
	}
	header.size = cursor as u32;
	let mut out = Vec::new();
	header.write(&mut out).unwrap();
	for (tile, payload) in header.tiles.iter().zip(&payloads) {
		out.resize(tile.offset as usize, 0);
		out.extend_from_slice(payload);
	}
	out.resize(cursor, 0);
	out
}
