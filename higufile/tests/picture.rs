use std::io::Cursor;
use bytes::BufMut;
use rstest::rstest;
use higufile::{
	chunk::ChunkHeader,
	container::{pic::PicHeader, HeaderLayout},
	image::{Pixel, RawImage, Size},
	pixels::PALETTE_BYTES,
	png_io,
	source::Source,
	Config
};

mod common;

#[test]
fn uncompressed_indexed_chunk_draws_only_its_mask() {
	let red = Pixel::new(255, 0, 0, 255);
	let mut file = Vec::new();
	file.put_slice(b"PIC4");
	file.put_u32_le(0);
	for dim in [4u16, 4, 4, 4] {
		file.put_u16_le(dim);
	}
	file.put_u32_le(0);
	file.put_u32_le(1);
	// table: one chunk at the canvas origin
	file.put_u16_le(0);
	file.put_u16_le(0);
	file.put_u32_le(32);
	// chunk header: indexed, one mask, padded with two words to 32 bytes
	for field in [3u16, 1, 0, 2, 0, 0, 4, 4] {
		file.put_u16_le(field);
	}
	file.put_u32_le(0);
	for field in [0u16, 0, 2, 2] {
		file.put_u16_le(field);
	}
	file.put_bytes(0, 4);
	// palette in PS3 channel order: a dark blue, then red
	file.put_slice(&[40, 0, 0, 255, 0, 0, 255, 255]);
	file.put_bytes(0, 1024 - 8);
	for y in 0..4 {
		for x in 0..4 {
			file.put_u8((x < 2 && y < 2) as u8);
		}
	}
	let len = file.len() as u32;
	file[4..8].copy_from_slice(&len.to_le_bytes());

	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("scene.png");
	higufile::convert(Cursor::new(file), &out, &Config::default().with_file_name("scene.pic")).unwrap();
	let image = png_io::read_rgba(&out).unwrap();
	assert_eq!(image.size(), Size::new(4, 4));
	assert_eq!(image.pixel(0, 0), red);
	assert_eq!(image.pixel(1, 1), red);
	assert_eq!(image.pixel(2, 0), Pixel::default());
	assert_eq!(image.pixel(3, 3), Pixel::default());
}

#[rstest]
#[case::opaque_few_colors(common::stripes(Size::new(12, 10)), 8)]
#[case::translucent_palette(common::busy(Size::new(12, 10)), 8)]
#[case::direct_color(common::busy(Size::new(40, 20)), 32)]
fn platforms_decode_to_the_same_pixels(#[case] image: RawImage, #[case] tile: u32) {
	let dir = tempfile::tempdir().unwrap();
	let mut decoded = Vec::new();
	for (name, layout) in [("ps3", HeaderLayout::Ps3), ("switch", HeaderLayout::Switch {version: 2}), ("switch3", HeaderLayout::Switch {version: 3})] {
		let out = dir.path().join(format!("{name}.png"));
		let file = common::picture(layout, &image, tile);
		higufile::convert(Cursor::new(file), &out, &Config::default()).unwrap();
		decoded.push(png_io::read_rgba(&out).unwrap());
	}
	assert_eq!(decoded[0], image);
	assert_eq!(decoded[1], image);
	assert_eq!(decoded[2], image);
}

#[rstest]
#[case::ps3(HeaderLayout::Ps3)]
#[case::switch(HeaderLayout::Switch {version: 1})]
#[case::switch_extended(HeaderLayout::Switch {version: 3})]
fn replaced_picture_decodes_to_the_replacement(#[case] layout: HeaderLayout) {
	let dir = tempfile::tempdir().unwrap();
	let original = common::picture(layout, &common::stripes(Size::new(10, 6)), 8);
	let replacement = common::busy(Size::new(10, 6));
	let png = dir.path().join("edited.png");
	png_io::write_rgba(&png, &replacement).unwrap();

	let mut rebuilt = Vec::new();
	higufile::replace(Cursor::new(original), &png, &mut rebuilt, &Config::default()).unwrap();
	assert_eq!(u32::from_le_bytes(rebuilt[if layout.is_switch() {8} else {4}..][..4].try_into().unwrap()) as usize, rebuilt.len());

	let out = dir.path().join("decoded.png");
	higufile::convert(Cursor::new(rebuilt), &out, &Config::default()).unwrap();
	assert_eq!(png_io::read_rgba(&out).unwrap(), replacement);
}

#[test]
fn replacement_must_match_the_canvas() {
	let dir = tempfile::tempdir().unwrap();
	let original = common::picture(HeaderLayout::Ps3, &common::stripes(Size::new(8, 8)), 8);
	let png = dir.path().join("small.png");
	png_io::write_rgba(&png, &common::stripes(Size::new(4, 4))).unwrap();
	let mut rebuilt = Vec::new();
	assert!(higufile::replace(Cursor::new(original), &png, &mut rebuilt, &Config::default()).is_err());
	assert!(rebuilt.is_empty());
}

#[rstest]
#[case::ps3(HeaderLayout::Ps3)]
#[case::switch(HeaderLayout::Switch {version: 2})]
fn rebuilt_chunks_are_packed_back_to_back(#[case] layout: HeaderLayout) {
	let dir = tempfile::tempdir().unwrap();
	let size = Size::new(40, 24);
	let original = common::picture(layout, &common::solid(size, Pixel::new(0, 0, 0, 255)), 16);
	// few colors on the left so some chunks are stored uncompressed, many on the right
	let mut replacement = common::busy(size);
	let stripes = common::stripes(size);
	for y in 0..size.height {
		for x in 0..16 {
			*replacement.pixel_mut(x, y) = stripes.pixel(x, y);
		}
	}
	let png = dir.path().join("edited.png");
	png_io::write_rgba(&png, &replacement).unwrap();
	let mut rebuilt = Vec::new();
	higufile::replace(Cursor::new(original), &png, &mut rebuilt, &Config::default()).unwrap();

	let mut src = Source::new(Cursor::new(rebuilt.clone())).unwrap();
	let header = PicHeader::read(&mut src, layout).unwrap();
	assert_eq!(header.chunks.len(), 6);
	assert_eq!(header.chunks[0].offset as usize, header.table_end().next_multiple_of(16));
	let mut ends: Vec<_> = header.chunks.iter().skip(1).map(|e| e.offset as usize).collect();
	ends.push(rebuilt.len());
	for (entry, end) in header.chunks.iter().zip(ends) {
		src.seek_to(entry.offset as u64).unwrap();
		let mut chunk = ChunkHeader::read(&mut src).unwrap();
		let payload = match chunk.size {
			0 => PALETTE_BYTES + Size::new(chunk.w as u32, chunk.h as u32).aligned().area(),
			size => size as usize
		};
		assert_eq!(end - entry.offset as usize, chunk.calc_alignment_get_bin_size() + payload);
		if layout.is_switch() {
			assert_eq!(entry.size as usize, end - entry.offset as usize);
		}
	}
}

#[test]
fn debug_images_do_not_change_the_output() {
	let dir = tempfile::tempdir().unwrap();
	let debug = dir.path().join("debug");
	std::fs::create_dir(&debug).unwrap();
	let image = common::busy(Size::new(16, 8));
	let file = common::picture(HeaderLayout::Ps3, &image, 8);
	let out = dir.path().join("pic.png");
	let config = Config {debug_images: Some(debug.clone()), ..Config::default()};
	higufile::convert(Cursor::new(file), &out, &config).unwrap();
	assert_eq!(png_io::read_rgba(&out).unwrap(), image);
	for name in ["chunk0", "chunk0_masked", "chunk1", "chunk1_masked"] {
		assert!(debug.join(format!("{name}.png")).exists(), "{name}");
	}
}
