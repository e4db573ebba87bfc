use std::io::{Read, Seek};
use log::{debug, info};
use crate::{
	bup_output::BupOutput,
	chunk::decode_chunk,
	config::Config,
	container::{bup::BupHeader, pic::PicHeader},
	error::Result,
	image::{Point, RawImage},
	png_io,
	source::Source
};

/// Decodes every chunk of a picture onto a transparent canvas at its table position.
pub fn compose_picture<R: Read + Seek>(src: &mut Source<R>, header: &PicHeader, config: &Config) -> Result<RawImage> {
	let is_switch = header.layout.is_switch();
	let mut canvas = RawImage::empty(header.size());
	for (i, entry) in header.chunks.iter().enumerate() {
		let chunk = decode_chunk(src, entry.offset as u64, &format!("chunk{i}"), is_switch, config.debug_images.as_deref())?;
		chunk.image.draw_onto(&mut canvas, Point::new(entry.x as u32, entry.y as u32), &chunk.masks)?;
	}
	Ok(canvas)
}

/// Builds the portrait base, then hands every expression's face and mouths to `out`.
pub fn compose_portrait<R: Read + Seek>(src: &mut Source<R>, header: &BupHeader, stem: &str, config: &Config, out: &mut dyn BupOutput) -> Result<()> {
	let is_switch = header.layout.is_switch();
	let debug_dir = config.debug_images.as_deref();
	let mut base = RawImage::empty(header.size());
	for (i, chunk_ref) in header.base.iter().enumerate() {
		let chunk = decode_chunk(src, chunk_ref.offset as u64, &format!("{stem}_BaseChunk{i}"), is_switch, debug_dir)?;
		chunk.image.draw_onto(&mut base, chunk.position, &chunk.masks)?;
	}
	if let Some(dir) = debug_dir {
		png_io::write_rgba(&dir.join(format!("{stem}_Base.png")), &base)?;
	}
	out.set_base(base)?;

	for expression in &header.expressions {
		debug!("expression {}", expression.name);
		let face = match expression.face {
			Some(face) => Some(decode_chunk(src, face.offset as u64, &format!("{stem}_{}_Face", expression.name), is_switch, debug_dir)?),
			None => None
		};
		out.new_face(face.as_ref(), &expression.name)?;
		let mut wrote = false;
		for (slot, mouth) in expression.mouths.iter().enumerate() {
			let Some(mouth) = mouth else {
				continue;
			};
			let mouth = decode_chunk(src, mouth.offset as u64, &format!("{stem}_{}_Mouth{slot}", expression.name), is_switch, debug_dir)?;
			out.new_mouth(&mouth, slot)?;
			out.write()?;
			wrote = true;
		}
		if !wrote {
			out.write()?;
		}
	}
	info!("composed {} expressions of {stem}", header.expressions.len());
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use bytes::BufMut;
	use crate::{
		chunk::{ChunkHeader, DecodedChunk},
		container::{bup::{ChunkRef, Expression}, pic::PicEntry, HeaderLayout},
		image::{MaskRect, Pixel, Size},
		pixels::encode_chunk
	};
	use super::*;

	#[derive(Default)]
	struct Recorder {
		events: Vec<String>
	}

	impl BupOutput for Recorder {
		fn set_base(&mut self, base: RawImage) -> Result<()> {
			self.events.push(format!("base {}x{}", base.width, base.height));
			Ok(())
		}

		fn new_face(&mut self, face: Option<&DecodedChunk>, expression: &str) -> Result<()> {
			self.events.push(format!("face {expression} {}", face.is_some()));
			Ok(())
		}

		fn new_mouth(&mut self, _: &DecodedChunk, slot: usize) -> Result<()> {
			self.events.push(format!("mouth {slot}"));
			Ok(())
		}

		fn write(&mut self) -> Result<()> {
			self.events.push("write".into());
			Ok(())
		}

		fn finish(self: Box<Self>) -> Result<()> {
			Ok(())
		}
	}

	fn solid(size: Size, color: Pixel) -> RawImage {
		RawImage::from_pixels(size, vec![color; size.area()])
	}

	/// Appends an encoded chunk and returns its offset.
	fn push_chunk(file: &mut Vec<u8>, image: &RawImage, at: Point) -> u32 {
		let offset = file.len() as u32;
		let (header, payload): (ChunkHeader, _) = encode_chunk(image, MaskRect::covering(image.size()), at, false).unwrap();
		header.write(file);
		file.put_slice(&payload);
		offset
	}

	#[test]
	fn picture_chunks_land_at_table_positions() {
		let red = Pixel::new(255, 0, 0, 255);
		let blue = Pixel::new(0, 0, 255, 255);
		let mut file = vec![0; 16];
		let first = push_chunk(&mut file, &solid(Size::new(2, 2), red), Point::default());
		let second = push_chunk(&mut file, &solid(Size::new(2, 2), blue), Point::default());
		let header = PicHeader {
			layout: HeaderLayout::Ps3,
			filesize: file.len() as u32,
			ew: 4, eh: 2, width: 4, height: 2,
			unk1: 0, unk2: 0, extra: [0; 4],
			chunks: vec![
				PicEntry {x: 0, y: 0, offset: first, size: 0},
				PicEntry {x: 2, y: 0, offset: second, size: 0}
			]
		};
		let image = compose_picture(&mut Source::new(Cursor::new(file)).unwrap(), &header, &Config::default()).unwrap();
		assert_eq!(image.pixel(1, 1), red);
		assert_eq!(image.pixel(2, 0), blue);
		assert_eq!(image.pixel(3, 1), blue);
	}

	#[test]
	fn portrait_writes_once_per_mouth_or_once_without() {
		let mut file = vec![0; 16];
		let base = push_chunk(&mut file, &solid(Size::new(4, 4), Pixel::new(1, 2, 3, 255)), Point::default());
		let part = push_chunk(&mut file, &solid(Size::new(1, 1), Pixel::new(9, 9, 9, 255)), Point::new(1, 1));
		let part = Some(ChunkRef {offset: part, size: 0});
		let header = BupHeader {
			layout: HeaderLayout::Ps3,
			size: file.len() as u32,
			ew: 4, eh: 4, width: 4, height: 4,
			base: vec![ChunkRef {offset: base, size: 0}],
			expressions: vec![
				Expression {name: "a".into(), face: part, mouths: vec![None, part, part]},
				Expression {name: "b".into(), face: None, mouths: vec![None, None, None]}
			]
		};
		let mut out = Recorder::default();
		compose_portrait(&mut Source::new(Cursor::new(file)).unwrap(), &header, "x", &Config::default(), &mut out).unwrap();
		assert_eq!(out.events, [
			"base 4x4", "face a true", "mouth 1", "write", "mouth 2", "write", "face b false", "write"
		]);
	}

	#[test]
	fn debug_images_are_named_after_their_role() {
		let dir = tempfile::tempdir().unwrap();
		let mut file = vec![0; 16];
		let base = push_chunk(&mut file, &solid(Size::new(2, 2), Pixel::new(1, 2, 3, 255)), Point::default());
		let header = BupHeader {
			layout: HeaderLayout::Ps3,
			size: file.len() as u32,
			ew: 2, eh: 2, width: 2, height: 2,
			base: vec![ChunkRef {offset: base, size: 0}],
			expressions: vec![Expression {name: "e".into(), face: Some(ChunkRef {offset: base, size: 0}), mouths: vec![]}]
		};
		let config = Config {debug_images: Some(dir.path().to_path_buf()), ..Config::default()};
		compose_portrait(&mut Source::new(Cursor::new(file)).unwrap(), &header, "s", &config, &mut Recorder::default()).unwrap();
		for name in ["s_BaseChunk0", "s_BaseChunk0_masked", "s_Base", "s_e_Face", "s_e_Face_masked"] {
			assert!(dir.path().join(format!("{name}.png")).exists(), "{name}");
		}
	}
}
