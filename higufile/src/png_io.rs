use std::{fs::File, io::{BufWriter, Write}, path::Path};
use png::{BitDepth, ColorType, Encoder};
use crate::{error::Result, image::{RawImage, Size}};

fn write_png<W: Write>(out: W, size: Size, color: ColorType, data: &[u8]) -> Result<()> {
	let mut encoder = Encoder::new(out, size.width, size.height);
	encoder.set_color(color);
	encoder.set_depth(BitDepth::Eight);
	let mut writer = encoder.write_header()?;
	writer.write_image_data(data)?;
	writer.finish()?;
	Ok(())
}

pub fn write_rgba(path: &Path, image: &RawImage) -> Result<()> {
	let file = BufWriter::new(File::create(path)?);
	write_png(file, image.size(), ColorType::Rgba, image.as_rgba_bytes())
}

/// 8-bit grayscale, one byte per pixel.
pub fn write_gray(path: &Path, size: Size, data: &[u8]) -> Result<()> {
	let file = BufWriter::new(File::create(path)?);
	write_png(file, size, ColorType::Grayscale, data)
}

/// Any format the image crate understands, normalized to RGBA8.
pub fn read_rgba(path: &Path) -> Result<RawImage> {
	let loaded = image::open(path)?.to_rgba8();
	Ok(RawImage::from_rgba(loaded.width(), loaded.height(), loaded.as_raw()))
}
