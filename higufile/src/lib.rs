use std::{collections::HashMap, fs, io::{Read, Seek, Write}, path::Path};
use log::{debug, info};
use phf::phf_map;

pub mod error;
pub mod image;
pub mod source;
pub mod lz77;
pub mod pixels;
pub mod chunk;
pub mod container;
pub mod compose;
pub mod bup_output;
pub mod saver;
pub mod png_io;
pub mod config;

pub use config::Config;
pub use error::{Error, Result};
use crate::{
	container::{bup::BupHeader, msk, pic::{self, PicHeader}, txa::{self, TxaHeader}, HeaderLayout},
	image::RawImage,
	saver::ImageSaver,
	source::Source
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContainerKind {
	Picture,
	Portrait,
	Atlas,
	Mask3,
	Mask4
}

static CONTAINERS: phf::Map<&'static [u8], ContainerKind> = phf_map! {
	b"PIC4" => ContainerKind::Picture,
	b"BUP4" => ContainerKind::Portrait,
	b"TXA4" => ContainerKind::Atlas,
	b"MSK3" => ContainerKind::Mask3,
	b"MSK4" => ContainerKind::Mask4
};

impl ContainerKind {
	pub fn from_magic(magic: [u8; 4]) -> Result<Self> {
		CONTAINERS.get(&magic[..]).copied().ok_or_else(|| Error::UnknownMagic(magic.iter().map(|&b| b as char).collect()))
	}
}

/// Reads the magic and platform of a container, leaving the source at its start.
pub fn identify<R: Read + Seek>(src: &mut Source<R>, file_name: &str) -> Result<(ContainerKind, HeaderLayout)> {
	src.seek_to(0)?;
	let kind = ContainerKind::from_magic(src.read_array("magic")?)?;
	let layout = HeaderLayout::detect(src, file_name)?;
	debug!("{file_name}: {kind:?} container, {layout:?}");
	Ok((kind, layout))
}

/// Directory and file stem every output of a multi-image container is named after.
fn output_template(output: &Path) -> (&Path, String) {
	let dir = output.parent().unwrap_or(Path::new(""));
	let stem = output.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
	(dir, stem)
}

pub fn convert_picture<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, output: &Path, config: &Config) -> Result<()> {
	let header = PicHeader::read(src, layout)?;
	let image = compose::compose_picture(src, &header, config)?;
	png_io::write_rgba(output, &image)
}

/// Writes every expression of a portrait next to `output`, composited or as parts.
pub fn convert_portrait<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, output: &Path, config: &Config) -> Result<()> {
	let header = BupHeader::read(src, layout)?;
	let (dir, stem) = output_template(output);
	let mut out = bup_output::make_output(dir, &stem, config.bup_parts, config.threads);
	compose::compose_portrait(src, &header, &stem, config, out.as_mut())?;
	out.finish()
}

/// Writes every atlas tile as `<stem>_<tile name>.png` next to `output`, once all of them decode.
pub fn convert_atlas<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, output: &Path, config: &Config) -> Result<()> {
	let header = TxaHeader::read(src, layout)?;
	let (dir, stem) = output_template(output);
	let mut decoded = Vec::with_capacity(header.tiles.len());
	for tile in &header.tiles {
		let name = format!("{stem}_{}", tile.name);
		let image = chunk::decode_headerless_chunk(src, tile.offset as u64, tile.length, header.indexed, tile.size(), &name, layout.is_switch())?;
		decoded.push((image, dir.join(format!("{name}.png"))));
	}
	let saver = ImageSaver::new(config.threads);
	for (image, path) in decoded {
		saver.enqueue(image, path);
	}
	saver.finish()
}

pub fn convert_mask<R: Read + Seek>(src: &mut Source<R>, kind: ContainerKind, layout: HeaderLayout, output: &Path) -> Result<()> {
	let (size, mask) = match kind {
		ContainerKind::Mask4 => msk::decode_msk4(src, layout)?,
		_ => msk::decode_msk3(src, layout)?
	};
	png_io::write_gray(output, size, &mask)
}

/// Decodes any supported container into PNG files.
pub fn convert<R: Read + Seek>(input: R, output: &Path, config: &Config) -> Result<()> {
	let mut src = Source::new(input)?;
	let (kind, layout) = identify(&mut src, &config.file_name)?;
	match kind {
		ContainerKind::Picture => convert_picture(&mut src, layout, output, config),
		ContainerKind::Portrait => convert_portrait(&mut src, layout, output, config),
		ContainerKind::Atlas => convert_atlas(&mut src, layout, output, config),
		ContainerKind::Mask3 | ContainerKind::Mask4 => convert_mask(&mut src, kind, layout, output)
	}?;
	info!("converted {} to {}", config.file_name, output.display());
	Ok(())
}

pub fn replace_picture<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, replacement: &Path) -> Result<Vec<u8>> {
	let header = PicHeader::read(src, layout)?;
	let image = png_io::read_rgba(replacement)?;
	pic::rebuild(src, &header, &image)
}

/// Collects `<stem>_<tile name>.png` for every tile that has one in `dir`.
fn find_tile_replacements(dir: &Path, stem: &str, header: &TxaHeader) -> Result<HashMap<String, RawImage>> {
	let mut found = HashMap::new();
	for tile in &header.tiles {
		let path = dir.join(format!("{stem}_{}.png", tile.name));
		if fs::metadata(&path).is_ok_and(|m| m.is_file()) {
			debug!("replacing tile {} with {}", tile.name, path.display());
			found.insert(tile.name.clone(), png_io::read_rgba(&path)?);
		}
	}
	Ok(found)
}

pub fn replace_atlas<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, dir: &Path, stem: &str) -> Result<Vec<u8>> {
	let header = TxaHeader::read(src, layout)?;
	let replacements = find_tile_replacements(dir, stem, &header)?;
	info!("replacing {} of {} tiles", replacements.len(), header.tiles.len());
	txa::rebuild(src, &header, &replacements)
}

/// Re-encodes a picture from a PNG, or an atlas from a directory of tile PNGs named after the
/// input file, and writes the rebuilt container to `output`.
pub fn replace<R: Read + Seek, W: Write>(input: R, replacement: &Path, mut output: W, config: &Config) -> Result<()> {
	let mut src = Source::new(input)?;
	let (kind, layout) = identify(&mut src, &config.file_name)?;
	let rebuilt = match kind {
		ContainerKind::Picture => replace_picture(&mut src, layout, replacement)?,
		ContainerKind::Atlas => {
			let stem = Path::new(&config.file_name).file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
			replace_atlas(&mut src, layout, replacement, &stem)?
		}
		_ => return Err(Error::Unsupported("re-encoding is only available for pictures and atlases"))
	};
	output.write_all(&rebuilt)?;
	output.flush()?;
	Ok(())
}
