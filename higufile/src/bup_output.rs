use std::{fs::{self, File}, io::BufWriter, mem, path::{Path, PathBuf}};
use log::warn;
use serde::Serialize;
use crate::{
	chunk::DecodedChunk,
	error::Result,
	image::{Point, RawImage},
	saver::ImageSaver
};

/// Receives a portrait as it is composed: the base once, then per expression a face (or none)
/// followed by zero or more mouths. `write` is called once per finished combination.
pub trait BupOutput {
	fn set_base(&mut self, base: RawImage) -> Result<()>;
	fn new_face(&mut self, face: Option<&DecodedChunk>, expression: &str) -> Result<()>;
	fn new_mouth(&mut self, mouth: &DecodedChunk, slot: usize) -> Result<()>;
	fn write(&mut self) -> Result<()>;
	/// Writes every image collected so far. Nothing reaches disk before this is called, so an
	/// output dropped after a decode error leaves no files behind.
	fn finish(self: Box<Self>) -> Result<()>;
}

pub fn make_output(dir: &Path, stem: &str, parts: bool, threads: usize) -> Box<dyn BupOutput> {
	if parts {
		Box::new(PartsOutput::new(dir, stem, threads))
	} else {
		Box::new(CompositedOutput::new(dir, stem, threads))
	}
}

/// Images waiting for `finish`, saved together on a fresh pool.
struct Pending {
	threads: usize,
	images: Vec<(RawImage, PathBuf)>
}

impl Pending {
	fn new(threads: usize) -> Self {
		Self {threads, images: Vec::new()}
	}

	fn push(&mut self, image: RawImage, path: PathBuf) {
		self.images.push((image, path));
	}

	fn save(self) -> Result<()> {
		let saver = ImageSaver::new(self.threads);
		for (image, path) in self.images {
			saver.enqueue(image, path);
		}
		saver.finish()
	}
}

/// One flattened PNG per face and mouth combination.
pub struct CompositedOutput {
	dir: PathBuf,
	stem: String,
	pending: Pending,
	base: RawImage,
	with_face: RawImage,
	with_face_name: String,
	with_mouth: Option<(RawImage, String)>
}

impl CompositedOutput {
	pub fn new(dir: &Path, stem: &str, threads: usize) -> Self {
		Self {
			dir: dir.to_path_buf(),
			stem: stem.to_string(),
			pending: Pending::new(threads),
			base: RawImage::default(),
			with_face: RawImage::default(),
			with_face_name: stem.to_string(),
			with_mouth: None
		}
	}
}

impl BupOutput for CompositedOutput {
	fn set_base(&mut self, base: RawImage) -> Result<()> {
		self.with_face = base.clone();
		self.base = base;
		self.with_face_name = self.stem.clone();
		self.with_mouth = None;
		Ok(())
	}

	fn new_face(&mut self, face: Option<&DecodedChunk>, expression: &str) -> Result<()> {
		self.with_face = self.base.clone();
		self.with_mouth = None;
		match face {
			Some(face) => {
				face.image.draw_onto(&mut self.with_face, face.position, &face.masks)?;
				self.with_face_name = format!("{}_{expression}", self.stem);
			}
			None => self.with_face_name = self.stem.clone()
		}
		Ok(())
	}

	fn new_mouth(&mut self, mouth: &DecodedChunk, slot: usize) -> Result<()> {
		let mut with_mouth = self.with_face.clone();
		mouth.image.draw_onto(&mut with_mouth, mouth.position, &mouth.masks)?;
		self.with_mouth = Some((with_mouth, format!("{}_{slot}", self.with_face_name)));
		Ok(())
	}

	fn write(&mut self) -> Result<()> {
		let (image, name) = match self.with_mouth.take() {
			Some(mouth) => mouth,
			None => (mem::take(&mut self.with_face), self.with_face_name.clone())
		};
		self.pending.push(image, self.dir.join(format!("{name}.png")));
		Ok(())
	}

	fn finish(self: Box<Self>) -> Result<()> {
		self.pending.save()
	}
}

/// How a part can be layered back onto what is under it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
pub enum Blend {
	/// Plain alpha blending reproduces the original.
	AlphaBlend,
	/// Needs a blend that copies every pixel whose source alpha is not 0.
	CustomBlend,
	/// Fully transparent pixels replace visible ones, which no blend can reproduce.
	NotPossible
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct PartRef {
	pub path: String,
	pub x: u32,
	pub y: u32
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct PartsEntry {
	pub blend: Blend,
	pub parts: Vec<PartRef>
}

struct Part {
	name: String,
	position: Point,
	blend: Blend
}

/// Only the masked pixels of `chunk`, plus how it may be blended onto `target`. Pixels over
/// fully transparent parts of the target are ignored.
fn isolate_part(chunk: &DecodedChunk, target: &RawImage) -> Result<(RawImage, Blend)> {
	let mut part = RawImage::empty(chunk.image.size());
	chunk.image.draw_onto(&mut part, Point::default(), &chunk.masks)?;
	let mut blend = Blend::AlphaBlend;
	for mask in &chunk.masks {
		for y in mask.y1..mask.y2 {
			for x in mask.x1..mask.x2 {
				let (tx, ty) = (chunk.position.x + x, chunk.position.y + y);
				if tx >= target.width || ty >= target.height || target.pixel(tx, ty).a == 0 {
					continue;
				}
				match chunk.image.pixel(x, y).a {
					0 => blend = Blend::NotPossible,
					255 => {}
					_ => blend = blend.max(Blend::CustomBlend)
				}
			}
		}
	}
	Ok((part, blend))
}

/// The base and every face and mouth as separate PNGs in `<stem>/`, plus `<stem>.json`
/// describing how to stack them.
pub struct PartsOutput {
	dir: PathBuf,
	parts_dir: PathBuf,
	stem: String,
	pending: Pending,
	base: RawImage,
	with_face: RawImage,
	face: Option<Part>,
	mouth: Option<Part>,
	expressions: Vec<(String, Vec<PartsEntry>)>
}

impl PartsOutput {
	pub fn new(dir: &Path, stem: &str, threads: usize) -> Self {
		Self {
			dir: dir.to_path_buf(),
			parts_dir: dir.join(stem),
			stem: stem.to_string(),
			pending: Pending::new(threads),
			base: RawImage::default(),
			with_face: RawImage::default(),
			face: None,
			mouth: None,
			expressions: Vec::new()
		}
	}

	/// Manifest key for an expression; repeated names get their index appended.
	fn expression_key(&self, expression: &str) -> String {
		let taken = |key: &str| self.expressions.iter().any(|(k, _)| k == key);
		if !taken(expression) {
			return expression.to_string();
		}
		let mut index = self.expressions.len();
		let mut key = format!("{expression}_{index}");
		while taken(&key) {
			index += 1;
			key = format!("{expression}_{index}");
		}
		warn!("{}: expression name {expression:?} is repeated, listing it as {key:?}", self.stem);
		key
	}

	fn part_path(&self, name: &str) -> String {
		format!("{}/{name}.png", self.stem)
	}

	pub fn manifest(&self) -> Result<serde_json::Value> {
		let mut map = serde_json::Map::new();
		for (name, entries) in &self.expressions {
			map.insert(name.clone(), serde_json::to_value(entries)?);
		}
		Ok(serde_json::Value::Object(map))
	}
}

impl BupOutput for PartsOutput {
	fn set_base(&mut self, base: RawImage) -> Result<()> {
		self.pending.push(base.clone(), self.parts_dir.join(format!("{}.png", self.stem)));
		self.base = base;
		Ok(())
	}

	fn new_face(&mut self, face: Option<&DecodedChunk>, expression: &str) -> Result<()> {
		self.with_face = self.base.clone();
		self.mouth = None;
		self.face = match face {
			Some(face) => {
				face.image.draw_onto(&mut self.with_face, face.position, &face.masks)?;
				let (part, blend) = isolate_part(face, &self.base)?;
				let name = format!("{}_{expression}", self.stem);
				self.pending.push(part, self.parts_dir.join(format!("{name}.png")));
				Some(Part {name, position: face.position, blend})
			}
			None => None
		};
		let key = self.expression_key(expression);
		self.expressions.push((key, Vec::new()));
		Ok(())
	}

	fn new_mouth(&mut self, mouth: &DecodedChunk, slot: usize) -> Result<()> {
		let prefix = self.face.as_ref().map_or(self.stem.as_str(), |f| f.name.as_str());
		let name = format!("{prefix}_{slot}");
		let (part, blend) = isolate_part(mouth, &self.with_face)?;
		self.pending.push(part, self.parts_dir.join(format!("{name}.png")));
		self.mouth = Some(Part {name, position: mouth.position, blend});
		Ok(())
	}

	fn write(&mut self) -> Result<()> {
		let mut entry = PartsEntry {
			blend: Blend::AlphaBlend,
			parts: vec![PartRef {path: self.part_path(&self.stem), x: 0, y: 0}]
		};
		for part in self.face.iter().chain(&self.mouth) {
			entry.parts.push(PartRef {path: self.part_path(&part.name), x: part.position.x, y: part.position.y});
			entry.blend = entry.blend.max(part.blend);
		}
		if entry.blend == Blend::NotPossible {
			let name = self.mouth.as_ref().or(self.face.as_ref()).map_or(self.stem.as_str(), |p| p.name.as_str());
			warn!("{name} has fully transparent overridden pixels, it may not be properly renderable");
		}
		if let Some((_, entries)) = self.expressions.last_mut() {
			entries.push(entry);
		}
		Ok(())
	}

	fn finish(self: Box<Self>) -> Result<()> {
		let manifest = self.manifest()?;
		fs::create_dir_all(&self.parts_dir)?;
		let file = BufWriter::new(File::create(self.dir.join(format!("{}.json", self.stem)))?);
		serde_json::to_writer_pretty(file, &manifest)?;
		self.pending.save()
	}
}
