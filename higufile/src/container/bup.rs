use std::io::{Read, Seek};
use log::{debug, warn};
use crate::{error::Result, image::Size, source::Source};
use super::{decode_name, HeaderLayout};

/// Reference to a chunk; Switch files also store its size.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ChunkRef {
	pub offset: u32,
	pub size: u32
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Expression {
	pub name: String,
	pub face: Option<ChunkRef>,
	/// One entry per mouth slot, so slot numbers survive gaps.
	pub mouths: Vec<Option<ChunkRef>>
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BupHeader {
	pub layout: HeaderLayout,
	pub size: u32,
	pub ew: u16,
	pub eh: u16,
	pub width: u16,
	pub height: u16,
	pub base: Vec<ChunkRef>,
	pub expressions: Vec<Expression>
}

const PS3_NAME_LEN: usize = 16;
const SWITCH_NAME_LEN: usize = 20;
const MOUTH_SLOTS: usize = 3;

fn read_ref<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, name: &'static str) -> Result<Option<ChunkRef>> {
	let offset = src.read_u32(name)?;
	let size = if layout.is_switch() {src.read_u32(name)?} else {0};
	Ok((offset != 0).then_some(ChunkRef {offset, size}))
}

/// Words that have only ever been seen as zero.
fn check_reserved<R: Read + Seek>(src: &mut Source<R>, count: usize, index: usize, name: &str) -> Result<()> {
	let mut nonzero = false;
	for _ in 0..count {
		nonzero |= src.read_u32("expression reserved word")? != 0;
	}
	if nonzero {
		warn!("expression {index}, {name}, had unexpected nonzero values in its expression data");
	}
	Ok(())
}

fn read_fixed_expression<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, index: usize) -> Result<Expression> {
	let name = if layout.is_switch() {
		decode_name(&src.read_array::<SWITCH_NAME_LEN>("expression name")?)
	} else {
		decode_name(&src.read_array::<PS3_NAME_LEN>("expression name")?)
	};
	let face = read_ref(src, layout, "face chunk")?;
	if layout.is_switch() {
		check_reserved(src, 6, index, &name)?;
	} else {
		src.skip(12, "expression unknown words")?;
	}
	let mouths = (0..MOUTH_SLOTS).map(|_| read_ref(src, layout, "mouth chunk")).collect::<Result<_>>()?;
	Ok(Expression {name, face, mouths})
}

fn read_variable_expression<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout, index: usize) -> Result<Expression> {
	let face = read_ref(src, layout, "face chunk")?;
	let reserved_start = src.position();
	src.skip(24, "expression reserved words")?;
	let mouth_count = src.read_u32("mouth count")?;
	let mut mouths = Vec::new();
	for _ in 0..mouth_count {
		mouths.push(read_ref(src, layout, "mouth chunk")?);
	}
	let name_len = src.read_u32("expression name length")? as usize;
	let name = decode_name(&src.read_vec(name_len, "expression name")?);
	src.skip((name_len.next_multiple_of(4) - name_len) as u64, "expression name padding")?;
	let after = src.position();
	// the reserved words are checked once the name is known, for the warning
	src.seek_to(reserved_start)?;
	check_reserved(src, 6, index, &name)?;
	src.seek_to(after)?;
	Ok(Expression {name, face, mouths})
}

impl BupHeader {
	pub fn read<R: Read + Seek>(src: &mut Source<R>, layout: HeaderLayout) -> Result<Self> {
		src.seek_to(4)?;
		if layout.is_switch() {
			src.skip(4, "version")?;
		}
		let size = src.read_u32("file size")?;
		let ew = src.read_u16("ew")?;
		let eh = src.read_u16("eh")?;
		let width = src.read_u16("width")?;
		let height = src.read_u16("height")?;
		let tbl1 = src.read_u32("tbl1")?;
		let base_count = src.read_u32("base chunk count")?;
		let expression_count = src.read_u32("expression count")?;
		let (tbl1_entry, second_skip) = if layout.is_switch() {
			src.skip(4, "unk1")?;
			(12, 12)
		} else {
			(4, 0)
		};
		src.skip(tbl1 as u64 * tbl1_entry, "tbl1 block")?;
		let mut base = Vec::new();
		for _ in 0..base_count {
			// base offsets are never zero in practice, but keep the entry either way
			let offset = src.read_u32("base chunk offset")?;
			let size = if layout.is_switch() {src.read_u32("base chunk size")?} else {0};
			base.push(ChunkRef {offset, size});
		}
		src.skip(second_skip, "second unknown block")?;
		let mut expressions = Vec::new();
		for i in 0..expression_count as usize {
			let mut expression = match layout {
				HeaderLayout::SwitchV4 {..} => read_variable_expression(src, layout, i)?,
				_ => read_fixed_expression(src, layout, i)?
			};
			if expression.name.is_empty() {
				expression.name = format!("expression{i}");
				warn!("expression {i} has no name, calling it {}", expression.name);
			}
			expressions.push(expression);
		}
		debug!("portrait {width}x{height} with {base_count} base chunks and {expression_count} expressions, {layout:?}");
		Ok(Self {layout, size, ew, eh, width, height, base, expressions})
	}

	pub fn size(&self) -> Size {
		Size::new(self.width as u32, self.height as u32)
	}
}
