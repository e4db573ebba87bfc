use bytemuck::{Pod, Zeroable};
use crate::error::{Error, Result};

#[repr(C)]
#[derive(Zeroable, Pod, Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct Pixel {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: u8
}

impl Pixel {
	pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
		Self {r, g, b, a}
	}

	pub const fn without_alpha(self) -> Self {
		Self {a: 0, ..self}
	}

	pub const fn swapped_red_blue(self) -> Self {
		Self {r: self.b, b: self.r, ..self}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Point {
	pub x: u32,
	pub y: u32
}

impl Point {
	pub const fn new(x: u32, y: u32) -> Self {
		Self {x, y}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Size {
	pub width: u32,
	pub height: u32
}

impl Size {
	pub const fn new(width: u32, height: u32) -> Self {
		Self {width, height}
	}

	pub const fn area(self) -> usize {
		self.width as usize * self.height as usize
	}

	/// Width rounded up to a multiple of 4, which is how every chunk plane is laid out.
	pub const fn aligned(self) -> Self {
		Self {width: (self.width + 3) & !3, height: self.height}
	}
}

/// Half-open rectangle in chunk-local coordinates.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct MaskRect {
	pub x1: u32,
	pub y1: u32,
	pub x2: u32,
	pub y2: u32
}

impl MaskRect {
	pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
		Self {x1, y1, x2, y2}
	}

	pub const fn covering(size: Size) -> Self {
		Self {x1: 0, y1: 0, x2: size.width, y2: size.height}
	}

	pub const fn is_empty(&self) -> bool {
		self.x2 <= self.x1 || self.y2 <= self.y1
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawImage {
	pub width: u32,
	pub height: u32,
	pub pixels: Box<[Pixel]>
}

impl Default for RawImage {
	fn default() -> Self {
		Self::empty(Size::default())
	}
}

impl RawImage {
	/// Transparent black canvas.
	pub fn empty(size: Size) -> Self {
		Self {
			width: size.width,
			height: size.height,
			pixels: vec![Pixel::zeroed(); size.area()].into()
		}
	}

	pub fn from_pixels(size: Size, pixels: Vec<Pixel>) -> Self {
		assert_eq!(pixels.len(), size.area());
		Self {width: size.width, height: size.height, pixels: pixels.into_boxed_slice()}
	}

	pub fn from_rgba(width: u32, height: u32, buf: &[u8]) -> Self {
		let needed_size = width as usize * height as usize * 4;
		assert!(buf.len() >= needed_size);
		Self {
			width, height,
			pixels: bytemuck::cast_slice(&buf[0..needed_size]).into()
		}
	}

	pub fn size(&self) -> Size {
		Size::new(self.width, self.height)
	}

	pub fn is_empty(&self) -> bool {
		self.pixels.is_empty()
	}

	pub fn pixel(&self, x: u32, y: u32) -> Pixel {
		self.pixels[y as usize * self.width as usize + x as usize]
	}

	pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut Pixel {
		&mut self.pixels[y as usize * self.width as usize + x as usize]
	}

	pub fn row(&self, y: u32) -> &[Pixel] {
		let w = self.width as usize;
		&self.pixels[y as usize * w..y as usize * w + w]
	}

	pub fn row_mut(&mut self, y: u32) -> &mut [Pixel] {
		let w = self.width as usize;
		&mut self.pixels[y as usize * w..y as usize * w + w]
	}

	pub fn has_transparency(&self) -> bool {
		self.pixels.iter().any(|p| p.a != 255)
	}

	pub fn swap_red_blue(&mut self) {
		for p in &mut self.pixels {
			*p = p.swapped_red_blue();
		}
	}

	/// Copies every mask region of `self` onto `dst`, offset by `at`. Regions are applied in order.
	pub fn draw_onto(&self, dst: &mut RawImage, at: Point, masks: &[MaskRect]) -> Result<()> {
		for mask in masks {
			if mask.is_empty() {
				continue;
			}
			if mask.x2 > self.width || mask.y2 > self.height {
				return Err(Error::format(format!(
					"mask ({}, {})-({}, {}) exceeds the {}x{} chunk", mask.x1, mask.y1, mask.x2, mask.y2, self.width, self.height
				)));
			}
			if at.x + mask.x2 > dst.width || at.y + mask.y2 > dst.height {
				return Err(Error::format(format!(
					"mask ({}, {})-({}, {}) placed at ({}, {}) exceeds the {}x{} canvas", mask.x1, mask.y1, mask.x2, mask.y2, at.x, at.y, dst.width, dst.height
				)));
			}
			for y in mask.y1..mask.y2 {
				let src = &self.row(y)[mask.x1 as usize..mask.x2 as usize];
				dst.row_mut(at.y + y)[(at.x + mask.x1) as usize..(at.x + mask.x2) as usize].copy_from_slice(src);
			}
		}
		Ok(())
	}

	/// Resizes the image, repeating the last column and row into any new area.
	pub fn resized_clamp_to_edge(&self, size: Size) -> RawImage {
		let mut out = RawImage::empty(size);
		if self.is_empty() || size.area() == 0 {
			return out;
		}
		let common_w = self.width.min(size.width) as usize;
		let common_h = self.height.min(size.height);
		for y in 0..common_h {
			let src = self.row(y);
			let dst = out.row_mut(y);
			dst[..common_w].copy_from_slice(&src[..common_w]);
			dst[common_w..].fill(src[self.width as usize - 1]);
		}
		for y in common_h..size.height {
			let last = out.row(common_h - 1).to_vec();
			out.row_mut(y).copy_from_slice(&last);
		}
		out
	}

	/// Copies out a rectangle, clipped to the image bounds.
	pub fn cropped(&self, rect: MaskRect) -> RawImage {
		let x1 = rect.x1.min(self.width);
		let y1 = rect.y1.min(self.height);
		let x2 = rect.x2.min(self.width).max(x1);
		let y2 = rect.y2.min(self.height).max(y1);
		let mut out = RawImage::empty(Size::new(x2 - x1, y2 - y1));
		for y in y1..y2 {
			out.row_mut(y - y1).copy_from_slice(&self.row(y)[x1 as usize..x2 as usize]);
		}
		out
	}

	pub fn as_rgba_bytes(&self) -> &[u8] {
		bytemuck::cast_slice(&self.pixels)
	}
}
