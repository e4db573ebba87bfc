use std::io::{Read, Seek, SeekFrom};
use crate::error::{Error, Result};

/// Seekable input with a known length. Every read is checked against that length before
/// anything is allocated, so a bogus size field fails instead of exhausting memory.
pub struct Source<R> {
	inner: R,
	len: u64,
	pos: u64
}

macro_rules! impl_field_readers {
	($($t:ty),*) => {paste::paste! {$(
		pub fn [<read_ $t>](&mut self, name: &'static str) -> Result<$t> {
			Ok($t::from_le_bytes(self.read_array(name)?))
		}
		pub fn [<read_ $t _be>](&mut self, name: &'static str) -> Result<$t> {
			Ok($t::from_be_bytes(self.read_array(name)?))
		}
		pub fn [<get_ $t _at>](&mut self, offset: u64, name: &'static str) -> Result<$t> {
			self.seek_to(offset)?;
			self.[<read_ $t>](name)
		}
	)*}}
}

impl<R: Read + Seek> Source<R> {
	pub fn new(mut inner: R) -> Result<Self> {
		let len = inner.seek(SeekFrom::End(0))?;
		inner.seek(SeekFrom::Start(0))?;
		Ok(Self {inner, len, pos: 0})
	}

	pub fn len(&self) -> u64 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn position(&self) -> u64 {
		self.pos
	}

	pub fn seek_to(&mut self, offset: u64) -> Result<()> {
		if offset > self.len {
			return Err(Error::format(format!("offset {offset} is past the end of the {}-byte file", self.len)));
		}
		if offset != self.pos {
			self.inner.seek(SeekFrom::Start(offset))?;
			self.pos = offset;
		}
		Ok(())
	}

	pub fn skip(&mut self, count: u64, name: &'static str) -> Result<()> {
		let target = self.pos.checked_add(count).filter(|x| *x <= self.len).ok_or_else(|| {
			Error::format(format!("could not skip {name}: {count} bytes at {} run past the end of the file", self.pos))
		})?;
		self.seek_to(target)
	}

	fn check_remaining(&self, count: u64, name: &'static str) -> Result<()> {
		if self.pos.checked_add(count).is_none_or(|end| end > self.len) {
			Err(Error::format(format!("could not read {name}: {count} bytes at {} run past the end of the file", self.pos)))
		} else {
			Ok(())
		}
	}

	pub fn read_array<const LEN: usize>(&mut self, name: &'static str) -> Result<[u8; LEN]> {
		self.check_remaining(LEN as u64, name)?;
		let mut buf = [0u8; LEN];
		self.inner.read_exact(&mut buf)?;
		self.pos += LEN as u64;
		Ok(buf)
	}

	pub fn read_vec(&mut self, len: usize, name: &'static str) -> Result<Vec<u8>> {
		self.check_remaining(len as u64, name)?;
		let mut buf = vec![0u8; len];
		self.inner.read_exact(&mut buf)?;
		self.pos += len as u64;
		Ok(buf)
	}

	pub fn read_vec_at(&mut self, offset: u64, len: usize, name: &'static str) -> Result<Vec<u8>> {
		self.seek_to(offset)?;
		self.read_vec(len, name)
	}

	impl_field_readers!(u16, u32);
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use super::*;

	#[test]
	fn reads_little_and_big_endian_fields() {
		let mut src = Source::new(Cursor::new(b"PIC4\x10\x00\x00\x00\x02\x01".to_vec())).unwrap();
		assert_eq!(src.len(), 10);
		assert_eq!(src.read_u32_be("magic").unwrap(), u32::from_be_bytes(*b"PIC4"));
		assert_eq!(src.read_u32("size").unwrap(), 16);
		assert_eq!(src.read_u16("width").unwrap(), 0x102);
		assert_eq!(src.position(), 10);
	}

	#[test]
	fn reads_past_the_end_fail_with_the_field_name() {
		let mut src = Source::new(Cursor::new(vec![0u8; 6])).unwrap();
		src.skip(4, "prefix").unwrap();
		let err = src.read_u32("chunk count").unwrap_err().to_string();
		assert!(err.contains("chunk count"), "{err}");
		assert!(src.read_vec(usize::MAX / 2, "payload").is_err());
		assert!(src.skip(3, "padding").is_err());
		assert!(src.seek_to(7).is_err());
	}

	#[test]
	fn random_access_reads() {
		let mut src = Source::new(Cursor::new((0u8..16).collect::<Vec<_>>())).unwrap();
		assert_eq!(src.get_u16_at(4, "x").unwrap(), 0x0504);
		assert_eq!(src.read_vec_at(14, 2, "tail").unwrap(), vec![14, 15]);
		assert!(src.read_vec_at(15, 2, "tail").is_err());
	}
}
