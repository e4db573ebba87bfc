use crate::error::{Error, Result};

// Token stream: one control byte per run of up to 8 tokens, read LSB first. A 0 bit is a literal
// byte, a 1 bit is a 2-byte back-reference: the low nibble of the first byte is length - 3, the
// high nibble and the second byte together are distance - 1. Switch files store the first byte
// with its nibbles swapped.

const MIN_MATCH: usize = 3;

fn swap_nibbles(b: u8) -> u8 {
	b.rotate_left(4)
}

pub fn decompress(inp: &[u8], is_switch: bool) -> Result<Vec<u8>> {
	let mut out = Vec::with_capacity(inp.len() * 2);
	let mut flags = 1u32;
	let mut p = 0;
	while p < inp.len() {
		if flags == 1 {
			flags = 0x100 | inp[p] as u32; // the marker bit tells us when eight tokens were used up
			p += 1;
			if p >= inp.len() {
				break;
			}
		}
		if flags & 1 != 0 {
			let (Some(&b1), Some(&b2)) = (inp.get(p), inp.get(p + 1)) else {
				return Err(Error::corrupt(format!("back-reference at input byte {p} is cut off by the end of the stream")));
			};
			p += 2;
			let b1 = if is_switch {swap_nibbles(b1)} else {b1};
			let count = (b1 & 0x0F) as usize + MIN_MATCH;
			let distance = ((b1 as usize & 0xF0) << 4 | b2 as usize) + 1;
			if distance > out.len() {
				return Err(Error::corrupt(format!(
					"back-reference reaches {distance} bytes back but only {} bytes were decoded", out.len()
				)));
			}
			// byte by byte, since the source may overlap what this same reference produces
			let start = out.len() - distance;
			for i in start..start + count {
				out.push(out[i]);
			}
		} else {
			out.push(inp[p]);
			p += 1;
		}
		flags >>= 1;
	}
	Ok(out)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CompressorConfig {
	/// Bits used to encode a match length.
	pub match_bits: u32,
	/// Bits used to encode a back distance.
	pub window_bits: u32,
	/// Shift applied between the three hashed bytes.
	pub hash_shift: u32
}

impl CompressorConfig {
	/// Widest length and distance fields a 2-byte back-reference can hold.
	pub const MAX_MATCH_BITS: u32 = 4;
	pub const MAX_WINDOW_BITS: u32 = 12;
	pub const MAX_HASH_SHIFT: u32 = 4;

	/// Narrows every field to what the token format can express.
	pub fn clamped(self) -> Self {
		Self {
			match_bits: self.match_bits.min(Self::MAX_MATCH_BITS),
			window_bits: self.window_bits.min(Self::MAX_WINDOW_BITS),
			hash_shift: self.hash_shift.min(Self::MAX_HASH_SHIFT)
		}
	}
}

impl Default for CompressorConfig {
	fn default() -> Self {
		Self {match_bits: 4, window_bits: 12, hash_shift: 1}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Token {
	Literal(u8),
	/// Length - 3 and distance - 1, as stored.
	Repeat {length: u8, offset: u16}
}

/// Greedy hash-chain match finder. Every position inside the window sits in the bucket of its
/// 3-byte hash and each bucket is searched exhaustively.
pub struct Compressor {
	config: CompressorConfig,
	max_match: usize,
	window: usize,
	buckets: Vec<Vec<usize>>,
	tokens: Vec<Token>
}

impl Default for Compressor {
	fn default() -> Self {
		Self::new(CompressorConfig::default())
	}
}

impl Compressor {
	/// Fields wider than a back-reference can store are clamped.
	pub fn new(config: CompressorConfig) -> Self {
		let config = config.clamped();
		Self {
			config,
			max_match: (1 << config.match_bits) + 2,
			window: 1 << config.window_bits,
			buckets: vec![Vec::new(); 1 << (8 + 2 * config.hash_shift)],
			tokens: Vec::new()
		}
	}

	pub fn config(&self) -> CompressorConfig {
		self.config
	}

	fn hash(&self, bytes: &[u8], pos: usize) -> usize {
		let shift = self.config.hash_shift;
		bytes[pos] as usize ^ (bytes[pos + 1] as usize) << shift ^ (bytes[pos + 2] as usize) << (shift * 2)
	}

	fn add(&mut self, bytes: &[u8], pos: usize) {
		let h = self.hash(bytes, pos);
		self.buckets[h].push(pos);
	}

	fn remove(&mut self, bytes: &[u8], pos: usize) {
		let h = self.hash(bytes, pos);
		let bucket = &mut self.buckets[h];
		if let Some(idx) = bucket.iter().position(|x| *x == pos) {
			bucket.swap_remove(idx);
		}
	}

	/// Longest match for `pos`, as (source position, length), if it is at least 3 bytes.
	fn search(&self, bytes: &[u8], pos: usize, max_len: usize) -> Option<(usize, usize)> {
		let mut best: Option<(usize, usize)> = None;
		let mut best_len = MIN_MATCH - 1;
		for &candidate in &self.buckets[self.hash(bytes, pos)] {
			let period = pos - candidate;
			// comparing against candidate + (i % period) is what the decoder's overlapping copy produces
			let len = (0..max_len).take_while(|&i| bytes[candidate + i % period] == bytes[pos + i]).count();
			if len > best_len {
				best_len = len;
				best = Some((candidate, len));
				if len == max_len {
					break;
				}
			}
		}
		best
	}

	/// Slides the window over `pos`: drops the position falling out of it and indexes `pos` if it
	/// is still hashable.
	fn advance(&mut self, bytes: &[u8], pos: usize, end: usize) {
		if pos >= self.window {
			self.remove(bytes, pos - self.window);
		}
		if pos < end {
			self.add(bytes, pos);
		}
	}

	fn tokenize(&mut self, inp: &[u8]) {
		self.tokens.clear();
		for bucket in &mut self.buckets {
			bucket.clear();
		}
		// the final two bytes are always literals, so every position before `end` can be hashed
		let end = inp.len().saturating_sub(2);
		let mut i = 0;
		while i < end {
			let max_len = self.max_match.min(end - i);
			let found = if max_len >= MIN_MATCH {self.search(inp, i, max_len)} else {None};
			if let Some((src, len)) = found {
				self.tokens.push(Token::Repeat {length: (len - MIN_MATCH) as u8, offset: (i - src - 1) as u16});
				for j in i..i + len {
					self.advance(inp, j, end);
				}
				i += len;
			} else {
				self.tokens.push(Token::Literal(inp[i]));
				self.advance(inp, i, end);
				i += 1;
			}
		}
		self.tokens.extend(inp[i..].iter().map(|x| Token::Literal(*x)));
	}

	pub fn compress(&mut self, inp: &[u8], is_switch: bool) -> Vec<u8> {
		self.tokenize(inp);
		let mut out = Vec::with_capacity(inp.len() + inp.len() / 8 + 1);
		for run in self.tokens.chunks(8) {
			let control = run.iter().enumerate().fold(0u8, |acc, (bit, token)| match token {
				Token::Repeat {..} => acc | 1 << bit,
				Token::Literal(_) => acc
			});
			out.push(control);
			for token in run {
				match *token {
					Token::Literal(b) => out.push(b),
					Token::Repeat {length, offset} => {
						let b1 = length | (offset >> 4) as u8 & 0xF0;
						out.push(if is_switch {swap_nibbles(b1)} else {b1});
						out.push(offset as u8);
					}
				}
			}
		}
		out
	}
}

pub fn compress(inp: &[u8], is_switch: bool) -> Vec<u8> {
	Compressor::default().compress(inp, is_switch)
}
