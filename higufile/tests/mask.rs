use std::io::Cursor;
use bytes::BufMut;
use higufile::{lz77, Config, Error};

fn msk3_ps3(width: u16, height: u16, plane: &[u8]) -> Vec<u8> {
	let packed = lz77::compress(plane, false);
	let mut file = Vec::new();
	file.put_slice(b"MSK3");
	file.put_u32_le((16 + packed.len()) as u32);
	file.put_u16_le(width);
	file.put_u16_le(height);
	file.put_u32_le(packed.len() as u32);
	file.put_slice(&packed);
	file
}

#[test]
fn mask_becomes_grayscale_png() {
	let plane: Vec<u8> = (0..6 * 5).map(|i| (i * 8) as u8).collect();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("mask.png");
	higufile::convert(Cursor::new(msk3_ps3(6, 5, &plane)), &out, &Config::default()).unwrap();
	let gray = image::open(&out).unwrap();
	assert_eq!(gray.color(), image::ColorType::L8);
	assert_eq!(gray.to_luma8().into_raw(), plane);
}

#[test]
fn short_mask_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let result = higufile::convert(Cursor::new(msk3_ps3(6, 5, &[7; 29])), &dir.path().join("mask.png"), &Config::default());
	assert!(matches!(result, Err(Error::CorruptStream(_))));
}

#[test]
fn ps3_msk4_is_unsupported() {
	let mut file = b"MSK4".to_vec();
	file.resize(40, 0);
	let dir = tempfile::tempdir().unwrap();
	let result = higufile::convert(Cursor::new(file), &dir.path().join("mask.png"), &Config::default());
	assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn unknown_magic_names_its_characters() {
	let mut file = b"ABCD".to_vec();
	file.resize(32, 0);
	let dir = tempfile::tempdir().unwrap();
	match higufile::convert(Cursor::new(file), &dir.path().join("x.png"), &Config::default()) {
		Err(e @ Error::UnknownMagic(_)) => assert_eq!(e.to_string(), "unknown magic 'ABCD'"),
		other => panic!("unexpected {other:?}")
	}
}

#[test]
fn pictures_and_atlases_are_the_only_replaceable_kinds() {
	let file = msk3_ps3(2, 2, &[1, 2, 3, 4]);
	let dir = tempfile::tempdir().unwrap();
	let result = higufile::replace(Cursor::new(file), dir.path(), Vec::new(), &Config::default());
	assert!(matches!(result, Err(Error::Unsupported(_))));
}
