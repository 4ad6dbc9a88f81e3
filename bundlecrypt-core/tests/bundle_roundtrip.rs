use std::io::Cursor;
use std::{env, fs};

use bundlecrypt_core::{
    BundleData, CryptError, DecryptStream, KeyFragment, Schedule, decrypt_bundle, decrypt_ram,
    decrypt_to_file, open_bundle,
};

const ZERO_GUID: &str = "00000000-0000-0000-0000-000000000000";

fn payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31).wrapping_add(7)) as u8)
        .collect()
}

#[test]
fn zero_guid_scenario() {
    let key = KeyFragment::from_bytes(vec![0xAA; 16]).unwrap();

    let mut stream =
        DecryptStream::new(Cursor::new(payload(2000)), ZERO_GUID, key.clone(), 2000).unwrap();
    assert_eq!(stream.len(), 2016);
    assert_eq!(stream.read_all().unwrap().len(), 2016);

    // schedule derivation is a pure function of its inputs
    let first = Schedule::build(ZERO_GUID.as_bytes(), 2000, key.as_bytes()).unwrap();
    let second = Schedule::build(ZERO_GUID.as_bytes(), 2000, key.as_bytes()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn key_only_bundle_decrypts() {
    let key = KeyFragment::from_bytes(vec![0x42; 32]).unwrap();
    let mut stream =
        DecryptStream::new(Cursor::new(Vec::new()), ZERO_GUID, key, 0).unwrap();
    assert_eq!(stream.len(), 32);
    assert_eq!(stream.read_all().unwrap().len(), 32);
}

#[test]
fn base64_key_adapter() {
    let key = KeyFragment::from_base64("qqqqqqqqqqqqqqqqqqqqqg==").unwrap();
    assert_eq!(key.as_bytes(), &[0xAA; 16][..]);

    assert!(matches!(
        KeyFragment::from_base64("not valid!"),
        Err(CryptError::KeyFragmentEncoding(_))
    ));
    assert!(matches!(
        KeyFragment::from_base64(""),
        Err(CryptError::EmptyKeyFragment)
    ));
}

#[test]
fn construction_contract_violations() {
    let key = KeyFragment::from_bytes(vec![0xAA; 16]).unwrap();

    assert!(matches!(
        Schedule::build(b"", 100, key.as_bytes()),
        Err(CryptError::EmptyIdentifier)
    ));
    assert!(matches!(
        Schedule::build(b"some-id", 100, b""),
        Err(CryptError::EmptyKeyFragment)
    ));
    assert!(matches!(
        Schedule::build(b"some-id", u32::MAX as u64, key.as_bytes()),
        Err(CryptError::BundleTooLarge { .. })
    ));
    assert!(matches!(
        KeyFragment::from_bytes(Vec::new()),
        Err(CryptError::EmptyKeyFragment)
    ));
}

#[test]
fn file_helpers_agree() {
    let base = env::temp_dir().join(format!("bundlecrypt-test-{}", std::process::id()));
    let input_dir = base.join("in");
    let tmp_dir = base.join("tmp");
    let out_dir = base.join("out");
    for dir in [&input_dir, &tmp_dir, &out_dir] {
        fs::create_dir_all(dir).unwrap();
    }

    let identifier = "f47ac10b-58cc-4372-a567-0e02b2c3d479";
    let input_path = input_dir.join(format!("{identifier}.bundle"));
    fs::write(&input_path, payload(4096)).unwrap();

    let key = KeyFragment::from_bytes(vec![0x5C; 24]).unwrap();

    let via_ram = decrypt_ram(&input_path, identifier, key.clone()).unwrap();
    assert_eq!(via_ram.len(), 4096 + 24);

    let output_path = out_dir.join("decrypted.bundle");
    let written = decrypt_to_file(&input_path, &output_path, identifier, key.clone()).unwrap();
    assert_eq!(written, via_ram.len() as u64);
    assert_eq!(fs::read(&output_path).unwrap(), via_ram);

    // identifier derived from the file stem
    let mut stream = open_bundle(&input_path, key.clone()).unwrap();
    assert_eq!(stream.read_all().unwrap(), via_ram);

    let small = decrypt_bundle(&input_path, &tmp_dir, identifier, key.clone(), usize::MAX).unwrap();
    assert!(matches!(*small, BundleData::Small(_)));
    assert_eq!(&small[..], &via_ram[..]);

    let big = decrypt_bundle(&input_path, &tmp_dir, identifier, key, 0).unwrap();
    assert!(matches!(*big, BundleData::Big(_)));
    assert_eq!(&big[..], &via_ram[..]);

    fs::remove_dir_all(&base).unwrap();
}
