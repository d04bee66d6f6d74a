//! Packages signed with gpg itself, checked against the exported key block

use srcport_rpm::test_utils::PackageSigner;
use srcport_rpm::{PackageHeader, SignatureError, TrustedKeys};

const GPG_KEY: &str = include_str!("fixtures/RPM-GPG-KEY-srcport-test");
const HEADER_SIGNED: &[u8] = include_bytes!("fixtures/srcport-test-1.0-1.el8.src.rpm");
const PAYLOAD_SIGNED: &[u8] = include_bytes!("fixtures/srcport-legacy-2.1-3.src.rpm");

#[test]
fn test_load_gpg_exported_key() {
    let keys = TrustedKeys::from_armored(GPG_KEY).unwrap();
    assert_eq!(keys.key_count(), 1);
}

#[test]
fn test_verify_rsaheader_signature() {
    let keys = TrustedKeys::from_armored(GPG_KEY).unwrap();
    keys.verify_package(HEADER_SIGNED).unwrap();

    let header = PackageHeader::parse(HEADER_SIGNED).unwrap();
    assert_eq!(header.source_entry_id(), "srcport-test-1.0-1.el8.src");
}

#[test]
fn test_verify_legacy_pgp_signature_covers_payload() {
    let keys = TrustedKeys::from_armored(GPG_KEY).unwrap();
    keys.verify_package(PAYLOAD_SIGNED).unwrap();

    let mut tampered = PAYLOAD_SIGNED.to_vec();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    assert!(keys.verify_package(&tampered).is_err());
}

#[test]
fn test_other_key_is_not_trusted() {
    let keys = PackageSigner::test_key().trusted_keys();
    let err = keys.verify_package(HEADER_SIGNED).unwrap_err();
    assert_eq!(
        err,
        SignatureError::Untrusted {
            key_id: "C60CC8E4157F21C9".to_string()
        }
    );
}

#[test]
fn test_key_files_concatenate() {
    let combined = format!(
        "{}\n{}",
        GPG_KEY,
        PackageSigner::test_key().armored_public_key()
    );
    let keys = TrustedKeys::from_armored(&combined).unwrap();
    assert_eq!(keys.key_count(), 2);
    keys.verify_package(HEADER_SIGNED).unwrap();
}
