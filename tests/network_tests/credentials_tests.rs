//! Tests for PEM credential loading

#[path = "../common/mod.rs"]
mod common;

use std::fs;

use apnslink::{ApnsError, Identity};
use tempfile::TempDir;

#[test]
fn test_load_combined_pem() {
    let (cert, key) = common::self_signed_pem();
    let identity = Identity::from_pem(format!("{}{}", cert, key).as_bytes()).unwrap();

    assert_eq!(identity.certificate_chain().len(), 1);
}

#[test]
fn test_load_combined_pem_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("apns.pem");
    let (cert, key) = common::self_signed_pem();
    fs::write(&path, format!("{}{}", cert, key)).unwrap();

    let identity = Identity::from_pem_file(&path).unwrap();
    assert_eq!(identity.certificate_chain().len(), 1);
}

#[test]
fn test_load_separate_files() {
    let temp = TempDir::new().unwrap();
    let cert_path = temp.path().join("cert.pem");
    let key_path = temp.path().join("key.pem");
    let (cert, key) = common::self_signed_pem();
    fs::write(&cert_path, cert).unwrap();
    fs::write(&key_path, key).unwrap();

    let identity = Identity::from_pem_files(&cert_path, &key_path).unwrap();
    assert_eq!(identity.certificate_chain().len(), 1);
}

#[test]
fn test_missing_key() {
    let (cert, _) = common::self_signed_pem();
    let err = Identity::from_pem(cert.as_bytes()).unwrap_err();
    assert!(matches!(err, ApnsError::Certificate(_)));
}

#[test]
fn test_missing_certificate() {
    let (_, key) = common::self_signed_pem();
    let err = Identity::from_pem(key.as_bytes()).unwrap_err();
    assert!(matches!(err, ApnsError::Certificate(_)));
}

#[test]
fn test_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = Identity::from_pem_file(temp.path().join("nope.pem")).unwrap_err();
    assert!(matches!(err, ApnsError::Certificate(_)));
}

#[test]
fn test_debug_redacts_key() {
    let identity = common::test_identity();
    let debug = format!("{:?}", identity.clone());
    assert!(debug.contains("redacted"));
    assert!(!debug.contains("PRIVATE"));
}
