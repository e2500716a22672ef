//! Tests of the complete parse, sign, and verify cycle.

use bytes::Bytes;
use cmsig::{ContentInfo, EncapsulatedContentInfo, Error, SignedData};
use cmsig::ber;
use cmsig::cert::Cert;
use cmsig::crypto::{DigestAlgorithm, SoftSigner};
use cmsig::oid;
use cmsig::x509::Time;

fn cert(data: &[u8]) -> Cert {
    Cert::decode(data).unwrap()
}

#[test]
fn openssl_messages() {
    let rsa = cert(include_bytes!("../test-data/rsa.cer"));
    let ca = cert(include_bytes!("../test-data/ca.cer"));
    let ec = cert(include_bytes!("../test-data/ec.cer"));

    let info = ContentInfo::decode_ber(
        include_bytes!("../test-data/rsa-ber.p7")
    ).unwrap();
    assert!(*info.content_type() == oid::SIGNED_DATA);
    let sd = info.signed_data().unwrap();
    assert_eq!(sd.certificates().unwrap(), vec![rsa.clone(), ca.clone()]);
    assert_eq!(sd.verify(None).unwrap(), vec![rsa.clone()]);
    assert_eq!(
        sd.encap_content_info().data_content().unwrap().unwrap().as_ref(),
        b"hello"
    );
    let info = &sd.signer_infos()[0];
    assert_eq!(
        info.signing_time_attr().unwrap(),
        Time::utc(2026, 10, 18, 14, 35, 44).unwrap()
    );

    // Strict DER parsing refuses the indefinite lengths.
    assert!(ContentInfo::decode(
        include_bytes!("../test-data/rsa-ber.p7")
    ).is_err());

    let sd = ContentInfo::decode(
        include_bytes!("../test-data/ec.p7")
    ).unwrap().signed_data().unwrap();
    assert_eq!(sd.verify(None).unwrap(), vec![ec]);

    let sd = ContentInfo::decode(
        include_bytes!("../test-data/rsa-keyid.p7")
    ).unwrap().signed_data().unwrap();
    assert_eq!(sd.signer_infos()[0].version(), 3);
    assert_eq!(sd.verify(None).unwrap(), vec![rsa.clone()]);

    let sd = ContentInfo::decode(
        include_bytes!("../test-data/rsa-detached.p7")
    ).unwrap().signed_data().unwrap();
    assert!(matches!(sd.verify(None), Err(Error::MissingContent)));
    assert_eq!(sd.verify(Some(&b"hello"[..])).unwrap(), vec![rsa]);
}

#[test]
fn normalize_is_idempotent() {
    for data in [
        &include_bytes!("../test-data/rsa-ber.p7")[..],
        &include_bytes!("../test-data/ec.p7")[..],
    ] {
        let der = ber::normalize(data).unwrap();
        assert_eq!(ber::normalize(&der).unwrap(), der);
    }
}

#[test]
fn sign_and_verify() {
    let signer = SoftSigner::new();
    let rsa_key = signer.key_from_pkcs8(
        include_bytes!("../test-data/rsa.key.pk8")
    ).unwrap();
    let ec_key = signer.key_from_pkcs8(
        include_bytes!("../test-data/ec.key.pk8")
    ).unwrap();
    let rsa = cert(include_bytes!("../test-data/rsa.cer"));
    let ca = cert(include_bytes!("../test-data/ca.cer"));
    let ec = cert(include_bytes!("../test-data/ec.cer"));

    let mut sd = SignedData::new(
        EncapsulatedContentInfo::new_data(Bytes::from_static(b"hello"))
    );
    sd.add_signer_info(
        &[rsa.clone(), ca.clone(), rsa.clone()], &signer, &rsa_key
    ).unwrap();
    sd.add_signer_info_at(
        &[ec.clone()], &signer, &ec_key, Time::now()
    ).unwrap();

    let der = sd.to_content_info_der();
    let sd = ContentInfo::decode(&der).unwrap().signed_data().unwrap();
    assert_eq!(sd.digest_algorithms().len(), 1);
    assert_eq!(
        DigestAlgorithm::from_identifier(&sd.digest_algorithms()[0]).unwrap(),
        DigestAlgorithm::Sha256
    );
    assert_eq!(sd.certificates().unwrap(), vec![rsa.clone(), ca, ec.clone()]);
    assert_eq!(sd.verify(None).unwrap(), vec![rsa, ec]);
    for info in sd.signer_infos() {
        assert_eq!(
            info.message_digest_attr().unwrap().as_ref(),
            DigestAlgorithm::Sha256.digest(b"hello").unwrap().as_ref()
        );
    }

    // A tampered message fails verification.
    let mut tampered = der.to_vec();
    let pos = tampered.windows(5).position(|w| w == b"hello").unwrap();
    tampered[pos] = b'j';
    let sd = ContentInfo::decode(&tampered).unwrap().signed_data().unwrap();
    assert!(matches!(sd.verify(None), Err(Error::Verification(_))));
}
