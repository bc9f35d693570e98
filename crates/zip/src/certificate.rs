use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use md5::{Digest, Md5};
use serde::Serialize;
use sha1::Sha1;
use sha2::Sha256;
use x509_cert::Certificate;
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, Encode, EncodePem};

use crate::errors::CertificateError;
use crate::signing_block::SigningScheme;

/// `id-signedData` content type of PKCS#7
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// Metadata of an X.509 signing certificate
///
/// Nothing here is verified, the values are read as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMeta {
    /// Java name of the signature algorithm, like `SHA256withRSA`
    pub sign_algorithm: String,

    #[serde(rename = "signAlgorithmOID")]
    pub sign_algorithm_oid: String,

    /// Hex of the serial number bytes
    pub serial_number: String,

    pub subject: String,
    pub issuer: String,

    /// Start of the validity window, RFC 3339
    pub start_date: String,

    /// End of the validity window, RFC 3339
    pub end_date: String,

    /// DER encoding of the whole certificate
    #[serde(skip)]
    pub data: Vec<u8>,

    /// MD5 of the base64 text of the DER bytes
    pub cert_base64_md5: String,

    /// MD5 of the DER bytes
    pub cert_md5: String,

    pub sha1_fingerprint: String,
    pub sha256_fingerprint: String,
}

impl CertificateMeta {
    pub fn from_der(der: &[u8]) -> Result<CertificateMeta, CertificateError> {
        let certificate = Certificate::from_der(der).map_err(der_error)?;
        Self::from_certificate(&certificate, der.to_vec())
    }

    fn from_certificate(
        certificate: &Certificate,
        data: Vec<u8>,
    ) -> Result<CertificateMeta, CertificateError> {
        let tbs = &certificate.tbs_certificate;
        let oid = certificate.signature_algorithm.oid.to_string();

        // base64 body of the PEM form, without line breaks
        let pem = certificate.to_pem(LineEnding::LF).map_err(der_error)?;
        let base64: String = pem.lines().filter(|line| !line.starts_with("-----")).collect();

        Ok(CertificateMeta {
            sign_algorithm: algorithm_name(&oid).unwrap_or(&oid).to_owned(),
            sign_algorithm_oid: oid,
            serial_number: const_hex::encode(tbs.serial_number.as_bytes()),
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            start_date: tbs.validity.not_before.to_date_time().to_string(),
            end_date: tbs.validity.not_after.to_date_time().to_string(),
            cert_base64_md5: const_hex::encode(Md5::digest(base64.as_bytes())),
            cert_md5: const_hex::encode(Md5::digest(&data)),
            sha1_fingerprint: const_hex::encode(Sha1::digest(&data)),
            sha256_fingerprint: const_hex::encode(Sha256::digest(&data)),
            data,
        })
    }

    /// Certificates carried by a PKCS#7 `SignedData` blob (`META-INF/*.RSA`)
    pub fn from_pkcs7(data: &[u8]) -> Result<Vec<CertificateMeta>, CertificateError> {
        let content = ContentInfo::from_der(data).map_err(der_error)?;
        if content.content_type != ID_SIGNED_DATA {
            return Err(CertificateError::UnsupportedContent(
                content.content_type.to_string(),
            ));
        }

        let signed = content.content.to_der().map_err(der_error)?;
        let signed = SignedData::from_der(&signed).map_err(der_error)?;

        let Some(certificates) = signed.certificates else {
            return Ok(Vec::new());
        };

        let mut metas = Vec::new();
        for choice in certificates.0.iter() {
            if let CertificateChoices::Certificate(certificate) = choice {
                let der = certificate.to_der().map_err(der_error)?;
                metas.push(Self::from_certificate(certificate, der)?);
            }
        }

        Ok(metas)
    }
}

fn der_error(err: x509_cert::der::Error) -> CertificateError {
    CertificateError::Der(err.to_string())
}

/// Java style name of common signature algorithms
fn algorithm_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        "1.2.840.113549.1.1.4" => "MD5withRSA",
        "1.2.840.113549.1.1.5" => "SHA1withRSA",
        "1.2.840.113549.1.1.10" => "RSASSA-PSS",
        "1.2.840.113549.1.1.11" => "SHA256withRSA",
        "1.2.840.113549.1.1.12" => "SHA384withRSA",
        "1.2.840.113549.1.1.13" => "SHA512withRSA",
        "1.2.840.10040.4.3" => "SHA1withDSA",
        "2.16.840.1.101.3.4.3.2" => "SHA256withDSA",
        "1.2.840.10045.4.1" => "SHA1withECDSA",
        "1.2.840.10045.4.3.2" => "SHA256withECDSA",
        "1.2.840.10045.4.3.3" => "SHA384withECDSA",
        "1.2.840.10045.4.3.4" => "SHA512withECDSA",
        "1.3.101.112" => "Ed25519",
        _ => return None,
    };

    Some(name)
}

/// v1 (JAR) signer, one per signature file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApkSigner {
    /// Path of the signature file inside the archive
    pub path: String,

    pub certificates: Vec<CertificateMeta>,
}

/// Signer of a v2/v3 signing block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApkV2Signer {
    pub scheme: SigningScheme,
    pub certificates: Vec<CertificateMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &[u8] = include_bytes!("../testdata/cert.der");
    const PKCS7: &[u8] = include_bytes!("../testdata/CERT.EC");

    #[test]
    fn reads_certificate_metadata() {
        let meta = CertificateMeta::from_der(CERT).unwrap();

        assert_eq!(meta.sign_algorithm, "SHA256withECDSA");
        assert_eq!(meta.sign_algorithm_oid, "1.2.840.10045.4.3.2");
        assert_eq!(meta.serial_number, "1234abcd");
        assert!(meta.subject.contains("CN=Example Signer"));
        assert_eq!(meta.subject, meta.issuer);
        assert!(meta.start_date.starts_with("2026-10-18"));
        assert!(meta.end_date.starts_with("2051-10-12"));
        assert_eq!(meta.cert_md5, "c5779dd53b5cc19969aecfc2ba988a01");
        assert_eq!(meta.cert_base64_md5, "db66fe30ec1c0d27072fc6eac59391ac");
        assert_eq!(
            meta.sha256_fingerprint,
            "943389eaa75812a33b2341d5870797ed1f110b3addf4e8843506e69fb94e06e8"
        );
        assert_eq!(meta.data, CERT);
    }

    #[test]
    fn reads_pkcs7_certificates() {
        let metas = CertificateMeta::from_pkcs7(PKCS7).unwrap();

        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0], CertificateMeta::from_der(CERT).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            CertificateMeta::from_der(&CERT[..100]),
            Err(CertificateError::Der(_))
        ));
        assert!(matches!(
            CertificateMeta::from_pkcs7(b"not a pkcs7 blob"),
            Err(CertificateError::Der(_))
        ));
    }

    #[test]
    fn unknown_algorithm_keeps_oid() {
        assert_eq!(algorithm_name("1.2.3.4"), None);
        assert_eq!(algorithm_name("1.2.840.113549.1.1.11"), Some("SHA256withRSA"));
    }
}
