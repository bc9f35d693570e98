use std::path::Path;

use anyhow::{Context, Result};
use apkparse::CertificateMeta;
use colored::Colorize;
use serde::Serialize;

use crate::commands::path_helpers::open_apk;

pub(crate) fn command_signers(path: &Path, json: bool) -> Result<()> {
    let apk = open_apk(path, None)?;

    let v1 = apk
        .get_signers_v1()
        .with_context(|| format!("got error while parsing v1 signatures: {:?}", path))?;
    let v2 = apk
        .get_signers_v2()
        .with_context(|| format!("got error while parsing signing block: {:?}", path))?;

    if json {
        #[derive(Serialize)]
        struct Signers<'a> {
            v1: &'a [apkparse::ApkSigner],
            v2: &'a [apkparse::ApkV2Signer],
        }

        println!("{}", serde_json::to_string(&Signers { v1, v2 })?);
        return Ok(());
    }

    for signer in v1 {
        println!("{}: {}", "Type", "v1".green());
        println!("{}: {}", "Path", signer.path.green());
        for certificate in &signer.certificates {
            print_certificate(certificate);
        }
        println!();
    }

    for signer in v2 {
        println!("{}: {}", "Type", signer.scheme.name().green());
        for certificate in &signer.certificates {
            print_certificate(certificate);
        }
        println!();
    }

    if v1.is_empty() && v2.is_empty() {
        println!("{}", "no signers found".yellow());
    }

    Ok(())
}

fn print_certificate(certificate: &CertificateMeta) {
    println!("  {}: {}", "Serial Number", certificate.serial_number.green());
    println!("  {}: {}", "Subject", certificate.subject.green());
    println!("  {}: {}", "Issuer", certificate.issuer.green());
    println!("  {}: {}", "Valid from", certificate.start_date.green());
    println!("  {}: {}", "Valid until", certificate.end_date.green());
    println!("  {}: {}", "Signature type", certificate.sign_algorithm.green());
    println!("  {}: {}", "MD5 fingerprint", certificate.cert_md5.green());
    println!("  {}: {}", "SHA1 fingerprint", certificate.sha1_fingerprint.green());
    println!(
        "  {}: {}",
        "SHA256 fingerprint",
        certificate.sha256_fingerprint.green()
    );
}
