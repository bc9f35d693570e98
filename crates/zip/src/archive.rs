use std::io::Read;

use ahash::AHashMap;
use apkparse_buffer::window;
use flate2::read::DeflateDecoder;
use log::{debug, warn};

use crate::certificate::{ApkSigner, ApkV2Signer, CertificateMeta};
use crate::errors::{CertificateError, FileCompressionType, ZipError};
use crate::signing_block::SigningBlock;
use crate::structs::{
    CentralDirectory, CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader,
};

/// Upper bound for preallocation from the declared uncompressed size
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Parsed ZIP archive over an owned buffer
pub struct ZipArchive {
    input: Vec<u8>,
    eocd_offset: usize,
    eocd: EndOfCentralDirectory,
    entries: Vec<CentralDirectoryEntry>,
    index: AHashMap<String, usize>,
}

impl ZipArchive {
    pub fn new(input: Vec<u8>) -> Result<ZipArchive, ZipError> {
        // perform basic sanity check
        if !input.starts_with(&LocalFileHeader::MAGIC) {
            return Err(ZipError::InvalidHeader);
        }

        let (eocd_offset, eocd) =
            EndOfCentralDirectory::locate(&input).ok_or(ZipError::NotFoundEOCD)?;

        let entries = CentralDirectory::parse(&input, &eocd)
            .map_err(ZipError::CentralDirectory)?
            .entries;

        // duplicated names resolve to the first record
        let mut index = AHashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.contains_key(&entry.file_name) {
                warn!("duplicated zip entry {:?}, keeping the first one", entry.file_name);
                continue;
            }
            index.insert(entry.file_name.clone(), i);
        }

        debug!(
            "zip with {} entries, eocd at 0x{:x}, central directory at 0x{:x}",
            entries.len(),
            eocd_offset,
            eocd.central_dir_offset
        );

        Ok(ZipArchive {
            input,
            eocd_offset,
            eocd,
            entries,
            index,
        })
    }

    /// Unique entry names in central directory order
    pub fn namelist(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, entry)| self.index.get(&entry.file_name) == Some(i))
            .map(|(_, entry)| entry.file_name.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&CentralDirectoryEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Raw archive bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.input
    }

    #[inline]
    pub fn eocd(&self) -> (usize, &EndOfCentralDirectory) {
        (self.eocd_offset, &self.eocd)
    }

    /// Read an entry, tolerating tampered compression methods
    ///
    /// Unknown methods are handled like the Android installer does: if the
    /// payload inflates cleanly it is deflate, otherwise it is stored.
    pub fn read(&self, name: &str) -> Result<(Vec<u8>, FileCompressionType), ZipError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ZipError::FileNotFound(name.to_owned()))?;

        let local_offset = entry.local_header_offset as usize;
        let local_header = LocalFileHeader::parse(&self.input, local_offset)
            .map_err(|_| ZipError::EOF(name.to_owned()))?;

        // sizes are zeroed in the local header when a data descriptor is used
        let (compressed_size, uncompressed_size) =
            if local_header.compressed_size == 0 || local_header.uncompressed_size == 0 {
                (
                    entry.compressed_size as usize,
                    entry.uncompressed_size as usize,
                )
            } else {
                (
                    local_header.compressed_size as usize,
                    local_header.uncompressed_size as usize,
                )
            };

        let offset = local_offset + local_header.size();
        let get_slice =
            |len: usize| window(&self.input, offset, len).map_err(|_| ZipError::EOF(name.to_owned()));

        match (
            local_header.compression_method,
            compressed_size == uncompressed_size,
        ) {
            (0, _) => {
                let data = get_slice(uncompressed_size)?;
                Ok((data.to_vec(), FileCompressionType::Stored))
            }
            (8, _) => {
                let compressed = get_slice(compressed_size)?;
                let (data, _) = inflate(compressed, uncompressed_size)
                    .ok_or_else(|| ZipError::DecompressionError(name.to_owned()))?;

                Ok((data, FileCompressionType::Deflated))
            }
            (method, true) => {
                debug!("{} has unknown compression method {}, read as stored", name, method);

                let data = get_slice(uncompressed_size)?;
                Ok((data.to_vec(), FileCompressionType::StoredTampered))
            }
            (method, false) => {
                debug!("{} has unknown compression method {}, trying deflate", name, method);

                let compressed = get_slice(compressed_size)?;
                match inflate(compressed, uncompressed_size) {
                    Some((data, true)) => Ok((data, FileCompressionType::DeflatedTampered)),
                    _ => {
                        let data = get_slice(uncompressed_size)?;
                        Ok((data.to_vec(), FileCompressionType::StoredTampered))
                    }
                }
            }
        }
    }

    /// APK signing block in front of the central directory
    pub fn signing_block(&self) -> Option<SigningBlock<'_>> {
        SigningBlock::locate(&self.input, self.eocd.central_dir_offset as usize)
    }

    /// v1 (JAR) signers from `META-INF/*.RSA`, `*.DSA` and `*.EC`
    pub fn signers_v1(&self) -> Result<Vec<ApkSigner>, CertificateError> {
        let mut signers = Vec::new();

        for name in self.namelist().filter(|name| is_signature_file(name)) {
            let (data, _) = self.read(name)?;
            let certificates = CertificateMeta::from_pkcs7(&data)?;

            signers.push(ApkSigner {
                path: name.to_owned(),
                certificates,
            });
        }

        Ok(signers)
    }

    /// v2, v3 and v3.1 signers, empty when there is no signing block
    pub fn signers_v2(&self) -> Result<Vec<ApkV2Signer>, CertificateError> {
        match self.signing_block() {
            Some(block) => block.signers(),
            None => Ok(Vec::new()),
        }
    }
}

fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };

    let upper = file.to_ascii_uppercase();
    !file.contains('/')
        && (upper.ends_with(".RSA") || upper.ends_with(".DSA") || upper.ends_with(".EC"))
}

/// Inflate raw deflate data, at most `size_hint` bytes of output
///
/// The flag tells whether the whole input was consumed by the stream.
fn inflate(compressed: &[u8], size_hint: usize) -> Option<(Vec<u8>, bool)> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut data = Vec::with_capacity(size_hint.min(MAX_PREALLOC));

    decoder
        .by_ref()
        .take(size_hint as u64 + 1)
        .read_to_end(&mut data)
        .ok()?;
    if data.len() > size_hint {
        warn!("deflate stream inflates past its declared {} bytes", size_hint);
        return None;
    }
    let complete = decoder.total_in() == compressed.len() as u64;

    Some((data, complete))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ZipWriter, signer_block, signing_block};
    use crate::signing_block::{SIGNATURE_V2_BLOCK_ID, SigningScheme};

    const CERT: &[u8] = include_bytes!("../testdata/cert.der");
    const PKCS7: &[u8] = include_bytes!("../testdata/CERT.EC");

    #[test]
    fn reads_stored_and_deflated() {
        let text = b"hello hello hello hello hello hello".repeat(10);
        let zip = ZipWriter::new()
            .stored("a.txt", b"plain")
            .deflated("dir/b.txt", &text)
            .build();

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.namelist().collect::<Vec<_>>(), ["a.txt", "dir/b.txt"]);
        assert!(archive.contains("dir/b.txt"));

        assert_eq!(
            archive.read("a.txt").unwrap(),
            (b"plain".to_vec(), FileCompressionType::Stored)
        );
        assert_eq!(
            archive.read("dir/b.txt").unwrap(),
            (text, FileCompressionType::Deflated)
        );
    }

    #[test]
    fn tampered_methods() {
        let text = b"abcabcabcabcabcabcabcabcabcabcabcabc".repeat(4);
        let zip = ZipWriter::new()
            .tampered("stored.bin", 0x1337, b"raw bytes", false)
            .tampered("deflated.bin", 0x1337, &text, true)
            .build();

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(
            archive.read("stored.bin").unwrap(),
            (b"raw bytes".to_vec(), FileCompressionType::StoredTampered)
        );
        assert_eq!(
            archive.read("deflated.bin").unwrap(),
            (text, FileCompressionType::DeflatedTampered)
        );
    }

    #[test]
    fn missing_entry() {
        let archive = ZipArchive::new(ZipWriter::new().stored("a", b"1").build()).unwrap();
        assert_eq!(
            archive.read("b"),
            Err(ZipError::FileNotFound("b".to_owned()))
        );
    }

    #[test]
    fn duplicated_names_keep_first() {
        let zip = ZipWriter::new()
            .stored("AndroidManifest.xml", b"first")
            .stored("AndroidManifest.xml", b"second")
            .build();

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.namelist().count(), 1);
        assert_eq!(archive.read("AndroidManifest.xml").unwrap().0, b"first");
    }

    #[test]
    fn rejects_non_zip() {
        assert!(matches!(
            ZipArchive::new(b"MZ\x90\x00".to_vec()),
            Err(ZipError::InvalidHeader)
        ));

        let mut zip = ZipWriter::new().stored("a", b"1").build();
        let len = zip.len();
        zip[len - 22] = 0;
        assert!(matches!(ZipArchive::new(zip), Err(ZipError::NotFoundEOCD)));
    }

    #[test]
    fn truncated_entry_data() {
        let mut zip = ZipWriter::new().stored("a", &[7; 64]).build();
        // claim more data than the archive holds
        zip[22..26].copy_from_slice(&0xffffu32.to_le_bytes());
        zip[18..22].copy_from_slice(&0xffffu32.to_le_bytes());

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.read("a"), Err(ZipError::EOF("a".to_owned())));
    }

    #[test]
    fn inflate_stops_at_declared_size() {
        let zip = ZipWriter::new().deflated("bomb", &vec![0; 1 << 20]).build();
        let mut small = zip.clone();
        // uncompressed size in the local header
        small[22..26].copy_from_slice(&16u32.to_le_bytes());

        let archive = ZipArchive::new(small).unwrap();
        assert_eq!(
            archive.read("bomb"),
            Err(ZipError::DecompressionError("bomb".to_owned()))
        );

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.read("bomb").unwrap().0.len(), 1 << 20);
    }

    #[test]
    fn comment_does_not_hide_eocd() {
        let zip = ZipWriter::new()
            .stored("a", b"1")
            .comment(b"PK\x05\x06 fake record in comment")
            .build();

        let archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.namelist().collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn v1_signers() {
        let zip = ZipWriter::new()
            .stored("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")
            .deflated("META-INF/CERT.EC", PKCS7)
            .stored("META-INF/nested/OTHER.RSA", b"ignored")
            .build();

        let signers = ZipArchive::new(zip).unwrap().signers_v1().unwrap();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].path, "META-INF/CERT.EC");
        assert_eq!(signers[0].certificates[0].serial_number, "1234abcd");
    }

    #[test]
    fn v2_signers() {
        let zip = ZipWriter::new()
            .stored("classes.dex", b"dex\n035\0")
            .signing_block(signing_block(&[(SIGNATURE_V2_BLOCK_ID, signer_block(&[CERT]))]))
            .build();

        let archive = ZipArchive::new(zip).unwrap();
        let signers = archive.signers_v2().unwrap();

        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].scheme, SigningScheme::V2);
        assert_eq!(signers[0].certificates[0].sign_algorithm, "SHA256withECDSA");
        assert!(archive.signers_v1().unwrap().is_empty());
    }

    #[test]
    fn unsigned_archive() {
        let archive = ZipArchive::new(ZipWriter::new().stored("a", b"1").build()).unwrap();

        assert!(archive.signing_block().is_none());
        assert!(archive.signers_v2().unwrap().is_empty());
    }

    fn exercise(data: Vec<u8>) {
        let Ok(archive) = ZipArchive::new(data) else {
            return;
        };

        for name in archive.namelist() {
            let _ = archive.read(name);
        }
        let _ = archive.signers_v1();
        let _ = archive.signers_v2();
    }

    #[test]
    fn truncated_archive_never_panics() {
        let zip = ZipWriter::new()
            .stored("classes.dex", b"dex\n035\0")
            .deflated("META-INF/CERT.EC", PKCS7)
            .tampered("res/raw.bin", 0x1337, &[9; 64], true)
            .signing_block(signing_block(&[(SIGNATURE_V2_BLOCK_ID, signer_block(&[CERT]))]))
            .build();

        for len in 0..zip.len() {
            exercise(zip[..len].to_vec());
        }
        for at in 0..zip.len() {
            let mut corrupt = zip.clone();
            corrupt[at] ^= 0xff;
            exercise(corrupt);
        }
    }

    #[test]
    fn signature_file_names() {
        assert!(is_signature_file("META-INF/CERT.RSA"));
        assert!(is_signature_file("META-INF/cert.dsa"));
        assert!(is_signature_file("META-INF/KEY.EC"));
        assert!(!is_signature_file("META-INF/CERT.SF"));
        assert!(!is_signature_file("assets/CERT.RSA"));
    }
}
