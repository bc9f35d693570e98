use apkparse_buffer::{BufferError, corrupt, le_u32, le_u64, length_prefixed, slice, window};
use log::{debug, warn};
use serde::Serialize;
use winnow::prelude::*;

use crate::certificate::{ApkV2Signer, CertificateMeta};
use crate::errors::CertificateError;

/// Magic at the very end of the signing block
pub const APK_SIGNING_BLOCK_MAGIC: &[u8; 16] = b"APK Sig Block 42";

/// APK signature scheme v2
///
/// See: <https://source.android.com/docs/security/features/apksigning/v2>
pub const SIGNATURE_V2_BLOCK_ID: u32 = 0x7109871a;

/// APK signature scheme v3
///
/// See: <https://source.android.com/docs/security/features/apksigning/v3>
pub const SIGNATURE_V3_BLOCK_ID: u32 = 0xf05368c0;

/// APK signature scheme v3.1
///
/// See: <https://source.android.com/docs/security/features/apksigning/v3-1>
pub const SIGNATURE_V31_BLOCK_ID: u32 = 0x1b93ad61;

/// Padding that aligns the block to 4096 bytes
///
/// More info: <https://android.googlesource.com/platform/tools/apksig/+/refs/heads/master/src/main/java/com/android/apksig/internal/apk/ApkSigningBlockUtils.java#100>
pub const VERITY_PADDING_BLOCK_ID: u32 = 0x42726577;

pub const SOURCE_STAMP_BLOCK_ID: u32 = 0x6dff800d;

/// Signing block id for SDK dependency block
pub const DEPENDENCY_INFO_BLOCK_ID: u32 = 0x504b4453;

/// Kind of an id-value pair of the signing block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    SignatureV2,
    SignatureV3,
    SignatureV31,
    VerityPadding,
    SourceStamp,
    DependencyInfo,
    Unknown(u32),
}

impl From<u32> for BlockKind {
    fn from(id: u32) -> Self {
        match id {
            SIGNATURE_V2_BLOCK_ID => BlockKind::SignatureV2,
            SIGNATURE_V3_BLOCK_ID => BlockKind::SignatureV3,
            SIGNATURE_V31_BLOCK_ID => BlockKind::SignatureV31,
            VERITY_PADDING_BLOCK_ID => BlockKind::VerityPadding,
            SOURCE_STAMP_BLOCK_ID => BlockKind::SourceStamp,
            DEPENDENCY_INFO_BLOCK_ID => BlockKind::DependencyInfo,
            other => BlockKind::Unknown(other),
        }
    }
}

/// Signature scheme of a signer block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SigningScheme {
    #[serde(rename = "v2")]
    V2,
    #[serde(rename = "v3")]
    V3,
    #[serde(rename = "v3.1")]
    V31,
}

impl SigningScheme {
    pub fn name(&self) -> &'static str {
        match self {
            SigningScheme::V2 => "v2",
            SigningScheme::V3 => "v3",
            SigningScheme::V31 => "v3.1",
        }
    }
}

impl BlockKind {
    /// Scheme of the signers stored in this pair, if it holds any
    pub fn scheme(&self) -> Option<SigningScheme> {
        match self {
            BlockKind::SignatureV2 => Some(SigningScheme::V2),
            BlockKind::SignatureV3 => Some(SigningScheme::V3),
            BlockKind::SignatureV31 => Some(SigningScheme::V31),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningPair<'a> {
    pub id: u32,
    pub value: &'a [u8],
}

impl SigningPair<'_> {
    #[inline]
    pub fn kind(&self) -> BlockKind {
        BlockKind::from(self.id)
    }
}

/// APK signing block placed right before the central directory
///
/// Layout: `u64 size | (u64 len, u32 id, value)* | u64 size | magic`,
/// both size fields count everything after the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningBlock<'a> {
    /// Offset of the leading size field
    pub offset: usize,

    pub size: u64,

    pairs: Vec<SigningPair<'a>>,
}

impl<'a> SigningBlock<'a> {
    /// Locate the block in front of the central directory at `cd_start`
    ///
    /// Returns `None` when there is no magic (unsigned or v1-only APK) and
    /// when the two size fields disagree.
    pub fn locate(data: &'a [u8], cd_start: usize) -> Option<SigningBlock<'a>> {
        let magic_offset = cd_start.checked_sub(APK_SIGNING_BLOCK_MAGIC.len())?;
        match window(data, magic_offset, APK_SIGNING_BLOCK_MAGIC.len()) {
            Ok(magic) if magic == APK_SIGNING_BLOCK_MAGIC => {}
            _ => {
                debug!("no apk signing block magic before 0x{:x}", cd_start);
                return None;
            }
        }

        let size = read_u64(data, cd_start.checked_sub(24)?)?;
        let offset = usize::try_from(size)
            .ok()
            .and_then(|size| cd_start.checked_sub(size))
            .and_then(|start| start.checked_sub(8));

        let Some(offset) = offset else {
            warn!("apk signing block size 0x{:x} points before the file", size);
            return None;
        };

        let leading = read_u64(data, offset)?;
        if leading != size {
            warn!(
                "apk signing block size mismatch: 0x{:x} at start, 0x{:x} at end",
                leading, size
            );
            return None;
        }

        // size counts the pairs, the trailing size field and the magic
        let Some(pairs_len) = (size as usize).checked_sub(24) else {
            warn!("apk signing block is too small: 0x{:x}", size);
            return None;
        };

        let mut input = window(data, offset + 8, pairs_len).ok()?;
        let pairs = Self::parse_pairs(&mut input);

        debug!(
            "apk signing block at 0x{:x}, {} bytes, {} pairs",
            offset,
            size,
            pairs.len()
        );

        Some(SigningBlock {
            offset,
            size,
            pairs,
        })
    }

    /// Read pairs until the input ends or a pair is broken
    fn parse_pairs(input: &mut &'a [u8]) -> Vec<SigningPair<'a>> {
        let mut pairs = Vec::new();

        while !input.is_empty() {
            let pair = (le_u64, le_u32).parse_next(input).and_then(|(len, id)| {
                let len = len.checked_sub(4).ok_or_else(corrupt)?;
                let value = slice(input, usize::try_from(len).unwrap_or(usize::MAX))?;

                Ok(SigningPair { id, value })
            });

            match pair {
                Ok(pair) => pairs.push(pair),
                Err(e) => {
                    warn!(
                        "broken pair #{} in apk signing block: {}",
                        pairs.len(),
                        BufferError::from(e)
                    );
                    break;
                }
            }
        }

        pairs
    }

    pub fn pairs(&self) -> &[SigningPair<'a>] {
        &self.pairs
    }

    /// First value with the given id
    pub fn get(&self, id: u32) -> Option<&'a [u8]> {
        self.pairs
            .iter()
            .find(|pair| pair.id == id)
            .map(|pair| pair.value)
    }

    /// Signers of every v2, v3 and v3.1 pair, in block order
    pub fn signers(&self) -> Result<Vec<ApkV2Signer>, CertificateError> {
        let mut signers = Vec::new();

        for pair in &self.pairs {
            let Some(scheme) = pair.kind().scheme() else {
                debug!("skipped signing block pair 0x{:08x}", pair.id);
                continue;
            };

            for certificates in signer_certificates(pair.value)? {
                let certificates = certificates
                    .into_iter()
                    .map(CertificateMeta::from_der)
                    .collect::<Result<Vec<_>, _>>()?;

                signers.push(ApkV2Signer {
                    scheme,
                    certificates,
                });
            }
        }

        Ok(signers)
    }
}

fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let mut input = window(data, offset, 8).ok()?;
    le_u64(&mut input).ok()
}

/// DER certificates of every signer of a v2/v3 value
fn signer_certificates(value: &[u8]) -> Result<Vec<Vec<&[u8]>>, CertificateError> {
    parse_signers(&mut &value[..]).map_err(|e| CertificateError::SignerBlock(BufferError::from(e)))
}

/// Every level is a u32 length-prefixed sequence:
/// `signers > signer > signed data > (digests, certificates, ...)`
fn parse_signers<'a>(input: &mut &'a [u8]) -> ModalResult<Vec<Vec<&'a [u8]>>> {
    let mut signers = length_prefixed(input)?;
    let mut result = Vec::new();

    while !signers.is_empty() {
        let mut signer = length_prefixed(&mut signers)?;
        let mut signed_data = length_prefixed(&mut signer)?;

        let _digests = length_prefixed(&mut signed_data)?;
        let mut certificates = length_prefixed(&mut signed_data)?;

        let mut ders = Vec::new();
        while !certificates.is_empty() {
            ders.push(length_prefixed(&mut certificates)?);
        }
        result.push(ders);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{signer_block, signing_block};

    const CERT: &[u8] = include_bytes!("../testdata/cert.der");

    /// Block followed by a fake central directory start
    fn apk(pairs: &[(u32, Vec<u8>)]) -> (Vec<u8>, usize) {
        let mut data = vec![0xaa; 32];
        data.extend(signing_block(pairs));
        let cd_start = data.len();
        data.extend_from_slice(b"PK\x01\x02");

        (data, cd_start)
    }

    #[test]
    fn recovers_both_size_fields() {
        let (data, cd_start) = apk(&[(0x1234, vec![1, 2, 3])]);
        let block = SigningBlock::locate(&data, cd_start).unwrap();

        // 12 bytes of pair header, 3 of value, trailing size and magic
        assert_eq!(block.size, 12 + 3 + 8 + 16);
        assert_eq!(block.offset, 32);
        assert_eq!(block.pairs().len(), 1);
        assert_eq!(block.get(0x1234), Some(&[1u8, 2, 3][..]));
        assert_eq!(block.pairs()[0].kind(), BlockKind::Unknown(0x1234));
    }

    #[test]
    fn corrupted_size_rejects_block() {
        let (data, cd_start) = apk(&[(VERITY_PADDING_BLOCK_ID, vec![0; 8])]);

        // leading size
        let mut tampered = data.clone();
        tampered[32] ^= 1;
        assert_eq!(SigningBlock::locate(&tampered, cd_start), None);

        // trailing size
        let mut tampered = data.clone();
        tampered[cd_start - 24] ^= 1;
        assert_eq!(SigningBlock::locate(&tampered, cd_start), None);

        assert!(SigningBlock::locate(&data, cd_start).is_some());
    }

    #[test]
    fn missing_magic() {
        let (mut data, cd_start) = apk(&[]);
        data[cd_start - 1] = b'3';

        assert_eq!(SigningBlock::locate(&data, cd_start), None);
        assert_eq!(SigningBlock::locate(&data, 4), None);
    }

    #[test]
    fn huge_size_is_rejected() {
        let (mut data, cd_start) = apk(&[]);
        data[cd_start - 24..cd_start - 16].copy_from_slice(&u64::MAX.to_le_bytes());

        assert_eq!(SigningBlock::locate(&data, cd_start), None);
    }

    #[test]
    fn extracts_v2_and_v3_signers() {
        let (data, cd_start) = apk(&[
            (SIGNATURE_V2_BLOCK_ID, signer_block(&[CERT])),
            (VERITY_PADDING_BLOCK_ID, vec![0; 16]),
            (SIGNATURE_V3_BLOCK_ID, signer_block(&[CERT])),
        ]);

        let signers = SigningBlock::locate(&data, cd_start)
            .unwrap()
            .signers()
            .unwrap();

        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].scheme, SigningScheme::V2);
        assert_eq!(signers[1].scheme, SigningScheme::V3);
        assert_eq!(signers[0].certificates.len(), 1);
        assert_eq!(signers[0].certificates[0].serial_number, "1234abcd");
    }

    #[test]
    fn broken_signer_is_an_error() {
        let mut value = signer_block(&[CERT]);
        value.truncate(value.len() - 10);
        let (data, cd_start) = apk(&[(SIGNATURE_V2_BLOCK_ID, value)]);

        let block = SigningBlock::locate(&data, cd_start).unwrap();
        assert!(matches!(
            block.signers(),
            Err(CertificateError::SignerBlock(_))
        ));
    }

    #[test]
    fn truncated_pair_keeps_previous_ones() {
        let mut input = Vec::new();
        input.extend_from_slice(&7u64.to_le_bytes());
        input.extend_from_slice(&0x42u32.to_le_bytes());
        input.extend_from_slice(&[1, 2, 3]);
        input.extend_from_slice(&100u64.to_le_bytes());
        input.extend_from_slice(&0x43u32.to_le_bytes());

        let pairs = SigningBlock::parse_pairs(&mut &input[..]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].id, 0x42);
    }
}
