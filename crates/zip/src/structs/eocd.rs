use apkparse_buffer::{le_u16, le_u32, slice};
use memchr::memmem;
use winnow::prelude::*;

/// Fixed part of the end of central directory record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub central_dir_start_disk: u16,
    pub entries_on_this_disk: u16,
    pub total_entries: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    pub comment_length: u16,
}

impl EndOfCentralDirectory {
    pub const MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

    /// Size of the record without comment
    pub const SIZE: usize = 22;

    /// How far from the end the record is searched for
    pub const MAX_SEARCH: usize = 100 * 1024;

    pub fn parse(input: &mut &[u8]) -> ModalResult<EndOfCentralDirectory> {
        slice(input, 4)?;

        let (disk_number, central_dir_start_disk, entries_on_this_disk, total_entries) =
            (le_u16, le_u16, le_u16, le_u16).parse_next(input)?;
        let (central_dir_size, central_dir_offset, comment_length) =
            (le_u32, le_u32, le_u16).parse_next(input)?;

        Ok(EndOfCentralDirectory {
            disk_number,
            central_dir_start_disk,
            entries_on_this_disk,
            total_entries,
            central_dir_size,
            central_dir_offset,
            comment_length,
        })
    }

    /// Offset of the record scanning backward from `len - 22`
    ///
    /// The whole window of [`Self::MAX_SEARCH`] bytes is scanned and the
    /// lowest-offset signature wins, so a fake record planted in the archive
    /// comment is shadowed by the real one in front of it.
    ///
    /// The floor offset `len - MAX_SEARCH` is part of the window, so a record
    /// starting exactly there is still found. One byte further back it is not.
    pub fn find_eocd(input: &[u8]) -> Option<usize> {
        let last = input.len().checked_sub(Self::SIZE)?;
        let floor = input.len().saturating_sub(Self::MAX_SEARCH);

        // every signature starting in [floor, last]
        let window = &input[floor..last + Self::MAGIC.len()];
        memmem::find(window, &Self::MAGIC).map(|pos| floor + pos)
    }

    /// Locate and parse the record
    pub fn locate(input: &[u8]) -> Option<(usize, EndOfCentralDirectory)> {
        let offset = Self::find_eocd(input)?;
        let eocd = Self::parse(&mut &input[offset..]).ok()?;

        Some((offset, eocd))
    }
}
