use crate::errors::GzipError;

/// Operating system byte meaning "unknown"
pub const OS_UNKNOWN: u8 = 255;

/// Header fields of a gzip member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipParameters {
    compression_level: u32,

    /// Milliseconds since the epoch, stored with second precision
    pub modification_time: u64,

    /// Original file name, ISO-8859-1 on the wire
    pub filename: Option<String>,

    pub comment: Option<String>,

    pub operating_system: u8,
}

impl Default for GzipParameters {
    fn default() -> Self {
        GzipParameters {
            compression_level: 6,
            modification_time: 0,
            filename: None,
            comment: None,
            operating_system: OS_UNKNOWN,
        }
    }
}

impl GzipParameters {
    #[inline]
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn set_compression_level(&mut self, level: u32) -> Result<(), GzipError> {
        if level > 9 {
            return Err(GzipError::InvalidLevel(level));
        }

        self.compression_level = level;
        Ok(())
    }

    /// `XFL` header byte derived from the level
    pub(crate) fn extra_flags(&self) -> u8 {
        match self.compression_level {
            9 => 2,
            1 => 4,
            _ => 0,
        }
    }

    /// Level hinted by an `XFL` header byte
    pub(crate) fn apply_extra_flags(&mut self, xfl: u8) {
        match xfl {
            2 => self.compression_level = 9,
            4 => self.compression_level = 1,
            _ => {}
        }
    }
}
