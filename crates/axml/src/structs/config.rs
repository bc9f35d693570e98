use std::fmt::{self, Display, Write};

use apkparse_buffer::{le_u32, slice};
use log::warn;
use winnow::prelude::*;

use crate::locale::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    Default,
    Low,
    Medium,
    TV,
    High,
    XHigh,
    XXHigh,
    XXXHigh,
    Any,
    None,
    Unknown(u16),
}

impl Density {
    pub const DEFAULT: u16 = 0;
    pub const ANY: u16 = 0xfffe;
    pub const NONE: u16 = 0xffff;
}

impl From<u16> for Density {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Default,
            120 => Self::Low,
            160 => Self::Medium,
            213 => Self::TV,
            240 => Self::High,
            320 => Self::XHigh,
            480 => Self::XXHigh,
            640 => Self::XXXHigh,
            0xfffe => Self::Any,
            0xffff => Self::None,
            v => Self::Unknown(v),
        }
    }
}

impl Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => Ok(()),
            Self::Low => write!(f, "ldpi"),
            Self::Medium => write!(f, "mdpi"),
            Self::TV => write!(f, "tvdpi"),
            Self::High => write!(f, "hdpi"),
            Self::XHigh => write!(f, "xhdpi"),
            Self::XXHigh => write!(f, "xxhdpi"),
            Self::XXXHigh => write!(f, "xxxhdpi"),
            Self::Any => write!(f, "anydpi"),
            Self::None => write!(f, "nodpi"),
            Self::Unknown(v) => write!(f, "{}dpi", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Any,
    Port,
    Land,
    Square,
    Unknown(u8),
}

impl From<u8> for Orientation {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Any,
            1 => Self::Port,
            2 => Self::Land,
            3 => Self::Square,
            v => Self::Unknown(v),
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => Ok(()),
            Self::Port => write!(f, "port"),
            Self::Land => write!(f, "land"),
            Self::Square => write!(f, "square"),
            Self::Unknown(v) => write!(f, "orientation={}", v),
        }
    }
}

/// Describes a particular resource configuration
///
/// Only the size-gated fields that exist in the file are read, the rest stay zero.
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=967)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResTableConfig {
    /// Number of bytes in this structure
    pub size: u32,

    /// Mobile country code in the low half, mobile network code in the high half
    pub imsi: u32,

    /// Two 7-bit ascii letters or a packed 3-letter code, `\0\0` means "any"
    pub language: [u8; 2],

    /// Same encoding as `language`, for regions
    pub country: [u8; 2],

    /// orientation, touchscreen and density
    pub screen_type: u32,

    /// keyboard, navigation, input flags and grammatical inflection
    pub input: u32,

    /// screen width and height in pixels
    pub screen_size: u32,

    /// sdk version and minor version
    pub version: u32,

    /// screen layout, ui mode and smallest screen width in dp
    pub screen_config: u32,

    /// screen width and height in dp
    pub screen_size_dp: u32,

    pub locale_script: [u8; 4],

    pub locale_variant: [u8; 8],

    /// round screen qualifier and color mode
    pub screen_config_2: u32,
}

impl ResTableConfig {
    /// Size of the structure written by current aapt2
    const KNOWN_SIZE: u32 = 64;

    pub fn parse(input: &mut &[u8]) -> ModalResult<ResTableConfig> {
        let size = le_u32.parse_next(input)?;

        // the whole structure is consumed even if it is larger than we know
        let body = &mut slice(input, (size as usize).saturating_sub(4))?;
        if size > Self::KNOWN_SIZE {
            warn!("got unexpected ResTable_config size {}", size);
        }

        let mut config = ResTableConfig {
            size,
            ..ResTableConfig::default()
        };

        let mut fields = [0u32; 8];
        for field in fields.iter_mut() {
            if body.len() < 4 {
                break;
            }
            *field = le_u32.parse_next(body)?;
        }

        let [imsi, locale, screen_type, input, screen_size, version, screen_config, screen_size_dp] =
            fields;
        let locale = locale.to_le_bytes();

        config.imsi = imsi;
        config.language = [locale[0], locale[1]];
        config.country = [locale[2], locale[3]];
        config.screen_type = screen_type;
        config.input = input;
        config.screen_size = screen_size;
        config.version = version;
        config.screen_config = screen_config;
        config.screen_size_dp = screen_size_dp;

        if body.len() >= 4 {
            config.locale_script.copy_from_slice(slice(body, 4)?);
        }
        if body.len() >= 8 {
            config.locale_variant.copy_from_slice(slice(body, 8)?);
        }
        if body.len() >= 4 {
            config.screen_config_2 = le_u32.parse_next(body)?;
        }

        Ok(config)
    }

    #[inline]
    pub fn mcc(&self) -> u16 {
        (self.imsi & 0xffff) as u16
    }

    #[inline]
    pub fn mnc(&self) -> u16 {
        (self.imsi >> 16) as u16
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        Orientation::from((self.screen_type & 0xff) as u8)
    }

    #[inline]
    pub fn density(&self) -> u16 {
        (self.screen_type >> 16) as u16
    }

    #[inline]
    pub fn sdk_version(&self) -> u16 {
        (self.version & 0xffff) as u16
    }

    #[inline]
    pub fn smallest_screen_width_dp(&self) -> u16 {
        (self.screen_config >> 16) as u16
    }

    /// Language code, empty for "any"
    pub fn language(&self) -> String {
        Self::unpack_language_or_region(self.language, b'a')
    }

    /// Region code, empty for "any"
    pub fn country(&self) -> String {
        Self::unpack_language_or_region(self.country, b'0')
    }

    pub fn locale(&self) -> Locale {
        Locale::new(self.language(), self.country())
    }

    /// Decode a 2-byte language or region field
    ///
    /// [Source code](https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/ResourceTypes.cpp;l=1987)
    fn unpack_language_or_region(raw: [u8; 2], base: u8) -> String {
        if raw == [0, 0] {
            return String::new();
        }

        if raw[0] & 0x80 == 0 {
            return String::from_utf8_lossy(&raw)
                .trim_end_matches('\0')
                .to_owned();
        }

        // {1, t, t, t, t, t, s, s, s, s, s, f, f, f, f, f}
        let first = raw[1] & 0x1f;
        let second = ((raw[1] & 0xe0) >> 5) + ((raw[0] & 0x03) << 3);
        let third = (raw[0] & 0x7c) >> 2;

        [first, second, third]
            .iter()
            .map(|c| (base + c) as char)
            .collect()
    }

    /// Qualifier string as used in resource directory names, empty for the default config
    ///
    /// [Source Code](https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/ResourceTypes.cpp;l=3368)
    pub fn qualifiers(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.mcc() != 0 {
            parts.push(format!("mcc{}", self.mcc()));
        }
        if self.mnc() != 0 {
            parts.push(format!("mnc{}", self.mnc()));
        }

        let language = self.language();
        if !language.is_empty() {
            parts.push(language);
            let country = self.country();
            if !country.is_empty() {
                parts.push(format!("r{}", country));
            }
        }

        if self.smallest_screen_width_dp() != 0 {
            parts.push(format!("sw{}dp", self.smallest_screen_width_dp()));
        }

        let width_dp = self.screen_size_dp & 0xffff;
        let height_dp = self.screen_size_dp >> 16;
        if width_dp != 0 {
            parts.push(format!("w{}dp", width_dp));
        }
        if height_dp != 0 {
            parts.push(format!("h{}dp", height_dp));
        }

        let orientation = self.orientation().to_string();
        if !orientation.is_empty() {
            parts.push(orientation);
        }

        let density = Density::from(self.density()).to_string();
        if !density.is_empty() {
            parts.push(density);
        }

        let mut result = parts.join("-");

        if self.sdk_version() != 0 {
            if !result.is_empty() {
                result.push('-');
            }
            let _ = write!(result, "v{}", self.sdk_version());
        }

        result
    }
}

impl Display for ResTableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifiers = self.qualifiers();
        if qualifiers.is_empty() {
            write!(f, "default")
        } else {
            write!(f, "{}", qualifiers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_config;

    #[test]
    fn parses_locale_and_density() {
        let data = write_config("fr", "CA", 480);
        let input = &mut &data[..];

        let config = ResTableConfig::parse(input).unwrap();
        assert!(input.is_empty());
        assert_eq!(config.language(), "fr");
        assert_eq!(config.country(), "CA");
        assert_eq!(config.density(), 480);
        assert_eq!(config.qualifiers(), "fr-rCA-xxhdpi");
    }

    #[test]
    fn default_config() {
        let data = write_config("", "", 0);
        let config = ResTableConfig::parse(&mut &data[..]).unwrap();

        assert_eq!(config.locale(), Locale::new("", ""));
        assert_eq!(config.to_string(), "default");
    }

    #[test]
    fn old_small_config() {
        // 28-byte layout from older aapt
        let mut data = write_config("de", "", 0);
        data[..4].copy_from_slice(&28u32.to_le_bytes());
        data.truncate(28);
        data[24..28].copy_from_slice(&21u32.to_le_bytes());

        let input = &mut &data[..];
        let config = ResTableConfig::parse(input).unwrap();
        assert!(input.is_empty());
        assert_eq!(config.sdk_version(), 21);
        assert_eq!(config.qualifiers(), "de-v21");
    }

    #[test]
    fn larger_config_is_consumed() {
        let mut data = write_config("en", "US", 0);
        data[..4].copy_from_slice(&72u32.to_le_bytes());
        data.resize(72, 0);
        data.push(0xaa);

        let input = &mut &data[..];
        ResTableConfig::parse(input).unwrap();
        assert_eq!(*input, &[0xaa]);
    }

    #[test]
    fn packed_three_letter_language() {
        // "fil" packed as in ResourceTypes.cpp
        let raw = [0x80 | (b'l' - b'a') << 2 | ((b'i' - b'a') >> 3), ((b'i' - b'a') & 0x7) << 5 | (b'f' - b'a')];
        assert_eq!(ResTableConfig::unpack_language_or_region(raw, b'a'), "fil");
    }

    #[test]
    fn truncated_config() {
        let data = write_config("en", "", 0);
        assert!(ResTableConfig::parse(&mut &data[..20]).is_err());
    }
}
