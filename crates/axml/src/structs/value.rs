use apkparse_buffer::{le_u16, le_u32, u8};
use winnow::prelude::*;

use crate::arsc::ResourceTable;
use crate::locale::Locale;
use crate::structs::StringPool;

/// Type of the data value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// The `data` is either 0 or 1, specifying this resource is either undefined or empty, respectively.
    Null = 0x00,

    /// The `data` holds a ResTable_ref, a reference to another resource table entry.
    Reference = 0x01,

    /// The `data` holds an attribute resource identifier.
    Attribute = 0x02,

    /// The `data` holds an index into the containing resource table's global value string pool.
    String = 0x03,

    /// The `data` holds a single-precision floating point number.
    Float = 0x04,

    /// The `data` holds a complex number encoding a dimension value, such as "100in".
    Dimension = 0x05,

    /// The `data` holds a complex number encoding a fraction of a container.
    Fraction = 0x06,

    /// The `data` holds a dynamic ResTable_ref, which needs to be resolved before it can be used like a Reference.
    DynamicReference = 0x07,

    /// The `data` holds an attribute resource identifier, which needs to be resolved before it can be used like an Attribute.
    DynamicAttribute = 0x08,

    /// The `data` is a raw integer value of the form n..n.
    Dec = 0x10,

    /// The `data` is a raw integer value of the form 0xn..n.
    Hex = 0x11,

    /// The `data` is either 0 or 1, for input "false" or "true" respectively.
    Boolean = 0x12,

    /// The `data` is a raw integer value of the form #aarrggbb.
    ColorArgb8 = 0x1c,

    /// The `data` is a raw integer value of the form #rrggbb.
    ColorRgb8 = 0x1d,

    /// The `data` is a raw integer value of the form #argb.
    ColorArgb4 = 0x1e,

    /// The `data` is a raw integer value of the form #rgb.
    ColorRgb4 = 0x1f,

    /// Unknown type value
    Unknown(u8),
}

impl From<u8> for ValueType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ValueType::Null,
            0x01 => ValueType::Reference,
            0x02 => ValueType::Attribute,
            0x03 => ValueType::String,
            0x04 => ValueType::Float,
            0x05 => ValueType::Dimension,
            0x06 => ValueType::Fraction,
            0x07 => ValueType::DynamicReference,
            0x08 => ValueType::DynamicAttribute,
            0x10 => ValueType::Dec,
            0x11 => ValueType::Hex,
            0x12 => ValueType::Boolean,
            0x1c => ValueType::ColorArgb8,
            0x1d => ValueType::ColorRgb8,
            0x1e => ValueType::ColorArgb4,
            0x1f => ValueType::ColorRgb4,
            v => ValueType::Unknown(v),
        }
    }
}

impl ValueType {
    /// Raw type byte as stored in the file
    pub fn code(&self) -> u8 {
        match self {
            ValueType::Null => 0x00,
            ValueType::Reference => 0x01,
            ValueType::Attribute => 0x02,
            ValueType::String => 0x03,
            ValueType::Float => 0x04,
            ValueType::Dimension => 0x05,
            ValueType::Fraction => 0x06,
            ValueType::DynamicReference => 0x07,
            ValueType::DynamicAttribute => 0x08,
            ValueType::Dec => 0x10,
            ValueType::Hex => 0x11,
            ValueType::Boolean => 0x12,
            ValueType::ColorArgb8 => 0x1c,
            ValueType::ColorRgb8 => 0x1d,
            ValueType::ColorArgb4 => 0x1e,
            ValueType::ColorRgb4 => 0x1f,
            ValueType::Unknown(v) => *v,
        }
    }
}

/// Representation of a value in a resource, supplying type information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceValue {
    /// Number of bytes in this structure
    pub size: u16,

    /// Always set to 0
    pub res0: u8,

    /// Type of the data value
    pub data_type: ValueType,

    /// Data itself
    pub data: u32,
}

impl ResourceValue {
    pub const SIZE: usize = 8;

    const RADIX_MULTS: [f64; 4] = [
        1.0 / (1 << 8) as f64,
        1.0 / (1 << 15) as f64,
        1.0 / (1 << 23) as f64,
        1.0 / (1u64 << 31) as f64,
    ];
    const DIMENSION_UNITS: [&str; 6] = ["px", "dp", "sp", "pt", "in", "mm"];
    const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
    const COMPLEX_UNIT_MASK: u32 = 0x0f;

    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResourceValue> {
        (le_u16, u8, u8, le_u32)
            .map(|(size, res0, data_type, data)| ResourceValue {
                size,
                res0,
                data_type: ValueType::from(data_type),
                data,
            })
            .parse_next(input)
    }

    pub fn new(data_type: ValueType, data: u32) -> ResourceValue {
        ResourceValue {
            size: Self::SIZE as u16,
            res0: 0,
            data_type,
            data,
        }
    }

    /// Resource id this value points to, if it is a reference
    #[inline]
    pub fn reference(&self) -> Option<u32> {
        match self.data_type {
            ValueType::Reference | ValueType::DynamicReference if self.data != 0 => {
                Some(self.data)
            }
            _ => None,
        }
    }

    /// Render the value as text
    ///
    /// References are resolved through `table` for the preferred `locale`.
    /// Without a table they are rendered as `resourceId:0x...`.
    pub fn to_string_value(
        &self,
        strings: &StringPool,
        table: Option<&ResourceTable>,
        locale: Option<&Locale>,
    ) -> String {
        self.render(strings, table, locale, &mut Vec::new())
    }

    pub(crate) fn render(
        &self,
        strings: &StringPool,
        table: Option<&ResourceTable>,
        locale: Option<&Locale>,
        visited: &mut Vec<u32>,
    ) -> String {
        match self.data_type {
            ValueType::Null => String::new(),
            ValueType::Reference | ValueType::DynamicReference => match table {
                Some(table) => table.resolve_reference(self.data, locale, visited),
                None => format!("resourceId:0x{:x}", self.data),
            },
            ValueType::Attribute | ValueType::DynamicAttribute => {
                format!("?{}{:08x}", self.fmt_package(), self.data)
            }
            ValueType::String => strings.get(self.data).unwrap_or_default().to_owned(),
            ValueType::Float => f32::from_bits(self.data).to_string(),
            ValueType::Dimension => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                match Self::DIMENSION_UNITS.get(idx) {
                    Some(unit) => format!("{}{}", self.complex_to_float(), unit),
                    None => format!("{}unknown unit:0x{:x}", self.complex_to_float(), idx),
                }
            }
            ValueType::Fraction => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                match Self::FRACTION_UNITS.get(idx) {
                    Some(unit) => format!("{}{}", self.complex_to_float() * 100f64, unit),
                    None => format!("{}unknown type:0x{:x}", self.complex_to_float(), idx),
                }
            }
            ValueType::Dec => (self.data as i32).to_string(),
            ValueType::Hex => format!("0x{:x}", self.data),
            ValueType::Boolean => (self.data != 0).to_string(),
            ValueType::ColorArgb8
            | ValueType::ColorRgb8
            | ValueType::ColorArgb4
            | ValueType::ColorRgb4 => format!("#{:08x}", self.data),
            ValueType::Unknown(t) => format!("{{{}:{}}}", t, self.data),
        }
    }

    /// Decode a complex (dimension or fraction) value
    ///
    /// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/ResourceTypes.cpp;l=7302
    #[inline(always)]
    pub fn complex_to_float(&self) -> f64 {
        let mantissa = (self.data & 0xffff_ff00) as i32 as f64;
        mantissa * Self::RADIX_MULTS[((self.data >> 4) & 3) as usize]
    }

    #[inline(always)]
    fn fmt_package(&self) -> &str {
        if self.data >> 24 == 1 { "android:" } else { "" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(data_type: ValueType, data: u32) -> String {
        ResourceValue::new(data_type, data).to_string_value(&StringPool::default(), None, None)
    }

    #[test]
    fn parses_res_value() {
        let data = [0x08, 0x00, 0x00, 0x12, 0xff, 0xff, 0xff, 0xff];
        let value = ResourceValue::parse(&mut &data[..]).unwrap();

        assert_eq!(value.size, 8);
        assert_eq!(value.data_type, ValueType::Boolean);
        assert_eq!(value.data, u32::MAX);
    }

    #[test]
    fn renders_scalars() {
        assert_eq!(render(ValueType::Boolean, 0), "false");
        assert_eq!(render(ValueType::Boolean, 1), "true");
        assert_eq!(render(ValueType::Dec, 21), "21");
        assert_eq!(render(ValueType::Dec, u32::MAX), "-1");
        assert_eq!(render(ValueType::Hex, 0x20000), "0x20000");
        assert_eq!(render(ValueType::Null, 0), "");
        assert_eq!(render(ValueType::ColorArgb8, 0xff00ff00), "#ff00ff00");
        assert_eq!(render(ValueType::Float, 1.5f32.to_bits()), "1.5");
        assert_eq!(render(ValueType::Unknown(0x42), 7), "{66:7}");
    }

    #[test]
    fn renders_complex_units() {
        // 16dp: mantissa 16, radix 0, unit 1
        assert_eq!(render(ValueType::Dimension, (16 << 8) | 0x01), "16dp");
        assert_eq!(render(ValueType::Dimension, (2 << 8) | 0x00), "2px");
        // 0.5 at radix 8p15
        assert_eq!(render(ValueType::Fraction, 0x4010), "50%");
        assert_eq!(render(ValueType::Fraction, 0x4011), "50%p");
    }

    #[test]
    fn unresolved_reference_is_raw_id() {
        assert_eq!(
            render(ValueType::Reference, 0x7f010000),
            "resourceId:0x7f010000"
        );
    }

    #[test]
    fn attribute_marks_framework() {
        assert_eq!(render(ValueType::Attribute, 0x01010000), "?android:01010000");
        assert_eq!(render(ValueType::Attribute, 0x7f010000), "?7f010000");
    }
}
