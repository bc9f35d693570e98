use serde::Serialize;

use crate::dex::AccessFlags;

/// Class of a dex file, identified by its type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DexClass {
    /// Descriptor like `Lcom/example/Main;`
    pub class_type: String,

    /// `None` for root classes such as `java.lang.Object`
    pub super_class: Option<String>,

    pub access_flags: u32,
}

impl DexClass {
    /// Dotted package of the class, empty for the default package
    pub fn package_name(&self) -> String {
        let name = self
            .class_type
            .strip_prefix('L')
            .and_then(|name| name.strip_suffix(';'))
            .unwrap_or(&self.class_type);

        match name.rfind('/') {
            Some(idx) => name[..idx].replace('/', "."),
            None => String::new(),
        }
    }

    #[inline]
    fn flags(&self) -> AccessFlags {
        AccessFlags::from_bits_retain(self.access_flags)
    }

    pub fn is_interface(&self) -> bool {
        self.flags().contains(AccessFlags::INTERFACE)
    }

    pub fn is_enum(&self) -> bool {
        self.flags().contains(AccessFlags::ENUM)
    }

    pub fn is_annotation(&self) -> bool {
        self.flags().contains(AccessFlags::ANNOTATION)
    }

    pub fn is_public(&self) -> bool {
        self.flags().contains(AccessFlags::PUBLIC)
    }

    pub fn is_protected(&self) -> bool {
        self.flags().contains(AccessFlags::PROTECTED)
    }

    pub fn is_static(&self) -> bool {
        self.flags().contains(AccessFlags::STATIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(class_type: &str, access_flags: u32) -> DexClass {
        DexClass {
            class_type: class_type.to_owned(),
            super_class: Some("Ljava/lang/Object;".to_owned()),
            access_flags,
        }
    }

    #[test]
    fn package_name() {
        assert_eq!(class("Lcom/example/app/Main;", 0).package_name(), "com.example.app");
        assert_eq!(class("LMain;", 0).package_name(), "");
    }

    #[test]
    fn predicates() {
        let annotation = class("Lcom/example/Keep;", 0x2201);
        assert!(annotation.is_annotation());
        assert!(annotation.is_interface());
        assert!(annotation.is_public());
        assert!(!annotation.is_enum());

        let inner = class("Lcom/example/Outer$Inner;", 0x000c);
        assert!(inner.is_static());
        assert!(inner.is_protected());
        assert!(!inner.is_public());
    }
}
