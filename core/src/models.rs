use serde::Serialize;

/// Icon file stored in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Icon {
    pub path: String,

    /// Target density in dpi, 0 for the default configuration
    pub density: u16,

    /// File content, `None` when the archive has no such entry
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

/// Layers of an adaptive icon, each resolved to a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdaptiveIcon {
    pub foreground: Option<Icon>,
    pub background: Option<Icon>,
}

/// Application icon in one density
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IconFace {
    File(Icon),
    Adaptive(AdaptiveIcon),
}
