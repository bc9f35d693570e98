//! Framework attribute names and symbolic values of manifest attributes.

use phf::phf_map;
use smallvec::SmallVec;

/// Names of `android.R.attr` ids, used when a document strips its attribute names
static FRAMEWORK_ATTRS: phf::Map<u32, &'static str> = phf_map! {
    0x01010000u32 => "theme",
    0x01010001u32 => "label",
    0x01010002u32 => "icon",
    0x01010003u32 => "name",
    0x01010004u32 => "manageSpaceActivity",
    0x01010005u32 => "allowClearUserData",
    0x01010006u32 => "permission",
    0x01010007u32 => "readPermission",
    0x01010008u32 => "writePermission",
    0x01010009u32 => "protectionLevel",
    0x0101000au32 => "permissionGroup",
    0x0101000bu32 => "sharedUserId",
    0x0101000cu32 => "hasCode",
    0x0101000du32 => "persistent",
    0x0101000eu32 => "enabled",
    0x0101000fu32 => "debuggable",
    0x01010010u32 => "exported",
    0x01010011u32 => "process",
    0x01010012u32 => "taskAffinity",
    0x01010013u32 => "multiprocess",
    0x01010014u32 => "finishOnTaskLaunch",
    0x01010015u32 => "clearTaskOnLaunch",
    0x01010016u32 => "stateNotNeeded",
    0x01010017u32 => "excludeFromRecents",
    0x01010018u32 => "authorities",
    0x01010019u32 => "syncable",
    0x0101001au32 => "initOrder",
    0x0101001bu32 => "grantUriPermissions",
    0x0101001cu32 => "priority",
    0x0101001du32 => "launchMode",
    0x0101001eu32 => "screenOrientation",
    0x0101001fu32 => "configChanges",
    0x01010020u32 => "description",
    0x01010021u32 => "targetPackage",
    0x01010022u32 => "handleProfiling",
    0x01010023u32 => "functionalTest",
    0x01010024u32 => "value",
    0x01010025u32 => "resource",
    0x01010026u32 => "mimeType",
    0x01010027u32 => "scheme",
    0x01010028u32 => "host",
    0x01010029u32 => "port",
    0x0101002au32 => "path",
    0x0101002bu32 => "pathPrefix",
    0x0101002cu32 => "pathPattern",
    0x0101002du32 => "action",
    0x0101002eu32 => "data",
    0x0101002fu32 => "targetClass",
    0x01010199u32 => "drawable",
    0x0101020cu32 => "minSdkVersion",
    0x0101021bu32 => "versionCode",
    0x0101021cu32 => "versionName",
    0x0101022bu32 => "windowSoftInputMode",
    0x01010261u32 => "sharedUserLabel",
    0x0101026cu32 => "anyDensity",
    0x01010270u32 => "targetSdkVersion",
    0x01010271u32 => "maxSdkVersion",
    0x01010272u32 => "testOnly",
    0x01010280u32 => "allowBackup",
    0x01010281u32 => "glEsVersion",
    0x01010284u32 => "smallScreens",
    0x01010285u32 => "normalScreens",
    0x01010286u32 => "largeScreens",
    0x0101028eu32 => "required",
    0x010102b7u32 => "installLocation",
    0x010102beu32 => "logo",
    0x010102bfu32 => "xlargeScreens",
    0x010102d3u32 => "hardwareAccelerated",
    0x0101035au32 => "largeHeap",
    0x01010398u32 => "uiOptions",
    0x010103a7u32 => "parentActivityName",
    0x010103afu32 => "supportsRtl",
    0x010103f2u32 => "banner",
    0x010104eau32 => "extractNativeLibs",
    0x010104ebu32 => "fullBackupContent",
    0x010104ecu32 => "usesCleartextTraffic",
    0x010104f6u32 => "resizeableActivity",
    0x01010505u32 => "directBootAware",
    0x01010527u32 => "networkSecurityConfig",
    0x0101052cu32 => "roundIcon",
    0x0101054bu32 => "isolatedSplits",
    0x0101055bu32 => "isFeatureSplit",
    0x01010572u32 => "compileSdkVersion",
    0x01010573u32 => "compileSdkVersionCodename",
    0x01010576u32 => "versionCodeMajor",
    0x0101057au32 => "appComponentFactory",
    0x01010591u32 => "isSplitRequired",
    0x01010599u32 => "foregroundServiceType",
};

/// Name of a framework attribute id
#[inline]
pub fn framework_attr_name(id: u32) -> Option<&'static str> {
    FRAMEWORK_ATTRS.get(&id).copied()
}

const CONFIG_CHANGES: [(u32, &str); 16] = [
    (0x0001, "mcc"),
    (0x0002, "mnc"),
    (0x0004, "locale"),
    (0x0008, "touchscreen"),
    (0x0010, "keyboard"),
    (0x0020, "keyboardHidden"),
    (0x0040, "navigation"),
    (0x0080, "orientation"),
    (0x0100, "screenLayout"),
    (0x0200, "uiMode"),
    (0x0400, "screenSize"),
    (0x0800, "smallestScreenSize"),
    (0x1000, "density"),
    (0x2000, "layoutDirection"),
    (0x4000, "colorMode"),
    (0x4000_0000, "fontScale"),
];

/// Symbolic form of an integer attribute value, `None` for attributes without one
pub fn format_value(attr_name: &str, value: u32) -> Option<String> {
    let value = match attr_name {
        "screenOrientation" => screen_orientation(value as i32),
        "configChanges" => config_changes(value),
        "windowSoftInputMode" => window_soft_input_mode(value),
        "launchMode" => launch_mode(value),
        "installLocation" => install_location(value),
        "protectionLevel" => protection_level(value),
        _ => return None,
    };

    Some(value)
}

pub fn screen_orientation(value: i32) -> String {
    let name = match value {
        -1 => "unspecified",
        0 => "landscape",
        1 => "portrait",
        2 => "user",
        3 => "behind",
        4 => "sensor",
        5 => "nosensor",
        6 => "sensorLandscape",
        7 => "sensorPortrait",
        8 => "reverseLandscape",
        9 => "reversePortrait",
        10 => "fullSensor",
        11 => "userLandscape",
        12 => "userPortrait",
        13 => "fullUser",
        14 => "locked",
        other => return format!("ScreenOrientation:{:x}", other),
    };

    name.to_owned()
}

pub fn launch_mode(value: u32) -> String {
    let name = match value {
        0 => "standard",
        1 => "singleTop",
        2 => "singleTask",
        3 => "singleInstance",
        other => return format!("LaunchMode:{:x}", other),
    };

    name.to_owned()
}

pub fn install_location(value: u32) -> String {
    let name = match value {
        0 => "auto",
        1 => "internalOnly",
        2 => "preferExternal",
        other => return format!("installLocation:{:x}", other),
    };

    name.to_owned()
}

/// Every set flag is listed, unknown bits are dropped
pub fn config_changes(value: u32) -> String {
    let names: SmallVec<[&str; 8]> = CONFIG_CHANGES
        .iter()
        .filter(|(flag, _)| value & flag != 0)
        .map(|(_, name)| *name)
        .collect();

    names.join("|")
}

pub fn window_soft_input_mode(value: u32) -> String {
    let adjust = match value & 0xf0 {
        0x00 => "adjustUnspecified".to_owned(),
        0x10 => "adjustResize".to_owned(),
        0x20 => "adjustPan".to_owned(),
        0x30 => "adjustNothing".to_owned(),
        other => format!("WindowInputModeAdjust:{:x}", other),
    };

    let state = match value & 0x0f {
        0 => "stateUnspecified".to_owned(),
        1 => "stateUnchanged".to_owned(),
        2 => "stateHidden".to_owned(),
        3 => "stateAlwaysHidden".to_owned(),
        4 => "stateVisible".to_owned(),
        5 => "stateAlwaysVisible".to_owned(),
        other => format!("WindowInputModeState:{:x}", other),
    };

    format!("{}|{}", adjust, state)
}

pub fn protection_level(mut value: u32) -> String {
    const FLAG_SYSTEM: u32 = 0x10;
    const FLAG_DEVELOPMENT: u32 = 0x20;

    let mut levels: SmallVec<[String; 3]> = SmallVec::new();

    if value & FLAG_SYSTEM != 0 {
        value ^= FLAG_SYSTEM;
        levels.push("system".to_owned());
    }
    if value & FLAG_DEVELOPMENT != 0 {
        value ^= FLAG_DEVELOPMENT;
        levels.push("development".to_owned());
    }

    levels.push(match value {
        0 => "normal".to_owned(),
        1 => "dangerous".to_owned(),
        2 => "signature".to_owned(),
        3 => "signatureOrSystem".to_owned(),
        other => format!("ProtectionLevel:{:x}", other),
    });

    levels.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_names() {
        assert_eq!(framework_attr_name(0x01010003), Some("name"));
        assert_eq!(framework_attr_name(0x0101020c), Some("minSdkVersion"));
        assert_eq!(framework_attr_name(0x7f010000), None);
    }

    #[test]
    fn enums() {
        assert_eq!(screen_orientation(1), "portrait");
        assert_eq!(screen_orientation(-1), "unspecified");
        assert_eq!(screen_orientation(99), "ScreenOrientation:63");
        assert_eq!(launch_mode(2), "singleTask");
        assert_eq!(install_location(2), "preferExternal");
        assert_eq!(install_location(7), "installLocation:7");
    }

    #[test]
    fn config_change_flags_are_joined() {
        assert_eq!(config_changes(0x04a0), "keyboardHidden|orientation|screenSize");
        assert_eq!(config_changes(0), "");
        assert_eq!(config_changes(0x4000_1000), "density|fontScale");
    }

    #[test]
    fn soft_input_mode() {
        assert_eq!(window_soft_input_mode(0x12), "adjustResize|stateHidden");
        assert_eq!(window_soft_input_mode(0), "adjustUnspecified|stateUnspecified");
    }

    #[test]
    fn protection_levels() {
        assert_eq!(protection_level(2), "signature");
        assert_eq!(protection_level(0x12), "system|signature");
        assert_eq!(protection_level(0x31), "system|development|dangerous");
    }

    #[test]
    fn dispatch_by_attribute_name() {
        assert_eq!(format_value("launchMode", 1).as_deref(), Some("singleTop"));
        assert_eq!(
            format_value("screenOrientation", u32::MAX).as_deref(),
            Some("unspecified")
        );
        assert_eq!(format_value("versionCode", 1), None);
    }
}
