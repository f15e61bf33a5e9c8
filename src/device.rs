//! Per-model command templates and version parsing.
//!
//! The device model is an opaque tag. It only selects which commands are
//! sent and how the version line is recognised.

/// Placeholder replaced with the remote firmware path in install templates.
const FILE_PLACEHOLDER: &str = "{file}";

/// Commands and parsing hints for one device family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub family: &'static str,
    pub version_command: &'static str,
    /// Token preceding the version number on the version line.
    pub version_marker: &'static str,
    pub install_template: &'static str,
    pub running_config_command: &'static str,
}

static GENERIC: CommandSet = CommandSet {
    family: "generic",
    version_command: "show version",
    version_marker: "Version",
    install_template: "install system {file}",
    running_config_command: "show running-config",
};

const JUNOS: CommandSet = CommandSet {
    family: "junos",
    version_command: "show version",
    version_marker: "Junos:",
    install_template: "request system software add {file} reboot",
    running_config_command: "show configuration | display set",
};

const IOS_XE: CommandSet = CommandSet {
    family: "ios-xe",
    version_command: "show version",
    version_marker: "Version",
    install_template: "install add file {file} activate commit prompt-level none",
    running_config_command: "show running-config",
};

/// Known model prefixes, matched case-insensitively.
static FAMILIES: &[(&str, CommandSet)] = &[
    ("ex", JUNOS),
    ("qfx", JUNOS),
    ("mx", JUNOS),
    ("junos", JUNOS),
    ("c9", IOS_XE),
    ("cat9", IOS_XE),
    ("ios-xe", IOS_XE),
];

impl CommandSet {
    /// Select the command set for a device model tag.
    ///
    /// Unknown models fall back to the generic set.
    pub fn for_model(model: &str) -> &'static CommandSet {
        let model = model.trim().to_lowercase();
        FAMILIES
            .iter()
            .find(|(prefix, _)| model.starts_with(*prefix))
            .map(|(_, set)| set)
            .unwrap_or(&GENERIC)
    }

    /// Install command for the given remote firmware file.
    pub fn install_command(&self, remote_file: &str) -> String {
        self.install_template.replace(FILE_PLACEHOLDER, remote_file)
    }

    /// Extract the version from version-query output.
    ///
    /// Takes the first whitespace-delimited token after the marker on the
    /// first line that contains it.
    pub fn parse_version(&self, output: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let (_, rest) = line.split_once(self.version_marker)?;
            rest.trim_start_matches([':', ',', ' ', '\t'])
                .split_whitespace()
                .next()
                .map(|v| v.trim_end_matches(',').to_string())
                .filter(|v| !v.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_uses_generic() {
        let set = CommandSet::for_model("WS-C2960X-48FPD");
        assert_eq!(set.family, "generic");
        assert_eq!(set.version_command, "show version");
    }

    #[test]
    fn test_model_prefix_is_case_insensitive() {
        assert_eq!(CommandSet::for_model("EX4300-48T").family, "junos");
        assert_eq!(CommandSet::for_model("C9300-48P").family, "ios-xe");
    }

    #[test]
    fn test_install_command_substitutes_file() {
        let set = CommandSet::for_model("generic");
        assert_eq!(
            set.install_command("/flash/fw-2.1.bin"),
            "install system /flash/fw-2.1.bin"
        );
    }

    #[test]
    fn test_parse_version_cisco_style() {
        let output = "Cisco IOS Software, C2960X Software, Version 15.2(7)E4, RELEASE SOFTWARE (fc2)\n\
                      ROM: Bootstrap program is C2960X boot loader";
        let set = CommandSet::for_model("c2960x");
        assert_eq!(set.parse_version(output), Some("15.2(7)E4".to_string()));
    }

    #[test]
    fn test_parse_version_junos_style() {
        let output = "Hostname: core-sw1\nModel: ex4300-48t\nJunos: 21.4R3-S5.4\n";
        let set = CommandSet::for_model("ex4300");
        assert_eq!(set.parse_version(output), Some("21.4R3-S5.4".to_string()));
    }

    #[test]
    fn test_parse_version_missing_marker() {
        let set = CommandSet::for_model("generic");
        assert_eq!(set.parse_version("uptime is 3 weeks"), None);
        assert_eq!(set.parse_version(""), None);
    }

    #[test]
    fn test_parse_version_marker_without_value() {
        let set = CommandSet::for_model("generic");
        assert_eq!(set.parse_version("Version\nVersion 2.1"), Some("2.1".to_string()));
    }
}
