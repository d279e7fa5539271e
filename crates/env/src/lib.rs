use std::fmt::{Display, Formatter};

use thiserror::Error;

/// A target environment: a core version of the module format, optionally
/// constrained by a client API revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetEnv {
    Universal1_0,
    Universal1_1,
    Universal1_2,
    Universal1_3,
    Universal1_4,
    Universal1_5,
    Universal1_6,
    Vulkan1_0,
    Vulkan1_1,
    Vulkan1_1Spv1_4,
    Vulkan1_2,
    Vulkan1_3,
    Vulkan1_4,
    OpenCl1_2,
    OpenClEmbedded1_2,
    OpenCl2_0,
    OpenClEmbedded2_0,
    OpenCl2_1,
    OpenClEmbedded2_1,
    OpenCl2_2,
    OpenClEmbedded2_2,
    OpenGl4_0,
    OpenGl4_1,
    OpenGl4_2,
    OpenGl4_3,
    OpenGl4_5,
}

/// A core format version, packed into a version word as
/// `(major << 16) | (minor << 8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub const fn word(self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8)
    }

    pub const fn from_word(word: u32) -> Self {
        Self {
            major: ((word >> 16) & 0xff) as u8,
            minor: ((word >> 8) & 0xff) as u8,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidTargetEnv {
    #[error("unrecognized target environment `{0}`")]
    Unrecognized(String),

    #[error("no target environment supports the requested client/core version combination")]
    UnsupportedVersions,
}

// The lookup algorithm picks the first entry whose key is a prefix of the
// user's string, so a name must precede every proper prefix of itself:
// `vulkan1.1spv1.4` before `vulkan1.1`, `opencl2.0embedded` before
// `opencl2.0`.
const TARGET_ENV_NAMES: &[(&str, TargetEnv)] = &[
    ("vulkan1.0", TargetEnv::Vulkan1_0),
    ("vulkan1.1spv1.4", TargetEnv::Vulkan1_1Spv1_4),
    ("vulkan1.1", TargetEnv::Vulkan1_1),
    ("vulkan1.2", TargetEnv::Vulkan1_2),
    ("vulkan1.3", TargetEnv::Vulkan1_3),
    ("vulkan1.4", TargetEnv::Vulkan1_4),
    ("spv1.0", TargetEnv::Universal1_0),
    ("spv1.1", TargetEnv::Universal1_1),
    ("spv1.2", TargetEnv::Universal1_2),
    ("spv1.3", TargetEnv::Universal1_3),
    ("spv1.4", TargetEnv::Universal1_4),
    ("spv1.5", TargetEnv::Universal1_5),
    ("spv1.6", TargetEnv::Universal1_6),
    ("opencl1.2embedded", TargetEnv::OpenClEmbedded1_2),
    ("opencl1.2", TargetEnv::OpenCl1_2),
    ("opencl2.0embedded", TargetEnv::OpenClEmbedded2_0),
    ("opencl2.0", TargetEnv::OpenCl2_0),
    ("opencl2.1embedded", TargetEnv::OpenClEmbedded2_1),
    ("opencl2.1", TargetEnv::OpenCl2_1),
    ("opencl2.2embedded", TargetEnv::OpenClEmbedded2_2),
    ("opencl2.2", TargetEnv::OpenCl2_2),
    ("opengl4.0", TargetEnv::OpenGl4_0),
    ("opengl4.1", TargetEnv::OpenGl4_1),
    ("opengl4.2", TargetEnv::OpenGl4_2),
    ("opengl4.3", TargetEnv::OpenGl4_3),
    ("opengl4.5", TargetEnv::OpenGl4_5),
];

const ORDERED_UNIVERSAL_ENVS: &[TargetEnv] = &[
    TargetEnv::Universal1_0,
    TargetEnv::Universal1_1,
    TargetEnv::Universal1_2,
    TargetEnv::Universal1_3,
    TargetEnv::Universal1_4,
    TargetEnv::Universal1_5,
    TargetEnv::Universal1_6,
];

const fn vulkan_ver(major: u32, minor: u32) -> u32 {
    (major << 22) | (minor << 12)
}

// Client API version paired with the maximum core version that client
// supports. Ordered from least capable to most capable.
const ORDERED_VULKAN_ENVS: &[(TargetEnv, u32, u32)] = &[
    (TargetEnv::Vulkan1_0, vulkan_ver(1, 0), Version::new(1, 0).word()),
    (TargetEnv::Vulkan1_1, vulkan_ver(1, 1), Version::new(1, 3).word()),
    (
        TargetEnv::Vulkan1_1Spv1_4,
        vulkan_ver(1, 1),
        Version::new(1, 4).word(),
    ),
    (TargetEnv::Vulkan1_2, vulkan_ver(1, 2), Version::new(1, 5).word()),
    (TargetEnv::Vulkan1_3, vulkan_ver(1, 3), Version::new(1, 6).word()),
    (TargetEnv::Vulkan1_4, vulkan_ver(1, 4), Version::new(1, 6).word()),
];

impl TargetEnv {
    /// Resolves a target environment token such as `vulkan1.1spv1.4`.
    ///
    /// The table is scanned in order and the first entry whose name is a
    /// prefix of `s` wins, so more specific names shadow their prefixes.
    pub fn parse(s: &str) -> Result<Self, InvalidTargetEnv> {
        for (name, env) in TARGET_ENV_NAMES {
            if s.starts_with(name) {
                return Ok(*env);
            }
        }
        Err(InvalidTargetEnv::Unrecognized(s.to_string()))
    }

    /// Picks the least capable environment supporting both the client API
    /// version word and the core version word.
    pub fn from_vulkan_versions(
        vulkan_version: u32,
        core_version: u32,
    ) -> Result<Self, InvalidTargetEnv> {
        for (env, vk, core) in ORDERED_VULKAN_ENVS {
            if *vk >= vulkan_version && *core >= core_version {
                return Ok(*env);
            }
        }
        Err(InvalidTargetEnv::UnsupportedVersions)
    }

    /// The maximum core version representable under this environment.
    pub fn version(self) -> Version {
        use TargetEnv::*;
        match self {
            Universal1_0 | Vulkan1_0 | OpenCl1_2 | OpenClEmbedded1_2 | OpenCl2_0
            | OpenClEmbedded2_0 | OpenCl2_1 | OpenClEmbedded2_1 | OpenGl4_0 | OpenGl4_1
            | OpenGl4_2 | OpenGl4_3 | OpenGl4_5 => Version::new(1, 0),
            Universal1_1 => Version::new(1, 1),
            Universal1_2 | OpenCl2_2 | OpenClEmbedded2_2 => Version::new(1, 2),
            Universal1_3 | Vulkan1_1 => Version::new(1, 3),
            Universal1_4 | Vulkan1_1Spv1_4 => Version::new(1, 4),
            Universal1_5 | Vulkan1_2 => Version::new(1, 5),
            Universal1_6 | Vulkan1_3 | Vulkan1_4 => Version::new(1, 6),
        }
    }

    pub fn version_word(self) -> u32 {
        self.version().word()
    }

    pub fn description(self) -> &'static str {
        use TargetEnv::*;
        match self {
            Universal1_0 => "SPIR-V 1.0",
            Universal1_1 => "SPIR-V 1.1",
            Universal1_2 => "SPIR-V 1.2",
            Universal1_3 => "SPIR-V 1.3",
            Universal1_4 => "SPIR-V 1.4",
            Universal1_5 => "SPIR-V 1.5",
            Universal1_6 => "SPIR-V 1.6",
            Vulkan1_0 => "SPIR-V 1.0 (under Vulkan 1.0 semantics)",
            Vulkan1_1 => "SPIR-V 1.3 (under Vulkan 1.1 semantics)",
            Vulkan1_1Spv1_4 => "SPIR-V 1.4 (under Vulkan 1.1 semantics)",
            Vulkan1_2 => "SPIR-V 1.5 (under Vulkan 1.2 semantics)",
            Vulkan1_3 => "SPIR-V 1.6 (under Vulkan 1.3 semantics)",
            Vulkan1_4 => "SPIR-V 1.6 (under Vulkan 1.4 semantics)",
            OpenCl1_2 => "SPIR-V 1.0 (under OpenCL 1.2 Full Profile semantics)",
            OpenClEmbedded1_2 => "SPIR-V 1.0 (under OpenCL 1.2 Embedded Profile semantics)",
            OpenCl2_0 => "SPIR-V 1.0 (under OpenCL 2.0 Full Profile semantics)",
            OpenClEmbedded2_0 => "SPIR-V 1.0 (under OpenCL 2.0 Embedded Profile semantics)",
            OpenCl2_1 => "SPIR-V 1.0 (under OpenCL 2.1 Full Profile semantics)",
            OpenClEmbedded2_1 => "SPIR-V 1.0 (under OpenCL 2.1 Embedded Profile semantics)",
            OpenCl2_2 => "SPIR-V 1.2 (under OpenCL 2.2 Full Profile semantics)",
            OpenClEmbedded2_2 => "SPIR-V 1.2 (under OpenCL 2.2 Embedded Profile semantics)",
            OpenGl4_0 => "SPIR-V 1.0 (under OpenGL 4.0 semantics)",
            OpenGl4_1 => "SPIR-V 1.0 (under OpenGL 4.1 semantics)",
            OpenGl4_2 => "SPIR-V 1.0 (under OpenGL 4.2 semantics)",
            OpenGl4_3 => "SPIR-V 1.0 (under OpenGL 4.3 semantics)",
            OpenGl4_5 => "SPIR-V 1.0 (under OpenGL 4.5 semantics)",
        }
    }

    pub fn is_vulkan(self) -> bool {
        use TargetEnv::*;
        matches!(
            self,
            Vulkan1_0 | Vulkan1_1 | Vulkan1_1Spv1_4 | Vulkan1_2 | Vulkan1_3 | Vulkan1_4
        )
    }

    pub fn is_opencl(self) -> bool {
        use TargetEnv::*;
        matches!(
            self,
            OpenCl1_2
                | OpenClEmbedded1_2
                | OpenCl2_0
                | OpenClEmbedded2_0
                | OpenCl2_1
                | OpenClEmbedded2_1
                | OpenCl2_2
                | OpenClEmbedded2_2
        )
    }

    pub fn is_opengl(self) -> bool {
        use TargetEnv::*;
        matches!(self, OpenGl4_0 | OpenGl4_1 | OpenGl4_2 | OpenGl4_3 | OpenGl4_5)
    }

    pub fn is_universal(self) -> bool {
        !self.is_vulkan() && !self.is_opencl() && !self.is_opengl()
    }

    /// The name token that `parse` resolves to this environment.
    pub fn name(self) -> &'static str {
        TARGET_ENV_NAMES
            .iter()
            .find(|(_, env)| *env == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

impl Display for TargetEnv {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Recovers the target environment from the leading comment block of a
/// disassembled module.
///
/// The version header has the fixed shape `; Version: 1.<digit>` and is only
/// recognized within the initial run of comment and blank lines; the first
/// other content ends the search.
pub fn read_env_from_text(text: &str) -> Option<TargetEnv> {
    const VERSION_PREFIX: &str = "; Version: 1.";

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with(';') {
            // Header is over.
            return None;
        }

        let Some(rest) = trimmed.strip_prefix(VERSION_PREFIX) else {
            continue;
        };
        let mut chars = rest.chars();
        let minor = chars.next()?;
        let next = chars.next();
        if minor.is_ascii_digit() && !next.is_some_and(|c| c.is_ascii_digit()) {
            let index = (minor as u8 - b'0') as usize;
            return ORDERED_UNIVERSAL_ENVS.get(index).copied();
        }
    }
    None
}

/// Renders every recognized environment name, `|`-separated and wrapped to
/// the given width, for use in help text.
pub fn target_env_list(pad: usize, wrap: usize) -> String {
    let mut out = String::new();
    let mut line = String::new();
    let mut max_line_len = wrap - pad;
    let mut sep = "";

    for (name, _) in TARGET_ENV_NAMES {
        let word = format!("{sep}{name}");
        if line.len() + word.len() > max_line_len {
            out.push_str(&line);
            out.push('\n');
            line = " ".repeat(pad);
            max_line_len = wrap;
        }
        line.push_str(&word);
        sep = "|";
    }
    out.push_str(&line);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_envs() {
        assert_eq!(TargetEnv::parse("vulkan1.0"), Ok(TargetEnv::Vulkan1_0));
        assert_eq!(TargetEnv::parse("spv1.6"), Ok(TargetEnv::Universal1_6));
        assert_eq!(
            TargetEnv::parse("opencl2.0embedded"),
            Ok(TargetEnv::OpenClEmbedded2_0)
        );
    }

    #[test]
    fn longest_prefix_wins() {
        // The more specific name must shadow its prefix.
        assert_eq!(
            TargetEnv::parse("vulkan1.1spv1.4"),
            Ok(TargetEnv::Vulkan1_1Spv1_4)
        );
        assert_eq!(TargetEnv::parse("vulkan1.1"), Ok(TargetEnv::Vulkan1_1));
    }

    #[test]
    fn unknown_env_is_rejected() {
        assert!(matches!(
            TargetEnv::parse("webgpu0"),
            Err(InvalidTargetEnv::Unrecognized(_))
        ));
        assert!(TargetEnv::parse("").is_err());
    }

    #[test]
    fn version_words() {
        assert_eq!(TargetEnv::Universal1_0.version_word(), 0x0001_0000);
        assert_eq!(TargetEnv::Vulkan1_1Spv1_4.version(), Version::new(1, 4));
        assert_eq!(Version::from_word(0x0001_0300), Version::new(1, 3));
    }

    #[test]
    fn vulkan_version_mapping_picks_least_capable() {
        let env =
            TargetEnv::from_vulkan_versions(vulkan_ver(1, 1), Version::new(1, 3).word()).unwrap();
        assert_eq!(env, TargetEnv::Vulkan1_1);

        let env =
            TargetEnv::from_vulkan_versions(vulkan_ver(1, 1), Version::new(1, 4).word()).unwrap();
        assert_eq!(env, TargetEnv::Vulkan1_1Spv1_4);
    }

    #[test]
    fn env_from_text_header() {
        let text = "; silica disassembly\n; Version: 1.4\n; Generator: test\ncap Shader\n";
        assert_eq!(read_env_from_text(text), Some(TargetEnv::Universal1_4));
    }

    #[test]
    fn env_header_must_precede_content() {
        let text = "cap Shader\n; Version: 1.4\n";
        assert_eq!(read_env_from_text(text), None);
    }

    #[test]
    fn env_header_rejects_two_digit_minor() {
        assert_eq!(read_env_from_text("; Version: 1.12\n"), None);
        // Out-of-range single digit has no table entry.
        assert_eq!(read_env_from_text("; Version: 1.9\n"), None);
    }

    #[test]
    fn name_round_trip() {
        for (name, env) in TARGET_ENV_NAMES {
            assert_eq!(env.name(), *name);
            assert_eq!(TargetEnv::parse(name), Ok(*env));
        }
    }
}
