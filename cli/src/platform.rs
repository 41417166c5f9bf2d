use std::fmt;

/// CPU architecture of the workstation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARM (hard float).
    Armv7,
    /// Anything else, carried verbatim.
    Other(String),
}

impl Arch {
    /// Map a `uname -m` / `std::env::consts::ARCH` style name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "x86_64" | "amd64" => Self::X86_64,
            "aarch64" | "arm64" => Self::Aarch64,
            "arm" | "armv7" | "armv7l" | "armhf" => Self::Armv7,
            other => Self::Other(other.to_string()),
        }
    }

    /// Architecture name as used in most release asset names.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Armv7 => "armv7",
            Self::Other(name) => name,
        }
    }

    /// Debian architecture name (`dpkg --print-architecture`).
    #[must_use]
    pub fn deb_arch(&self) -> &str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
            Self::Armv7 => "armhf",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Detected CPU architecture.
    pub arch: Arch,
    /// Whether `apt-get` is available.
    pub has_apt: bool,
    /// Whether the process runs with effective uid 0.
    pub is_root: bool,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            arch: Arch::from_name(std::env::consts::ARCH),
            has_apt: which::which("apt-get").is_ok(),
            is_root: nix::unistd::geteuid().is_root(),
        }
    }

    /// Create a platform with explicit values (for tests and fabricated contexts).
    #[must_use]
    pub const fn new(arch: Arch, has_apt: bool, is_root: bool) -> Self {
        Self {
            arch,
            has_apt,
            is_root,
        }
    }

    /// Name of the system package manager, if one is supported.
    #[must_use]
    pub const fn package_manager(&self) -> Option<&'static str> {
        if self.has_apt { Some("apt") } else { None }
    }
}
