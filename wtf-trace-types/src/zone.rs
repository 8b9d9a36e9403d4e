use std::{fmt::Display, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// The kind of execution context a zone describes.
pub enum ZoneType {
    Script,
    NativeScript,
    NativeGpu,
    NativeBrowser,
    /// Any type string this library does not know about.
    Other(String),
}

impl ZoneType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Script => "script",
            Self::NativeScript => "native_script",
            Self::NativeGpu => "native_gpu",
            Self::NativeBrowser => "native_browser",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl Default for ZoneType {
    fn default() -> Self {
        Self::Script
    }
}

impl Display for ZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ZoneType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "script" => Self::Script,
            "native_script" => Self::NativeScript,
            "native_gpu" => Self::NativeGpu,
            "native_browser" => Self::NativeBrowser,
            other => Self::Other(other.to_owned()),
        })
    }
}
