use std::ops::BitOr;

/// Version of the tool writing traces. Files from newer tools are rejected.
pub const TOOL_VERSION: u32 = 1;

/// Version of the chunked file format.
pub const FORMAT_VERSION: u32 = 10;

/// Version of the pre-chunk binary format. Recognized, but not supported.
pub const LEGACY_FORMAT_VERSION: u32 = 3;

/// Version of the line-oriented JSON event format.
pub const JSON_FORMAT_VERSION: u32 = 2;

/// File-level flags carried by the file header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFlags(u32);

impl FileFlags {
    /// Times are recorded with sub-millisecond precision.
    pub const HAS_HIGH_RESOLUTION_TIMES: Self = Self(1);
    /// Times are event counts rather than wall clock.
    pub const TIMES_AS_COUNT: Self = Self(2);

    const NAMES: [(Self, &'static str); 2] = [
        (Self::HAS_HIGH_RESOLUTION_TIMES, "has_high_resolution_times"),
        (Self::TIMES_AS_COUNT, "times_as_count"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the set flags, as used by the JSON file header.
    pub fn to_strings(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Unknown names are ignored.
    pub fn from_strings<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        let mut flags = Self::empty();
        for name in names {
            if let Some((flag, _)) = Self::NAMES.iter().find(|(_, n)| *n == name) {
                flags = flags | *flag;
            }
        }
        flags
    }
}

impl BitOr for FileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_file_flags() {
        let flags = FileFlags::HAS_HIGH_RESOLUTION_TIMES | FileFlags::TIMES_AS_COUNT;
        assert_eq!(flags.bits(), 3);
        assert_eq!(
            flags.to_strings(),
            vec!["has_high_resolution_times", "times_as_count"]
        );
        assert_eq!(
            FileFlags::from_strings(["times_as_count", "bogus"]),
            FileFlags::TIMES_AS_COUNT
        );
    }
}
