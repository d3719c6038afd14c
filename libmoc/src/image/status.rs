//! Status flags and exit codes

use std::fmt::Display;

use strum::IntoStaticStr;

/// Compression mode of an image, as packed into the exit code
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum CompressionMode {
    /// uncompressed
    #[default]
    #[strum(serialize = "raw")]
    Raw = 0,
    /// predictive
    #[strum(serialize = "predictive")]
    Predictive = 1,
    /// transform
    #[strum(serialize = "transform")]
    Transform = 2,
}

impl CompressionMode {
    /// Label spelling of the mode
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Accumulated image status flags
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    /// no problems recorded
    pub const OK: Self = Self(0);
    /// fewer lines than declared
    pub const SHORT: Self = Self(1 << 1);
    /// fragment numbers skipped
    pub const BAD_SEQUENCE: Self = Self(1 << 2);
    /// bad fragment checksum, or sync lost before the data ran out
    pub const BAD_CHECKSUM: Self = Self(1 << 3);

    /// Raw flag bits
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every flag in `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the flags in `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns true if no flag is set
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Status {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = [
            (Self::SHORT, "short"),
            (Self::BAD_SEQUENCE, "bad-sequence"),
            (Self::BAD_CHECKSUM, "bad-checksum"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("ok")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Packs mode, status flags and the error bit into a process exit code
///
/// A clean decode exits with 0 whatever the mode.
#[must_use]
pub const fn exit_code(mode: CompressionMode, status: Status, errors: u32) -> u8 {
    if errors == 0 {
        0
    } else {
        ((mode as u8) << 4) | status.bits() | 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_mode_flags_and_error_bit() {
        let modes = [
            CompressionMode::Raw,
            CompressionMode::Predictive,
            CompressionMode::Transform,
        ];
        let flags = [Status::SHORT, Status::BAD_SEQUENCE, Status::BAD_CHECKSUM];
        for mode in modes {
            for subset in 0..8u8 {
                let mut status = Status::OK;
                for (i, &flag) in flags.iter().enumerate() {
                    if subset & (1 << i) != 0 {
                        status.insert(flag);
                    }
                }
                let code = exit_code(mode, status, 3);
                assert_eq!(code, ((mode as u8) << 4) | status.bits() | 1);
                assert_eq!(code >> 4, mode as u8);
                assert_eq!(code & 0x0e, subset << 1);
            }
            assert_eq!(exit_code(mode, Status::OK, 0), 0);
        }
    }

    #[test]
    fn lists_flag_names() {
        assert_eq!(Status::OK.to_string(), "ok");
        assert_eq!(
            (Status::SHORT | Status::BAD_CHECKSUM).to_string(),
            "short,bad-checksum"
        );
        assert!((Status::SHORT | Status::BAD_SEQUENCE).contains(Status::BAD_SEQUENCE));
    }
}
