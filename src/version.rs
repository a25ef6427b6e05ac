// ============================================================================
// VERSION STAMPS - A.B.C.D packed into a u64, 16 bits per part
// ============================================================================

use std::fmt;
use std::str::FromStr;

/// Mask that keeps A.B.C and drops the build part.
const MASK_UPDATE: u64 = 0xFFFF_FFFF_FFFF_0000;

/// Version the current build writes into persisted documents.
pub const CURRENT: Version = Version::new(0, 11, 1, 0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    pub const ZERO: Version = Version(0);

    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Version(
            ((major as u64) << 48) | ((minor as u64) << 32) | ((patch as u64) << 16) | build as u64,
        )
    }

    pub const fn from_raw(raw: u64) -> Self {
        Version(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Drop the build component, so `0.8.0.7` compares equal to `0.8.0.0`.
    pub const fn masked_update(self) -> Self {
        Version(self.0 & MASK_UPDATE)
    }

    pub const fn parts(self) -> [u16; 4] {
        [
            (self.0 >> 48) as u16,
            (self.0 >> 32) as u16,
            (self.0 >> 16) as u16,
            self.0 as u16,
        ]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.parts();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid version '{0}', expected up to four dot-separated numbers")]
pub struct ParseVersionError(String);

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Accepts `a`, `a.b`, `a.b.c` or `a.b.c.d`; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u16; 4];
        let pieces: Vec<&str> = s.trim().split('.').collect();
        if pieces.is_empty() || pieces.len() > 4 {
            return Err(ParseVersionError(s.to_string()));
        }
        for (slot, piece) in parts.iter_mut().zip(&pieces) {
            *slot = piece
                .parse::<u16>()
                .map_err(|_| ParseVersionError(s.to_string()))?;
        }
        Ok(Version::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_orders_parts() {
        let v = Version::new(0, 11, 1, 0);
        assert_eq!(v.parts(), [0, 11, 1, 0]);
        assert!(Version::new(0, 8, 0, 0) < Version::new(0, 11, 0, 0));
        assert!(Version::new(0, 11, 0, 9) < Version::new(0, 11, 1, 0));
        assert_eq!(v.to_string(), "0.11.1.0");
    }

    #[test]
    fn masking_drops_build() {
        assert_eq!(
            Version::new(0, 8, 0, 7).masked_update(),
            Version::new(0, 8, 0, 0)
        );
    }

    #[test]
    fn parses_short_forms() {
        assert_eq!("0.11".parse::<Version>().unwrap(), Version::new(0, 11, 0, 0));
        assert_eq!("1.2.3.4".parse::<Version>().unwrap(), Version::new(1, 2, 3, 4));
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("x.1".parse::<Version>().is_err());
    }
}
