use std::str::FromStr;

/// Represents video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Resolution {
    pub width: u64,
    pub height: u64,
}

impl Resolution {
    pub fn new(width: u64, height: u64) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `WIDTHxHEIGHT` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resolution {0:?}, expected WIDTHxHEIGHT")]
pub struct ParseResolutionError(pub String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResolutionError(s.to_string());
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(err)?;
        Ok(Self {
            width: width.trim().parse().map_err(|_| err())?,
            height: height.trim().parse().map_err(|_| err())?,
        })
    }
}
