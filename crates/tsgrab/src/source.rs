use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::DownloadError;

/// Where the top-level playlist comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    Url(Url),
    Path(PathBuf),
}

impl PlaylistSource {
    /// Anything starting with `http` is a URL, everything else a local path.
    pub fn parse(input: &str) -> Result<Self, DownloadError> {
        if input.starts_with("http") {
            Url::parse(input)
                .map(Self::Url)
                .map_err(|e| DownloadError::UrlError(format!("Invalid playlist URL {input}: {e}")))
        } else {
            Ok(Self::Path(PathBuf::from(input)))
        }
    }

    /// The playlist's own URL, used as the base for relative URIs.
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Url(url) => Some(url),
            Self::Path(_) => None,
        }
    }
}

impl FromStr for PlaylistSource {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for PlaylistSource {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<PathBuf> for PlaylistSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl fmt::Display for PlaylistSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
