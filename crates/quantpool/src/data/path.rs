//! Pool locations with an optional `scheme://` prefix.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PoolError;

const DEFAULT_SCHEME: &str = "dsv";
const QUANTIZED_SCHEME: &str = "quantized";
const UNSUPPORTED_SCHEMES: &[&str] = &["yt-quantized"];

/// Location of an input pool, e.g. `quantized:///data/train.bin`.
///
/// A bare path uses the `dsv` scheme.
///
/// # Example
///
/// ```
/// use quantpool::data::PoolPath;
///
/// let path: PoolPath = "quantized://train.bin".parse().unwrap();
/// assert!(path.is_quantized());
/// assert!("yt-quantized://cluster/table".parse::<PoolPath>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolPath {
    scheme: String,
    path: PathBuf,
}

impl PoolPath {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Whether features arrive pre-binarized.
    pub fn is_quantized(&self) -> bool {
        self.scheme == QUANTIZED_SCHEME
    }
}

impl FromStr for PoolPath {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, path) = match s.split_once("://") {
            Some((scheme, path)) => (scheme, path),
            None => (DEFAULT_SCHEME, s),
        };
        if UNSUPPORTED_SCHEMES.contains(&scheme) {
            return Err(PoolError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for PoolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_path_defaults_to_dsv() {
        let path: PoolPath = "data/train.tsv".parse().unwrap();
        assert_eq!(path.scheme(), "dsv");
        assert_eq!(path.path(), &PathBuf::from("data/train.tsv"));
        assert!(!path.is_quantized());
    }

    #[test]
    fn test_quantized_scheme() {
        let path: PoolPath = "quantized:///tmp/pool.bin".parse().unwrap();
        assert!(path.is_quantized());
        assert_eq!(path.to_string(), "quantized:///tmp/pool.bin");
    }

    #[test]
    fn test_remote_quantized_is_rejected() {
        let err = "yt-quantized://hahn/home/pool".parse::<PoolPath>().unwrap_err();
        assert!(matches!(err, PoolError::UnsupportedScheme(ref s) if s == "yt-quantized"));
        assert!(err.to_string().contains("unsupported"));
    }
}
