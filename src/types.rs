use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which files a watch session considers relevant.
///
/// - `Python`: only Python sources (`.py`, `.pyx`, `.pyd`) plus any extra
///   extensions configured by the user (default behaviour).
/// - `Default`: a built-in set of commonly edited source/text extensions.
/// - `All`: every file, minus explicitly ignored paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Python,
    Default,
    All,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" => Ok(FilterMode::Python),
            "default" => Ok(FilterMode::Default),
            "all" => Ok(FilterMode::All),
            other => Err(format!(
                "invalid filter: {other} (expected \"python\", \"default\" or \"all\")"
            )),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterMode::Python => "python",
            FilterMode::Default => "default",
            FilterMode::All => "all",
        };
        f.write_str(s)
    }
}
