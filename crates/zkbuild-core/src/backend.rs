//! Proving backends and how a source file selects one.
//!
//! The backend is encoded in the source's path: a path containing `gm17`
//! targets GM17, otherwise one containing `pghr13` targets PGHR13. Matching is
//! case-sensitive and `gm17` wins when both appear.

use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Trusted-setup proving scheme a circuit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Groth-Maller 2017. Supported end-to-end.
    Gm17,
    /// Parno-Howell-Gentry-Raykova 2013. Recognised only.
    Pghr13,
}

impl Backend {
    /// Name the toolchain expects for `--proving-scheme`.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Backend::Gm17 => "gm17",
            Backend::Pghr13 => "pghr13",
        }
    }

    /// Whether the full setup pipeline can run for this backend.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Backend::Gm17)
    }

    /// Fail with [`BuildError::UnsupportedBackend`] unless supported.
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(BuildError::UnsupportedBackend {
                backend: self.scheme().to_owned(),
            })
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Infer the backend from a source path.
pub fn infer_backend(path: impl AsRef<Path>) -> Result<Backend> {
    let path = path.as_ref();
    let s = path.to_string_lossy();
    if s.contains(Backend::Gm17.scheme()) {
        Ok(Backend::Gm17)
    } else if s.contains(Backend::Pghr13.scheme()) {
        Ok(Backend::Pghr13)
    } else {
        Err(BuildError::BackendUnresolved {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gm17_wins_over_pghr13() {
        let b = infer_backend("/code/pghr13/gm17/main.code").unwrap();
        assert_eq!(b, Backend::Gm17);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(matches!(
            infer_backend("/code/GM17/main.code"),
            Err(BuildError::BackendUnresolved { .. })
        ));
    }

    #[test]
    fn only_gm17_is_supported() {
        assert!(Backend::Gm17.ensure_supported().is_ok());
        assert!(matches!(
            Backend::Pghr13.ensure_supported(),
            Err(BuildError::UnsupportedBackend { .. })
        ));
    }

    proptest! {
        #[test]
        fn any_path_with_gm17_is_gm17(pre in "[a-z/]{0,12}", post in "[a-z/.]{0,12}") {
            let p = format!("{pre}gm17{post}");
            prop_assert_eq!(infer_backend(&p).unwrap(), Backend::Gm17);
        }

        #[test]
        fn pghr13_without_gm17_is_pghr13(pre in "[a-f/]{0,12}", post in "[a-f/.]{0,12}") {
            // The alphabet excludes 'g', so "gm17" cannot appear by accident.
            let p = format!("{pre}pghr13{post}");
            prop_assert_eq!(infer_backend(&p).unwrap(), Backend::Pghr13);
        }

        #[test]
        fn neither_token_fails(p in "[a-f/.]{0,24}") {
            prop_assert!(infer_backend(&p).is_err());
        }
    }
}
