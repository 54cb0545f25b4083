use crate::settings::CompilerSettings;
use ethers_solc::Solc;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid solc version {0}: {1}")]
    InvalidVersion(String, semver::Error),
    #[error("solc binary {0} does not exist")]
    NotFound(PathBuf),
    #[error("svm returned error: {0}")]
    Svm(String),
}

/// Where the solc binary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolcFetcher {
    Path(PathBuf),
    Svm(semver::Version),
    /// `solc` from `SOLC_PATH` or `PATH`.
    System,
}

impl SolcFetcher {
    pub fn from_settings(settings: &CompilerSettings) -> Result<Self, FetchError> {
        if let Some(path) = &settings.solc_path {
            return Ok(Self::Path(path.clone()));
        }
        match &settings.version {
            Some(version) => {
                let trimmed = version.trim().trim_start_matches('v');
                semver::Version::parse(trimmed)
                    .map(Self::Svm)
                    .map_err(|err| FetchError::InvalidVersion(version.clone(), err))
            }
            None => Ok(Self::System),
        }
    }

    pub async fn fetch(&self) -> Result<Solc, FetchError> {
        match self {
            Self::Path(path) => {
                if !path.exists() {
                    return Err(FetchError::NotFound(path.clone()));
                }
                Ok(Solc::new(path.clone()))
            }
            Self::Svm(version) => {
                let installed = Solc::find_svm_installed_version(version.to_string())
                    .map_err(|err| FetchError::Svm(err.to_string()))?;
                match installed {
                    Some(solc) => Ok(solc),
                    None => {
                        log::info!(target: "compiler", "installing solc version {}", version);
                        Solc::install(version)
                            .await
                            .map_err(|err| FetchError::Svm(err.to_string()))
                    }
                }
            }
            Self::System => Ok(Solc::default()),
        }
    }
}
