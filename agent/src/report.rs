use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report file name {0:?}: expected a plain file name")]
    InvalidName(String),
    #[error("could not write report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes HTML reports into a single directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `html` to `<dir>/<file_name>`, creating the directory if needed.
    /// Existing files are overwritten.
    pub async fn write(&self, file_name: &str, html: &str) -> Result<PathBuf, ReportError> {
        if !is_plain_file_name(file_name) {
            return Err(ReportError::InvalidName(file_name.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, html)
            .await
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), bytes = html.len(), "wrote report");
        Ok(path)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
