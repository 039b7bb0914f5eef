use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Filesystem-backed image store. Stands in for the managed object storage
/// bucket behind the same name-plus-public-URL surface.
pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub name: String,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> io::Result<StoredImage> {
        fs::create_dir_all(&self.root).await?;
        let name = format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            sanitize_name(original_name)
        );
        fs::write(self.root.join(&name), bytes).await?;
        Ok(StoredImage {
            url: self.public_url(&name),
            name,
        })
    }

    pub async fn list(&self) -> io::Result<Vec<ImageEntry>> {
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(err) => return Err(err),
        };

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let created_at = metadata
                .modified()
                .ok()
                .map(DateTime::<Utc>::from);
            entries.push(ImageEntry {
                url: self.public_url(&name),
                name,
                created_at,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

/// Uploaded names are reduced to their final path component so a crafted
/// filename cannot escape the media root.
fn sanitize_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}
