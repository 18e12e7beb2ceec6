//! Local persistence for downloaded content: the checksum index sidecar,
//! per-item metadata documents, and file helpers used by the reconciler.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use md5::{Digest, Md5};
use serde_json::Value;

use crate::{
    error::Error,
    models::{comment::Comment, post::Post},
    result::Result,
};

/// Sidecar file holding the checksum-to-filename index of a directory.
pub const INDEX_FILE: &str = ".md5data";

/// Subdirectory holding one metadata document per downloaded item.
pub const METADATA_DIR: &str = ".metadata";

/// File extensions recognized as downloadable media.
pub const MEDIA_EXTENSIONS: [&str; 5] = ["png", "gif", "jpg", "swf", "webm"];

/// Computes the MD5 hex digest of a byte slice.
pub fn content_md5(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Computes the MD5 hex digest of a file's content.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn file_md5(path: &Path) -> Result<String> {
    Ok(content_md5(&fs::read(path)?))
}

/// The checksum-to-filename index for one managed directory.
///
/// The index is the authoritative record of what content, by checksum,
/// already exists in the directory and under what name. At most one
/// filename is kept per checksum. It is never assumed in sync with the
/// filesystem without a [`ContentIndex::load`] or [`ContentIndex::rebuild`]
/// in the same run, and one run owns it exclusively.
#[derive(Debug, Clone)]
pub struct ContentIndex {
    dir: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ContentIndex {
    /// Loads the index sidecar from `dir`.
    ///
    /// A missing, unreadable or undecodable sidecar falls back to a full
    /// [`ContentIndex::rebuild`].
    ///
    /// # Errors
    ///
    /// Fails only if the fallback rebuild fails.
    pub fn load(dir: &Path) -> Result<Self> {
        let entries = fs::read_to_string(dir.join(INDEX_FILE))
            .ok()
            .and_then(|text| serde_json::from_str::<BTreeMap<String, String>>(&text).ok());
        match entries {
            Some(entries) => Ok(ContentIndex {
                dir: dir.to_path_buf(),
                entries,
            }),
            None => Self::rebuild(dir),
        }
    }

    /// Rebuilds the index by hashing every recognized media file in `dir`,
    /// creating the directory first when it does not exist.
    ///
    /// Files are visited in sorted name order; for byte-identical
    /// duplicates the first name visited wins. Files that cannot be read
    /// are skipped. The rebuilt index is persisted immediately.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, enumerated, or the
    /// sidecar cannot be written.
    pub fn rebuild(dir: &Path) -> Result<Self> {
        log::info!("rebuilding checksum index for {}", dir.display());
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            if !path.is_file() || !has_media_extension(&path) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut entries = BTreeMap::new();
        for name in names {
            match file_md5(&dir.join(&name)) {
                Ok(digest) => {
                    entries.entry(digest).or_insert(name);
                }
                Err(err) => {
                    log::warn!("skipping unreadable file {name}: {err}");
                }
            }
        }

        let index = ContentIndex {
            dir: dir.to_path_buf(),
            entries,
        };
        index.save()?;
        Ok(index)
    }

    /// Writes the index to its sidecar file, sorted by checksum,
    /// overwriting any previous sidecar.
    ///
    /// # Errors
    ///
    /// Fails if the sidecar cannot be written.
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
        fs::write(self.dir.join(INDEX_FILE), text)?;
        Ok(())
    }

    /// Returns the directory this index is scoped to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the filename stored for `checksum`, if any.
    pub fn get(&self, checksum: &str) -> Option<&str> {
        self.entries.get(checksum).map(String::as_str)
    }

    /// Whether `checksum` is present in the index.
    pub fn contains(&self, checksum: &str) -> bool {
        self.entries.contains_key(checksum)
    }

    /// Maps `checksum` to `name`, replacing any previous entry.
    pub fn insert(&mut self, checksum: String, name: String) {
        self.entries.insert(checksum, name);
    }

    /// Iterates the index entries in checksum order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(checksum, name)| (checksum.as_str(), name.as_str()))
    }

    /// Returns the number of indexed files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn has_media_extension(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map_or(false, |ext| MEDIA_EXTENSIONS.contains(&ext))
}

/// Writes a post's full field set (pass-through fields included) to the
/// metadata sidecar for its checksum, with the comment list appended when
/// one is supplied.
///
/// # Errors
///
/// Fails if the post carries no checksum or the document cannot be
/// written.
pub fn write_metadata(dir: &Path, post: &Post, comments: Option<&[Comment]>) -> Result<()> {
    let checksum = post.md5().ok_or(Error::NotFound {
        kind: "checksum",
        ident: String::from("(unset)"),
    })?;
    let meta_dir = dir.join(METADATA_DIR);
    fs::create_dir_all(&meta_dir)?;

    let mut document = post.dump_data();
    if let (Some(comments), Some(map)) = (comments, document.as_object_mut()) {
        map.insert(
            String::from("comments"),
            Value::Array(comments.iter().map(Comment::dump_data).collect()),
        );
    }
    let text = serde_json::to_string_pretty(&document)
        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    fs::write(meta_dir.join(checksum), text)?;
    Ok(())
}

/// Reads the locally stored metadata for an image file back into a post.
///
/// # Errors
///
/// Fails if the image cannot be hashed, the metadata document is missing,
/// or it does not decode.
pub fn read_metadata(dir: &Path, file_name: &str) -> Result<Post> {
    let checksum = file_md5(&dir.join(file_name))?;
    let text = fs::read_to_string(dir.join(METADATA_DIR).join(&checksum))?;
    let data: Value = serde_json::from_str(&text).map_err(|_| Error::MalformedResponse {
        url: format!("{METADATA_DIR}/{checksum}"),
    })?;
    Post::from_data(data)
}

/// Copies a file into `dest_dir`, creating the directory as needed.
/// A missing source is a no-op.
///
/// # Errors
///
/// Fails if the directory cannot be created or the copy fails.
pub fn copy_into(src: &Path, dest_dir: &Path) -> Result<()> {
    if !dest_dir.is_dir() {
        fs::create_dir_all(dest_dir)?;
    }
    if !src.is_file() {
        return Ok(());
    }
    let name = src.file_name().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "source has no file name",
        ))
    })?;
    fs::copy(src, dest_dir.join(name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::{content_md5, ContentIndex, INDEX_FILE, METADATA_DIR};
    use crate::models::post::Post;

    #[test]
    fn rebuild_hashes_recognized_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"one").unwrap();
        fs::write(dir.path().join("b.webm"), b"two").unwrap();
        fs::write(dir.path().join("notes.txt"), b"three").unwrap();

        let index = ContentIndex::rebuild(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&content_md5(b"one")), Some("a.png"));
        assert_eq!(index.get(&content_md5(b"two")), Some("b.webm"));
        assert!(dir.path().join(INDEX_FILE).is_file());
    }

    #[test]
    fn duplicate_content_keeps_first_sorted_name() {
        let dir = TempDir::new().unwrap();
        // written out of order on purpose; enumeration sorts by name
        fs::write(dir.path().join("b.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("a.png"), b"same bytes").unwrap();

        let index = ContentIndex::rebuild(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&content_md5(b"same bytes")), Some("a.png"));
    }

    #[test]
    fn corrupt_sidecar_falls_back_to_rebuild() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.gif"), b"gif bytes").unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"not json {").unwrap();

        let index = ContentIndex::load(dir.path()).unwrap();
        assert_eq!(index.get(&content_md5(b"gif bytes")), Some("a.gif"));
    }

    #[test]
    fn load_prefers_intact_sidecar_over_filesystem() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(INDEX_FILE),
            r#"{ "0123": "gone.png" }"#,
        )
        .unwrap();

        let index = ContentIndex::load(dir.path()).unwrap();
        assert_eq!(index.get("0123"), Some("gone.png"));
    }

    #[test]
    fn save_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let mut index = ContentIndex::rebuild(dir.path()).unwrap();
        index.insert(String::from("ffff"), String::from("z.png"));
        index.insert(String::from("0000"), String::from("a.png"));
        index.save().unwrap();
        let first = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        index.save().unwrap();
        let second = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert_eq!(first, second);
        assert!(first.find("0000").unwrap() < first.find("ffff").unwrap());
    }

    #[test]
    fn metadata_round_trips_through_the_sidecar() {
        let dir = TempDir::new().unwrap();
        let bytes = b"image bytes";
        let checksum = content_md5(bytes);
        fs::write(dir.path().join("img.png"), bytes).unwrap();

        let post = Post::from_data(json!({
            "id": 42,
            "md5": checksum,
            "file_ext": "png",
            "votes_weird_field": "kept",
        }))
        .unwrap();
        super::write_metadata(dir.path(), &post, None).unwrap();
        assert!(dir.path().join(METADATA_DIR).join(&checksum).is_file());

        let loaded = super::read_metadata(dir.path(), "img.png").unwrap();
        assert_eq!(loaded.id(), Some(42));
        assert_eq!(loaded.extra().get("votes_weird_field"), post.extra().get("votes_weird_field"));
    }
}
