pub mod fs;

use crate::error::Error;
use chrono::{DateTime, Utc};

pub use self::fs::FsPlatform;

/// A file returned by a datastore search, before it becomes a `DiskFileRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreFile {
    /// `[<datastore>] <folder/>`
    pub folder_path: String,
    pub file_name: String,
    pub size_bytes: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// The virtualization platform session. Every call may be slow and may fail
/// independently of the others.
///
/// Implementations are shared across volume searches, hence `Send + Sync`.
pub trait Platform: Send + Sync {
    /// Every disk path referenced by any VM's current disk layout, platform-wide,
    /// including the parent disks of snapshots.
    fn vm_disk_paths(&self) -> Result<Vec<String>, Error>;

    /// Names of the storage volumes under `location`.
    fn datastores(&self, location: &str) -> Result<Vec<String>, Error>;

    /// Recursive search of one datastore for disks whose name matches `pattern`.
    /// A disk's size covers all of its data files.
    fn search_datastore(&self, datastore: &str, pattern: &str)
        -> Result<Vec<DatastoreFile>, Error>;

    /// Rename the file at `path` to `new_name` within the same folder.
    fn rename_file(&self, path: &str, new_name: &str) -> Result<(), Error>;

    /// Remove the disk at `path` together with its data files.
    fn delete_file(&self, path: &str) -> Result<(), Error>;
}

/// Bring a datastore path to the canonical `[ds] folder/file` form.
pub fn normalize_datastore_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");

    let (prefix, rest) = match (unified.starts_with('['), unified.find(']')) {
        (true, Some(end)) => (
            &unified[..=end],
            unified[end + 1..].trim_start().trim_start_matches('/'),
        ),
        _ => ("", unified.as_str()),
    };

    let mut normalized = String::with_capacity(unified.len() + 1);
    if !prefix.is_empty() {
        normalized.push_str(prefix);
        normalized.push(' ');
    }

    let mut previous_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(c);
    }

    normalized
}

/// Split `[ds] rel/path` into `("ds", "rel/path")`.
pub fn parse_datastore_path(path: &str) -> Result<(String, String), Error> {
    let normalized = normalize_datastore_path(path);

    let end = match (normalized.starts_with('['), normalized.find(']')) {
        (true, Some(end)) => end,
        _ => return Err(Error::InvalidPath(path.to_string())),
    };

    let datastore = normalized[1..end].trim();
    if datastore.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }

    let relative = normalized[end + 1..].trim_start();
    Ok((datastore.to_string(), relative.to_string()))
}

/// `[ds] ` for the datastore root, `[ds] a/b/` for a subfolder.
pub fn datastore_folder_path(datastore: &str, relative_folder: &str) -> String {
    let relative_folder = relative_folder.trim_matches('/');
    if relative_folder.is_empty() {
        format!("[{}] ", datastore)
    } else {
        format!("[{}] {}/", datastore, relative_folder)
    }
}
