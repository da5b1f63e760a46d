//! Directory-backed platform.
//!
//! Layout under the inventory root:
//!
//! ```text
//! <root>/<location>/<datastore>/<vm folder>/<vm>.vmx
//! <root>/<location>/<datastore>/<vm folder>/<disk>.vmdk
//! ```
//!
//! Datastore names are unique across the whole inventory, so a datastore
//! path `[ds] folder/file.vmdk` resolves without knowing its location.
//!
//! A `.vmdk` may be a text descriptor. Its extent lines (`RW 100 VMFS
//! "disk-flat.vmdk"`) name the data files that belong to it, and a
//! snapshot descriptor points at its parent with `parentFileNameHint`.
//! Usage follows the parent chain; search and delete treat a descriptor
//! and its extents as one disk.

use super::{datastore_folder_path, normalize_datastore_path, parse_datastore_path};
use super::{DatastoreFile, Platform};
use crate::error::Error;
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const VMFS_VOLUMES_PREFIX: &str = "/vmfs/volumes/";

/// Data-extent suffixes. These are never descriptors.
const EXTENT_SUFFIXES: &[&str] = &["-flat", "-delta", "-sesparse"];

/// Descriptors are small; anything past this is extent data.
const DESCRIPTOR_READ_LIMIT: u64 = 64 * 1024;

const EXTENT_ACCESS_MODES: &[&str] = &["RW", "RDONLY", "NOACCESS"];

/// What a disk descriptor says about its files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskDescriptor {
    /// Extent file names, relative to the descriptor's folder.
    pub extents: Vec<String>,
    pub parent_hint: Option<String>,
}

pub struct FsPlatform {
    root: PathBuf,
}

impl FsPlatform {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::platform(
                "connect",
                format!("inventory root {} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    fn datastore_dir(&self, datastore: &str) -> Result<PathBuf, Error> {
        if !is_single_component(datastore) {
            return Err(Error::InvalidPath(format!("[{}]", datastore)));
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::platform("resolve datastore", e))?;

        for entry in entries {
            let location = entry.map_err(|e| Error::platform("resolve datastore", e))?.path();
            let candidate = location.join(datastore);
            if location.is_dir() && candidate.is_dir() {
                return Ok(candidate);
            }
        }

        Err(Error::platform(
            "resolve datastore",
            format!("datastore '{}' not found", datastore),
        ))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        let (datastore, relative) = parse_datastore_path(path)?;
        if relative.is_empty() || relative.split('/').any(|part| part == "..") {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(self.datastore_dir(&datastore)?.join(relative))
    }

    /// Map a filesystem directory back to `(datastore, relative folder)`.
    fn locate_folder(&self, dir: &Path) -> Option<(String, String)> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let mut parts = relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        });

        let _location = parts.next()?;
        let datastore = parts.next()?;
        let folder = parts.collect::<Vec<_>>().join("/");
        Some((datastore, folder))
    }

    /// Push `path` and every ancestor named by `parentFileNameHint` onto
    /// `paths`. Disks already in `seen` end the walk.
    fn collect_disk_chain(
        &self,
        path: String,
        seen: &mut HashSet<String>,
        paths: &mut Vec<String>,
    ) -> Result<(), Error> {
        let mut next = Some(path);

        while let Some(current) = next.take() {
            if !seen.insert(current.clone()) {
                break;
            }
            paths.push(current.clone());

            // Raw paths outside any datastore cannot be opened here.
            let Ok((datastore, relative)) = parse_datastore_path(&current) else {
                continue;
            };
            let file = match self.resolve(&current) {
                Ok(file) if file.exists() => file,
                Ok(_) => {
                    warn!("Referenced disk {} does not exist", current);
                    continue;
                }
                Err(e) => {
                    warn!("Cannot locate referenced disk {}: {}", current, e);
                    continue;
                }
            };

            let descriptor = read_descriptor(&file).map_err(|e| {
                Error::platform(
                    "list vm disks",
                    format!("reading descriptor {}: {}", current, e),
                )
            })?;

            if let Some(hint) = descriptor.parent_hint {
                let folder = relative.rsplit_once('/').map(|(f, _)| f).unwrap_or("");
                next = resolve_disk_reference(&hint, &datastore, folder);
                if let Some(parent) = &next {
                    debug!("{} is a snapshot of {}", current, parent);
                }
            }
        }

        Ok(())
    }
}

impl Platform for FsPlatform {
    fn vm_disk_paths(&self) -> Result<Vec<String>, Error> {
        let mut paths = Vec::new();
        let mut seen = HashSet::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| Error::platform("list vm disks", e))?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), "vmx") {
                continue;
            }

            let contents = fs::read_to_string(entry.path()).map_err(|e| {
                Error::platform(
                    "list vm disks",
                    format!("reading {}: {}", entry.path().display(), e),
                )
            })?;

            let Some((datastore, folder)) = entry
                .path()
                .parent()
                .and_then(|dir| self.locate_folder(dir))
            else {
                warn!("{} is not inside a datastore", entry.path().display());
                continue;
            };

            for value in parse_vmx_disk_entries(&contents) {
                if let Some(path) = resolve_disk_reference(&value, &datastore, &folder) {
                    debug!("{} references {}", entry.path().display(), path);
                    self.collect_disk_chain(path, &mut seen, &mut paths)?;
                }
            }
        }

        Ok(paths)
    }

    fn datastores(&self, location: &str) -> Result<Vec<String>, Error> {
        let location_dir = self.root.join(location);
        let entries = fs::read_dir(&location_dir).map_err(|e| {
            Error::platform(
                "list datastores",
                format!("location '{}': {}", location, e),
            )
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::platform("list datastores", e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    fn search_datastore(
        &self,
        datastore: &str,
        pattern: &str,
    ) -> Result<Vec<DatastoreFile>, Error> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| Error::platform("search datastore", format!("pattern '{}': {}", pattern, e)))?;
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };

        let datastore_dir = self.datastore_dir(datastore)?;

        let walker = WalkDir::new(&datastore_dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        let mut matched = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| Error::platform("search datastore", e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if pattern.matches_with(&file_name, options) {
                matched.push((entry.into_path(), file_name));
            }
        }

        // Extents claimed by a descriptor are folded into that descriptor.
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut extents_of = Vec::with_capacity(matched.len());
        for (path, file_name) in &matched {
            let extents = if is_extent_file(file_name) {
                Vec::new()
            } else {
                match read_descriptor(path) {
                    Ok(descriptor) => sibling_extents(&descriptor, file_name),
                    Err(e) => {
                        warn!("Cannot read descriptor {}: {}", path.display(), e);
                        Vec::new()
                    }
                }
            };
            claimed.extend(extents.iter().map(|extent| path.with_file_name(extent)));
            extents_of.push(extents);
        }

        let mut files = Vec::new();
        for ((path, file_name), extents) in matched.into_iter().zip(extents_of) {
            if claimed.contains(&path) {
                continue;
            }

            let folder = path
                .parent()
                .and_then(|parent| parent.strip_prefix(&datastore_dir).ok())
                .map(|relative| {
                    relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_default();

            let metadata = fs::metadata(&path).ok();
            let extent_bytes: u64 = extents
                .iter()
                .filter_map(|extent| fs::metadata(path.with_file_name(extent)).ok())
                .map(|m| m.len())
                .sum();
            let size_bytes = metadata.as_ref().map(|m| m.len() + extent_bytes);
            let modified = metadata
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            files.push(DatastoreFile {
                folder_path: datastore_folder_path(datastore, &folder),
                file_name,
                size_bytes,
                modified,
            });
        }

        Ok(files)
    }

    fn rename_file(&self, path: &str, new_name: &str) -> Result<(), Error> {
        if !is_single_component(new_name) {
            return Err(Error::InvalidPath(new_name.to_string()));
        }

        let source = self.resolve(path)?;
        if !source.is_file() {
            return Err(Error::platform("rename", format!("{} not found", path)));
        }

        let target = source.with_file_name(new_name);
        if target.exists() {
            return Err(Error::platform(
                "rename",
                format!("target {} already exists", new_name),
            ));
        }

        fs::rename(&source, &target).map_err(|e| Error::platform("rename", e))
    }

    fn delete_file(&self, path: &str) -> Result<(), Error> {
        let target = self.resolve(path)?;
        if !target.is_file() {
            return Err(Error::platform("delete", format!("{} not found", path)));
        }

        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extents = if is_extent_file(&file_name) {
            Vec::new()
        } else {
            let descriptor = read_descriptor(&target)
                .map_err(|e| Error::platform("delete", format!("reading {}: {}", path, e)))?;
            sibling_extents(&descriptor, &file_name)
        };

        for extent in extents {
            match fs::remove_file(target.with_file_name(&extent)) {
                Ok(()) => debug!("Deleted extent {} of {}", extent, path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::platform(
                        "delete",
                        format!("extent {}: {}", extent, e),
                    ))
                }
            }
        }

        fs::remove_file(&target).map_err(|e| Error::platform("delete", e))
    }
}

/// Values of `*.fileName = "...vmdk"` entries in a `.vmx` file.
pub fn parse_vmx_disk_entries(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.starts_with('#') {
                return None;
            }

            let (key, value) = line.split_once('=')?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().trim_matches('"').trim();

            if key.ends_with(".filename") && value.to_ascii_lowercase().ends_with(".vmdk") {
                Some(value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Extent lines and the parent hint of a text descriptor. Binary content
/// yields an empty descriptor.
pub fn parse_disk_descriptor(contents: &str) -> DiskDescriptor {
    let mut descriptor = DiskDescriptor::default();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let access = line.split_whitespace().next().unwrap_or("");
        if EXTENT_ACCESS_MODES.contains(&access) {
            let quoted = line
                .split_once('"')
                .and_then(|(_, rest)| rest.split_once('"'))
                .map(|(name, _)| name.trim());
            if let Some(name) = quoted.filter(|name| !name.is_empty()) {
                descriptor.extents.push(name.to_string());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("parentFileNameHint") {
                let value = value.trim().trim_matches('"').trim();
                if !value.is_empty() {
                    descriptor.parent_hint = Some(value.to_string());
                }
            }
        }
    }

    descriptor
}

fn read_descriptor(path: &Path) -> io::Result<DiskDescriptor> {
    let mut buf = Vec::new();
    fs::File::open(path)?
        .take(DESCRIPTOR_READ_LIMIT)
        .read_to_end(&mut buf)?;
    Ok(parse_disk_descriptor(&String::from_utf8_lossy(&buf)))
}

/// Extents that live next to the descriptor, excluding the descriptor itself
/// (monolithic sparse disks list their own file).
fn sibling_extents(descriptor: &DiskDescriptor, own_name: &str) -> Vec<String> {
    descriptor
        .extents
        .iter()
        .filter(|extent| is_single_component(extent) && extent.as_str() != own_name)
        .cloned()
        .collect()
}

/// Turn a disk reference into a datastore path. Relative references are
/// taken from `folder` on `datastore`.
pub fn resolve_disk_reference(value: &str, datastore: &str, folder: &str) -> Option<String> {
    let value = value.trim();

    if value.starts_with('[') {
        return Some(normalize_datastore_path(value));
    }

    if let Some(rest) = value.strip_prefix(VMFS_VOLUMES_PREFIX) {
        let (datastore, relative) = rest.split_once('/')?;
        return Some(normalize_datastore_path(&format!("[{}] {}", datastore, relative)));
    }

    if value.starts_with('/') {
        warn!(
            "Disk reference '{}' from [{}] {} is outside any datastore",
            value, datastore, folder
        );
        return Some(value.to_string());
    }

    Some(normalize_datastore_path(&format!(
        "{}{}",
        datastore_folder_path(datastore, folder),
        value
    )))
}

/// True for data extents (`-flat`, `-delta`, `-sesparse`, `-s001`) of a disk.
pub fn is_extent_file(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    let Some(stem) = lower.strip_suffix(".vmdk") else {
        return false;
    };

    if EXTENT_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix)) {
        return true;
    }

    match stem.rsplit_once("-s") {
        Some((_, digits)) => digits.len() == 3 && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// A plain file or directory name: one normal component, no separators.
fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
