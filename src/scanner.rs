use crate::error::Error;
use crate::model::DiskFileRecord;
use crate::platform::{normalize_datastore_path, DatastoreFile, Platform};
use crate::progress::ProgressReporter;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A datastore whose search failed; it contributes no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFailure {
    pub datastore: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Enumeration {
    /// Datastore-name order, then the platform's search order within a datastore.
    pub records: Vec<DiskFileRecord>,
    pub failures: Vec<VolumeFailure>,
    pub duplicates_dropped: usize,
}

/// Search every datastore under `location` for files matching `pattern`.
///
/// Only the datastore listing itself is fatal. A datastore whose search fails
/// is logged, recorded in `failures`, and skipped. With `parallel` the
/// searches run on the rayon pool; the result is identical either way.
pub fn enumerate_location(
    platform: &dyn Platform,
    location: &str,
    pattern: &str,
    parallel: bool,
    reporter: &dyn ProgressReporter,
) -> Result<Enumeration, Error> {
    let mut datastores = platform.datastores(location)?;
    datastores.sort();
    datastores.dedup();
    info!(
        "Searching {} datastores in '{}' for '{}'",
        datastores.len(),
        location,
        pattern
    );
    reporter.on_enumerate_start(datastores.len());

    let search = |datastore: &String| {
        let result = platform.search_datastore(datastore, pattern);
        let found = result.as_ref().map(Vec::len).unwrap_or(0);
        reporter.on_datastore_searched(datastore, found);
        (datastore.clone(), result)
    };

    let searched: Vec<(String, Result<Vec<DatastoreFile>, Error>)> = if parallel {
        datastores.par_iter().map(search).collect()
    } else {
        datastores.iter().map(search).collect()
    };

    let mut enumeration = Enumeration::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (datastore, result) in searched {
        let files = match result {
            Ok(files) => files,
            Err(e) => {
                warn!("Skipping datastore '{}': {}", datastore, e);
                enumeration.failures.push(VolumeFailure {
                    datastore,
                    error: e.to_string(),
                });
                continue;
            }
        };

        debug!("{} disk files on '{}'", files.len(), datastore);

        for file in files {
            let record = DiskFileRecord {
                datastore: datastore.clone(),
                folder_path: normalize_datastore_path(&file.folder_path),
                file_name: file.file_name,
                size_bytes: file.size_bytes.unwrap_or(0),
                modified: file.modified,
            };

            if !seen.insert(record.full_path()) {
                debug!("Dropping duplicate listing of {}", record.full_path());
                enumeration.duplicates_dropped += 1;
                continue;
            }
            enumeration.records.push(record);
        }
    }

    Ok(enumeration)
}
