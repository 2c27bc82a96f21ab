//! Per-file metadata records: `file-properties/<path inside project>`.

use lw_domain::{to_millis, FileData, PropertyMap};
use tracing::{error, warn};

use crate::sidecar::SidecarStore;

pub(crate) const FILE_PROPERTIES_FOLDER: &str = "file-properties";
pub(crate) const UNIQUE_ID: &str = "unique-id";
pub(crate) const MODIFIED_FLAG: &str = "modified";
pub(crate) const MODIFIED_AT_LONG: &str = "modified-at-long";
pub(crate) const SIZE: &str = "size";

/// Record name for `path`, or `None` when `path` is a bare project name.
pub(crate) fn record_name(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    let idx = path.find('/')?;
    Some(format!("{FILE_PROPERTIES_FOLDER}{}", &path[idx..]))
}

/// Reads the metadata record of `path`. Missing and unreadable records both
/// come back empty; the latter is logged.
pub(crate) fn read(sidecar: &SidecarStore, path: &str) -> PropertyMap {
    let Some(name) = record_name(path) else {
        return PropertyMap::new();
    };
    let location = sidecar.get(path, &name);
    if !location.is_file() {
        return PropertyMap::new();
    }
    PropertyMap::load(&location).unwrap_or_else(|err| {
        error!(path = %location.display(), %err, "unreadable file metadata record");
        PropertyMap::new()
    })
}

fn write(sidecar: &SidecarStore, path: &str, name: &str, properties: &PropertyMap) {
    let location = match sidecar.create(path, name) {
        Ok(location) => location,
        Err(err) => {
            error!(path, %err, "cannot create file metadata record");
            return;
        }
    };
    if let Err(err) = properties.store(&location) {
        error!(path = %location.display(), %err, "cannot write file metadata record");
        if let Err(err) = std::fs::remove_file(&location) {
            warn!(path = %location.display(), %err, "cannot remove broken metadata record");
        }
    }
}

/// A file counts as modified when its record says so, when size or
/// modification time differ from the record, or when the record cannot tell.
pub(crate) fn is_modified(actual: &FileData, properties: &PropertyMap) -> bool {
    let flagged = properties
        .get(MODIFIED_FLAG)
        .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true"));
    if flagged {
        return true;
    }

    let Some(size) = properties.get(SIZE).and_then(|raw| raw.trim().parse::<u64>().ok()) else {
        return true;
    };
    if size != actual.size {
        return true;
    }

    let Some(recorded) = properties
        .get(MODIFIED_AT_LONG)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
    else {
        return true;
    };
    actual.modified_at.map(to_millis) != Some(recorded)
}

pub(crate) fn set_modified(sidecar: &SidecarStore, path: &str) {
    let Some(name) = record_name(path) else {
        return;
    };
    let mut properties = read(sidecar, path);
    properties.insert(MODIFIED_FLAG, "true");
    write(sidecar, path, &name, &properties);
}

/// Remembers what the source of truth reported for `data`.
pub(crate) fn update(sidecar: &SidecarStore, data: &FileData) {
    let Some(name) = record_name(&data.name) else {
        return;
    };
    let mut properties = read(sidecar, &data.name);
    match &data.unique_id {
        Some(unique_id) => properties.insert(UNIQUE_ID, unique_id.as_str()),
        None => {
            properties.remove(UNIQUE_ID);
        }
    }
    if let Some(modified_at) = data.modified_at {
        properties.insert(MODIFIED_AT_LONG, to_millis(modified_at).to_string());
    } else {
        properties.remove(MODIFIED_AT_LONG);
    }
    properties.insert(SIZE, data.size.to_string());
    write(sidecar, &data.name, &name, &properties);
}

pub(crate) fn delete(sidecar: &SidecarStore, path: &str) {
    let Some(name) = record_name(path) else {
        return;
    };
    let location = sidecar.get(path, &name);
    if location.is_file() {
        if let Err(err) = std::fs::remove_file(&location) {
            warn!(path = %location.display(), %err, "cannot remove file metadata record");
        }
    }
}

pub(crate) fn delete_all(sidecar: &SidecarStore, path: &str) {
    let folder = sidecar.properties_folder(path).join(FILE_PROPERTIES_FOLDER);
    if !folder.exists() {
        return;
    }
    if let Err(err) = std::fs::remove_dir_all(&folder) {
        warn!(path = %folder.display(), %err, "cannot remove file metadata records");
    }
}
