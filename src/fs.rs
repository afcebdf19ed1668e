use std::{
    fs::{File, create_dir, remove_file, rename},
    io::{ErrorKind, Write},
    path::Path,
};

use log::debug;
use rustix::fs::{Mode, chmod};

use crate::error::{Result, SwitchoverError};

pub fn mkdir_p<P: AsRef<Path>>(path: P, mode: Mode) -> Result<()> {
    let path = path.as_ref();
    for dir in descending_dirs(&path.to_string_lossy()) {
        match create_dir(&dir) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => (),
            Err(e) => return Err(SwitchoverError::io("create directory", dir, e)),
            Ok(_) => {
                debug!("Created directory: {}", &dir);
                chmod(dir.as_str(), mode)
                    .map_err(|e| SwitchoverError::io("change mode of", &dir, e.into()))?;
            }
        }
    }
    Ok(())
}

// Given a path, return a list of it and its parents in descending order.
// For example, "/a/b/c", returns the Vector ["/a", "/a/b", "/a/b/c"].
fn descending_dirs(path: &str) -> Vec<String> {
    let dirs = path.split("/").collect::<Vec<&str>>();
    (1..=dirs.len())
        .map(|i| dirs[..i].join("/"))
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn atomic_write<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let p = path.as_ref();
    let dir_name = match p.parent() {
        Some(d) if d.as_os_str().is_empty() => Path::new("."),
        Some(d) => d,
        None => Path::new("/"),
    };
    let file_name = p
        .file_name()
        .ok_or_else(|| SwitchoverError::io("write", p, ErrorKind::InvalidInput.into()))?;
    let file_name_tmp = dir_name.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = write_and_rename(&file_name_tmp, p, data);
    if written.is_err() {
        // Keep the original error.
        let _ = remove_file(&file_name_tmp);
    }
    written?;

    let dir = File::open(dir_name).map_err(|e| SwitchoverError::io("open directory", dir_name, e))?;
    dir.sync_all()
        .map_err(|e| SwitchoverError::io("sync directory", dir_name, e))
}

fn write_and_rename(tmp: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut f = File::create(tmp).map_err(|e| SwitchoverError::io("create", tmp, e))?;
    f.write_all(data)
        .map_err(|e| SwitchoverError::io("write", path, e))?;
    f.sync_all().map_err(|e| SwitchoverError::io("sync", path, e))?;
    rename(tmp, path).map_err(|e| SwitchoverError::io("rename temp file to", path, e))
}

/// Write a config file, creating its parent directories as needed.
pub fn write_config<P: AsRef<Path>>(path: P, data: &str) -> Result<()> {
    let p = path.as_ref();
    if let Some(parent) = p.parent()
        && !parent.as_os_str().is_empty()
    {
        mkdir_p(parent, Mode::from(0o755))?;
    }
    debug!("Writing {:?}", p);
    atomic_write(p, data.as_bytes())
}

// Same as rm -f.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let p = path.as_ref();
    match remove_file(p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SwitchoverError::io("remove", p, e)),
    }
}
