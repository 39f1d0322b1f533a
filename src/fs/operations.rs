use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{self, File},
    io::{self, AsyncReadExt, AsyncWriteExt},
};

/// Path of the scratch file used by [write_atomically]. It lives next to the target so that the
/// final rename never crosses file systems.
fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("state"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces the contents of `path` in a way that readers either see the old or the new
/// contents, never a half written file. Useful for state that is rewritten as a whole.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let scratch = scratch_path(path);
    {
        let mut file = File::create(&scratch).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
    }
    match fs::rename(&scratch, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&scratch).await;
            Err(e)
        }
    }
}

/// Reads the whole file, `None` if it doesn't exist.
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, io::Error> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer).await?;
    Ok(Some(buffer))
}
