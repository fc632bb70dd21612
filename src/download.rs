use std::{
    fs::{create_dir_all, remove_file, rename, File},
    io::Write,
    path::{Path, PathBuf},
};

use burn::data::network::downloader;

/// Download the pre-trained weights to the local cache directory.
pub(crate) fn download(module: &'static str, url: &str) -> Result<PathBuf, std::io::Error> {
    // Model cache directory
    let model_dir = dirs::home_dir()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine the home directory.",
            )
        })?
        .join(".cache")
        .join(format!("{}-burn", module));

    if !model_dir.exists() {
        create_dir_all(&model_dir)?;
    }

    let file_base_name = file_name_from_url(url).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Weights URL has no file name: {url}"),
        )
    })?;
    let file_name = model_dir.join(file_base_name);
    if file_name.exists() {
        tracing::debug!(path = %file_name.display(), "using cached weights");
        return Ok(file_name);
    }

    tracing::info!(url, path = %file_name.display(), "downloading weights");
    let bytes = downloader::download_file_as_bytes(url, file_base_name);
    persist(&file_name, &bytes)?;

    Ok(file_name)
}

/// Writes `bytes` next to `file_name` and renames it into place, so an interrupted
/// write never leaves a truncated file at the cached path.
fn persist(file_name: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut partial = file_name.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = File::create(&partial)
        .and_then(|mut file| file.write_all(bytes).and_then(|_| file.sync_all()))
        .and_then(|_| rename(&partial, file_name));

    if let Err(err) = written {
        let _ = remove_file(&partial);
        return Err(err);
    }
    Ok(())
}

fn file_name_from_url(url: &str) -> Option<&str> {
    url.rsplit_once('/')
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
}
