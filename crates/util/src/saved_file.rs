//! Contains tools for keeping [serde] types in JSON files (mainly by providing
//! the [SavedFile] API).

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use thiserror::Error;

/// Gives an object a nice API for saving to and reading from a JSON file. This
/// trait is blanket implemented for all types that meet the requirements.
pub trait SavedFile: Serialize + DeserializeOwned {
    /// Save to `file_path`, replacing whatever was there.
    fn save_to_path<P: AsRef<Path>>(&self, file_path: P) -> Result<(), SavedFileError> {
        let file_path = file_path.as_ref();
        crate::debug_log_info!("Writing saved file `{}`.", file_path.display());

        self.save_to_file(&File::create(file_path)?)
    }

    /// Write to an already open (and empty) `file`.
    fn save_to_file(&self, file: &File) -> Result<(), SavedFileError> {
        let mut writer = BufWriter::new(file);

        // We'll pretty print if we're in debug mode.
        if cfg!(debug_assertions) {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }

        writer.flush().map_err(Into::into)
    }

    /// Read from `file_path`.
    fn read_from_path<P: AsRef<Path>>(file_path: P) -> Result<Self, SavedFileError> {
        let file = File::open(file_path.as_ref())?;
        serde_json::from_reader(BufReader::new(file))
            .inspect_err(|e| crate::debug_log_warning!("Failed to deserialize file: {e}"))
            .map_err(Into::into)
    }

    /// Read from `file_path`, saving the result of `f` there first if the file
    /// does not exist yet. The returned [bool] is whether the file was created.
    fn read_from_path_or_create<P, F>(file_path: P, f: F) -> Result<(Self, bool), SavedFileError>
    where
        P: AsRef<Path>,
        F: FnOnce() -> Self,
    {
        let file_path = file_path.as_ref();

        let Some(file) = create_if_missing(file_path)? else {
            return Self::read_from_path(file_path).map(|data| (data, false));
        };

        let data = f();
        if let Err(e) = data.save_to_file(&file) {
            crate::debug_log_error!("Failed to save `{}`: {e}", file_path.display());
            drop(file);
            // An empty or partial file would fail every later read.
            if let Err(e) = fs::remove_file(file_path) {
                crate::debug_log_warning!("Failed to remove `{}`: {e}", file_path.display());
            }
            return Err(e);
        }

        Ok((data, true))
    }

    /// The same as [SavedFile::read_from_path_or_create], but
    /// [Default::default] is used in place of a provided callback function.
    fn read_from_path_or_default<P>(file_path: P) -> Result<(Self, bool), SavedFileError>
    where
        P: AsRef<Path>,
        Self: Default,
    {
        Self::read_from_path_or_create(file_path, Self::default)
    }
}

impl<T: Serialize + DeserializeOwned> SavedFile for T {}

/// Indicates that something went wrong trying to serialize or deserialize.
#[derive(Error, Debug)]
pub enum SavedFileError {
    #[error(transparent)]
    BadData(serde_json::Error),
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl From<serde_json::Error> for SavedFileError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            SavedFileError::IoError(e.into())
        } else {
            SavedFileError::BadData(e)
        }
    }
}

/// Atomically creates an empty file at `file_path` if nothing is there yet,
/// returning it if it was created.
fn create_if_missing(file_path: &Path) -> Result<Option<File>, io::Error> {
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(file_path)
    {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => {
            crate::debug_log_warning!("Failed to create `{}`: {e}", file_path.display());
            Err(e)
        }
    }
}
