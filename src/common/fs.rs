//! File system helpers
//!
//! Used to check certificate material before any socket is created.

use std::fs::File;
use std::io;
use std::path::Path;

/// Check that a path names a regular file this process can open for reading
///
/// # Returns
///
/// `Ok(())` if the file exists and can be opened, otherwise the I/O error
/// describing why not.
pub fn check_readable_file(path: &Path) -> io::Result<()> {
    let metadata = path.metadata()?;

    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a regular file: {}", path.display()),
        ));
    }

    File::open(path).map(|_| ())
}

/// Read file content
///
/// Returns the raw bytes of a file after checking it is readable.
pub fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    check_readable_file(path)?;

    std::fs::read(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_check_readable_file() {
        let path = PathBuf::from("Cargo.toml");
        assert!(check_readable_file(&path).is_ok(), "Cargo.toml should be readable");

        let path = PathBuf::from("non_existent_file.txt");
        let err = check_readable_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_directory_is_rejected() {
        let path = PathBuf::from("src");
        let err = check_readable_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_read_file() {
        let content = read_file(Path::new("Cargo.toml")).expect("Cargo.toml should be readable");
        assert!(!content.is_empty());

        assert!(read_file(Path::new("non_existent_file.txt")).is_err());
    }
}
