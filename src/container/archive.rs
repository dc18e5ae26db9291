//! Tar archives for the runtime's upload API.
//!
//! The daemon only accepts file uploads as tar streams extracted below a
//! target directory, so single files are wrapped in a one-entry archive.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// Permission bits of uploaded files.
pub const FILE_MODE: u32 = 0o644;

/// Build a tar archive containing `content` at `relative_path`.
///
/// # Errors
///
/// Returns an error if the path cannot be encoded in a tar header.
pub fn single_file(relative_path: &str, content: &[u8]) -> io::Result<Vec<u8>> {
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(FILE_MODE);
    header.set_mtime(mtime);
    header.set_entry_type(tar::EntryType::Regular);

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, relative_path, content)?;
    builder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_single_file_archive_contains_entry() {
        let archive = single_file("src/app.py", b"print('hi')\n").unwrap();

        let mut reader = tar::Archive::new(archive.as_slice());
        let mut entries = reader.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();

        assert_eq!(entry.path().unwrap().to_str(), Some("src/app.py"));
        assert_eq!(entry.header().mode().unwrap(), FILE_MODE);

        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "print('hi')\n");

        assert!(entries.next().is_none());
    }

    #[test]
    fn test_empty_file_archive() {
        let archive = single_file("empty.txt", b"").unwrap();
        let mut reader = tar::Archive::new(archive.as_slice());
        let entry = reader.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().size().unwrap(), 0);
    }
}
