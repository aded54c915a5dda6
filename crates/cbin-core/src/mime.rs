//! Content type sniffing for journal entries.
//!
//! Looks at the leading bytes of a file and recognises the formats that
//! commonly end up in server trash: archives, images, documents, binaries
//! and databases. Anything else is classified as UTF-8 text or opaque bytes.

use std::fs::{File, FileType};
use std::io::{self, Read};
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

const SNIFF_LENGTH: usize = 512;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"PK\x05\x06", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"BZh", "application/x-bzip2"),
    (b"\xfd7zXZ\x00", "application/x-xz"),
    (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (b"\x7fELF", "application/x-elf"),
    (b"ID3", "audio/mpeg"),
    (b"OggS", "audio/ogg"),
    (b"SQLite format 3\x00", "application/vnd.sqlite3"),
];

pub fn detect_file_type(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0; SNIFF_LENGTH];
    let bytes_read = file.read(&mut buffer)?;
    buffer.truncate(bytes_read);
    Ok(detect_bytes(&buffer).to_string())
}

/// Type recorded for anything that is neither a regular file nor a directory.
pub fn special_file_type(file_type: &FileType) -> &'static str {
    if file_type.is_symlink() {
        "inode/symlink"
    } else if file_type.is_fifo() {
        "inode/fifo"
    } else if file_type.is_socket() {
        "inode/socket"
    } else if file_type.is_char_device() {
        "inode/chardevice"
    } else if file_type.is_block_device() {
        "inode/blockdevice"
    } else {
        OCTET_STREAM
    }
}

pub fn detect_bytes(head: &[u8]) -> &'static str {
    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return *mime;
    }

    // RIFF container: the format tag lives at offset 8.
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        match &head[8..12] {
            b"WEBP" => return "image/webp",
            b"WAVE" => return "audio/wav",
            _ => {}
        }
    }

    if head.contains(&0) {
        return OCTET_STREAM;
    }

    match std::str::from_utf8(head) {
        Ok(_) => TEXT_PLAIN,
        // A multi-byte sequence may be cut at the sniff boundary.
        Err(e) if e.error_len().is_none() && head.len() == SNIFF_LENGTH => TEXT_PLAIN,
        Err(_) => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_magic_numbers() {
        assert_eq!(detect_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(detect_bytes(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(detect_bytes(b"\x1f\x8b\x08\x00"), "application/gzip");
        assert_eq!(detect_bytes(b"\x7fELF\x02\x01\x01"), "application/x-elf");
        assert_eq!(detect_bytes(b"RIFF\x24\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_text_and_binary_fallbacks() {
        assert_eq!(detect_bytes(b"server.port=8080\n"), TEXT_PLAIN);
        assert_eq!(detect_bytes("héllo wörld".as_bytes()), TEXT_PLAIN);
        assert_eq!(detect_bytes(b""), TEXT_PLAIN);
        assert_eq!(detect_bytes(b"\x00\x01\x02\x03"), OCTET_STREAM);
        assert_eq!(detect_bytes(b"\xc3\x28 invalid"), OCTET_STREAM);
    }

    #[test]
    fn test_special_file_types() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("/nonexistent", &link).unwrap();
        let link_type = std::fs::symlink_metadata(&link).unwrap().file_type();
        assert_eq!(special_file_type(&link_type), "inode/symlink");

        let null_type = std::fs::metadata("/dev/null").unwrap().file_type();
        assert_eq!(special_file_type(&null_type), "inode/chardevice");
    }

    #[test]
    fn test_truncated_utf8_at_boundary_is_text() {
        let mut head = vec![b'a'; SNIFF_LENGTH - 1];
        head.push(0xc3);
        assert_eq!(detect_bytes(&head), TEXT_PLAIN);
    }
}
