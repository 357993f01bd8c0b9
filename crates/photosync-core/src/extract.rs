use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Reader, Tag, Value};

use crate::error::SyncError;
use crate::record::{FileAttributes, FileRecord};

/// Dates found inside a media file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedDates {
    pub capture: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
}

/// Decodes embedded metadata from a file on disk.
///
/// Any decoder returning the original capture time and the embedded
/// last-modified time can be plugged into the walker.
pub trait MetadataDecoder {
    fn decode(&self, path: &Path) -> Result<EmbeddedDates, SyncError>;
}

/// EXIF-backed decoder (JPEG, TIFF, HEIF, PNG, WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifDecoder;

impl MetadataDecoder for ExifDecoder {
    fn decode(&self, path: &Path) -> Result<EmbeddedDates, SyncError> {
        let file = File::open(path).map_err(|source| SyncError::FilesystemRead {
            path: path.to_path_buf(),
            source,
        })?;
        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .map_err(|e| SyncError::MetadataDecode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let capture = read_datetime(&exif, Tag::DateTimeOriginal);
        // If we have the capture time, always use it.
        let modified = if capture.is_none() {
            read_datetime(&exif, Tag::DateTime)
        } else {
            None
        };
        Ok(EmbeddedDates { capture, modified })
    }
}

fn read_datetime(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(ref parts) => parse_exif_datetime(parts.first()?),
        _ => None,
    }
}

/// `YYYY:MM:DD HH:MM:SS` with no zone; taken as local time. Blank or
/// out-of-range values yield `None`.
fn parse_exif_datetime(ascii: &[u8]) -> Option<NaiveDateTime> {
    let dt = exif::DateTime::from_ascii(ascii).ok()?;
    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?.and_hms_opt(
        dt.hour.into(),
        dt.minute.into(),
        dt.second.into(),
    )
}

/// Build the record for one file.
///
/// Hidden files are never decoded. Decode failures are logged and leave the
/// embedded dates absent so date resolution falls through to the creation time.
pub fn extract(decoder: &dyn MetadataDecoder, path: &Path, attrs: &FileAttributes) -> FileRecord {
    let mut record = FileRecord::bare(path, attrs);
    if record.hidden {
        return record;
    }

    match decoder.decode(path) {
        Ok(dates) => {
            record.capture = dates.capture;
            if record.capture.is_none() {
                log::debug!("DateTimeOriginal missing: {}", path.display());
                record.modified = dates.modified;
            }
        }
        Err(e) if looks_like_image(path) => log::warn!("{e}"),
        Err(e) => log::debug!("{e}"),
    }

    record
}

fn looks_like_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::tempdir;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn attrs(size: u64, hidden: bool) -> FileAttributes {
        FileAttributes {
            size,
            hidden,
            created: ts("2015-03-04 05:06:07"),
        }
    }

    struct FixedDecoder {
        result: Option<EmbeddedDates>,
        calls: Cell<u32>,
    }

    impl MetadataDecoder for FixedDecoder {
        fn decode(&self, path: &Path) -> Result<EmbeddedDates, SyncError> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone().ok_or_else(|| SyncError::MetadataDecode {
                path: path.to_path_buf(),
                reason: "not a media file".to_string(),
            })
        }
    }

    fn decoder(result: Option<EmbeddedDates>) -> FixedDecoder {
        FixedDecoder {
            result,
            calls: Cell::new(0),
        }
    }

    /// Big-endian TIFF with IFD0 DateTime and, optionally, Exif DateTimeOriginal.
    fn tiff_bytes(modified: &str, original: Option<&str>) -> Vec<u8> {
        fn entry(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32) {
            buf.extend_from_slice(&tag.to_be_bytes());
            buf.extend_from_slice(&typ.to_be_bytes());
            buf.extend_from_slice(&count.to_be_bytes());
            buf.extend_from_slice(&value.to_be_bytes());
        }
        fn ascii(s: &str) -> Vec<u8> {
            let mut v = s.as_bytes().to_vec();
            v.push(0);
            v
        }

        let mut buf = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
        let n: u16 = if original.is_some() { 2 } else { 1 };
        buf.extend_from_slice(&n.to_be_bytes());
        // IFD0 occupies 8 + 2 + 12n + 4 bytes
        let dt_offset = 8 + 2 + 12 * n as u32 + 4;
        let exif_ifd_offset = dt_offset + 20;
        entry(&mut buf, 0x0132, 2, 20, dt_offset);
        if original.is_some() {
            entry(&mut buf, 0x8769, 4, 1, exif_ifd_offset);
        }
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&ascii(modified));

        if let Some(original) = original {
            let dto_offset = exif_ifd_offset + 2 + 12 + 4;
            buf.extend_from_slice(&1u16.to_be_bytes());
            entry(&mut buf, 0x9003, 2, 20, dto_offset);
            buf.extend_from_slice(&0u32.to_be_bytes());
            buf.extend_from_slice(&ascii(original));
        }
        buf
    }

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(
            parse_exif_datetime(b"2021:06:01 10:00:00"),
            Some(ts("2021-06-01 10:00:00"))
        );
        assert_eq!(parse_exif_datetime(b"    :  :     :  :  "), None);
        assert_eq!(parse_exif_datetime(b"2021:13:01 10:00:00"), None);
        assert_eq!(parse_exif_datetime(b"2021:06:01"), None);
    }

    #[test]
    fn test_hidden_file_is_not_decoded() {
        let d = decoder(Some(EmbeddedDates {
            capture: Some(ts("2021-06-01 10:00:00")),
            modified: None,
        }));
        let record = extract(&d, Path::new("/src/.hidden.jpg"), &attrs(500, true));
        assert_eq!(d.calls.get(), 0);
        assert!(record.hidden);
        assert!(record.capture.is_none());
        assert!(record.modified.is_none());
    }

    #[test]
    fn test_capture_suppresses_modified() {
        let d = decoder(Some(EmbeddedDates {
            capture: Some(ts("2021-06-01 10:00:00")),
            modified: Some(ts("2022-01-01 00:00:00")),
        }));
        let record = extract(&d, Path::new("/src/IMG_0001.jpg"), &attrs(500, false));
        assert_eq!(record.capture, Some(ts("2021-06-01 10:00:00")));
        assert!(record.modified.is_none());
        assert_eq!(record.size, 500);
        assert_eq!(record.created, ts("2015-03-04 05:06:07"));
    }

    #[test]
    fn test_modified_kept_without_capture() {
        let d = decoder(Some(EmbeddedDates {
            capture: None,
            modified: Some(ts("2022-01-01 00:00:00")),
        }));
        let record = extract(&d, Path::new("/src/IMG_0002.jpg"), &attrs(500, false));
        assert!(record.capture.is_none());
        assert_eq!(record.modified, Some(ts("2022-01-01 00:00:00")));
    }

    #[test]
    fn test_decode_failure_is_absorbed() {
        let d = decoder(None);
        let record = extract(&d, Path::new("/src/notes.txt"), &attrs(10, false));
        assert_eq!(d.calls.get(), 1);
        assert!(record.capture.is_none());
        assert!(record.modified.is_none());
        assert_eq!(record.created, ts("2015-03-04 05:06:07"));
    }

    #[test]
    fn test_exif_decoder_reads_tiff() {
        let dir = tempdir().unwrap();

        let with_original = dir.path().join("a.tif");
        File::create(&with_original)
            .unwrap()
            .write_all(&tiff_bytes("2022:02:02 02:02:02", Some("2021:06:01 10:00:00")))
            .unwrap();
        let dates = ExifDecoder.decode(&with_original).unwrap();
        assert_eq!(dates.capture, Some(ts("2021-06-01 10:00:00")));
        assert!(dates.modified.is_none());

        let modified_only = dir.path().join("b.tif");
        File::create(&modified_only)
            .unwrap()
            .write_all(&tiff_bytes("2022:02:02 02:02:02", None))
            .unwrap();
        let dates = ExifDecoder.decode(&modified_only).unwrap();
        assert!(dates.capture.is_none());
        assert_eq!(dates.modified, Some(ts("2022-02-02 02:02:02")));
    }

    #[test]
    fn test_exif_decoder_rejects_non_media() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        File::create(&path).unwrap().write_all(b"hello world").unwrap();

        let err = ExifDecoder.decode(&path).unwrap_err();
        assert!(matches!(err, SyncError::MetadataDecode { .. }));
    }
}
