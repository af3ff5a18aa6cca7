//! TIFF and BigTIFF file headers and image file directories (IFDs).
//!
//! ## Classic TIFF header (8 bytes)
//! ```text
//! 0-1  byte order: "II" little-endian, "MM" big-endian
//! 2-3  version 42
//! 4-7  offset of the first IFD
//! ```
//!
//! ## BigTIFF header (16 bytes)
//! ```text
//! 0-1   byte order
//! 2-3   version 43
//! 4-5   offset size, always 8
//! 6-7   reserved
//! 8-15  offset of the first IFD
//! ```
//!
//! An IFD is an entry count, the entries sorted by tag, then the offset of
//! the next IFD (zero for the last). Entries are 12 bytes in classic TIFF
//! and 20 bytes in BigTIFF; values that fit the entry's value field are
//! stored inline.

use std::collections::BTreeMap;
use std::io::SeekFrom;

use super::tags::{FieldType, TiffTag};
use crate::error::{RasterError, Warning, WarningSink};
use crate::pack::Endian;
use crate::stream::{ByteReader, ByteWriter};

const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

/// Directories with more entries than this are treated as corrupt.
const MAX_ENTRIES: u64 = 4096;

// ── Header ──────────────────────────────────────────────────────────

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub endian: Endian,
    pub big_tiff: bool,
    pub first_ifd: u64,
}

impl TiffHeader {
    pub fn parse(data: &[u8]) -> Result<Self, RasterError> {
        let mut r = ByteReader::new(data);
        let endian = match r.read_bytes(2)? {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(RasterError::header(0, "byte order is neither II nor MM")),
        };
        match r.read_u16(endian)? {
            VERSION_TIFF => Ok(Self {
                endian,
                big_tiff: false,
                first_ifd: u64::from(r.read_u32(endian)?),
            }),
            VERSION_BIGTIFF => {
                let offset_size = r.read_u16(endian)?;
                if offset_size != 8 {
                    return Err(RasterError::header(
                        4,
                        format!("BigTIFF offset size {offset_size}"),
                    ));
                }
                r.read_u16(endian)?;
                Ok(Self {
                    endian,
                    big_tiff: true,
                    first_ifd: r.read_u64(endian)?,
                })
            }
            version => Err(RasterError::header(2, format!("TIFF version {version}"))),
        }
    }

    /// Write the header with a zero first-IFD offset. Returns the position
    /// of that offset for later patching.
    pub fn write(endian: Endian, big_tiff: bool, w: &mut ByteWriter) -> Result<u64, RasterError> {
        w.write_bytes(match endian {
            Endian::Little => b"II",
            Endian::Big => b"MM",
        })?;
        if big_tiff {
            w.write_u16(VERSION_BIGTIFF, endian)?;
            w.write_u16(8, endian)?;
            w.write_u16(0, endian)?;
            let at = w.tell();
            w.write_u64(0, endian)?;
            Ok(at)
        } else {
            w.write_u16(VERSION_TIFF, endian)?;
            let at = w.tell();
            w.write_u32(0, endian)?;
            Ok(at)
        }
    }

    #[inline]
    const fn entry_size(&self) -> u64 {
        if self.big_tiff { 20 } else { 12 }
    }
}

// ── Reading ─────────────────────────────────────────────────────────

/// One IFD entry with its value bytes resolved.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u64,
    bytes: &'a [u8],
    endian: Endian,
}

impl Entry<'_> {
    /// Integer values. Signed types are reinterpreted; rationals and floats
    /// are rejected.
    pub fn uints(&self) -> Result<Vec<u64>, RasterError> {
        let size = self.field_type.size_in_bytes();
        let mut out = Vec::new();
        out.try_reserve_exact(self.count as usize)?;
        for chunk in self.bytes.chunks_exact(size) {
            let mut r = ByteReader::new(chunk);
            let v = match self.field_type {
                FieldType::Byte | FieldType::SByte | FieldType::Undefined | FieldType::Ascii => {
                    u64::from(chunk[0])
                }
                FieldType::Short | FieldType::SShort => u64::from(r.read_u16(self.endian)?),
                FieldType::Long | FieldType::SLong => u64::from(r.read_u32(self.endian)?),
                FieldType::Long8 | FieldType::SLong8 | FieldType::Ifd8 => r.read_u64(self.endian)?,
                _ => {
                    return Err(RasterError::header(
                        0,
                        format!("tag {} has non-integer type {:?}", self.tag, self.field_type),
                    ));
                }
            };
            out.push(v);
        }
        Ok(out)
    }

    pub fn uint(&self) -> Result<u64, RasterError> {
        self.uints()?
            .first()
            .copied()
            .ok_or_else(|| RasterError::header(0, format!("tag {} has no value", self.tag)))
    }

    /// Numeric values as floats, for rational, float and integer types.
    pub fn floats(&self) -> Result<Vec<f64>, RasterError> {
        let size = self.field_type.size_in_bytes();
        let mut out = Vec::new();
        for chunk in self.bytes.chunks_exact(size) {
            let mut r = ByteReader::new(chunk);
            let v = match self.field_type {
                FieldType::Rational => {
                    let n = r.read_u32(self.endian)?;
                    let d = r.read_u32(self.endian)?;
                    if d == 0 { 0.0 } else { f64::from(n) / f64::from(d) }
                }
                FieldType::SRational => {
                    let n = r.read_u32(self.endian)? as i32;
                    let d = r.read_u32(self.endian)? as i32;
                    if d == 0 { 0.0 } else { f64::from(n) / f64::from(d) }
                }
                FieldType::Float => f64::from(f32::from_bits(r.read_u32(self.endian)?)),
                FieldType::Double => f64::from_bits(r.read_u64(self.endian)?),
                _ => return Ok(self.uints()?.into_iter().map(|v| v as f64).collect()),
            };
            out.push(v);
        }
        Ok(out)
    }

    /// ASCII value up to the first NUL.
    pub fn ascii(&self) -> String {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

/// A parsed IFD.
#[derive(Debug, Clone)]
pub struct Directory<'a> {
    pub offset: u64,
    pub next: u64,
    entries: Vec<Entry<'a>>,
}

impl<'a> Directory<'a> {
    /// Parse the IFD at `offset`. Entries with unknown field types or
    /// unknown tags are reported to `sink` and skipped.
    pub fn read(
        data: &'a [u8],
        header: &TiffHeader,
        offset: u64,
        sink: &mut dyn WarningSink,
    ) -> Result<Self, RasterError> {
        let endian = header.endian;
        let mut r = ByteReader::new(data);
        r.seek(SeekFrom::Start(offset))
            .map_err(|_| RasterError::header(offset, "IFD offset beyond end of file"))?;
        let count = if header.big_tiff {
            r.read_u64(endian)?
        } else {
            u64::from(r.read_u16(endian)?)
        };
        if count > MAX_ENTRIES {
            return Err(RasterError::header(offset, format!("IFD with {count} entries")));
        }
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let start = r.tell();
            let tag = r.read_u16(endian)?;
            let raw_type = r.read_u16(endian)?;
            let n = if header.big_tiff {
                r.read_u64(endian)?
            } else {
                u64::from(r.read_u32(endian)?)
            };
            let value_field = r.read_bytes(if header.big_tiff { 8 } else { 4 })?;
            let Some(field_type) = FieldType::from_u16(raw_type) else {
                sink.warn(Warning::IgnoredField(format!("tag {tag} with field type {raw_type}")));
                continue;
            };
            if TiffTag::from_u16(tag).is_none() {
                sink.warn(Warning::UnknownTag { tag });
                continue;
            }
            let len = (field_type.size_in_bytes() as u64)
                .checked_mul(n)
                .ok_or_else(|| RasterError::header(start, format!("tag {tag} count {n}")))?;
            let bytes = if field_type.fits_inline(n, header.big_tiff) {
                &value_field[..len as usize]
            } else {
                let mut vr = ByteReader::new(value_field);
                let at = if header.big_tiff {
                    vr.read_u64(endian)?
                } else {
                    u64::from(vr.read_u32(endian)?)
                };
                r.slice_at(at, len)?
            };
            entries.push(Entry {
                tag,
                field_type,
                count: n,
                bytes,
                endian,
            });
        }
        let next = if header.big_tiff {
            r.read_u64(endian)?
        } else {
            u64::from(r.read_u32(endian)?)
        };
        debug_assert!(r.tell() >= offset + count * header.entry_size());
        Ok(Self {
            offset,
            next,
            entries,
        })
    }

    pub fn get(&self, tag: TiffTag) -> Option<&Entry<'a>> {
        self.entries.iter().find(|e| e.tag == tag.as_u16())
    }

    pub fn uint(&self, tag: TiffTag) -> Result<Option<u64>, RasterError> {
        self.get(tag).map(Entry::uint).transpose()
    }

    pub fn uints(&self, tag: TiffTag) -> Result<Option<Vec<u64>>, RasterError> {
        self.get(tag).map(Entry::uints).transpose()
    }

    pub fn float(&self, tag: TiffTag) -> Result<Option<f64>, RasterError> {
        Ok(self
            .get(tag)
            .map(Entry::floats)
            .transpose()?
            .and_then(|v| v.first().copied()))
    }

    pub fn ascii(&self, tag: TiffTag) -> Option<String> {
        self.get(tag).map(Entry::ascii)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Writing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingEntry {
    field_type: FieldType,
    count: u64,
    bytes: Vec<u8>,
}

/// Collects entries for one IFD and writes them sorted by tag.
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    endian: Endian,
    big_tiff: bool,
    entries: BTreeMap<u16, PendingEntry>,
}

impl DirectoryBuilder {
    pub fn new(endian: Endian, big_tiff: bool) -> Self {
        Self {
            endian,
            big_tiff,
            entries: BTreeMap::new(),
        }
    }

    fn put(&mut self, tag: TiffTag, field_type: FieldType, count: u64, bytes: Vec<u8>) {
        self.entries.insert(
            tag.as_u16(),
            PendingEntry {
                field_type,
                count,
                bytes,
            },
        );
    }

    fn encode<const N: usize>(&self, values: impl IntoIterator<Item = [u8; N]>) -> Vec<u8> {
        values.into_iter().flatten().collect()
    }

    pub fn shorts(&mut self, tag: TiffTag, values: &[u16]) {
        let e = self.endian;
        let bytes = self.encode(values.iter().map(|&v| match e {
            Endian::Big => v.to_be_bytes(),
            Endian::Little => v.to_le_bytes(),
        }));
        self.put(tag, FieldType::Short, values.len() as u64, bytes);
    }

    pub fn short(&mut self, tag: TiffTag, value: u16) {
        self.shorts(tag, &[value]);
    }

    pub fn long(&mut self, tag: TiffTag, value: u32) {
        let bytes = match self.endian {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.put(tag, FieldType::Long, 1, bytes.to_vec());
    }

    /// Strip or tile offsets and byte counts: LONG in classic TIFF, LONG8
    /// in BigTIFF.
    pub fn offsets(&mut self, tag: TiffTag, values: &[u64]) -> Result<(), RasterError> {
        let e = self.endian;
        if self.big_tiff {
            let bytes = self.encode(values.iter().map(|&v| match e {
                Endian::Big => v.to_be_bytes(),
                Endian::Little => v.to_le_bytes(),
            }));
            self.put(tag, FieldType::Long8, values.len() as u64, bytes);
        } else {
            let mut narrow = Vec::with_capacity(values.len());
            for &v in values {
                narrow.push(u32::try_from(v).map_err(|_| {
                    RasterError::ResourceExhausted("file exceeds 4 GiB; use BigTIFF".into())
                })?);
            }
            let bytes = self.encode(narrow.iter().map(|&v| match e {
                Endian::Big => v.to_be_bytes(),
                Endian::Little => v.to_le_bytes(),
            }));
            self.put(tag, FieldType::Long, values.len() as u64, bytes);
        }
        Ok(())
    }

    /// Unsigned rational with a fixed 10000 denominator.
    pub fn rational(&mut self, tag: TiffTag, value: f64) {
        let den = 10_000u32;
        let num = (value.max(0.0) * f64::from(den)).round().min(f64::from(u32::MAX)) as u32;
        let mut bytes = Vec::with_capacity(8);
        for v in [num, den] {
            bytes.extend_from_slice(&match self.endian {
                Endian::Big => v.to_be_bytes(),
                Endian::Little => v.to_le_bytes(),
            });
        }
        self.put(tag, FieldType::Rational, 1, bytes);
    }

    pub fn ascii(&mut self, tag: TiffTag, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        let count = bytes.len() as u64;
        self.put(tag, FieldType::Ascii, count, bytes);
    }

    pub fn contains(&self, tag: TiffTag) -> bool {
        self.entries.contains_key(&tag.as_u16())
    }

    /// Write the IFD at the writer's end, word aligned, with out-of-line
    /// values following it. Returns `(ifd_offset, next_pointer_position)`.
    pub fn write(&self, w: &mut ByteWriter) -> Result<(u64, u64), RasterError> {
        let e = self.endian;
        w.seek(SeekFrom::End(0))?;
        w.align_word()?;
        let ifd = w.tell();
        let (count_size, entry_size, field_size) = if self.big_tiff { (8, 20, 8) } else { (2, 12, 4) };
        let dir_len = count_size + entry_size * self.entries.len() as u64 + field_size;
        let mut data_at = ifd + dir_len;

        let mut table = ByteWriter::new();
        let mut values = ByteWriter::new();
        if self.big_tiff {
            table.write_u64(self.entries.len() as u64, e)?;
        } else {
            table.write_u16(self.entries.len() as u16, e)?;
        }
        for (&tag, entry) in &self.entries {
            table.write_u16(tag, e)?;
            table.write_u16(entry.field_type as u16, e)?;
            if self.big_tiff {
                table.write_u64(entry.count, e)?;
            } else {
                table.write_u32(entry.count as u32, e)?;
            }
            if entry.field_type.fits_inline(entry.count, self.big_tiff) {
                let mut field = vec![0u8; field_size as usize];
                field[..entry.bytes.len()].copy_from_slice(&entry.bytes);
                table.write_bytes(&field)?;
            } else {
                if self.big_tiff {
                    table.write_u64(data_at, e)?;
                } else {
                    let at = u32::try_from(data_at).map_err(|_| {
                        RasterError::ResourceExhausted("file exceeds 4 GiB; use BigTIFF".into())
                    })?;
                    table.write_u32(at, e)?;
                }
                values.write_bytes(&entry.bytes)?;
                values.align_word()?;
                data_at = ifd + dir_len + values.tell();
            }
        }
        let next_at = ifd + table.tell();
        if self.big_tiff {
            table.write_u64(0, e)?;
        } else {
            table.write_u32(0, e)?;
        }
        w.write_bytes(&table.into_inner())?;
        w.write_bytes(&values.into_inner())?;
        Ok((ifd, next_at))
    }
}

/// Overwrite an IFD pointer at `at` with `target`.
pub fn patch_pointer(
    w: &mut ByteWriter,
    at: u64,
    target: u64,
    endian: Endian,
    big_tiff: bool,
) -> Result<(), RasterError> {
    w.seek(SeekFrom::Start(at))?;
    if big_tiff {
        w.write_u64(target, endian)?;
    } else {
        let target = u32::try_from(target)
            .map_err(|_| RasterError::ResourceExhausted("file exceeds 4 GiB; use BigTIFF".into()))?;
        w.write_u32(target, endian)?;
    }
    w.seek(SeekFrom::End(0))?;
    Ok(())
}
