// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The array container: the one file format every dense warp and feature
//! array is stored in.
//!
//! The header is 16 bytes of fixed-size fields, parsed in one read before
//! anything else. The footer is 8 bytes: a CRC32 checksum over everything
//! before it, plus a magic number ("BAFC", the header magic reversed). The
//! checksum is NOT verified at open time: the whole point of the container
//! is that a valid store supports lazy paging, and checksumming would fault
//! in every page. `check_integrity` does the full pass on demand.
//!
//! # Wire Format
//!
//! ```text
//! magic:    [u8; 4] = "CFAB"
//! version:  u8 = 1
//! kind:     u8 (0 = i32, 1 = u32)
//! reserved: [u8; 2]
//! count:    u64 LE
//! payload:  count * 4 bytes, little-endian fixed width
//! footer:   crc32 u32 LE + magic "BAFC" reversed ("BAFC" -> "BAFC"[::-1])
//! ```

use std::fs::File;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32Hasher;
use memmap2::Mmap;

use crate::error::{FabricError, Result};

/// Magic bytes: "CFAB" in ASCII (header)
pub const MAGIC: [u8; 4] = [0x43, 0x46, 0x41, 0x42];

/// Footer magic: "BAFC" (reversed, marks valid file end)
pub const FOOTER_MAGIC: [u8; 4] = [0x42, 0x41, 0x46, 0x43];

/// Current container version
pub const VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Footer size in bytes: 4 bytes CRC32 + 4 bytes magic
pub const FOOTER_SIZE: usize = 8;

/// Element kind stored in an array container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemKind {
    I32,
    U32,
}

impl ElemKind {
    fn code(self) -> u8 {
        match self {
            ElemKind::I32 => 0,
            ElemKind::U32 => 1,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ElemKind::I32),
            1 => Some(ElemKind::U32),
            _ => None,
        }
    }
}

// ============================================================================
// REGION: mapped or owned bytes
// ============================================================================

/// Read-only byte region: either an OS mapping or an owned copy.
///
/// The owned variant backs the embedding preload; everything else stays
/// mapped so the OS can share pages across processes.
pub enum Region {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Region {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Region::Mapped(m) => m,
            Region::Owned(v) => v,
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Mapped(m) => write!(f, "Region::Mapped({} bytes)", m.len()),
            Region::Owned(v) => write!(f, "Region::Owned({} bytes)", v.len()),
        }
    }
}

/// Map a file read-only, or read it fully when `preload` is set.
pub fn open_region(path: &Path, preload: bool) -> Result<Region> {
    if preload {
        let bytes = std::fs::read(path).map_err(|e| FabricError::io(path, e))?;
        return Ok(Region::Owned(bytes));
    }
    let file = File::open(path).map_err(|e| FabricError::io(path, e))?;
    // SAFETY: the store is append-only and versioned; files are never
    // mutated after the compiler publishes them, so the mapping stays valid.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| FabricError::io(path, e))?;
    Ok(Region::Mapped(mmap))
}

// ============================================================================
// INT ARRAY
// ============================================================================

/// A dense fixed-width integer array backed by a byte region.
///
/// Every accessor is bounds-safe: out-of-range indices yield `None` rather
/// than panicking, because subset corpora legitimately reference nodes
/// outside a feature's stored range.
#[derive(Debug)]
pub struct IntArray {
    region: Region,
    kind: ElemKind,
    count: usize,
    path: PathBuf,
}

impl IntArray {
    /// Open an array container, validating header and footer structure
    /// (magic, version, kind, size consistency) but not the checksum.
    pub fn open(path: &Path, expect: ElemKind, preload: bool) -> Result<IntArray> {
        let region = open_region(path, preload)?;
        let bytes: &[u8] = &region;

        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(FabricError::corrupt(path, "file too small for container"));
        }
        if bytes[0..4] != MAGIC {
            return Err(FabricError::corrupt(path, "bad magic (expected CFAB)"));
        }
        if bytes[4] != VERSION {
            return Err(FabricError::VersionMismatch {
                path: path.to_path_buf(),
                found: u32::from(bytes[4]),
                supported: u32::from(VERSION),
            });
        }
        let kind = ElemKind::from_code(bytes[5])
            .ok_or_else(|| FabricError::corrupt(path, format!("bad element kind {}", bytes[5])))?;
        if kind != expect {
            return Err(FabricError::corrupt(
                path,
                format!("element kind {:?} where {:?} was declared", kind, expect),
            ));
        }

        let count = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
        let expected_len = HEADER_SIZE + count * 4 + FOOTER_SIZE;
        if bytes.len() != expected_len {
            return Err(FabricError::corrupt(
                path,
                format!(
                    "size mismatch: {} bytes for {} elements (expected {})",
                    bytes.len(),
                    count,
                    expected_len
                ),
            ));
        }
        if bytes[bytes.len() - 4..] != FOOTER_MAGIC {
            return Err(FabricError::corrupt(path, "bad footer magic (truncated?)"));
        }

        Ok(IntArray {
            region,
            kind,
            count,
            path: path.to_path_buf(),
        })
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn kind(&self) -> ElemKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn cell(&self, index: usize) -> Option<[u8; 4]> {
        if index >= self.count {
            return None;
        }
        let at = HEADER_SIZE + index * 4;
        Some(self.region[at..at + 4].try_into().unwrap())
    }

    /// Element at `index` as a signed value. `None` when out of range.
    #[inline]
    pub fn get_i32(&self, index: usize) -> Option<i32> {
        self.cell(index).map(i32::from_le_bytes)
    }

    /// Element at `index` as an unsigned value. `None` when out of range.
    #[inline]
    pub fn get_u32(&self, index: usize) -> Option<u32> {
        self.cell(index).map(u32::from_le_bytes)
    }

    /// Iterate all elements as unsigned values.
    pub fn iter_u32(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.count).map(move |i| self.get_u32(i).unwrap_or(0))
    }

    /// Iterate all elements as signed values.
    pub fn iter_i32(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.count).map(move |i| self.get_i32(i).unwrap_or(0))
    }

    /// Full checksum pass. Faults in every page; call it from integrity
    /// checks, not from the query path.
    pub fn check_integrity(&self) -> Result<()> {
        verify_crc(&self.region, &self.path)
    }
}

/// Verify the CRC32 footer of a container file's bytes.
pub fn verify_crc(bytes: &[u8], path: &Path) -> Result<()> {
    if bytes.len() < FOOTER_SIZE {
        return Err(FabricError::corrupt(path, "file too small for footer"));
    }
    let content = &bytes[..bytes.len() - FOOTER_SIZE];
    let footer = &bytes[bytes.len() - FOOTER_SIZE..];
    let stored = u32::from_le_bytes(footer[0..4].try_into().unwrap());
    let computed = compute_crc32(content);
    if stored != computed {
        return Err(FabricError::corrupt(
            path,
            format!("checksum mismatch: stored {:08x}, computed {:08x}", stored, computed),
        ));
    }
    Ok(())
}

/// Compute CRC32 over the given bytes.
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

// ============================================================================
// WRITERS
// ============================================================================

fn write_container(path: &Path, kind: ElemKind, cells: impl ExactSizeIterator<Item = [u8; 4]>) -> Result<()> {
    let count = cells.len();
    let mut buf = Vec::with_capacity(HEADER_SIZE + count * 4 + FOOTER_SIZE);
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(kind.code());
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&(count as u64).to_le_bytes());
    for cell in cells {
        buf.extend_from_slice(&cell);
    }
    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&FOOTER_MAGIC);

    let mut file = File::create(path).map_err(|e| FabricError::io(path, e))?;
    file.write_all(&buf).map_err(|e| FabricError::io(path, e))?;
    Ok(())
}

/// Write a u32 array container.
pub fn write_u32_array(path: &Path, values: &[u32]) -> Result<()> {
    write_container(path, ElemKind::U32, values.iter().map(|v| v.to_le_bytes()))
}

/// Write an i32 array container.
pub fn write_i32_array(path: &Path, values: &[i32]) -> Result<()> {
    write_container(path, ElemKind::I32, values.iter().map(|v| v.to_le_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("fabric-bytes-tests");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn u32_roundtrip() {
        let path = tmp("u32.bin");
        write_u32_array(&path, &[1, 2, 3, u32::MAX]).unwrap();
        let arr = IntArray::open(&path, ElemKind::U32, false).unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get_u32(0), Some(1));
        assert_eq!(arr.get_u32(3), Some(u32::MAX));
        assert_eq!(arr.get_u32(4), None);
        arr.check_integrity().unwrap();
    }

    #[test]
    fn i32_sentinel_survives() {
        let path = tmp("i32.bin");
        write_i32_array(&path, &[i32::MIN, -1, 0, 7]).unwrap();
        let arr = IntArray::open(&path, ElemKind::I32, true).unwrap();
        assert_eq!(arr.get_i32(0), Some(i32::MIN));
        assert_eq!(arr.get_i32(1), Some(-1));
    }

    #[test]
    fn kind_mismatch_rejected() {
        let path = tmp("kind.bin");
        write_u32_array(&path, &[1]).unwrap();
        assert!(IntArray::open(&path, ElemKind::I32, false).is_err());
    }

    #[test]
    fn corruption_detected_by_integrity_check() {
        let path = tmp("corrupt.bin");
        write_u32_array(&path, &[10, 20, 30]).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        // Structure is still coherent, so open succeeds...
        let arr = IntArray::open(&path, ElemKind::U32, false).unwrap();
        // ...but the checksum pass reports the flip.
        assert!(arr.check_integrity().is_err());
    }

    #[test]
    fn truncated_file_rejected_at_open() {
        let path = tmp("trunc.bin");
        write_u32_array(&path, &[10, 20, 30]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(IntArray::open(&path, ElemKind::U32, false).is_err());
    }
}
