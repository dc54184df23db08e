// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The CSR container: offsets plus contiguous values, the arena encoding
//! for every one-to-many relation in the store (slot lists, embedding
//! indices, edge features).
//!
//! Keeping these as indices into a contiguous pool is load-bearing. The
//! embedding relations are graphs with heavy sharing; materializing them as
//! pointer structures would cost an order of magnitude in memory and lose
//! the OS page sharing across processes.
//!
//! # Wire Format
//!
//! ```text
//! magic:       [u8; 4] = "CFSR"
//! version:     u8 = 1
//! kind:        u8 (0 = plain, 1 = with parallel i32 value array)
//! reserved:    [u8; 2]
//! row_count:   u64 LE                 (K)
//! value_count: u64 LE                 (V)
//! offsets:     (K+1) * u32 LE          monotonic, offsets[0] = 0, offsets[K] = V
//! values:      V * u32 LE
//! aux:         V * i32 LE              (kind = 1 only)
//! footer:      crc32 u32 LE + magic "RSFC"
//! ```
//!
//! Offsets are validated at open (monotonicity, final bound): a CSR whose
//! offsets walk off the end of its value pool is corruption, and the loader
//! contract is to fail loudly before anyone traverses it.

use std::path::{Path, PathBuf};

use crate::error::{FabricError, Result};
use crate::store::bytes::{compute_crc32, open_region, verify_crc, Region, FOOTER_SIZE};

/// Magic bytes: "CFSR" in ASCII (header)
pub const MAGIC: [u8; 4] = [0x43, 0x46, 0x53, 0x52];

/// Footer magic: "RSFC" (reversed, marks valid file end)
pub const FOOTER_MAGIC: [u8; 4] = [0x52, 0x53, 0x46, 0x43];

/// Current container version
pub const VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 24;

// ============================================================================
// VIEW
// ============================================================================

/// Read-only view over a CSR container.
#[derive(Debug)]
pub struct CsrView {
    region: Region,
    path: PathBuf,
    row_count: usize,
    value_count: usize,
    has_aux: bool,
}

impl CsrView {
    /// Open and structurally validate a CSR container.
    pub fn open(path: &Path, preload: bool) -> Result<CsrView> {
        let region = open_region(path, preload)?;
        let bytes: &[u8] = &region;

        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(FabricError::corrupt(path, "file too small for CSR container"));
        }
        if bytes[0..4] != MAGIC {
            return Err(FabricError::corrupt(path, "bad magic (expected CFSR)"));
        }
        if bytes[4] != VERSION {
            return Err(FabricError::VersionMismatch {
                path: path.to_path_buf(),
                found: u32::from(bytes[4]),
                supported: u32::from(VERSION),
            });
        }
        let has_aux = match bytes[5] {
            0 => false,
            1 => true,
            k => {
                return Err(FabricError::corrupt(path, format!("bad CSR kind {}", k)));
            }
        };

        let row_count = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
        let value_count = u64::from_le_bytes(bytes[16..24].try_into().unwrap()) as usize;

        let aux_len = if has_aux { value_count * 4 } else { 0 };
        let expected_len =
            HEADER_SIZE + (row_count + 1) * 4 + value_count * 4 + aux_len + FOOTER_SIZE;
        if bytes.len() != expected_len {
            return Err(FabricError::corrupt(
                path,
                format!(
                    "size mismatch: {} bytes for {} rows / {} values (expected {})",
                    bytes.len(),
                    row_count,
                    value_count,
                    expected_len
                ),
            ));
        }
        if bytes[bytes.len() - 4..] != FOOTER_MAGIC {
            return Err(FabricError::corrupt(path, "bad footer magic (truncated?)"));
        }

        let view = CsrView {
            region,
            path: path.to_path_buf(),
            row_count,
            value_count,
            has_aux,
        };

        // Monotonic offsets that end exactly at the value pool bound.
        let mut prev = view.offset_at(0);
        if prev != 0 {
            return Err(FabricError::corrupt(path, "offsets[0] != 0"));
        }
        for i in 1..=row_count {
            let cur = view.offset_at(i);
            if cur < prev {
                return Err(FabricError::corrupt(
                    path,
                    format!("offsets not monotonic at row {}", i),
                ));
            }
            prev = cur;
        }
        if prev as usize != value_count {
            return Err(FabricError::ArrayOutOfRange {
                path: path.to_path_buf(),
                index: u64::from(prev),
                bound: value_count as u64,
            });
        }

        Ok(view)
    }

    /// Number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Total number of values across all rows.
    #[inline]
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Whether a parallel i32 value array is present.
    pub fn has_aux(&self) -> bool {
        self.has_aux
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn offset_at(&self, i: usize) -> u32 {
        let at = HEADER_SIZE + i * 4;
        u32::from_le_bytes(self.region[at..at + 4].try_into().unwrap())
    }

    #[inline]
    fn value_at(&self, i: usize) -> u32 {
        let at = HEADER_SIZE + (self.row_count + 1) * 4 + i * 4;
        u32::from_le_bytes(self.region[at..at + 4].try_into().unwrap())
    }

    #[inline]
    fn aux_at(&self, i: usize) -> i32 {
        let at = HEADER_SIZE + (self.row_count + 1) * 4 + (self.value_count + i) * 4;
        i32::from_le_bytes(self.region[at..at + 4].try_into().unwrap())
    }

    /// Length of row `row`; 0 for out-of-range rows.
    #[inline]
    pub fn row_len(&self, row: usize) -> usize {
        if row >= self.row_count {
            return 0;
        }
        (self.offset_at(row + 1) - self.offset_at(row)) as usize
    }

    /// Iterate the values of row `row`. Empty for out-of-range rows.
    pub fn row(&self, row: usize) -> impl Iterator<Item = u32> + '_ {
        let (start, end) = if row >= self.row_count {
            (0, 0)
        } else {
            (self.offset_at(row) as usize, self.offset_at(row + 1) as usize)
        };
        (start..end).map(move |i| self.value_at(i))
    }

    /// Row values collected into a vector.
    pub fn row_vec(&self, row: usize) -> Vec<u32> {
        self.row(row).collect()
    }

    /// Iterate `(value, aux)` pairs of row `row`. Aux is 0 when absent.
    pub fn row_with_aux(&self, row: usize) -> impl Iterator<Item = (u32, i32)> + '_ {
        let (start, end) = if row >= self.row_count {
            (0, 0)
        } else {
            (self.offset_at(row) as usize, self.offset_at(row + 1) as usize)
        };
        (start..end).map(move |i| {
            let aux = if self.has_aux { self.aux_at(i) } else { 0 };
            (self.value_at(i), aux)
        })
    }

    /// Binary search for `value` in row `row` (rows with sorted values only).
    pub fn row_contains_sorted(&self, row: usize, value: u32) -> bool {
        if row >= self.row_count {
            return false;
        }
        let mut lo = self.offset_at(row) as usize;
        let mut hi = self.offset_at(row + 1) as usize;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let v = self.value_at(mid);
            if v == value {
                return true;
            } else if v < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        false
    }

    /// Full checksum pass over the file.
    pub fn check_integrity(&self) -> Result<()> {
        verify_crc(&self.region, &self.path)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Accumulates rows and writes a CSR container.
#[derive(Debug, Default)]
pub struct CsrBuilder {
    offsets: Vec<u32>,
    values: Vec<u32>,
    aux: Option<Vec<i32>>,
}

impl CsrBuilder {
    pub fn new() -> Self {
        CsrBuilder {
            offsets: vec![0],
            values: Vec::new(),
            aux: None,
        }
    }

    /// Builder for a CSR with a parallel i32 value array.
    pub fn with_aux() -> Self {
        CsrBuilder {
            offsets: vec![0],
            values: Vec::new(),
            aux: Some(Vec::new()),
        }
    }

    /// Append one row of plain values.
    pub fn push_row<I: IntoIterator<Item = u32>>(&mut self, row: I) {
        self.values.extend(row);
        self.offsets.push(self.values.len() as u32);
        if let Some(aux) = &mut self.aux {
            aux.resize(self.values.len(), 0);
        }
    }

    /// Append one row of `(value, aux)` pairs.
    pub fn push_row_with_aux<I: IntoIterator<Item = (u32, i32)>>(&mut self, row: I) {
        let aux = self.aux.get_or_insert_with(Vec::new);
        for (v, a) in row {
            self.values.push(v);
            aux.push(a);
        }
        self.offsets.push(self.values.len() as u32);
    }

    pub fn row_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Write the container to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let row_count = self.offsets.len() - 1;
        let value_count = self.values.len();
        let has_aux = self.aux.is_some();
        let aux_len = if has_aux { value_count * 4 } else { 0 };

        let mut buf =
            Vec::with_capacity(HEADER_SIZE + (row_count + 1) * 4 + value_count * 4 + aux_len + FOOTER_SIZE);
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(u8::from(has_aux));
        buf.extend_from_slice(&[0u8; 2]);
        buf.extend_from_slice(&(row_count as u64).to_le_bytes());
        buf.extend_from_slice(&(value_count as u64).to_le_bytes());
        for off in &self.offsets {
            buf.extend_from_slice(&off.to_le_bytes());
        }
        for v in &self.values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        if let Some(aux) = &self.aux {
            for a in aux {
                buf.extend_from_slice(&a.to_le_bytes());
            }
        }
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&FOOTER_MAGIC);

        std::fs::write(path, &buf).map_err(|e| FabricError::io(path, e))
    }
}
