//! Persisted binary form of a built index.
//!
//! The layout mirrors the in-memory packing byte for byte: an 8-byte header
//! (magic, version + coordinate type tag, node size, item count) followed by
//! the boxes buffer and the indices buffer, all little-endian. Loading
//! revalidates everything derivable from the header and rejects any buffer
//! whose length disagrees with it.

use crate::builder::compute_level_bounds;
use crate::coord::Coord;
use crate::error::IndexError;
use crate::index::SpatialIndex;

/// First byte of every serialized index.
const MAGIC: u8 = 0xfb;
/// Format version carried in the high nibble of byte 1.
const VERSION: u8 = 1;
/// Header bytes preceding the boxes buffer.
const HEADER_LEN: usize = 8;
/// Serialized width of one `indices` element.
const INDEX_WIDTH: usize = 4;

impl<S: Coord> SpatialIndex<S> {
    /// Serialize into the flat binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_slots = self.total_slots();
        let mut out =
            Vec::with_capacity(HEADER_LEN + total_slots * (4 * S::WIDTH + INDEX_WIDTH));
        out.push(MAGIC);
        out.push((VERSION << 4) | S::TYPE_TAG);
        out.extend_from_slice(&(self.node_size as u16).to_le_bytes());
        out.extend_from_slice(&(self.num_items as u32).to_le_bytes());
        for &coordinate in &self.boxes {
            coordinate.write_le(&mut out);
        }
        for &index in &self.indices {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out
    }

    /// Reconstruct an index serialized by [`SpatialIndex::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`IndexError::FormatError`] on a short header, wrong magic byte,
    /// unsupported version, mismatched coordinate type tag, out-of-range
    /// node size, zero item count, or a payload length that disagrees with
    /// the header.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        if data.len() < HEADER_LEN {
            return Err(IndexError::format("buffer shorter than header"));
        }
        if data[0] != MAGIC {
            return Err(IndexError::format(format!(
                "bad magic byte 0x{:02x}",
                data[0]
            )));
        }
        let version = data[1] >> 4;
        if version != VERSION {
            return Err(IndexError::format(format!(
                "unsupported version {version}"
            )));
        }
        let tag = data[1] & 0x0f;
        if tag != S::TYPE_TAG {
            return Err(IndexError::format(format!(
                "coordinate type tag {tag} does not match expected {}",
                S::TYPE_TAG
            )));
        }

        let node_size = usize::from(u16::from_le_bytes([data[2], data[3]]));
        if node_size < 2 {
            return Err(IndexError::format(format!(
                "node size {node_size} out of range"
            )));
        }
        let num_items = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if num_items == 0 {
            return Err(IndexError::format("zero item count"));
        }

        let level_bounds = compute_level_bounds(num_items, node_size);
        let total_slots = *level_bounds.last().unwrap_or(&num_items);
        let boxes_len = total_slots * 4 * S::WIDTH;
        let expected_len = HEADER_LEN + boxes_len + total_slots * INDEX_WIDTH;
        if data.len() != expected_len {
            return Err(IndexError::format(format!(
                "expected {expected_len} bytes for {num_items} items, got {}",
                data.len()
            )));
        }

        let mut boxes = Vec::with_capacity(total_slots * 4);
        for chunk in data[HEADER_LEN..HEADER_LEN + boxes_len].chunks_exact(S::WIDTH) {
            let coordinate =
                S::read_le(chunk).ok_or_else(|| IndexError::format("truncated boxes buffer"))?;
            boxes.push(coordinate);
        }

        let mut indices = Vec::with_capacity(total_slots);
        for chunk in data[HEADER_LEN + boxes_len..].chunks_exact(INDEX_WIDTH) {
            indices.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        Ok(Self {
            num_items,
            node_size,
            level_bounds,
            boxes,
            indices,
        })
    }
}
