use crate::filter_bank::try_zeroed;
use crate::model::{BlipError, BlipResult};

/// Overlap-add accumulator that slides forward as samples are read.
///
/// Holds `capacity + taps` cells. Cells `[0, avail)` are finished; cells
/// `[avail, avail + taps)` may still receive contributions; everything past
/// that is zero. Writes and reads are bounds-checked against these regions.
#[derive(Debug, Clone)]
pub struct DeltaBuffer {
    cells: Vec<f32>,
    taps: usize,
}

impl DeltaBuffer {
    pub fn new(capacity: usize, taps: usize) -> BlipResult<Self> {
        let len = capacity
            .checked_add(taps)
            .ok_or(BlipError::Allocation { what: "output buffer", len: usize::MAX })?;
        Ok(Self {
            cells: try_zeroed(len, "output buffer")?,
            taps,
        })
    }

    /// Output samples that can be pending before a read is required.
    pub fn capacity(&self) -> usize {
        self.cells.len() - self.taps
    }

    /// Fails unless a response starting at `target` fits.
    #[inline]
    pub fn check_write(&self, target: usize) -> BlipResult<()> {
        if target > self.capacity() {
            return Err(BlipError::CapacityExceeded {
                needed: target,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Add `scale * response` at `target`.
    #[inline]
    pub fn add_response(&mut self, target: usize, scale: f32, response: &[f32]) {
        debug_assert_eq!(response.len(), self.taps);
        let window = &mut self.cells[target..target + response.len()];
        for (cell, &r) in window.iter_mut().zip(response) {
            *cell += scale * r;
        }
    }

    #[inline]
    pub fn head(&self, count: usize) -> &[f32] {
        &self.cells[..count]
    }

    /// Discard the first `count` cells of a buffer with `avail` finished
    /// cells, keeping the pending tail and zeroing what it leaves behind.
    pub fn consume(&mut self, count: usize, avail: usize) {
        debug_assert!(count <= avail);
        let occupied = (avail + self.taps).min(self.cells.len());
        self.cells.copy_within(count..occupied, 0);
        self.cells[occupied - count..occupied].fill(0.0);
    }

    pub fn clear(&mut self) {
        self.cells.fill(0.0);
    }

    #[cfg(test)]
    pub(crate) fn cells(&self) -> &[f32] {
        &self.cells
    }
}
