/// Scale used for progress when no entry reports an uncompressed size.
pub const UNKNOWN_SIZE_SCALE: u64 = 1000;

/// Maps "entry N is P% done" onto a single monotonic `loaded / total` pair.
///
/// When the archive declares uncompressed sizes, progress is measured in
/// bytes: entries before the current one count in full and the current
/// entry counts proportionally. Entries without a size contribute nothing.
///
/// When no entry declares a size, progress falls back to
/// `(index + percent / 100) / entries`, expressed on a fixed
/// [`UNKNOWN_SIZE_SCALE`]. Either way the reported value never decreases
/// and equals [`total`](Self::total) once the last entry reaches 100%.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    sizes: Vec<u64>,
    /// `offsets[i]` is the sum of the sizes of every entry before `i`.
    offsets: Vec<u64>,
    total_bytes: u64,
}

impl ProgressMeter {
    pub fn new(sizes: impl IntoIterator<Item = Option<u64>>) -> Self {
        let sizes: Vec<u64> = sizes.into_iter().map(|size| size.unwrap_or(0)).collect();
        let mut offsets = Vec::with_capacity(sizes.len());
        let mut running = 0u64;
        for size in &sizes {
            offsets.push(running);
            running = running.saturating_add(*size);
        }
        Self { sizes, offsets, total_bytes: running }
    }

    pub fn total_files(&self) -> u64 {
        self.sizes.len() as u64
    }

    /// Sum of the declared uncompressed sizes, or `0` when none were declared.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Denominator for [`position`](Self::position).
    pub fn total(&self) -> u64 {
        match self.total_bytes {
            0 => UNKNOWN_SIZE_SCALE,
            bytes => bytes,
        }
    }

    /// Progress after `percent` (clamped to `0..=100`) of entry `index`.
    pub fn position(&self, index: usize, percent: u8) -> u64 {
        let percent = u64::from(percent.min(100));
        if self.total_bytes > 0 {
            let offset = self.offsets.get(index).copied().unwrap_or(self.total_bytes);
            let size = self.sizes.get(index).copied().unwrap_or(0);
            return offset + size * percent / 100;
        }
        let entries = self.total_files().max(1);
        let index = (index as u64).min(entries - 1);
        (index * 100 + percent) * UNKNOWN_SIZE_SCALE / (entries * 100)
    }
}

/// Percentage of `read` out of `size`, capped at 99 until the entry has
/// actually finished (the final 100% is reported separately).
pub(crate) fn partial_percent(read: u64, size: u64) -> u8 {
    match size {
        0 => 0,
        size => (read.saturating_mul(100) / size).min(99) as u8,
    }
}
