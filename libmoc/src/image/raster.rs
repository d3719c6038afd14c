//! Pixel storage

/// 8-bit raster assembled from decoded fragments
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Raster {
    /// The width of the image
    width: usize,
    /// Image pixels, row-major; always a whole number of rows
    pixels: Vec<u8>,
}

impl Raster {
    /// Creates an empty raster `width` pixels wide
    #[must_use]
    pub const fn empty(width: usize) -> Self {
        Self {
            width,
            pixels: Vec::new(),
        }
    }

    /// Returns the width of the image
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of rows
    #[must_use]
    pub fn height(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.pixels.len() / self.width
        }
    }

    /// Returns the pixels, row-major
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// get an entire row
    #[must_use]
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let start = y.checked_mul(self.width)?;
        self.pixels.get(start..start + self.width)
    }

    /// Appends whole rows; a trailing partial row is zero-filled
    pub(crate) fn push_rows(&mut self, data: &[u8]) {
        self.pixels.extend_from_slice(data);
        let partial = data.len() % self.width.max(1);
        if partial != 0 {
            self.pixels.resize(self.pixels.len() + self.width - partial, 0);
        }
    }

    /// Appends `rows` rows of zeros
    pub(crate) fn pad_rows(&mut self, rows: usize) {
        self.pixels.resize(self.pixels.len() + rows * self.width, 0);
    }

    /// Drops every row from `height` on
    pub(crate) fn truncate(&mut self, height: usize) {
        self.pixels.truncate(height * self.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_whole_rows() {
        let mut r = Raster::empty(4);
        r.push_rows(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(r.height(), 2);
        assert_eq!(r.row(1), Some(&[5u8, 6, 0, 0][..]));
        r.pad_rows(3);
        assert_eq!(r.height(), 5);
        assert_eq!(r.row(4), Some(&[0u8; 4][..]));
        assert_eq!(r.row(5), None);
        r.truncate(1);
        assert_eq!(r.pixels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn zero_width_raster_has_no_rows() {
        let mut r = Raster::empty(0);
        r.pad_rows(3);
        assert_eq!(r.height(), 0);
        assert_eq!(r.row(0), None);
    }
}
