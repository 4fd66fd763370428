/// Packed bit matrix used for binarized frames and sampled module grids.
///
/// `true` means a dark pixel/module. Reads outside the matrix return `false`
/// and writes outside it are ignored, so callers sampling near image borders
/// never have to bounds-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl BitMatrix {
    /// Create an all-light matrix with the given dimensions
    pub fn new(width: usize, height: usize) -> Self {
        let bytes_needed = (width * height).div_ceil(8);
        Self {
            width,
            height,
            data: vec![0; bytes_needed],
        }
    }

    /// Build a square matrix from a predicate over `(x, y)`
    pub fn from_fn(size: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut matrix = Self::new(size, size);
        for y in 0..size {
            for x in 0..size {
                if f(x, y) {
                    matrix.set(x, y, true);
                }
            }
        }
        matrix
    }

    /// Matrix width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Matrix height
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get bit at (x, y)
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y * self.width + x;
        (self.data[index / 8] >> (index % 8)) & 1 == 1
    }

    /// Signed lookup; negative coordinates read as light
    pub fn get_signed(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.get(x as usize, y as usize)
    }

    /// Set bit at (x, y)
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y * self.width + x;
        if value {
            self.data[index / 8] |= 1 << (index % 8);
        } else {
            self.data[index / 8] &= !(1 << (index % 8));
        }
    }

    /// Toggle bit at (x, y)
    pub fn toggle(&mut self, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y * self.width + x;
        self.data[index / 8] ^= 1 << (index % 8);
    }

    /// Number of dark cells
    pub fn count_dark(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Reset every bit to light
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl Default for BitMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_toggle() {
        let mut matrix = BitMatrix::new(9, 7);
        assert_eq!(matrix.width(), 9);
        assert_eq!(matrix.height(), 7);

        matrix.set(8, 6, true);
        assert!(matrix.get(8, 6));
        assert!(!matrix.get(7, 6));
        assert_eq!(matrix.count_dark(), 1);

        matrix.toggle(8, 6);
        assert!(!matrix.get(8, 6));

        matrix.set(0, 0, true);
        matrix.clear();
        assert_eq!(matrix.count_dark(), 0);
    }

    #[test]
    fn test_out_of_bounds_is_light() {
        let mut matrix = BitMatrix::new(4, 4);
        matrix.set(10, 10, true);
        assert!(!matrix.get(10, 10));
        assert!(!matrix.get_signed(-1, 2));
    }

    #[test]
    fn test_from_fn_checkerboard() {
        let matrix = BitMatrix::from_fn(5, |x, y| (x + y) % 2 == 0);
        assert!(matrix.get(0, 0));
        assert!(!matrix.get(1, 0));
        assert_eq!(matrix.count_dark(), 13);
    }
}
