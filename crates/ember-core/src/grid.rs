use serde::{Deserialize, Serialize};

/// A 2D raster layer, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

impl<T: Copy> Grid<T> {
    /// Create a grid filled with the given value.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Wrap an existing row-major buffer. Returns `None` if the length does
    /// not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == width * height).then_some(Self { data, width, height })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.data[row * self.width..(row + 1) * self.width]
    }
}

impl Grid<f32> {
    pub fn max_value(&self) -> f32 {
        self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_is_row_major() {
        let mut g = Grid::new(3, 2, 0u16);
        g.set(1, 2, 7);
        assert_eq!(g.get(1, 2), 7);
        assert_eq!(g.data[5], 7);
        g.row_mut(0).copy_from_slice(&[1, 2, 3]);
        assert_eq!(g.data, [1, 2, 3, 0, 0, 7]);
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Grid::from_vec(2, 2, vec![1.0f32; 4]).is_some());
        assert!(Grid::from_vec(2, 2, vec![1.0f32; 3]).is_none());
    }

    #[test]
    fn max_value_of_float_grid() {
        let g = Grid::from_vec(2, 1, vec![3.5f32, -1.0]).unwrap();
        assert_eq!(g.max_value(), 3.5);
    }
}
