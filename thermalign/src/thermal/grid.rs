/// Row-major grid of raw sensor readings, typically temperatures in degrees Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalGrid {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl ThermalGrid {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Self {
        assert_eq!(
            values.len(),
            width * height,
            "grid of {width}x{height} needs {} values",
            width * height
        );
        Self {
            width,
            height,
            values,
        }
    }

    pub fn new_filled(width: usize, height: usize, value: f32) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    /// Stacks parsed rows. `None` if there are no values or rows differ in length.
    pub(crate) fn from_rows(rows: Vec<Vec<f32>>) -> Option<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            return None;
        }
        let height = rows.len();
        Some(Self {
            width,
            height,
            values: rows.concat(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.values[y * self.width + x]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut f32 {
        debug_assert!(x < self.width && y < self.height);
        &mut self.values[y * self.width + x]
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.values[y * self.width..(y + 1) * self.width]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Smallest and largest finite reading, `None` if there is none.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
