//! Cube projection types

/// Row-major 2-D image, row 0 at the top of the display
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

impl<T: Clone + Default> Plane<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Copy> Plane<T> {
    pub fn get(&self, row: usize, column: usize) -> Option<T> {
        (row < self.height && column < self.width).then(|| self.data[row * self.width + column])
    }

    pub(crate) fn set(&mut self, row: usize, column: usize, value: T) {
        self.data[row * self.width + column] = value;
    }
}

/// Derived images of a scan, same shape as the pan/tilt grid
#[derive(Debug, Clone, PartialEq)]
pub struct Projections {
    pub luminance: Plane<f64>,
    pub red: Plane<f64>,
    pub green: Plane<f64>,
    pub blue: Plane<f64>,
    pub saturated: Plane<bool>,
    pub saturation_magnitude: Plane<f64>,
    pub infrared: Plane<f64>,
    /// CIE Y reused as the green channel of the extreme-band image
    pub extreme_green: Plane<f64>,
    pub ultraviolet: Plane<f64>,
    pub chlorophyll_a: Plane<f64>,
    pub chlorophyll_b: Plane<f64>,
    /// Running maximum over red, green and blue
    pub max_color_channel: f64,
    /// Running maximum over infrared, extreme green and ultraviolet
    pub max_extreme_channel: f64,
}

impl Projections {
    pub fn new(width: usize, height: usize, initial_max: f64) -> Self {
        Self {
            luminance: Plane::new(width, height),
            red: Plane::new(width, height),
            green: Plane::new(width, height),
            blue: Plane::new(width, height),
            saturated: Plane::new(width, height),
            saturation_magnitude: Plane::new(width, height),
            infrared: Plane::new(width, height),
            extreme_green: Plane::new(width, height),
            ultraviolet: Plane::new(width, height),
            chlorophyll_a: Plane::new(width, height),
            chlorophyll_b: Plane::new(width, height),
            max_color_channel: initial_max,
            max_extreme_channel: initial_max,
        }
    }
}
