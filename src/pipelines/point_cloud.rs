// SPDX-License-Identifier: GPL-3.0-only

//! Point-cloud reconstruction from registered depth + color

use rayon::prelude::*;

use crate::backends::depth::{ColorImage, FloatImage, Point4, PointColor, Registration};

/// One colored point per depth pixel, row-major over the depth grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub width: u32,
    pub height: u32,
    /// Homogeneous points in meters, Z pointing away from the viewer (negative in front)
    pub vertices: Vec<Point4>,
    pub colors: Vec<PointColor>,
    /// Undistorted depth (millimeters) the points were unprojected from
    pub depth: FloatImage,
}

impl PointCloud {
    /// Number of points (one per depth pixel)
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Reallocate for a `width` x `height` grid if needed
    fn ensure_grid(&mut self, width: u32, height: u32) {
        let count = width as usize * height as usize;
        if self.width != width || self.height != height || self.vertices.len() != count {
            self.width = width;
            self.height = height;
            self.vertices = vec![[0.0; 4]; count];
            self.colors = vec![[0; 3]; count];
        }
    }

    /// Point at grid coordinate (x, y)
    pub fn point(&self, x: u32, y: u32) -> (Point4, PointColor) {
        let idx = (y * self.width + x) as usize;
        (self.vertices[idx], self.colors[idx])
    }
}

/// Unpack a registration color (BGRX little-endian) into RGB
#[inline]
pub fn unpack_color(packed: u32) -> PointColor {
    let [b, g, r, _] = packed.to_le_bytes();
    [r, g, b]
}

/// Unproject every depth pixel into `cloud`
///
/// The sensor's Z axis points into the scene; it is negated so the cloud uses a
/// right-handed view convention with the camera looking down -Z.
pub fn reconstruct(
    registration: &dyn Registration,
    undistorted: &FloatImage,
    registered: &ColorImage,
    cloud: &mut PointCloud,
) {
    let (width, height) = (undistorted.width, undistorted.height);
    cloud.ensure_grid(width, height);
    cloud.depth.copy_from(undistorted);

    if width == 0 {
        return;
    }

    cloud
        .vertices
        .par_chunks_mut(width as usize)
        .zip(cloud.colors.par_chunks_mut(width as usize))
        .enumerate()
        .for_each(|(row, (vertices, colors))| {
            for col in 0..width {
                let (x, y, z, packed) =
                    registration.unproject(undistorted, registered, row as u32, col);
                vertices[col as usize] = [x, y, -z, 1.0];
                colors[col as usize] = unpack_color(packed);
            }
        });

    debug_assert_eq!(cloud.vertices.len(), (width * height) as usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Registration returning the pixel coordinates as the point
    struct GridRegistration;

    impl Registration for GridRegistration {
        fn align(&self, _: &ColorImage, _: &FloatImage, _: &mut FloatImage, _: &mut ColorImage) {}

        fn unproject(
            &self,
            undistorted: &FloatImage,
            _registered: &ColorImage,
            row: u32,
            col: u32,
        ) -> (f32, f32, f32, u32) {
            let d = undistorted.pixel(col, row)[0];
            // Blue 0x10, green 0x20, red 0x30
            (col as f32, row as f32, d, 0xff30_2010)
        }
    }

    #[test]
    fn test_unpack_color_reverses_byte_order() {
        assert_eq!(unpack_color(0xff30_2010), [0x30, 0x20, 0x10]);
    }

    #[test]
    fn test_reconstruct_flips_z_and_sets_w() {
        let depth = FloatImage::from_data(3, 2, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let registered = ColorImage::new(3, 2, 4);
        let mut cloud = PointCloud::default();

        reconstruct(&GridRegistration, &depth, &registered, &mut cloud);

        assert_eq!(cloud.len(), 6);
        let (point, color) = cloud.point(2, 1);
        assert_eq!(point, [2.0, 1.0, -6.0, 1.0]);
        assert_eq!(color, [0x30, 0x20, 0x10]);
        assert_eq!(cloud.depth, depth);
    }
}
