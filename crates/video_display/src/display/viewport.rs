//! Letterbox/pillarbox render-area arithmetic
//!
//! Pure integer math; no device state is touched when the window
//! resizes but the frame format stays the same.

use crate::display::surface::WindowParameters;

/// Region of the surface the frame is drawn into, centered and
/// aspect-preserving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderArea {
    /// Left edge in surface pixels
    pub x: u32,
    /// Top edge in surface pixels
    pub y: u32,
    /// Width in surface pixels
    pub width: u32,
    /// Height in surface pixels
    pub height: u32,
}

impl RenderArea {
    /// Fit an image of `image_width` x `image_height` into the window,
    /// preserving aspect ratio and centering the result
    pub fn fit(image_width: u32, image_height: u32, window: WindowParameters) -> Self {
        if image_width == 0 || image_height == 0 || window.is_minimized() {
            return Self::default();
        }

        // Compare aspect ratios via cross-multiplication to stay in
        // integer arithmetic.
        let wide = u64::from(window.width) * u64::from(image_height)
            >= u64::from(image_width) * u64::from(window.height);
        let (width, height) = if wide {
            // Window is wider than the image: full height, pillarbox.
            let width =
                (u64::from(window.height) * u64::from(image_width) / u64::from(image_height)) as u32;
            (width, window.height)
        } else {
            // Window is taller than the image: full width, letterbox.
            let height =
                (u64::from(window.width) * u64::from(image_height) / u64::from(image_width)) as u32;
            (window.width, height)
        };

        Self {
            x: (window.width - width) / 2,
            y: (window.height - height) / 2,
            width,
            height,
        }
    }

    /// Whether the area covers zero pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_covers_window() {
        let area = RenderArea::fit(1920, 1080, WindowParameters::new(1920, 1080));
        assert_eq!(
            area,
            RenderArea {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn wide_window_pillarboxes() {
        let area = RenderArea::fit(1000, 1000, WindowParameters::new(2000, 1000));
        assert_eq!(
            area,
            RenderArea {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
    }

    #[test]
    fn tall_window_letterboxes() {
        let area = RenderArea::fit(1920, 1080, WindowParameters::new(1920, 2160));
        assert_eq!(
            area,
            RenderArea {
                x: 0,
                y: 540,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn minimized_window_yields_empty_area() {
        let area = RenderArea::fit(1920, 1080, WindowParameters::new(0, 0));
        assert!(area.is_empty());
    }

    #[test]
    fn non_integral_ratios_stay_centered() {
        let area = RenderArea::fit(640, 480, WindowParameters::new(1366, 768));
        // Height-limited: 768 * 640 / 480 = 1024 wide.
        assert_eq!(area.width, 1024);
        assert_eq!(area.height, 768);
        assert_eq!(area.x, (1366 - 1024) / 2);
        assert_eq!(area.y, 0);
    }
}
