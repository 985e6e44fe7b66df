//! Heatmap colormap.

use image::Rgb;

/// Classic "jet" colormap: blue at 0, through cyan, yellow, to red at 255.
pub fn jet(intensity: u8) -> Rgb<u8> {
    let x = f32::from(intensity) / 255.0;
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
    }

    #[test]
    fn test_jet_midpoint_is_green_dominant() {
        let Rgb([r, g, b]) = jet(128);
        assert_eq!(g, 255);
        assert!(r > 100 && b > 100);
    }

    #[test]
    fn test_jet_hue_moves_from_blue_to_red() {
        let low = jet(40);
        let high = jet(215);
        assert!(low[2] > low[0]);
        assert!(high[0] > high[2]);
    }
}
