use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Bar colours
// ---------------------------------------------------------------------------

const START_HUE: f32 = 210.0;
const HUE_SPAN: f32 = 300.0;

/// One colour per bar, ordered by rank.
///
/// Hues walk around the wheel from blue so neighbouring bars stay distinct,
/// and lightness rises with rank so the winning class reads strongest.
pub fn bar_colors(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|rank| {
            let t = if n > 1 { rank as f32 / (n - 1) as f32 } else { 0.0 };
            let hue = (START_HUE + t * HUE_SPAN) % 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.45 + 0.25 * t);
            to_color32(hsl.into_color())
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgb(channel(rgb.red), channel(rgb.green), channel(rgb.blue))
}
