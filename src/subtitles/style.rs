use serde::{Deserialize, Serialize};

// @module: Burned-in subtitle style

// libass scales style sizes against a 384x288 script canvas, so sizes below
// are in canvas units and only the aspect ratio of the video matters
const BASE_FONT_SIZE: f64 = 20.0;
const BASE_MARGIN_V: f64 = 25.0;
const BILINGUAL_FONT_FACTOR: f64 = 0.85;
const MIN_FONT_SIZE: u32 = 8;

/// Style applied when burning subtitles into a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub font_name: String,
    pub font_size: u32,
    /// Primary text color as libass `&HBBGGRR&`
    pub primary_colour: String,
    pub outline_colour: String,
    pub outline: u32,
    /// 1 = outline and shadow, 3 = opaque box
    pub border_style: u32,
    pub margin_v: u32,
    /// Suggested max equivalent width of one line for this frame
    pub max_line_width: f64,
}

impl StyleConfig {
    /// libass `force_style` value for ffmpeg's `subtitles` filter
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},Outline={},BorderStyle={},MarginV={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.outline,
            self.border_style,
            self.margin_v
        )
    }
}

/// Derive a subtitle style from the frame size.
///
/// Portrait frames get a smaller font since libass scales with height and the
/// line would otherwise overflow the narrow width. Bilingual output shrinks the
/// font so two lines take about as much room as one.
pub fn compute_render_style(
    width: u32,
    height: u32,
    is_bilingual: bool,
    content_scale: f64,
) -> StyleConfig {
    let scale = if content_scale.is_finite() && content_scale > 0.0 {
        content_scale
    } else {
        1.0
    };

    let aspect = if width > 0 && height > 0 {
        width as f64 / height as f64
    } else {
        16.0 / 9.0
    };
    // 16:9 is the reference; narrower frames shrink proportionally
    let aspect_factor = (aspect / (16.0 / 9.0)).clamp(0.45, 1.0);

    let mut font_size = BASE_FONT_SIZE * scale * aspect_factor;
    if is_bilingual {
        font_size *= BILINGUAL_FONT_FACTOR;
    }
    let font_size = (font_size.round() as u32).max(MIN_FONT_SIZE);

    // Canvas is 384 units wide for 4:3; scale that by aspect, keep a 10% margin
    let canvas_width = 288.0 * aspect;
    let max_line_width = (canvas_width * 0.9 / font_size as f64).max(4.0);

    StyleConfig {
        font_name: "DejaVu Sans".to_string(),
        font_size,
        primary_colour: "&HFFFFFF&".to_string(),
        outline_colour: "&H000000&".to_string(),
        outline: 1,
        border_style: 3,
        margin_v: (BASE_MARGIN_V * scale).round() as u32,
        max_line_width,
    }
}
