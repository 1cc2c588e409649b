//! RGBA colour stored as 16-bit channels and exposed as normalized floats

/// Colour as handed to the renderer: 16 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color16 {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

/// Convert a 0..1 channel to 16 bits, truncating like the renderer expects
pub fn channel_to_u16(value: f64) -> u16 {
    (value.clamp(0.0, 1.0) * 65535.0) as u16
}

/// Colour with the float components it was set from kept alongside the
/// 16-bit representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    rgba: [f64; 4],
    raw: Color16,
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Color {
    pub fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            rgba: [red, green, blue, alpha],
            raw: Color16 {
                red: channel_to_u16(red),
                green: channel_to_u16(green),
                blue: channel_to_u16(blue),
                alpha: channel_to_u16(alpha),
            },
        }
    }

    pub fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::new(red, green, blue, 1.0)
    }

    /// Normalized components as last set
    pub fn components(&self) -> (f64, f64, f64, f64) {
        let [r, g, b, a] = self.rgba;
        (r, g, b, a)
    }

    pub fn raw(&self) -> Color16 {
        self.raw
    }

    /// 8-bit RGB for raster and vector output
    pub fn to_rgb8(&self) -> [u8; 3] {
        [
            (self.raw.red >> 8) as u8,
            (self.raw.green >> 8) as u8,
            (self.raw.blue >> 8) as u8,
        ]
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let [r, g, b] = self.to_rgb8();
        [r, g, b, (self.raw.alpha >> 8) as u8]
    }

    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl From<(f64, f64, f64, f64)> for Color {
    fn from((r, g, b, a): (f64, f64, f64, f64)) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<(f64, f64, f64)> for Color {
    fn from((r, g, b): (f64, f64, f64)) -> Self {
        Self::rgb(r, g, b)
    }
}
