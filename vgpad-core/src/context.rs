//! # Drawing context
//!
//! The style attached to every shape. Rendering is not our concern, but the values are part of the document
//! and take part in equality, undo, and recording.

use crate::storage::Storage;

/// Straight 8-bit RGBA, unpremultiplied.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct Color(pub [u8; 4]);
impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }
    /// Packed as `0xRRGGBBAA`, the form used in storage.
    #[must_use]
    pub fn to_packed(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
    #[must_use]
    pub fn from_packed(packed: u32) -> Self {
        Self(packed.to_be_bytes())
    }
    #[must_use]
    pub fn alpha(self) -> u8 {
        self.0[3]
    }
    #[must_use]
    pub fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }
}

#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Debug, Default, strum::FromRepr, strum::AsRefStr, strum::EnumIter,
)]
#[repr(u8)]
pub enum LineStyle {
    #[default]
    Solid = 0,
    Dash = 1,
    Dot = 2,
    DashDot = 3,
    DashDotDot = 4,
    /// Not stroked at all.
    Null = 5,
}

bitflags::bitflags! {
    /// Selects which properties of a [`Context`] a change applies to.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[rustfmt::skip]
    pub struct ContextBits : u32 {
        const LINE_RGB =   0b0000_0001;
        const LINE_ALPHA = 0b0000_0010;
        const LINE_COLOR = 0b0000_0011;
        const LINE_WIDTH = 0b0000_0100;
        const LINE_STYLE = 0b0000_1000;
        const FILL_RGB =   0b0001_0000;
        const FILL_ALPHA = 0b0010_0000;
        const FILL_COLOR = 0b0011_0000;
        const ALL =        0b0011_1111;
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Context {
    /// Positive values are model units, negative values are display pixels (fixed on-screen width).
    pub line_width: f32,
    pub line_color: Color,
    pub line_style: LineStyle,
    pub fill_color: Color,
}
impl Default for Context {
    fn default() -> Self {
        Self {
            line_width: 0.0,
            line_color: Color::BLACK,
            line_style: LineStyle::Solid,
            fill_color: Color::TRANSPARENT,
        }
    }
}
impl Context {
    /// Copy the properties of `src` selected by `mask` into `self`.
    pub fn apply(&mut self, src: &Context, mask: ContextBits) {
        let merge = |dst: Color, src: Color, rgb: bool, alpha: bool| -> Color {
            let [mut r, mut g, mut b, mut a] = dst.0;
            if rgb {
                [r, g, b] = [src.0[0], src.0[1], src.0[2]];
            }
            if alpha {
                a = src.0[3];
            }
            Color([r, g, b, a])
        };
        self.line_color = merge(
            self.line_color,
            src.line_color,
            mask.contains(ContextBits::LINE_RGB),
            mask.contains(ContextBits::LINE_ALPHA),
        );
        self.fill_color = merge(
            self.fill_color,
            src.fill_color,
            mask.contains(ContextBits::FILL_RGB),
            mask.contains(ContextBits::FILL_ALPHA),
        );
        if mask.contains(ContextBits::LINE_WIDTH) {
            self.line_width = src.line_width;
        }
        if mask.contains(ContextBits::LINE_STYLE) {
            self.line_style = src.line_style;
        }
    }
    pub fn save(&self, s: &mut dyn Storage) {
        s.write_float("lineWidth", self.line_width);
        s.write_int("lineColor", i64::from(self.line_color.to_packed()));
        s.write_int("lineStyle", i64::from(self.line_style as u8));
        s.write_int("fillColor", i64::from(self.fill_color.to_packed()));
    }
    /// Missing fields fall back to the defaults, unknown line styles to solid.
    pub fn load(&mut self, s: &mut dyn Storage) {
        use az::SaturatingAs;
        fn read_color(s: &mut dyn Storage, name: &str, default: Color) -> Color {
            Color::from_packed(s.read_int(name, i64::from(default.to_packed())).saturating_as())
        }
        let defaults = Self::default();
        self.line_width = s.read_float("lineWidth", defaults.line_width);
        self.line_color = read_color(s, "lineColor", defaults.line_color);
        self.fill_color = read_color(s, "fillColor", defaults.fill_color);
        self.line_style = LineStyle::from_repr(s.read_int("lineStyle", 0).saturating_as())
            .unwrap_or_default();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn masked_apply() {
        let mut ctx = Context::default();
        let src = Context {
            line_width: 3.0,
            line_color: Color::rgba(10, 20, 30, 40),
            line_style: LineStyle::Dash,
            fill_color: Color::WHITE,
        };
        ctx.apply(&src, ContextBits::LINE_ALPHA | ContextBits::LINE_WIDTH);
        assert_eq!(ctx.line_color, Color::rgba(0, 0, 0, 40));
        assert_eq!(ctx.line_width, 3.0);
        assert_eq!(ctx.line_style, LineStyle::Solid);
        assert_eq!(ctx.fill_color, Color::TRANSPARENT);

        ctx.apply(&src, ContextBits::ALL);
        assert_eq!(ctx, src);
    }
    #[test]
    fn packed_color() {
        let c = Color::rgba(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.to_packed(), 0x1234_5678);
        assert_eq!(Color::from_packed(0x1234_5678), c);
    }
}
