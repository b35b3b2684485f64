//! Off-screen drawing surface.
//!
//! Pixels are `0x00RRGGBB`. Every primitive records the bounding box of the
//! pixels it actually wrote into the dirty region, which the window thread
//! uses to decide what to blit on the next present.
//!
//! Geometry follows GDI conventions: a line does not draw its end point and
//! a rectangle covers the half-open box `[x1, x2) x [y1, y2)`.

use std::ops::Range;

use super::color::{Color, Palette};

/// Half-open rectangle `[left, right) x [top, bottom)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The single pixel at (x, y)
    pub const fn pixel(x: i32, y: i32) -> Self {
        Self::new(x, y, x + 1, y + 1)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Bounding union
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.left >= self.left
                && other.top >= self.top
                && other.right <= self.right
                && other.bottom <= self.bottom)
    }

    /// Scale all edges by an integer zoom
    pub fn scaled(&self, scale: u32) -> Rect {
        let s = scale as i32;
        Rect::new(self.left * s, self.top * s, self.right * s, self.bottom * s)
    }
}

/// Grows to cover the pixels a primitive writes
#[derive(Default)]
struct Touched(Option<Rect>);

impl Touched {
    fn add(&mut self, x: i32, y: i32) {
        let p = Rect::pixel(x, y);
        self.0 = Some(match self.0 {
            Some(r) => r.union(&p),
            None => p,
        });
    }

    fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.0 = Some(match self.0 {
            Some(r) => r.union(&rect),
            None => rect,
        });
    }
}

/// The off-screen pixel buffer plus pen and dirty tracking
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    pen: Color,
    background: Palette,
    dirty: Option<Rect>,
}

impl Surface {
    /// New surface filled with the background color; the whole surface
    /// starts dirty so the first paint shows it
    pub fn new(width: u32, height: u32) -> Self {
        let background = Palette::Black;
        Self {
            width,
            height,
            pixels: vec![background.rgb(); width as usize * height as usize],
            pen: Color::default(),
            background,
            dirty: Some(Rect::new(0, 0, width as i32, height as i32)),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Row-major pixel data
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x.into(), y.into()).map(|i| self.pixels[i])
    }

    pub fn pen(&self) -> Color {
        self.pen
    }

    pub fn set_pen(&mut self, color: Color) {
        self.pen = color;
    }

    pub fn dirty(&self) -> Option<Rect> {
        self.dirty
    }

    /// Return the dirty region and reset it to empty
    pub fn take_dirty(&mut self) -> Option<Rect> {
        self.dirty.take()
    }

    pub fn mark_dirty(&mut self, rect: Rect) {
        if let Some(clipped) = rect.intersect(&self.bounds()) {
            self.dirty = Some(match self.dirty {
                Some(r) => r.union(&clipped),
                None => clipped,
            });
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            None
        } else {
            Some(y as usize * self.width as usize + x as usize)
        }
    }

    fn plot(&mut self, x: i64, y: i64, value: u32, touched: &mut Touched) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = value;
            // In bounds, so both fit in i32
            touched.add(x as i32, y as i32);
        }
    }

    fn commit(&mut self, touched: Touched) {
        if let Some(rect) = touched.0 {
            self.mark_dirty(rect);
        }
    }

    /// Fill the whole surface with the background color
    pub fn clear(&mut self) {
        self.clear_with(self.background);
    }

    /// Fill the whole surface with a palette color, which becomes the new
    /// background
    pub fn clear_with(&mut self, color: Palette) {
        self.background = color;
        self.pixels.fill(color.rgb());
        self.mark_dirty(self.bounds());
    }

    pub fn draw_point(&mut self, x: i32, y: i32) {
        let mut touched = Touched::default();
        self.plot(x.into(), y.into(), self.pen.pixel(), &mut touched);
        self.commit(touched);
    }

    /// Bresenham line from (x1, y1) towards (x2, y2); the end point itself
    /// is not drawn.
    ///
    /// Only the steps along the major axis that land on the surface are
    /// visited, each placed with the closed form of the Bresenham error
    /// term, so far off-surface end points cost nothing.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let value = self.pen.pixel();
        let mut touched = Touched::default();
        let (x1, y1, x2, y2) = (x1 as i64, y1 as i64, x2 as i64, y2 as i64);
        let (dx, dy) = ((x2 - x1).abs(), (y2 - y1).abs());
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };

        if dx >= dy {
            for k in steps_on_surface(x1, sx, dx, self.width) {
                let y = y1 + sy * minor_offset(k, dy, dx);
                self.plot(x1 + sx * k, y, value, &mut touched);
            }
        } else {
            for k in steps_on_surface(y1, sy, dy, self.height) {
                let x = x1 + sx * minor_offset(k, dx, dy);
                self.plot(x, y1 + sy * k, value, &mut touched);
            }
        }
        self.commit(touched);
    }

    /// Hollow rectangle covering `[x1, x2) x [y1, y2)`; corners may be given
    /// in any order
    pub fn draw_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        if left == right || top == bottom {
            return;
        }
        let mut touched = Touched::default();
        self.fill_span(Rect::new(left, top, right, top + 1), &mut touched);
        self.fill_span(Rect::new(left, bottom - 1, right, bottom), &mut touched);
        self.fill_span(Rect::new(left, top, left + 1, bottom), &mut touched);
        self.fill_span(Rect::new(right - 1, top, right, bottom), &mut touched);
        self.commit(touched);
    }

    fn fill_span(&mut self, rect: Rect, touched: &mut Touched) {
        let Some(clipped) = rect.intersect(&self.bounds()) else {
            return;
        };
        let value = self.pen.pixel();
        let stride = self.width as usize;
        for y in clipped.top..clipped.bottom {
            let row = y as usize * stride;
            self.pixels[row + clipped.left as usize..row + clipped.right as usize].fill(value);
        }
        touched.add_rect(clipped);
    }

    /// Clamp a 64-bit half-open box to the surface
    fn clip_wide(&self, left: i64, top: i64, right: i64, bottom: i64) -> Option<Rect> {
        let r = Rect::new(
            left.clamp(0, self.width as i64) as i32,
            top.clamp(0, self.height as i64) as i32,
            right.clamp(0, self.width as i64) as i32,
            bottom.clamp(0, self.height as i64) as i32,
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn draw_circle(&mut self, x: i32, y: i32, radius: i32) {
        self.draw_ellipse(x, y, radius, radius);
    }

    /// Hollow ellipse centred on (xc, yc) with semi-axes `a` and `b`; its
    /// bounding box is `(2a + 1) x (2b + 1)` pixels
    pub fn draw_ellipse(&mut self, xc: i32, yc: i32, a: i32, b: i32) {
        let value = self.pen.pixel();
        let mut touched = Touched::default();
        let (xc, yc) = (xc as i64, yc as i64);
        let (a, b) = (a.unsigned_abs() as i64, b.unsigned_abs() as i64);
        let (w, h) = (self.width as i64, self.height as i64);

        if xc + a < 0 || xc - a >= w || yc + b < 0 || yc - b >= h {
            return;
        }

        if a == 0 || b == 0 {
            // Degenerate: a straight segment through the centre
            if let Some(span) = self.clip_wide(xc - a, yc - b, xc + a + 1, yc + b + 1) {
                self.fill_span(span, &mut touched);
            }
            self.commit(touched);
            return;
        }

        let mut plot4 = |surface: &mut Surface, x: i128, y: i128| {
            let (x, y) = (x as i64, y as i64);
            surface.plot(xc + x, yc + y, value, &mut touched);
            surface.plot(xc - x, yc + y, value, &mut touched);
            surface.plot(xc + x, yc - y, value, &mut touched);
            surface.plot(xc - x, yc - y, value, &mut touched);
        };
        // x only grows: once both columns are off opposite sides, so is the
        // rest of the outline
        let columns_gone = |x: i128| xc - (x as i64) < 0 && xc + (x as i64) >= w;
        // y only shrinks in the second half: once both rows are off the
        // same side they stay there
        let rows_gone = |y: i128| yc + (y as i64) < 0 || yc - (y as i64) >= h;

        // Midpoint algorithm, decision variables scaled by 4
        let (a2, b2) = ((a as i128) * (a as i128), (b as i128) * (b as i128));
        let (mut x, mut y) = (0i128, b as i128);
        let mut d = 4 * b2 - 4 * a2 * y + a2;
        while b2 * x < a2 * y {
            if columns_gone(x) {
                break;
            }
            plot4(self, x, y);
            if d < 0 {
                d += 4 * b2 * (2 * x + 3);
            } else {
                d += 4 * (b2 * (2 * x + 3) + a2 * (2 - 2 * y));
                y -= 1;
            }
            x += 1;
        }

        d = b2 * (4 * x * x + 4 * x + 1) + 4 * a2 * (y - 1) * (y - 1) - 4 * a2 * b2;
        while y >= 0 {
            if columns_gone(x) || rows_gone(y) {
                break;
            }
            plot4(self, x, y);
            if d > 0 {
                d += 4 * a2 * (3 - 2 * y);
            } else {
                d += 4 * (b2 * (2 * x + 2) + a2 * (3 - 2 * y));
                x += 1;
            }
            y -= 1;
        }

        self.commit(touched);
    }

    /// Copy `area` into `dst`, a `width * scale` pixels wide buffer, zooming
    /// every source pixel to a `scale x scale` block
    pub fn blit_scaled(&self, area: Rect, scale: u32, dst: &mut [u32]) {
        let Some(area) = area.intersect(&self.bounds()) else {
            return;
        };
        let s = scale.max(1) as usize;
        let dst_stride = self.width as usize * s;
        for y in area.top as usize..area.bottom as usize {
            let src_row = &self.pixels[y * self.width as usize..(y + 1) * self.width as usize];
            for sy in 0..s {
                let dst_row = (y * s + sy) * dst_stride;
                for x in area.left as usize..area.right as usize {
                    let start = dst_row + x * s;
                    dst[start..start + s].fill(src_row[x]);
                }
            }
        }
    }
}

/// Steps `k` in `0..len` along a major axis that starts at `start` and
/// moves by `dir` whose coordinate `start + dir * k` lies in `0..size`
fn steps_on_surface(start: i64, dir: i64, len: i64, size: u32) -> Range<i64> {
    let size = size as i64;
    let (lo, hi) = if dir > 0 {
        (-start, size - start)
    } else {
        (start - size + 1, start + 1)
    };
    lo.max(0)..hi.min(len)
}

/// Minor-axis offset of the Bresenham pixel `k` steps along the major axis
fn minor_offset(k: i64, minor: i64, major: i64) -> i64 {
    let (k, minor, major) = (k as i128, minor as i128, major as i128);
    ((2 * k * minor + major) / (2 * major)) as i64
}
