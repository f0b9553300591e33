//! Debug drawing on BGR frames.

use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

fn put(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x >= frame.width() as i32 || y >= frame.height() as i32 {
        return;
    }
    let ch = frame.channels() as usize;
    let offset = (y as usize * frame.width() as usize + x as usize) * ch;
    let data = frame.data_mut();
    for (c, value) in color.iter().enumerate().take(ch) {
        data[offset + c] = *value;
    }
}

/// Rectangle outline `thickness` pixels wide, drawn inwards.
pub fn draw_rect(frame: &mut Frame, rect: &Rect, color: [u8; 3], thickness: i32) {
    if rect.is_empty() {
        return;
    }
    for t in 0..thickness.min(rect.width / 2 + 1).min(rect.height / 2 + 1) {
        let (x0, y0) = (rect.x + t, rect.y + t);
        let (x1, y1) = (rect.right() - 1 - t, rect.bottom() - 1 - t);
        for x in x0..=x1 {
            put(frame, x, y0, color);
            put(frame, x, y1, color);
        }
        for y in y0..=y1 {
            put(frame, x0, y, color);
            put(frame, x1, y, color);
        }
    }
}

/// One-pixel circle outline (midpoint algorithm).
pub fn draw_circle(frame: &mut Frame, center: (i32, i32), radius: i32, color: [u8; 3]) {
    let (cx, cy) = center;
    if radius <= 0 {
        put(frame, cx, cy, color);
        return;
    }
    let (mut x, mut y, mut err) = (radius, 0, 1 - radius);
    while x >= y {
        for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            put(frame, cx + dx, cy + dy, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Circle marking a chosen eye: centred on the box, radius 0.15 * (w + h).
pub fn draw_eye(frame: &mut Frame, eye: &Rect, color: [u8; 3]) {
    let (cx, cy) = eye.center();
    let radius = ((eye.width + eye.height) as f64 * 0.15).round() as i32;
    draw_circle(frame, (cx as i32, cy as i32), radius, color);
}
