/// Axis-aligned pixel rectangle. A zero-area rectangle means "not found".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return Rect::default();
        }
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Restricts the rectangle to a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        self.intersection(&Rect::new(0, 0, width as i32, height as i32))
    }

    /// Maps coordinates from a uniformly scaled image back to this one.
    pub fn unscale(&self, factor: f64) -> Rect {
        if factor <= 0.0 {
            return *self;
        }
        Rect::new(
            (self.x as f64 / factor).round() as i32,
            (self.y as f64 / factor).round() as i32,
            (self.width as f64 / factor).round() as i32,
            (self.height as f64 / factor).round() as i32,
        )
    }

    pub fn iou(&self, other: &Rect) -> f64 {
        let inter = self.intersection(other).area() as f64;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() as f64 + other.area() as f64 - inter)
    }

    /// The candidate with the largest area; earlier entries win ties.
    pub fn largest<'a, I>(rects: I) -> Option<&'a Rect>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        rects.into_iter().fold(None, |best: Option<&Rect>, r| match best {
            Some(b) if b.area() >= r.area() => Some(b),
            _ => Some(r),
        })
    }
}
