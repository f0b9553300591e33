use crate::shared::rect::Rect;

/// Drops candidates whose area is at least `max_ratio` of the face area.
pub fn drop_oversized(eyes: &mut Vec<Rect>, face: &Rect, max_ratio: f64) {
    let face_area = face.area() as f64;
    if face_area <= 0.0 {
        eyes.clear();
        return;
    }
    eyes.retain(|eye| (eye.area() as f64 / face_area) < max_ratio);
}

/// When one side has several candidates and the other has at least one,
/// keeps the left/right pair whose areas are closest.
pub fn pair_by_symmetry(left: &mut Vec<Rect>, right: &mut Vec<Rect>) {
    let ambiguous = (!left.is_empty() && right.len() > 1) || (left.len() > 1 && !right.is_empty());
    if !ambiguous {
        return;
    }

    let mut best = (0, 0);
    let mut closest = i64::MAX;
    for (li, l) in left.iter().enumerate() {
        for (ri, r) in right.iter().enumerate() {
            let diff = (l.area() - r.area()).abs();
            if diff < closest {
                closest = diff;
                best = (li, ri);
            }
        }
    }

    let (l, r) = (left[best.0], right[best.1]);
    *left = vec![l];
    *right = vec![r];
}

/// Filters both sides and returns the chosen eye per side.
pub fn select_eyes(
    left: &mut Vec<Rect>,
    right: &mut Vec<Rect>,
    face: &Rect,
    max_ratio: f64,
) -> (Option<Rect>, Option<Rect>) {
    drop_oversized(left, face, max_ratio);
    drop_oversized(right, face, max_ratio);
    pair_by_symmetry(left, right);
    (left.first().copied(), right.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, side: i32) -> Rect {
        Rect::new(x, 0, side, side)
    }

    #[test]
    fn test_oversized_eyes_dropped() {
        let face = Rect::new(0, 0, 100, 100);
        let mut eyes = vec![square(0, 31), square(1, 32), square(2, 20)];
        drop_oversized(&mut eyes, &face, 0.1);
        assert_eq!(eyes, vec![square(0, 31), square(2, 20)]);
    }

    #[test]
    fn test_ratio_at_threshold_is_dropped() {
        let face = Rect::new(0, 0, 100, 100);
        let mut eyes = vec![Rect::new(0, 0, 100, 10)];
        drop_oversized(&mut eyes, &face, 0.1);
        assert!(eyes.is_empty());
    }

    #[test]
    fn test_symmetry_picks_closest_areas() {
        let mut left = vec![square(0, 10), square(1, 25)];
        let mut right = vec![square(2, 24)];
        pair_by_symmetry(&mut left, &mut right);
        assert_eq!(left, vec![square(1, 25)]);
        assert_eq!(right, vec![square(2, 24)]);
    }

    #[test]
    fn test_symmetry_leaves_unambiguous_sides_alone() {
        let mut left = vec![square(0, 10), square(1, 25)];
        let mut right = vec![];
        pair_by_symmetry(&mut left, &mut right);
        assert_eq!(left.len(), 2);
        assert!(right.is_empty());
    }

    #[test]
    fn test_select_eyes() {
        let face = Rect::new(0, 0, 200, 200);
        let mut left = vec![square(0, 150), square(1, 30)];
        let mut right = vec![square(2, 29), square(3, 12)];
        let (l, r) = select_eyes(&mut left, &mut right, &face, 0.1);
        assert_eq!(l, Some(square(1, 30)));
        assert_eq!(r, Some(square(2, 29)));
    }

    #[test]
    fn test_select_eyes_none_found() {
        let face = Rect::new(0, 0, 200, 200);
        let (l, r) = select_eyes(&mut vec![], &mut vec![square(0, 20)], &face, 0.1);
        assert_eq!(l, None);
        assert_eq!(r, Some(square(0, 20)));
    }
}
