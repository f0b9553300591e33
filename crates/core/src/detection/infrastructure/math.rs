//! Union-find clustering and the detection grouping built on it.

use crate::shared::rect::Rect;

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Two detections describe the same object when every edge is within
/// `eps` of the mean of their smaller sides.
fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: i32, q: i32| ((p - q).abs() as f64) <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

/// Merges raw sliding-window hits into one rectangle per object.
///
/// Hits are clustered transitively by similarity, each cluster is averaged,
/// and clusters with `min_neighbors` or fewer members are dropped. A
/// cluster lying inside a stronger one is dropped too. `min_neighbors == 0`
/// returns the hits unchanged.
pub fn group_rectangles(rects: &[Rect], min_neighbors: u32, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                union(&mut parent, i, j);
            }
        }
    }

    // Classes numbered by first appearance for deterministic output.
    let mut class_of_root = vec![usize::MAX; rects.len()];
    let mut sums: Vec<[i64; 4]> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for (i, r) in rects.iter().enumerate() {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = sums.len();
            sums.push([0; 4]);
            counts.push(0);
        }
        let c = class_of_root[root];
        sums[c][0] += r.x as i64;
        sums[c][1] += r.y as i64;
        sums[c][2] += r.width as i64;
        sums[c][3] += r.height as i64;
        counts[c] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Rect::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find_transitive() {
        let mut parent = vec![0, 1, 2];
        union(&mut parent, 0, 1);
        union(&mut parent, 1, 2);
        assert_eq!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_union_find_separate() {
        let mut parent = vec![0, 1, 2, 3];
        union(&mut parent, 0, 1);
        union(&mut parent, 2, 3);
        assert_ne!(find(&mut parent, 0), find(&mut parent, 2));
    }

    // ── Grouping ─────────────────────────────────────────────────────

    #[test]
    fn test_cluster_is_averaged_and_lonely_hit_dropped() {
        let rects = [
            Rect::new(10, 10, 50, 50),
            Rect::new(11, 10, 50, 50),
            Rect::new(200, 200, 50, 50),
            Rect::new(10, 11, 50, 51),
        ];
        assert_eq!(group_rectangles(&rects, 2, 0.2), vec![Rect::new(10, 10, 50, 50)]);
    }

    #[test]
    fn test_zero_neighbours_keeps_raw_hits() {
        let rects = [Rect::new(0, 0, 10, 10), Rect::new(1, 1, 10, 10)];
        assert_eq!(group_rectangles(&rects, 0, 0.2), rects.to_vec());
    }

    #[test]
    fn test_cluster_needs_more_than_min_neighbours() {
        let rects = [Rect::new(10, 10, 50, 50), Rect::new(11, 10, 50, 50)];
        assert!(group_rectangles(&rects, 2, 0.2).is_empty());
        assert_eq!(group_rectangles(&rects, 1, 0.2).len(), 1);
    }

    #[test]
    fn test_weak_cluster_inside_strong_one_is_dropped() {
        let mut rects = vec![Rect::new(30, 30, 20, 20); 3];
        rects.extend(vec![Rect::new(0, 0, 100, 100); 5]);
        assert_eq!(group_rectangles(&rects, 1, 0.2), vec![Rect::new(0, 0, 100, 100)]);
    }

    #[test]
    fn test_similarity_is_transitive() {
        // 0~1 and 1~2 but 0 and 2 are too far apart on their own.
        let rects = [
            Rect::new(0, 0, 40, 40),
            Rect::new(6, 0, 40, 40),
            Rect::new(12, 0, 40, 40),
        ];
        assert_eq!(group_rectangles(&rects, 2, 0.2), vec![Rect::new(6, 0, 40, 40)]);
    }
}
