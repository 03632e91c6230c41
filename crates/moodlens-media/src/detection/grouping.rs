//! Merging of overlapping raw detections.
//!
//! Sliding-window detectors fire several times around every true object.
//! Hits are clustered by similarity, clusters with too few members are
//! dropped, the survivors are averaged, and small clusters sitting inside a
//! stronger one are suppressed.

use moodlens_models::Rect;

/// Relative tolerance for two hits to land in the same cluster.
pub const GROUP_EPS: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
struct IRect {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl From<&Rect> for IRect {
    fn from(r: &Rect) -> Self {
        Self {
            x: r.x as i64,
            y: r.y as i64,
            w: r.width as i64,
            h: r.height as i64,
        }
    }
}

fn similar(a: &IRect, b: &IRect, eps: f64) -> bool {
    let delta = eps * (a.w.min(b.w) + a.h.min(b.h)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.x + a.w - b.x - b.w).abs() as f64 <= delta
        && (a.y + a.h - b.y - b.h).abs() as f64 <= delta
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Cluster `rects` and keep groups with more than `min_neighbors` members.
///
/// With `min_neighbors == 0` the input is returned unchanged.
pub fn group_rectangles(rects: &[Rect], min_neighbors: u32, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let items: Vec<IRect> = rects.iter().map(IRect::from).collect();
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&items[i], &items[j], eps) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    // Root -> (sum x, sum y, sum w, sum h, count)
    let mut label_of = vec![usize::MAX; n];
    let mut sums: Vec<[i64; 5]> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        if label_of[root] == usize::MAX {
            label_of[root] = sums.len();
            sums.push([0; 5]);
        }
        let acc = &mut sums[label_of[root]];
        acc[0] += items[i].x;
        acc[1] += items[i].y;
        acc[2] += items[i].w;
        acc[3] += items[i].h;
        acc[4] += 1;
    }

    let averaged: Vec<(IRect, i64)> = sums
        .iter()
        .map(|s| {
            let count = s[4] as f64;
            let avg = |v: i64| (v as f64 / count).round() as i64;
            (
                IRect {
                    x: avg(s[0]),
                    y: avg(s[1]),
                    w: avg(s[2]),
                    h: avg(s[3]),
                },
                s[4],
            )
        })
        .collect();

    let threshold = min_neighbors as i64;
    let mut out = Vec::new();
    for (i, (r1, n1)) in averaged.iter().enumerate() {
        if *n1 <= threshold {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, (r2, n2))| {
            if i == j || *n2 <= threshold {
                return false;
            }
            let dx = (r2.w as f64 * eps).round() as i64;
            let dy = (r2.h as f64 * eps).round() as i64;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.x + r1.w <= r2.x + r2.w + dx
                && r1.y + r1.h <= r2.y + r2.h + dy
                && (*n2 > (*n1).max(3) || *n1 < 3)
        });
        if !swallowed {
            out.push(Rect::new(
                r1.x.max(0) as u32,
                r1.y.max(0) as u32,
                r1.w.max(0) as u32,
                r1.h.max(0) as u32,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_neighbors_is_passthrough() {
        let rects = vec![Rect::new(0, 0, 10, 10), Rect::new(100, 100, 10, 10)];
        assert_eq!(group_rectangles(&rects, 0, GROUP_EPS), rects);
    }

    #[test]
    fn test_cluster_is_averaged() {
        let rects = vec![
            Rect::new(100, 100, 50, 50),
            Rect::new(102, 101, 50, 50),
            Rect::new(98, 99, 50, 50),
            Rect::new(101, 100, 52, 52),
        ];
        let grouped = group_rectangles(&rects, 2, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        let r = grouped[0];
        assert!((99..=101).contains(&r.x));
        assert!((50..=51).contains(&r.width));
    }

    #[test]
    fn test_sparse_hits_are_dropped() {
        let mut rects = vec![Rect::new(0, 0, 40, 40)];
        for i in 0..4 {
            rects.push(Rect::new(200 + i, 200, 40, 40));
        }
        let grouped = group_rectangles(&rects, 3, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].x >= 200);
    }

    #[test]
    fn test_weak_cluster_inside_strong_one_is_suppressed() {
        let mut rects = Vec::new();
        for i in 0..8 {
            rects.push(Rect::new(100 + i % 2, 100, 100, 100));
        }
        for i in 0..2 {
            rects.push(Rect::new(130 + i, 130, 30, 30));
        }
        let grouped = group_rectangles(&rects, 1, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].width, 100);
    }
}
