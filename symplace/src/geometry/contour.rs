/// One horizontal interval `[start, end)` of a skyline at a fixed height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContourSegment {
    pub start: i64,
    pub end: i64,
    pub height: i64,
}

/// Skyline of packed rectangles projected onto one axis.
///
/// Segments are kept sorted by `start`, non-overlapping, with adjacent
/// equal-height segments fused. Queries and updates locate the affected
/// range by binary search.
///
/// Two instances are maintained per tree: one over x-intervals yielding
/// the maximum y (used to place modules on top of already-placed ones),
/// and a transposed one over y-intervals yielding the maximum x.
#[derive(Clone, Debug, Default)]
pub struct Contour {
    segments: Vec<ContourSegment>,
    max_coordinate: i64,
    max_height: i64,
}

impl Contour {
    pub fn new() -> Self {
        Contour::default()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.max_coordinate = 0;
        self.max_height = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ContourSegment] {
        &self.segments
    }

    /// Largest `end` coordinate ever inserted.
    pub fn max_coordinate(&self) -> i64 {
        self.max_coordinate
    }

    /// Largest height ever inserted.
    pub fn max_height(&self) -> i64 {
        self.max_height
    }

    /// Maximum height of any segment intersecting `[start, end)`,
    /// or 0 when nothing intersects.
    pub fn get_height(&self, start: i64, end: i64) -> i64 {
        if start >= end {
            return 0;
        }
        // first segment that ends after `start`
        let mut i = self.segments.partition_point(|s| s.end <= start);
        let mut max = 0;
        while let Some(s) = self.segments.get(i) {
            if s.start >= end {
                break;
            }
            max = max.max(s.height);
            i += 1;
        }
        max
    }

    /// Inserts `[start, end) -> height`, overriding whatever the skyline
    /// held there. Partially overlapped segments are split so their parts
    /// outside `[start, end)` keep their original heights.
    ///
    /// `start >= end` is a silent no-op.
    pub fn add_segment(&mut self, start: i64, end: i64, height: i64) {
        if start >= end {
            return;
        }
        self.max_coordinate = self.max_coordinate.max(end);
        self.max_height = self.max_height.max(height);

        // range of segments overlapping [start, end)
        let lo = self.segments.partition_point(|s| s.end <= start);
        let hi = self.segments.partition_point(|s| s.start < end);

        let mut replacement = Vec::with_capacity(3);
        if lo < hi {
            let first = self.segments[lo];
            if first.start < start {
                replacement.push(ContourSegment {
                    start: first.start,
                    end: start,
                    height: first.height,
                });
            }
        }
        replacement.push(ContourSegment { start, end, height });
        if lo < hi {
            let last = self.segments[hi - 1];
            if last.end > end {
                replacement.push(ContourSegment {
                    start: end,
                    end: last.end,
                    height: last.height,
                });
            }
        }
        self.segments.splice(lo..hi, replacement);
        self.fuse_segments();
    }

    /// Raises the skyline to at least `height` over `[start, end)`,
    /// leaving taller parts untouched (pointwise maximum with a single
    /// segment).
    pub fn raise(&mut self, start: i64, end: i64, height: i64) {
        if start >= end {
            return;
        }
        // sub-ranges currently below `height`, including gaps (height 0)
        let mut spans: Vec<(i64, i64)> = Vec::new();
        let mut push = |spans: &mut Vec<(i64, i64)>, from: i64, to: i64| {
            if from >= to {
                return;
            }
            match spans.last_mut() {
                Some(last) if last.1 == from => last.1 = to,
                _ => spans.push((from, to)),
            }
        };

        let mut cursor = start;
        let mut i = self.segments.partition_point(|s| s.end <= start);
        while cursor < end {
            match self.segments.get(i) {
                Some(s) if s.start < end => {
                    if s.start > cursor {
                        push(&mut spans, cursor, s.start);
                    }
                    let from = s.start.max(cursor);
                    let to = s.end.min(end);
                    if s.height < height {
                        push(&mut spans, from, to);
                    }
                    cursor = to;
                    i += 1;
                }
                _ => {
                    push(&mut spans, cursor, end);
                    cursor = end;
                }
            }
        }
        for (from, to) in spans {
            self.add_segment(from, to, height);
        }
    }

    /// Pointwise maximum of two skylines.
    pub fn merge(&mut self, other: &Contour) {
        for s in &other.segments {
            self.raise(s.start, s.end, s.height);
        }
    }

    /// Fuses adjacent segments of equal height.
    fn fuse_segments(&mut self) {
        if self.segments.len() <= 1 {
            return;
        }
        let mut fused: Vec<ContourSegment> = Vec::with_capacity(self.segments.len());
        for &s in &self.segments {
            match fused.last_mut() {
                Some(last) if last.end == s.start && last.height == s.height => last.end = s.end,
                _ => fused.push(s),
            }
        }
        self.segments = fused;
    }
}
