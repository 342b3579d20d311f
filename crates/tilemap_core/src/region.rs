//! Cell rectangles and multi-rect regions
//!
//! A [`Region`] is a set of cells stored as sorted, merged horizontal spans per
//! row. Iteration is always in scan order: top to bottom, then left to right.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// An axis-aligned rectangle of cells. A non-positive width or height is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
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

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Number of cells covered
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left() && x < self.right() && y >= self.top() && y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::default();
        }
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersection(other).is_empty()
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Every cell in scan order
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let (left, right) = (self.left(), self.right());
        (self.top()..self.bottom()).flat_map(move |y| (left..right).map(move |x| (x, y)))
    }
}

/// Half-open run of cells `[start, end)` on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: i32,
    end: i32,
}

/// A set of cells, kept as merged horizontal spans per row.
///
/// Rows never hold empty span lists, so two regions covering the same cells
/// always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rows: BTreeMap<i32, Vec<Span>>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn add_cell(&mut self, x: i32, y: i32) {
        insert_span(self.rows.entry(y).or_default(), x, x + 1);
    }

    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        for y in rect.top()..rect.bottom() {
            insert_span(self.rows.entry(y).or_default(), rect.left(), rect.right());
        }
    }

    /// Add all cells of `other` to this region
    pub fn unite(&mut self, other: &Region) {
        for (&y, spans) in &other.rows {
            let row = self.rows.entry(y).or_default();
            for span in spans {
                insert_span(row, span.start, span.end);
            }
        }
    }

    pub fn united(&self, other: &Region) -> Region {
        let mut result = self.clone();
        result.unite(other);
        result
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rows.get(&y).is_some_and(|spans| {
            let index = spans.partition_point(|s| s.end <= x);
            spans.get(index).is_some_and(|s| s.start <= x)
        })
    }

    pub fn intersected(&self, other: &Region) -> Region {
        let mut rows = BTreeMap::new();
        for (&y, spans) in &self.rows {
            if let Some(other_spans) = other.rows.get(&y) {
                let common = intersect_spans(spans, other_spans);
                if !common.is_empty() {
                    rows.insert(y, common);
                }
            }
        }
        Region { rows }
    }

    pub fn intersected_rect(&self, rect: Rect) -> Region {
        let mut rows = BTreeMap::new();
        if rect.is_empty() {
            return Region { rows };
        }
        for (&y, spans) in self.rows.range(rect.top()..rect.bottom()) {
            let clipped: Vec<Span> = spans
                .iter()
                .filter_map(|s| {
                    let start = s.start.max(rect.left());
                    let end = s.end.min(rect.right());
                    (start < end).then_some(Span { start, end })
                })
                .collect();
            if !clipped.is_empty() {
                rows.insert(y, clipped);
            }
        }
        Region { rows }
    }

    pub fn intersects(&self, other: &Region) -> bool {
        let (small, large) = if self.rows.len() <= other.rows.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.rows.iter().any(|(y, spans)| {
            large
                .rows
                .get(y)
                .is_some_and(|other_spans| spans_overlap(spans, other_spans))
        })
    }

    pub fn intersects_rect(&self, rect: Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        self.rows
            .range(rect.top()..rect.bottom())
            .any(|(_, spans)| {
                spans
                    .iter()
                    .any(|s| s.start < rect.right() && rect.left() < s.end)
            })
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Region {
        let rows = self
            .rows
            .iter()
            .map(|(&y, spans)| {
                let moved = spans
                    .iter()
                    .map(|s| Span {
                        start: s.start + dx,
                        end: s.end + dx,
                    })
                    .collect();
                (y + dy, moved)
            })
            .collect();
        Region { rows }
    }

    /// Grow the region by `margin` cells in every direction (square neighbourhood)
    pub fn expanded(&self, margin: i32) -> Region {
        if margin <= 0 {
            return self.clone();
        }
        let mut result = Region::new();
        for rect in self.rects() {
            result.add_rect(Rect::new(
                rect.x - margin,
                rect.y - margin,
                rect.width + 2 * margin,
                rect.height + 2 * margin,
            ));
        }
        result
    }

    /// Smallest rectangle containing every cell, or an empty rect
    pub fn bounding_rect(&self) -> Rect {
        let (Some((&top, _)), Some((&last, _))) =
            (self.rows.first_key_value(), self.rows.last_key_value())
        else {
            return Rect::default();
        };
        let mut left = i32::MAX;
        let mut right = i32::MIN;
        for spans in self.rows.values() {
            if let (Some(first), Some(end)) = (spans.first(), spans.last()) {
                left = left.min(first.start);
                right = right.max(end.end);
            }
        }
        Rect::new(left, top, right - left, last + 1 - top)
    }

    /// One-row rectangles covering the region, in scan order
    pub fn rects(&self) -> impl Iterator<Item = Rect> + '_ {
        self.rows.iter().flat_map(|(&y, spans)| {
            spans
                .iter()
                .map(move |s| Rect::new(s.start, y, s.end - s.start, 1))
        })
    }

    /// Every cell in scan order
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.rows.iter().flat_map(|(&y, spans)| {
            spans
                .iter()
                .flat_map(move |s| (s.start..s.end).map(move |x| (x, y)))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.rows
            .values()
            .flatten()
            .map(|s| (s.end - s.start) as usize)
            .sum()
    }

    /// Split the region into 4-connected components.
    ///
    /// Components are ordered by their first cell in scan order.
    pub fn connected_components(&self) -> Vec<Region> {
        let mut visited: HashSet<(i32, i32)> = HashSet::new();
        let mut components = Vec::new();

        for (x, y) in self.cells() {
            if visited.contains(&(x, y)) {
                continue;
            }

            let mut component = Region::new();
            let mut stack = vec![(x, y)];
            while let Some((cx, cy)) = stack.pop() {
                if !self.contains(cx, cy) || !visited.insert((cx, cy)) {
                    continue;
                }
                component.add_cell(cx, cy);
                stack.extend([(cx - 1, cy), (cx + 1, cy), (cx, cy - 1), (cx, cy + 1)]);
            }
            components.push(component);
        }

        components
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

/// Insert `[start, end)` into a sorted span list, merging overlapping and
/// touching spans.
fn insert_span(row: &mut Vec<Span>, start: i32, end: i32) {
    if start >= end {
        return;
    }
    let mut start = start;
    let mut end = end;
    let first = row.partition_point(|s| s.end < start);
    let mut last = first;
    while last < row.len() && row[last].start <= end {
        start = start.min(row[last].start);
        end = end.max(row[last].end);
        last += 1;
    }
    row.splice(first..last, std::iter::once(Span { start, end }));
}

fn intersect_spans(a: &[Span], b: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            result.push(Span { start, end });
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

fn spans_overlap(a: &[Span], b: &[Span]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].start.max(b[j].start) < a[i].end.min(b[j].end) {
            return true;
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}
