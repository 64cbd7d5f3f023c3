// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Scroll positioning for fixed-size lists.
//!
//! The same computation drives the vertical category and channel columns and the
//! horizontal EPG strip. Sizes are abstract units; the terminal UI uses cells.

use std::ops::Range;

/// Vertical list metrics for the channel column.
pub const CHANNEL_ROW: Metrics = Metrics {
    item_size: 6.0,
    gap: 0.5,
};

/// Horizontal EPG card metrics.
pub const EPG_CARD: Metrics = Metrics {
    item_size: 30.0,
    gap: 0.4,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub item_size: f64,
    pub gap: f64,
}

impl Metrics {
    pub fn stride(&self) -> f64 {
        self.item_size + self.gap
    }

    pub fn offset(&self, focused_index: usize, container_size: f64, item_count: usize) -> f64 {
        offset(
            focused_index,
            self.item_size,
            self.gap,
            container_size,
            item_count,
        )
    }
}

/// Scroll offset that keeps `focused_index` visible.
///
/// Always `<= 0`; its magnitude never exceeds the overflow of the content past the
/// container, so the list stays pinned once the last page is reached.
pub fn offset(
    focused_index: usize,
    item_size: f64,
    gap: f64,
    container_size: f64,
    item_count: usize,
) -> f64 {
    if item_count == 0 {
        return 0.0;
    }

    let stride = item_size + gap;
    let content_size = item_count as f64 * stride - gap;
    if content_size <= container_size {
        return 0.0;
    }

    let desired = focused_index as f64 * stride;
    let max_scroll = content_size - container_size;
    -desired.min(max_scroll)
}

/// Index of the first item whose leading edge is at or past the scroll offset.
pub fn first_visible_index(offset: f64, stride: f64) -> usize {
    if stride <= 0.0 || offset >= 0.0 {
        return 0;
    }
    (-offset / stride).floor() as usize
}

/// Item range to render for a list drawn in whole terminal cells.
///
/// `rows_per_item` is the height (or width) of one item in cells; items are drawn
/// without gaps.
pub fn visible_range(
    focused_index: usize,
    item_count: usize,
    container_cells: u16,
    rows_per_item: u16,
) -> Range<usize> {
    let per_item = rows_per_item.max(1) as f64;
    let scroll = offset(
        focused_index,
        per_item,
        0.0,
        container_cells as f64,
        item_count,
    );
    let start = first_visible_index(scroll, per_item);
    let fits = (container_cells as usize / rows_per_item.max(1) as usize).max(1);
    start..(start + fits).min(item_count)
}

/// Dimming applied to a row relative to the focused row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEmphasis {
    Focused,
    /// Scrolled past, drawn faintest
    Above,
    Below,
    /// Focus is on the final page, so nothing is dimmed as "above"
    LastPage,
}

impl RowEmphasis {
    pub fn for_row(
        index: usize,
        focused_index: usize,
        item_count: usize,
        visible_count: usize,
    ) -> Self {
        if index == focused_index {
            return RowEmphasis::Focused;
        }
        let last_page_start = item_count.saturating_sub(visible_count);
        if focused_index >= last_page_start {
            RowEmphasis::LastPage
        } else if index < focused_index {
            RowEmphasis::Above
        } else {
            RowEmphasis::Below
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            RowEmphasis::Focused => 1.0,
            RowEmphasis::Above => 0.4,
            RowEmphasis::Below | RowEmphasis::LastPage => 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_column_window() {
        assert_eq!(offset(15, 6.0, 0.5, 30.0, 20), -97.5);
        assert_eq!(CHANNEL_ROW.offset(15, 30.0, 20), -97.5);
    }

    #[test]
    fn test_no_scroll_when_content_fits() {
        assert_eq!(offset(3, 6.0, 0.5, 30.0, 4), 0.0);
        assert_eq!(offset(0, 6.0, 0.5, 30.0, 0), 0.0);
    }

    #[test]
    fn test_clamped_to_last_page() {
        // content = 129.5, container = 30, max scroll = 99.5
        assert_eq!(offset(19, 6.0, 0.5, 30.0, 20), -99.5);
    }

    #[test]
    fn test_offset_bounds_hold_for_all_positions() {
        for count in 0..40usize {
            for focus in 0..count.max(1) {
                for container in [5.0, 12.0, 30.0, 100.0] {
                    let o = offset(focus, 6.0, 0.5, container, count);
                    let content = count as f64 * 6.5 - 0.5;
                    let max_scroll = (content - container).max(0.0);
                    assert!(o <= 0.0);
                    assert!(-o <= max_scroll + f64::EPSILON);
                }
            }
        }
    }

    #[test]
    fn test_horizontal_epg_strip() {
        // 10 cards of 30 with gap 0.4 in a 100-wide strip
        let o = EPG_CARD.offset(2, 100.0, 10);
        assert!((o + 60.8).abs() < 1e-9);
    }

    #[test]
    fn test_visible_range_in_cells() {
        assert_eq!(visible_range(0, 50, 10, 1), 0..10);
        assert_eq!(visible_range(12, 50, 10, 1), 12..22);
        assert_eq!(visible_range(49, 50, 10, 1), 40..50);
        assert_eq!(visible_range(3, 5, 10, 1), 0..5);
        assert_eq!(visible_range(0, 0, 10, 1), 0..0);
    }

    #[test]
    fn test_row_emphasis() {
        assert_eq!(RowEmphasis::for_row(5, 5, 20, 5), RowEmphasis::Focused);
        assert_eq!(RowEmphasis::for_row(2, 5, 20, 5), RowEmphasis::Above);
        assert_eq!(RowEmphasis::for_row(7, 5, 20, 5), RowEmphasis::Below);
        assert_eq!(RowEmphasis::for_row(14, 17, 20, 5), RowEmphasis::LastPage);
        assert_eq!(RowEmphasis::Above.opacity(), 0.4);
    }
}
