//! Pixel geometry of a windowed grid and the resident index range derived from it.
//!
//! Scroll offsets are in master-catalog pixel space: row `r` of the full
//! catalog starts at `r * cell_height`.

/// Visible area of a scrollable grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scroll_y: u64,
}

/// Geometry provider for a windowed view.
pub trait ViewportGeometry {
    fn viewport(&self) -> Viewport;
    /// Width and height of one cell in pixels.
    fn cell_size(&self) -> (u32, u32);
    /// Scrolls so that `y` is the top edge. Expected to raise a scroll event.
    fn scroll_to(&self, y: u64);
}

/// Inclusive master-index range resident in a windowed view's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailWindow {
    pub first: usize,
    pub last: usize,
    pub columns: usize,
}

impl ThumbnailWindow {
    /// Number of resident items; a window always holds at least one.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }

    /// Offset of `index` from the window start.
    pub fn relative(&self, index: usize) -> Option<usize> {
        self.contains(index).then(|| index - self.first)
    }
}

/// Columns rendered for a viewport; never less than one.
pub fn columns_for(viewport_width: u32, cell_width: u32) -> usize {
    if cell_width == 0 {
        return 1;
    }
    ((viewport_width / cell_width) as usize).max(1)
}

pub fn first_visible_row(scroll_y: u64, cell_height: u32) -> usize {
    if cell_height == 0 {
        return 0;
    }
    (scroll_y / cell_height as u64) as usize
}

/// Rows that are at least partly on screen; never less than one.
pub fn visible_rows(viewport_height: u32, cell_height: u32) -> usize {
    if cell_height == 0 {
        return 1;
    }
    (viewport_height.div_ceil(cell_height) as usize).max(1)
}

/// Row holding master index `index`.
pub fn row_of(index: usize, columns: usize) -> usize {
    index / columns.max(1)
}

/// Whether master row `row` is fully inside the viewport.
pub fn is_row_visible(row: usize, viewport: &Viewport, cell_height: u32) -> bool {
    let top = row as u64 * cell_height as u64;
    let bottom = top + cell_height as u64;
    top >= viewport.scroll_y && bottom <= viewport.scroll_y + viewport.height as u64
}

/// The resident range for a catalog of `len` items.
///
/// Anchored at the first on-screen index, it reaches `preload_rows` rows
/// back and `max(preload_rows, visible rows)` rows forward, clamped to the
/// catalog. `None` for an empty catalog.
///
/// The forward reach is deliberately larger than the backward one: it always
/// covers at least one full screen, so every visible row is resident.
pub fn compute_window(
    len: usize,
    viewport: &Viewport,
    cell_size: (u32, u32),
    preload_rows: usize,
) -> Option<ThumbnailWindow> {
    if len == 0 {
        return None;
    }
    let (cell_width, cell_height) = cell_size;
    let columns = columns_for(viewport.width, cell_width);
    let last_index = len - 1;

    let anchor = first_visible_row(viewport.scroll_y, cell_height)
        .saturating_mul(columns)
        .min(last_index);
    let behind = preload_rows.saturating_mul(columns);
    let ahead = preload_rows
        .max(visible_rows(viewport.height, cell_height))
        .saturating_mul(columns);

    Some(ThumbnailWindow {
        first: anchor.saturating_sub(behind),
        last: anchor.saturating_add(ahead).min(last_index),
        columns,
    })
}
