//! Palette paginator - filtered, paged view of the discovered names.

use serde::{Deserialize, Serialize};

use crate::{DiscoverySet, ElementName};

/// Palette geometry. Page capacity is derived from the available width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteLayout {
    /// Height of the palette region at the bottom of the viewport.
    pub height: f32,
    /// Grid rows per page.
    pub rows: usize,
    /// Width of one grid cell.
    pub cell_width: f32,
    /// Height of one grid cell.
    pub cell_height: f32,
    /// Horizontal padding on each side of the grid.
    pub padding: f32,
    /// Space between the top of the palette and the first grid row.
    pub header_height: f32,
}

impl Default for PaletteLayout {
    fn default() -> Self {
        Self {
            height: 256.0,
            rows: 3,
            cell_width: 80.0,
            cell_height: 48.0,
            padding: 16.0,
            header_height: 36.0,
        }
    }
}

impl PaletteLayout {
    /// Grid columns that fit in the given width (at least one).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn columns(&self, width: f32) -> usize {
        let usable = (width - 2.0 * self.padding).max(0.0);
        ((usable / self.cell_width).floor() as usize).max(1)
    }

    /// Entries per page for the given width.
    #[must_use]
    pub fn capacity(&self, width: f32) -> usize {
        self.rows.max(1) * self.columns(width)
    }

    /// Check whether a point lies in the palette region.
    #[must_use]
    pub fn contains(&self, y: f32, viewport_height: f32) -> bool {
        y > viewport_height - self.height
    }

    /// Grid slot (index within a page) under a point, if any.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn slot_at(&self, x: f32, y: f32, width: f32, viewport_height: f32) -> Option<usize> {
        let local_x = x - self.padding;
        let local_y = y - (viewport_height - self.height + self.header_height);
        if local_x < 0.0 || local_y < 0.0 {
            return None;
        }
        let column = (local_x / self.cell_width).floor() as usize;
        let row = (local_y / self.cell_height).floor() as usize;
        if column >= self.columns(width) || row >= self.rows {
            return None;
        }
        Some(row * self.columns(width) + column)
    }
}

/// Paging and filter state of the palette.
#[derive(Debug, Clone)]
pub struct Palette {
    layout: PaletteLayout,
    width: f32,
    filter: Option<char>,
    page: usize,
    translate: f32,
    /// Page count at the last refresh.
    page_count: usize,
    /// Discovery count at the last refresh.
    discovered_len: usize,
}

impl Palette {
    /// Create a palette on page 0 for the given width.
    #[must_use]
    pub fn new(layout: PaletteLayout, width: f32, discovered: &DiscoverySet) -> Self {
        let mut palette = Self {
            layout,
            width,
            filter: None,
            page: 0,
            translate: 0.0,
            page_count: 1,
            discovered_len: discovered.len(),
        };
        palette.page_count = palette.count_pages(discovered);
        palette
    }

    /// Palette geometry.
    #[must_use]
    pub const fn layout(&self) -> &PaletteLayout {
        &self.layout
    }

    /// Active page index.
    #[must_use]
    pub const fn active_page(&self) -> usize {
        self.page
    }

    /// Page count as of the last refresh.
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Current swipe offset (raw horizontal delta, unclamped).
    #[must_use]
    pub const fn translate(&self) -> f32 {
        self.translate
    }

    /// Active filter character.
    #[must_use]
    pub const fn filter(&self) -> Option<char> {
        self.filter
    }

    /// Entries per page at the current width.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.layout.capacity(self.width)
    }

    /// Discovered names passing the filter, in discovery order.
    #[must_use]
    pub fn filtered<'a>(&self, discovered: &'a DiscoverySet) -> Vec<&'a ElementName> {
        match self.filter {
            Some(ch) => {
                let prefix = ch.to_string();
                discovered
                    .iter()
                    .filter(|name| name.starts_with_ignore_case(&prefix))
                    .collect()
            }
            None => discovered.iter().collect(),
        }
    }

    /// All pages. There is always at least one page, possibly empty.
    #[must_use]
    pub fn pages<'a>(&self, discovered: &'a DiscoverySet) -> Vec<Vec<&'a ElementName>> {
        let filtered = self.filtered(discovered);
        if filtered.is_empty() {
            return vec![Vec::new()];
        }
        filtered
            .chunks(self.capacity())
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Entries of the active page.
    #[must_use]
    pub fn active_entries<'a>(&self, discovered: &'a DiscoverySet) -> Vec<&'a ElementName> {
        self.pages(discovered)
            .into_iter()
            .nth(self.page)
            .unwrap_or_default()
    }

    fn count_pages(&self, discovered: &DiscoverySet) -> usize {
        self.filtered(discovered).len().div_ceil(self.capacity()).max(1)
    }

    /// Recompute paging after the discovered set or the layout changed.
    ///
    /// Jumps to the new last page only when the page count grew because the
    /// discovery count grew; otherwise only clamps. Returns the new page if
    /// it changed.
    pub fn refresh(&mut self, discovered: &DiscoverySet) -> Option<usize> {
        let count = self.count_pages(discovered);
        let len = discovered.len();
        let mut page = self.page;
        if count > self.page_count && len > self.discovered_len {
            page = count - 1;
        }
        page = page.min(count - 1);
        self.page_count = count;
        self.discovered_len = len;
        self.set_active(page)
    }

    /// Set or clear the filter. Always returns to page 0.
    pub fn set_filter(&mut self, filter: Option<char>, discovered: &DiscoverySet) -> Option<usize> {
        self.filter = filter;
        self.page_count = self.count_pages(discovered);
        self.discovered_len = discovered.len();
        tracing::debug!("Palette filter {filter:?}, {} pages", self.page_count);
        self.set_active(0)
    }

    /// Change the available width. Never jumps pages, only clamps.
    pub fn resize(&mut self, width: f32, discovered: &DiscoverySet) -> Option<usize> {
        self.width = width;
        self.discovered_len = discovered.len();
        self.page_count = self.count_pages(discovered);
        let page = self.page.min(self.page_count - 1);
        self.set_active(page)
    }

    /// Jump to a page, clamped into range.
    pub fn set_page(&mut self, page: usize) -> Option<usize> {
        self.set_active(page.min(self.page_count - 1))
    }

    fn set_active(&mut self, page: usize) -> Option<usize> {
        if page == self.page {
            None
        } else {
            self.page = page;
            Some(page)
        }
    }

    /// Track an in-progress swipe.
    pub fn swipe_to(&mut self, dx: f32) {
        self.translate = dx;
    }

    /// Finish a swipe: flip one page if `|dx|` exceeds the threshold,
    /// otherwise snap back. The offset resets either way.
    pub fn end_swipe(&mut self, dx: f32, threshold: f32) -> Option<usize> {
        self.translate = 0.0;
        if dx > threshold && self.page > 0 {
            self.set_active(self.page - 1)
        } else if dx < -threshold && self.page + 1 < self.page_count {
            self.set_active(self.page + 1)
        } else {
            None
        }
    }

    /// Check whether a point lies in the palette region.
    #[must_use]
    pub fn contains(&self, y: f32, viewport_height: f32) -> bool {
        self.layout.contains(y, viewport_height)
    }

    /// Palette entry on the active page under a point.
    #[must_use]
    pub fn entry_at(
        &self,
        x: f32,
        y: f32,
        viewport_height: f32,
        discovered: &DiscoverySet,
    ) -> Option<ElementName> {
        let slot = self.layout.slot_at(x, y, self.width, viewport_height)?;
        self.active_entries(discovered)
            .get(slot)
            .map(|&name| name.clone())
    }
}
