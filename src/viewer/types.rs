//! Core types shared by the viewer components

/// Decoded page payload produced by a [`PageSource`](super::PageSource).
///
/// The viewer never looks inside `data`; it only stores, evicts and hands the
/// payload back to whoever paints it.
#[derive(Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_num: usize,
    /// Opaque decoded bytes
    pub data: Vec<u8>,
    /// Intrinsic width in pixels, 0 when the source does not know it
    pub width_px: u32,
    /// Intrinsic height in pixels, 0 when the source does not know it
    pub height_px: u32,
}

impl PageContent {
    #[must_use]
    pub fn new(page_num: usize, data: Vec<u8>) -> Self {
        Self {
            page_num,
            data,
            width_px: 0,
            height_px: 0,
        }
    }

    #[must_use]
    pub fn with_size(mut self, width_px: u32, height_px: u32) -> Self {
        self.width_px = width_px;
        self.height_px = height_px;
        self
    }
}

impl std::fmt::Debug for PageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContent")
            .field("page_num", &self.page_num)
            .field("data_len", &self.data.len())
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .finish()
    }
}

/// Navigation direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
        }
    }
}

/// How many pages are shown at once
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMode {
    #[default]
    Single,
    TwoPage,
}

impl SpreadMode {
    /// Page indices advanced per navigation command
    #[must_use]
    pub const fn step(self) -> usize {
        match self {
            SpreadMode::Single => 1,
            SpreadMode::TwoPage => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpreadMode::Single => "single",
            SpreadMode::TwoPage => "two_page",
        }
    }
}

/// Pages shown for a spread starting at `first`.
///
/// The second page of a two-page spread is only included when it exists.
#[must_use]
pub fn spread_pages(first: usize, step: usize, total_pages: Option<usize>) -> Vec<usize> {
    let Some(total) = total_pages else {
        return vec![first];
    };
    (first..first + step.max(1))
        .filter(|&page| page >= 1 && page <= total)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_step_matches_mode() {
        assert_eq!(SpreadMode::Single.step(), 1);
        assert_eq!(SpreadMode::TwoPage.step(), 2);
    }

    #[test]
    fn spread_pages_drops_missing_second_page() {
        assert_eq!(spread_pages(9, 2, Some(10)), vec![9, 10]);
        assert_eq!(spread_pages(11, 2, Some(11)), vec![11]);
        assert_eq!(spread_pages(4, 1, Some(10)), vec![4]);
    }

    #[test]
    fn spread_pages_with_unknown_total_shows_first_only() {
        assert_eq!(spread_pages(3, 2, None), vec![3]);
    }
}
