use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub filename: String,
    pub url: String,
    pub thumbnail_url: String,
    /// Server-side timestamp, passed through as sent
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Photo {
    pub fn owner_display(&self) -> &str {
        self.owner.as_deref().unwrap_or("unknown")
    }
}

/// Envelope returned by `/photos` and `/photos/user`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotosResponse {
    pub error: bool,
    #[serde(default)]
    pub data: Vec<Photo>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a successful `/upload`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slice `items` into the requested page, clamping out-of-range pages
    /// to the last one.
    pub fn from_items(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * per_page;

        let items = items.into_iter().skip(start).take(per_page).collect();

        Self {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_photos_response() {
        let json = r#"{"error": false, "data": [{"filename": "a.jpg", "url": "https://bucket/originals/a.jpg", "thumbnail_url": "https://bucket/thumbnails/a.jpg", "upload_time": "2024-11-02 10:15:00", "owner": "alice"}]}"#;
        let resp: PhotosResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.error);
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].filename, "a.jpg");
        assert_eq!(resp.data[0].owner_display(), "alice");
    }

    #[test]
    fn test_photo_without_owner() {
        let json = r#"{"filename": "b.png", "url": "u", "thumbnail_url": "t"}"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        assert_eq!(photo.owner_display(), "unknown");
        assert!(photo.upload_time.is_none());
    }

    #[test]
    fn test_page_slices_items() {
        let page = Page::from_items((1..=25).collect::<Vec<_>>(), 2, 10);
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 25);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_page_clamps_out_of_range() {
        let last = Page::from_items((1..=25).collect::<Vec<_>>(), 99, 10);
        assert_eq!(last.page, 3);
        assert_eq!(last.items, (21..=25).collect::<Vec<_>>());
        assert!(!last.has_next());

        let first = Page::from_items(vec![1, 2, 3], 0, 10);
        assert_eq!(first.page, 1);
        assert!(!first.has_previous());
    }

    #[test]
    fn test_page_of_empty_listing() {
        let page: Page<u32> = Page::from_items(Vec::new(), 1, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.per_page, 1);
    }
}
