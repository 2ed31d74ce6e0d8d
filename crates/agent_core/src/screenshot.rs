pub type PreloadId = u64;

/// A preload the loader wants performed before `url` may become visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPreload {
    pub id: PreloadId,
    pub url: String,
}

/// Bookkeeping for the visible screenshot.
///
/// The displayed URL only changes after a successful preload of the latest
/// requested URL. Completions for superseded requests are discarded, so a slow
/// preload can never overwrite a newer screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScreenshotLoader {
    displayed: Option<String>,
    loading: Option<PendingPreload>,
    next_id: PreloadId,
}

impl ScreenshotLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn loading_url(&self) -> Option<&str> {
        self.loading.as_ref().map(|pending| pending.url.as_str())
    }

    /// Requests that `url` become the visible screenshot.
    ///
    /// Returns the preload to perform, or `None` when `url` is already shown or
    /// already loading. Asking for the displayed URL while another URL loads
    /// abandons that load: the displayed image is the latest request.
    pub fn show(&mut self, url: impl Into<String>) -> Option<PendingPreload> {
        let url = url.into();
        if url.is_empty() {
            return None;
        }
        if self.displayed.as_deref() == Some(url.as_str()) {
            self.loading = None;
            return None;
        }
        if self.loading_url() == Some(url.as_str()) {
            return None;
        }

        self.next_id += 1;
        let pending = PendingPreload {
            id: self.next_id,
            url,
        };
        self.loading = Some(pending.clone());
        Some(pending)
    }

    /// Applies a preload result. Returns true when visible state changed.
    pub fn complete(&mut self, id: PreloadId, ok: bool) -> bool {
        let is_current = self.loading.as_ref().is_some_and(|pending| pending.id == id);
        if !is_current {
            return false;
        }
        if let Some(pending) = self.loading.take() {
            if ok {
                self.displayed = Some(pending.url);
            }
        }
        true
    }

    /// Forgets the displayed image and any in-flight request.
    pub fn reset(&mut self) -> bool {
        let changed = self.displayed.is_some() || self.loading.is_some();
        self.displayed = None;
        self.loading = None;
        changed
    }
}
