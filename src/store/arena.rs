use crate::store::StoreError;
use parking_lot::RwLock;

/// Default arena page size. Large enough that allocation is rare, small
/// enough that a half-filled tail page is cheap.
pub const DEFAULT_PAGE_BYTES: usize = 4 * 1024 * 1024;

/// Paged, append-only storage for fixed-dimension f32 vectors.
///
/// Vectors live back to back inside float-typed pages so brute-force scans
/// and k-means sweeps read memory sequentially. Indices are dense u32s
/// assigned in insertion order and never reused:
/// `index = page * vectors_per_page + slot`.
///
/// Pages are boxed slices; once allocated their contents never move, so a
/// reader inside `read`/`scan` observes stable addresses while writers
/// extend the page list. Readers take the inner lock shared, writers
/// exclusive.
pub struct VectorArena {
    dim: usize,
    vectors_per_page: usize,
    inner: RwLock<ArenaInner>,
}

struct ArenaInner {
    pages: Vec<Box<[f32]>>,
    // slot to fill next in the last page; vectors_per_page means "full"
    slot: usize,
    len: u32,
}

impl VectorArena {
    pub fn new(dim: usize, page_bytes: usize) -> Self {
        let vectors_per_page = (page_bytes / (dim * 4)).max(1);
        Self {
            dim,
            vectors_per_page,
            inner: RwLock::new(ArenaInner {
                pages: Vec::new(),
                slot: 0,
                len: 0,
            }),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vectors_per_page(&self) -> usize {
        self.vectors_per_page
    }

    pub fn len(&self) -> u32 {
        self.inner.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a vector and returns its dense index.
    pub fn push(&self, vector: &[f32]) -> Result<u32, StoreError> {
        if vector.len() != self.dim {
            return Err(StoreError::DimMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }

        let mut inner = self.inner.write();
        if inner.pages.is_empty() || inner.slot >= self.vectors_per_page {
            let page = vec![0.0f32; self.vectors_per_page * self.dim].into_boxed_slice();
            inner.pages.push(page);
            inner.slot = 0;
        }

        let slot = inner.slot;
        let page_no = inner.pages.len() - 1;
        let offset = slot * self.dim;
        let page = inner.pages.last_mut().unwrap();
        page[offset..offset + self.dim].copy_from_slice(vector);

        let index = (page_no * self.vectors_per_page + slot) as u32;
        inner.slot += 1;
        inner.len += 1;
        Ok(index)
    }

    /// Copies out the vector at `index`.
    pub fn get(&self, index: u32) -> Result<Vec<f32>, StoreError> {
        self.read(index, |v| v.to_vec())
    }

    /// Runs `f` against a borrowed view of the vector at `index`. The view
    /// is valid for the duration of the call only.
    pub fn read<R>(&self, index: u32, f: impl FnOnce(&[f32]) -> R) -> Result<R, StoreError> {
        let inner = self.inner.read();
        if index >= inner.len {
            return Err(StoreError::OutOfBounds {
                index,
                size: inner.len,
            });
        }
        let page_no = index as usize / self.vectors_per_page;
        let offset = (index as usize % self.vectors_per_page) * self.dim;
        Ok(f(&inner.pages[page_no][offset..offset + self.dim]))
    }

    /// Ordered, index-bearing sweep over every stored vector under a single
    /// read guard. Used by brute-force search and k-means training.
    pub fn scan(&self, mut f: impl FnMut(u32, &[f32])) {
        let inner = self.inner.read();
        let mut index = 0u32;
        'pages: for page in &inner.pages {
            for chunk in page.chunks_exact(self.dim) {
                if index >= inner.len {
                    break 'pages;
                }
                f(index, chunk);
                index += 1;
            }
        }
    }
}
