use std::sync::{Arc, Condvar, Mutex};

/// Byte budget shared by the dump workers: in-RAM decryptions block until
/// enough of the allowance is free, file-streamed ones bypass it.
#[derive(Clone)]
pub struct MemoryBudget {
    inner: Arc<(Mutex<usize>, Condvar)>,
    limit: usize,
}

impl MemoryBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(0), Condvar::new())),
            limit,
        }
    }

    pub fn acquire(&self, bytes: usize) {
        let (used, cv) = &*self.inner;
        let mut used = used.lock().unwrap();
        while *used + bytes > self.limit {
            used = cv.wait(used).unwrap();
        }
        *used += bytes;
    }

    pub fn release(&self, bytes: usize) {
        let (used, cv) = &*self.inner;
        let mut used = used.lock().unwrap();
        *used = used.saturating_sub(bytes);
        cv.notify_all();
    }
}
