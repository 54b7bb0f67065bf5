/// Bounded accumulator sitting in front of `ChannelStore::bulk_insert`,
/// grounded in `original_source/webscraper/insbuffer.py`'s `InsertBuffer`.
/// `add` flushes automatically once the buffer reaches capacity; callers
/// are still responsible for a final `flush()` on every exit path, the way
/// `sws-crawler::crawl_site` calls `scraper.finalizer()` unconditionally
/// after its `try_join!`, win or lose.
pub struct InsertBuffer<T> {
    capacity: usize,
    pending: Vec<T>,
}

impl<T> InsertBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "insert buffer capacity must be positive");
        Self {
            capacity,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Adds one item. Returns a full batch (drained from the buffer) once
    /// `capacity` is reached, `None` otherwise.
    pub fn add(&mut self, item: T) -> Option<Vec<T>> {
        self.pending.push(item);
        if self.pending.len() >= self.capacity {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    /// Drains whatever remains, however short. Safe to call on an empty
    /// buffer — returns `None` rather than an empty batch so callers don't
    /// have to special-case a no-op insert.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_batch_once_capacity_is_reached() {
        let mut buf = InsertBuffer::new(2);
        assert!(buf.add(1).is_none());
        let batch = buf.add(2).unwrap();
        assert_eq!(batch, vec![1, 2]);
        assert!(buf.is_empty());
    }

    #[test]
    fn flush_drains_a_partial_batch() {
        let mut buf = InsertBuffer::new(100);
        buf.add("a");
        buf.add("b");
        let batch = buf.flush().unwrap();
        assert_eq!(batch, vec!["a", "b"]);
    }

    #[test]
    fn flush_on_empty_buffer_is_a_noop() {
        let mut buf: InsertBuffer<i32> = InsertBuffer::new(10);
        assert!(buf.flush().is_none());
    }

    #[test]
    fn buffer_is_reusable_after_a_flush() {
        let mut buf = InsertBuffer::new(2);
        buf.add(1);
        buf.flush();
        assert!(buf.add(2).is_none());
        assert_eq!(buf.len(), 1);
    }
}
