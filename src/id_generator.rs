use std::sync::atomic::{AtomicU64, Ordering};

// Single static counter for all bitmaps
static NEXT_BITMAP_ID: AtomicU64 = AtomicU64::new(1);

pub fn generate_id() -> u64 {
    NEXT_BITMAP_ID.fetch_add(1, Ordering::SeqCst)
}
