use tieralloc_bitmap::words_for;
use tieralloc_sys::prim::word_width;

/// Granularity of every size class.
pub const ALIGNMENT: usize = 8;
/// Largest request served by the tiers; anything bigger goes to the heap.
pub const MAX_BLOCK_SIZE: usize = 256 * 1024;
pub const NSCLASSES: usize = MAX_BLOCK_SIZE / ALIGNMENT;

pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: usize = PAGE_SIZE.trailing_zeros() as usize;

/// Span size handed to the central tier for blocks up to `SPAN_PAGES * PAGE_SIZE`.
pub const SPAN_PAGES: usize = 8;
/// A thread-local list longer than this is drained back to the central tier.
pub const RETURN_THRESHOLD: usize = 64;
/// Upper bound on the bytes moved by one thread-local refill.
pub const MAX_BATCH_BYTES: usize = 4 * 1024;

/// Chunk size of the metadata bump arenas.
pub const CHUNK_SIZE: usize = 64 * 1024;
pub const FANOUT: usize = 1 << 4;

/// Largest span the free-span index keeps track of.
pub const MAX_INDEXED_PAGES: usize = 256;
pub const SPAN_INDEX_WORDS: usize = words_for(MAX_INDEXED_PAGES + 1);

const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(ALIGNMENT >= word_width());
const _: () = assert!(MAX_BLOCK_SIZE % ALIGNMENT == 0);
const _: () = assert!(PAGE_SIZE.is_power_of_two());
const _: () = assert!(MAX_BLOCK_SIZE.div_ceil(PAGE_SIZE) <= MAX_INDEXED_PAGES);
