//! Chunk sequencing and content reconstruction
//!
//! Sequence numbers are an append-only log position: assignment order equals
//! arrival order, and a message's chunk set is always exactly {0..n-1}. The
//! persisted UNIQUE(message_id, sequence) index backs uniqueness under
//! concurrent producers.

use crate::domain::entities::MessageChunk;

/// Assigns per-message sequence numbers and reconstructs assembled content.
pub struct ChunkSequencer;

impl ChunkSequencer {
    /// Next sequence for a message given its existing chunk sequences:
    /// `max + 1`, or `0` when no chunks exist.
    pub fn next_sequence(existing: &[i32]) -> i32 {
        existing.iter().copied().max().map_or(0, |max| max + 1)
    }

    /// Concatenate chunk contents in ascending sequence order.
    pub fn reconstruct(chunks: &[MessageChunk]) -> String {
        let mut ordered: Vec<&MessageChunk> = chunks.iter().collect();
        ordered.sort_by_key(|chunk| chunk.sequence);
        ordered.iter().map(|chunk| chunk.content.as_str()).collect()
    }

    /// Whether a chunk set satisfies the gapless property: sequences form
    /// exactly {0, 1, .., n-1} with no duplicates.
    pub fn is_gapless(sequences: &[i32]) -> bool {
        let mut sorted = sequences.to_vec();
        sorted.sort_unstable();
        sorted
            .iter()
            .enumerate()
            .all(|(index, &sequence)| sequence == index as i32)
    }
}
