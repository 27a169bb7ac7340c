/*!
 * Array-backed binary min-heap over arena indices
 *
 * The heap stores indices into a caller-owned arena and orders them by a key
 * looked up through `key`. Only the root is ever modified by the partitioner,
 * so the only maintenance operation needed is a sift-down from position 0.
 */

/// Lay out `0..len` as a valid heap
///
/// Every key starts at zero in the partitioner, so identity order already
/// satisfies the heap property.
pub fn identity(len: usize) -> Vec<usize> {
    (0..len).collect()
}

/// Restore the heap property after the key of the root changed
///
/// A child replaces its parent only when its key is strictly smaller. When
/// both children qualify with equal keys the left child (lower position)
/// wins, which keeps the outcome deterministic.
pub fn sift_down_root<F>(heap: &mut [usize], key: F)
where
    F: Fn(usize) -> u64,
{
    let len = heap.len();
    let mut pos = 0;

    loop {
        let left = 2 * pos + 1;
        if left >= len {
            break;
        }

        let right = left + 1;
        let mut smallest = left;
        if right < len && key(heap[right]) < key(heap[left]) {
            smallest = right;
        }

        if key(heap[smallest]) < key(heap[pos]) {
            heap.swap(pos, smallest);
            pos = smallest;
        } else {
            break;
        }
    }
}

/// Check the min-heap property for every parent/child pair
pub fn is_heap<F>(heap: &[usize], key: F) -> bool
where
    F: Fn(usize) -> u64,
{
    (1..heap.len()).all(|child| key(heap[(child - 1) / 2]) <= key(heap[child]))
}
