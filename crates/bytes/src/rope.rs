//! Concatenation tree construction and balancing.
//!
//! Concatenation builds binary nodes over the operands instead of copying
//! them, with three cost controls:
//!
//! - tiny combined results are flattened eagerly (tree overhead would cost
//!   more than the copy)
//! - two reuse shortcuts avoid growing depth when repeatedly appending
//!   small pieces on the right, the common construction pattern
//! - a Fibonacci minimum-length-per-depth invariant bounds depth at
//!   O(log n); a tree that violates it is rebuilt to minimal depth from
//!   its in-order leaf sequence

use once_cell::sync::Lazy;
use tracing::debug;

use crate::seq::{ByteSeq, Repr};

/// Combined lengths below this are flattened into one contiguous leaf
/// instead of adding a tree node.
const CONCAT_BY_COPY_LIMIT: usize = 128;

/// `MIN_LENGTH_BY_DEPTH[d]` is the minimum total length a tree of depth
/// `d` must have to count as balanced: the Fibonacci numbers 1, 2, 3, 5,
/// 8, ... (skipping the duplicate leading 1), with a `u64::MAX` cap so any
/// depth past the table is simply unbalanced.
static MIN_LENGTH_BY_DEPTH: Lazy<Vec<u64>> = Lazy::new(|| {
    let mut lengths = Vec::new();
    let (mut f1, mut f2) = (1u64, 1u64);
    loop {
        lengths.push(f2);
        match f1.checked_add(f2) {
            Some(next) => {
                f1 = f2;
                f2 = next;
            }
            None => break,
        }
    }
    lengths.push(u64::MAX);
    lengths
});

fn is_balanced(len: usize, depth: usize) -> bool {
    let table = &*MIN_LENGTH_BY_DEPTH;
    depth < table.len() && len as u64 >= table[depth]
}

pub(crate) fn concatenate(left: ByteSeq, right: ByteSeq) -> ByteSeq {
    if right.is_empty() {
        return left;
    }
    if left.is_empty() {
        return right;
    }

    let new_len = left.len() + right.len();
    if new_len < CONCAT_BY_COPY_LIMIT {
        return flatten_pair(&left, &right);
    }

    if let Repr::Rope(rope) = left.repr() {
        if rope.right.len() + right.len() < CONCAT_BY_COPY_LIMIT {
            // Appending a small piece to a node whose right branch is also
            // small: merge the two small pieces so the result keeps the
            // left tree's depth. This also sheds references to storage
            // that substring views no longer need.
            let new_right = flatten_pair(&rope.right, &right);
            return ByteSeq::rope_node(rope.left.clone(), new_right);
        }

        if rope.left.depth() > rope.right.depth() && left.depth() > right.depth() {
            // Left-leaning tree absorbing a shallow right operand: rebuild
            // only the right spine so overall depth does not grow.
            let new_right = ByteSeq::rope_node(rope.right.clone(), right);
            return ByteSeq::rope_node(rope.left.clone(), new_right);
        }
    }

    let new_depth = left.depth().max(right.depth()) + 1;
    if is_balanced(new_len, new_depth) {
        return ByteSeq::rope_node(left, right);
    }
    rebalance(left, right)
}

/// Copy two sequences into one contiguous leaf.
fn flatten_pair(a: &ByteSeq, b: &ByteSeq) -> ByteSeq {
    let mut out = Vec::with_capacity(a.len() + b.len());
    for leaf in a.leaves() {
        out.extend_from_slice(leaf);
    }
    for leaf in b.leaves() {
        out.extend_from_slice(leaf);
    }
    ByteSeq::from_vec(out)
}

/// Rebuild a minimal-depth tree over the in-order leaves of both operands.
fn rebalance(left: ByteSeq, right: ByteSeq) -> ByteSeq {
    let mut leaves = Vec::new();
    left.collect_leaves(&mut leaves);
    right.collect_leaves(&mut leaves);
    debug!(
        leaves = leaves.len(),
        total_len = left.len() + right.len(),
        "rebalancing degenerate concatenation tree"
    );
    build_balanced(&leaves)
}

fn build_balanced(leaves: &[ByteSeq]) -> ByteSeq {
    match leaves {
        [] => ByteSeq::empty(),
        [leaf] => leaf.clone(),
        _ => {
            let mid = leaves.len() / 2;
            ByteSeq::rope_node(build_balanced(&leaves[..mid]), build_balanced(&leaves[mid..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_empty_operands() {
        let seq = ByteSeq::copy_from_slice(b"payload");
        assert_eq!(ByteSeq::empty().concat(&seq), seq);
        assert_eq!(seq.concat(&ByteSeq::empty()), seq);
    }

    #[test]
    fn test_small_pieces_flatten() {
        let a = ByteSeq::copy_from_slice(b"tiny");
        let b = ByteSeq::copy_from_slice(b"bits");
        let joined = a.concat(&b);
        assert_eq!(joined.depth(), 0);
        assert_eq!(joined.to_vec(), b"tinybits");
    }

    #[test]
    fn test_large_pieces_share_without_copy() {
        let a = ByteSeq::from_vec(vec![1u8; 4096]);
        let b = ByteSeq::from_vec(vec![2u8; 4096]);
        let joined = a.concat(&b);
        assert_eq!(joined.depth(), 1);
        assert_eq!(joined.len(), 8192);
    }

    #[test]
    fn test_repeated_small_appends_stay_shallow() {
        // The classic degenerate pattern: building a large sequence by
        // appending one small chunk at a time. Depth must stay O(log n),
        // not O(chunks).
        let mut seq = ByteSeq::empty();
        for i in 0..10_000 {
            seq = seq.concat(&ByteSeq::copy_from_slice(&[i as u8; 7]));
        }
        assert_eq!(seq.len(), 70_000);
        assert!(
            seq.depth() <= 40,
            "depth {} for 10k appends is not logarithmic",
            seq.depth()
        );
    }

    #[test]
    fn test_content_preserved_through_rebalance() {
        let mut expected = Vec::new();
        let mut seq = ByteSeq::empty();
        for i in 0u32..3000 {
            let chunk = i.to_le_bytes();
            expected.extend_from_slice(&chunk);
            seq = seq.concat(&ByteSeq::copy_from_slice(&chunk));
        }
        assert_eq!(seq.to_vec(), expected);
    }

    #[test]
    fn test_associativity_of_content_and_hash() {
        let a = ByteSeq::from_vec(vec![b'a'; 300]);
        let b = ByteSeq::from_vec(vec![b'b'; 300]);
        let c = ByteSeq::from_vec(vec![b'c'; 300]);
        let left_assoc = a.concat(&b).concat(&c);
        let right_assoc = a.concat(&b.concat(&c));
        assert_eq!(left_assoc, right_assoc);
        assert_eq!(left_assoc.hash_value(), right_assoc.hash_value());
    }

    #[test]
    fn test_operands_unchanged_by_concat() {
        let a = ByteSeq::from_vec(vec![5u8; 500]);
        let b = ByteSeq::from_vec(vec![6u8; 500]);
        let before_a = a.to_vec();
        let _joined = a.concat(&b);
        assert_eq!(a.to_vec(), before_a);
        assert_eq!(a.len(), 500);
    }

    #[test]
    fn test_min_length_table_is_fibonacci() {
        let table = &*MIN_LENGTH_BY_DEPTH;
        assert_eq!(&table[..6], &[1, 2, 3, 5, 8, 13]);
        assert_eq!(*table.last().unwrap(), u64::MAX);
        for window in table[..table.len() - 2].windows(3) {
            assert_eq!(window[0] + window[1], window[2]);
        }
    }

    #[test]
    fn test_shared_child_in_two_parents() {
        let shared = ByteSeq::from_vec(vec![9u8; 1000]);
        let left_parent = shared.concat(&ByteSeq::from_vec(vec![1u8; 1000]));
        let right_parent = ByteSeq::from_vec(vec![2u8; 1000]).concat(&shared);
        assert_eq!(left_parent.substring(0..1000), shared);
        assert_eq!(right_parent.substring(1000..2000), shared);
    }

    #[test]
    fn test_random_tree_shapes_equal_flat() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        /// Build a randomly shaped tree over `bytes` by splitting at random
        /// points, bypassing the concat optimizations via `rope_node`.
        fn random_tree(rng: &mut StdRng, bytes: &[u8]) -> ByteSeq {
            if bytes.len() <= 1 || rng.gen_bool(0.2) {
                return ByteSeq::copy_from_slice(bytes);
            }
            let split = rng.gen_range(1..bytes.len());
            ByteSeq::rope_node(
                random_tree(rng, &bytes[..split]),
                random_tree(rng, &bytes[split..]),
            )
        }

        let mut rng = StdRng::seed_from_u64(0x5EED);
        let data: Vec<u8> = (0..2000u32).map(|i| (i * 31) as u8).collect();
        let flat = ByteSeq::copy_from_slice(&data);
        for _ in 0..20 {
            let tree = random_tree(&mut rng, &data);
            assert_eq!(tree, flat);
            assert_eq!(tree.hash_value(), flat.hash_value());
            assert_eq!(tree.is_valid_utf8(), flat.is_valid_utf8());
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn incremental_concat_matches_flat(
                chunks in proptest::collection::vec(
                    proptest::collection::vec(any::<u8>(), 0..64),
                    0..32,
                )
            ) {
                let mut expected = Vec::new();
                let mut seq = ByteSeq::empty();
                for chunk in &chunks {
                    expected.extend_from_slice(chunk);
                    seq = seq.concat(&ByteSeq::copy_from_slice(chunk));
                }
                prop_assert_eq!(seq.len(), expected.len());
                prop_assert_eq!(seq.to_vec(), expected.clone());
                prop_assert_eq!(seq, ByteSeq::from_vec(expected));
            }

            #[test]
            fn substring_matches_slice(
                data in proptest::collection::vec(any::<u8>(), 1..512),
                a in 0usize..512,
                b in 0usize..512,
            ) {
                let start = a % data.len();
                let end = b % data.len();
                let (start, end) = if start <= end { (start, end) } else { (end, start) };
                let seq = ByteSeq::copy_from_slice(&data);
                prop_assert_eq!(seq.substring(start..end).to_vec(), &data[start..end]);
            }
        }
    }
}
