//! Brute-force Hamming matching with a mutual nearest neighbour check.

use rayon::prelude::*;

use crate::registration::orb::Descriptor;

/// A cross-checked pair of feature indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub secondary: usize,
    pub primary: usize,
    pub distance: u32,
}

/// Nearest descriptor in `train`, lowest index on ties.
fn nearest(query: &Descriptor, train: &[Descriptor]) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (index, candidate) in train.iter().enumerate() {
        let distance = query.hamming(candidate);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
            if distance == 0 {
                break;
            }
        }
    }
    best
}

/// Matches every secondary descriptor to its nearest primary descriptor and
/// keeps the pair only when the primary's nearest secondary is the same one.
///
/// The result is sorted by ascending distance (secondary index among equals)
/// and truncated to `limit`.
pub fn cross_check_match(
    secondary: &[Descriptor],
    primary: &[Descriptor],
    limit: usize,
) -> Vec<DescriptorMatch> {
    if secondary.is_empty() || primary.is_empty() {
        return Vec::new();
    }

    let backward: Vec<Option<(usize, u32)>> =
        primary.par_iter().map(|d| nearest(d, secondary)).collect();

    let mut matches: Vec<DescriptorMatch> = secondary
        .par_iter()
        .enumerate()
        .filter_map(|(s, descriptor)| {
            let (p, distance) = nearest(descriptor, primary)?;
            match backward[p] {
                Some((back, _)) if back == s => Some(DescriptorMatch {
                    secondary: s,
                    primary: p,
                    distance,
                }),
                _ => None,
            }
        })
        .collect();

    matches.sort_by_key(|m| m.distance);
    matches.truncate(limit);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(bits: u64) -> Descriptor {
        Descriptor([bits, 0, 0, 0])
    }

    #[test]
    fn test_hamming_distance() {
        let a = Descriptor([u64::MAX, 0, 0, 1]);
        let b = Descriptor([0, 0, 0, 0]);
        assert_eq!(a.hamming(&b), 65);
        assert_eq!(a.hamming(&a), 0);
    }

    #[test]
    fn test_mutual_matches_only() {
        let secondary = vec![descriptor(0b0000), descriptor(0b0001)];
        // Both secondaries are nearest to primary 0, but primary 0 prefers secondary 0.
        let primary = vec![descriptor(0b0000), descriptor(0b1111_0000)];

        let matches = cross_check_match(&secondary, &primary, 50);
        assert_eq!(
            matches,
            vec![DescriptorMatch {
                secondary: 0,
                primary: 0,
                distance: 0
            }]
        );
    }

    #[test]
    fn test_sorted_and_truncated() {
        let secondary = vec![descriptor(0b111), descriptor(0b1 << 20), descriptor(0b1 << 40)];
        let primary = vec![descriptor(0b1 << 40 | 0b11), descriptor(0b110), descriptor(0b1 << 20)];

        let matches = cross_check_match(&secondary, &primary, 2);
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].secondary, matches[0].primary), (1, 2));
        assert_eq!(matches[0].distance, 0);
        assert_eq!((matches[1].secondary, matches[1].primary), (0, 1));
        assert_eq!(matches[1].distance, 1);
    }

    #[test]
    fn test_empty_sets() {
        assert!(cross_check_match(&[], &[descriptor(1)], 50).is_empty());
        assert!(cross_check_match(&[descriptor(1)], &[], 50).is_empty());
    }
}
