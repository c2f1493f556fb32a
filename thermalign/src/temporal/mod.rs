//! Temporal pairing of files from two unsynchronized sensors.
//!
//! The sensors are not triggered together, so a primary file is paired with the
//! secondary file whose decoded capture time is closest, provided the distance
//! stays within a tolerance window. Candidates are pre-grouped by the date key
//! that follows the sensor tag, which keeps each scan short.

use std::collections::HashMap;

use chrono::TimeDelta;

use crate::sensor::SensorFile;
use crate::timestamp::TimestampFormat;

#[cfg(test)]
mod tests;

/// A candidate selected by [`find_nearest`].
#[derive(Debug, Clone, Copy)]
pub struct TemporalMatch<'a> {
    pub file: &'a SensorFile,
    pub delta: TimeDelta,
}

/// Finds the candidate closest in time to `target` within `tolerance`.
///
/// A candidate is eligible when `|t_candidate - t_target| <= tolerance`.
/// Candidates without a decodable timestamp are skipped. When several
/// candidates share the smallest delta the first one in iteration order wins.
/// Returns `None` when `target` itself has no timestamp.
pub fn find_nearest<'a, I>(
    target: &SensorFile,
    candidates: I,
    tolerance: TimeDelta,
) -> Option<TemporalMatch<'a>>
where
    I: IntoIterator<Item = &'a SensorFile>,
{
    let target_time = target.timestamp()?;

    let mut best: Option<TemporalMatch<'a>> = None;
    for candidate in candidates {
        let Some(candidate_time) = candidate.timestamp() else {
            continue;
        };

        let delta = target_time.abs_delta(&candidate_time);
        if delta > tolerance {
            continue;
        }
        if best.map_or(true, |b| delta < b.delta) {
            best = Some(TemporalMatch {
                file: candidate,
                delta,
            });
        }
    }

    best
}

/// How a primary file fared in temporal pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A partner within the window was found.
    Matched,
    /// The primary has a timestamp but no candidate is within the window.
    NoMatch,
    /// The primary file name does not encode a timestamp.
    NoTimestamp,
}

impl std::fmt::Display for PairingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingOutcome::Matched => write!(f, "matched"),
            PairingOutcome::NoMatch => write!(f, "no partner within time window"),
            PairingOutcome::NoTimestamp => write!(f, "file name has no timestamp"),
        }
    }
}

/// Association of a primary file with its temporal partner, if any.
#[derive(Debug, Clone)]
pub struct FilePairing {
    pub primary: SensorFile,
    pub matched: Option<SensorFile>,
    pub delta: Option<TimeDelta>,
}

impl FilePairing {
    pub fn outcome(&self) -> PairingOutcome {
        match (&self.matched, self.primary.timestamp()) {
            (Some(_), _) => PairingOutcome::Matched,
            (None, Some(_)) => PairingOutcome::NoMatch,
            (None, None) => PairingOutcome::NoTimestamp,
        }
    }
}

/// Secondary files grouped by date key, each group sorted by file name.
///
/// Built once per run so that pairing does not rescan the secondary directory
/// for every primary file. Sorting by name makes the first-seen tie-break of
/// [`find_nearest`] resolve to the lexicographically smallest file name.
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    format: TimestampFormat,
    groups: HashMap<String, Vec<SensorFile>>,
    total: usize,
}

impl CandidateIndex {
    pub fn build(files: impl IntoIterator<Item = SensorFile>, format: &TimestampFormat) -> Self {
        let mut groups: HashMap<String, Vec<SensorFile>> = HashMap::new();
        let mut total = 0;

        for file in files {
            total += 1;
            let Some(key) = format.group_key(file.name()) else {
                tracing::debug!("No group key in '{}', not a pairing candidate", file.name());
                continue;
            };
            groups.entry(key.to_string()).or_default().push(file);
        }

        for group in groups.values_mut() {
            group.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.path().cmp(b.path())));
        }

        Self {
            format: format.clone(),
            groups,
            total,
        }
    }

    /// Candidates sharing the primary's date key.
    pub fn candidates_for(&self, primary: &SensorFile) -> &[SensorFile] {
        self.format
            .group_key(primary.name())
            .and_then(|key| self.groups.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of indexed files, including ungroupable ones.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Pairs a single primary file against its candidate group.
    pub fn pair(&self, primary: &SensorFile, tolerance: TimeDelta) -> FilePairing {
        let found = find_nearest(primary, self.candidates_for(primary), tolerance);
        FilePairing {
            primary: primary.clone(),
            matched: found.map(|m| m.file.clone()),
            delta: found.map(|m| m.delta),
        }
    }
}

/// Pairs every primary file, in order.
pub fn pair_all(
    primaries: &[SensorFile],
    index: &CandidateIndex,
    tolerance: TimeDelta,
) -> Vec<FilePairing> {
    primaries
        .iter()
        .map(|primary| {
            let pairing = index.pair(primary, tolerance);
            match (&pairing.matched, pairing.delta) {
                (Some(partner), Some(delta)) => tracing::debug!(
                    "Paired {} with {} (delta {} min)",
                    primary.name(),
                    partner.name(),
                    delta.num_minutes()
                ),
                _ => tracing::debug!("{}: {}", primary.name(), pairing.outcome()),
            }
            pairing
        })
        .collect()
}
