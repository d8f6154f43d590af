//! Trace ingestion.
//!
//! A trace file is tab separated, one event per line:
//!
//! ```text
//! dt_1 ... dt_W <TAB> hyper <TAB> site_1 ... site_{W+1}
//! ```
//!
//! `W` (the memory size) is taken from the first line and must match on every
//! other line. Hyper-entities and sites are interned in first-seen order.
//! Events are stably sorted by their final gap before counts are built, so
//! the whole engine works in timestamp order.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::Path;

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tribe_common::{Error, Result};

use super::counts::CountTables;
use super::stamps::StampLists;

/// Immutable event table shared (read-only) by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    dts: Array2<f64>,
    hyper_ids: Vec<usize>,
    sites: Array2<usize>,
}

impl Trace {
    pub fn new(dts: Array2<f64>, hyper_ids: Vec<usize>, sites: Array2<usize>) -> Result<Self> {
        let n = hyper_ids.len();
        if dts.nrows() != n || sites.nrows() != n {
            return Err(Error::Data(format!(
                "trace tables disagree on length: {} gap rows, {} hypers, {} site rows",
                dts.nrows(),
                n,
                sites.nrows()
            )));
        }
        if dts.ncols() == 0 {
            return Err(Error::Data("events must carry at least one gap".to_string()));
        }
        if sites.ncols() == 0 {
            return Err(Error::Data("events must visit at least one site".to_string()));
        }
        if let Some(bad) = dts.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(Error::Data(format!("gaps must be finite and non-negative, got {}", bad)));
        }
        Ok(Self {
            dts,
            hyper_ids,
            sites,
        })
    }

    pub fn len(&self) -> usize {
        self.hyper_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyper_ids.is_empty()
    }

    /// Number of gaps per event (`W`).
    pub fn memory_size(&self) -> usize {
        self.dts.ncols()
    }

    pub fn path_len(&self) -> usize {
        self.sites.ncols()
    }

    pub fn hyper(&self, i: usize) -> usize {
        self.hyper_ids[i]
    }

    pub fn sites(&self, i: usize) -> ArrayView1<'_, usize> {
        self.sites.row(i)
    }

    pub fn dts(&self, i: usize) -> ArrayView1<'_, f64> {
        self.dts.row(i)
    }

    /// Event timestamp: the final gap.
    pub fn stamp(&self, i: usize) -> f64 {
        self.dts[[i, self.dts.ncols() - 1]]
    }
}

/// One parsed but not yet interned event.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub dts: Vec<f64>,
    pub hyper: String,
    pub sites: Vec<String>,
}

impl RawEvent {
    pub fn new(dts: Vec<f64>, hyper: impl Into<String>, sites: &[&str]) -> Self {
        Self {
            dts,
            hyper: hyper.into(),
            sites: sites.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// How topics are assigned before the first iteration.
#[derive(Debug, Clone, Default)]
pub enum InitialTopics {
    /// Uniform draws from an RNG seeded with the given seed.
    #[default]
    Random,
    /// Explicit assignment, indexed by input order (before sorting).
    Given(Vec<usize>),
}

/// Fully materialized, time-sorted input bundle.
#[derive(Debug, Clone)]
pub struct InputData {
    pub trace: Trace,
    pub topics: Vec<usize>,
    pub stamps: StampLists,
    pub counts: CountTables,
    pub hyper2id: BTreeMap<String, usize>,
    pub site2id: BTreeMap<String, usize>,
    pub n_topics: usize,
}

impl InputData {
    pub fn load(path: &Path, n_topics: usize, initial: InitialTopics, seed: u64) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let data = Self::parse(std::io::BufReader::new(file), n_topics, initial, seed)?;
        tracing::debug!(
            path = %path.display(),
            events = data.n_events(),
            hypers = data.n_hypers(),
            sites = data.n_sites(),
            "trace loaded"
        );
        Ok(data)
    }

    /// Parse tab-separated trace lines. Blank lines are skipped.
    pub fn parse(reader: impl BufRead, n_topics: usize, initial: InitialTopics, seed: u64) -> Result<Self> {
        let mut events = Vec::new();
        let mut mem_size: Option<usize> = None;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let words: Vec<&str> = line.split('\t').collect();
            if words.len() < 4 {
                return Err(Error::InvalidTrace {
                    line: line_no,
                    message: format!("expected at least 4 fields, got {}", words.len()),
                });
            }
            if (words.len() - 2) % 2 != 0 {
                return Err(Error::InvalidTrace {
                    line: line_no,
                    message: "expected 2 + 2 * W fields".to_string(),
                });
            }
            let w = (words.len() - 2) / 2;
            match mem_size {
                Some(expected) if expected != w => {
                    return Err(Error::InvalidTrace {
                        line: line_no,
                        message: format!("memory size {} differs from previously seen {}", w, expected),
                    });
                }
                _ => mem_size = Some(w),
            }
            let dts = words[..w]
                .iter()
                .map(|raw| {
                    raw.trim().parse::<f64>().map_err(|e| Error::InvalidTrace {
                        line: line_no,
                        message: format!("bad gap {:?}: {}", raw, e),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            if let Some(bad) = dts.iter().find(|d| !d.is_finite() || **d < 0.0) {
                return Err(Error::InvalidTrace {
                    line: line_no,
                    message: format!("gaps must be finite and non-negative, got {}", bad),
                });
            }
            events.push(RawEvent {
                dts,
                hyper: words[w].to_string(),
                sites: words[w + 1..].iter().map(|s| s.to_string()).collect(),
            });
        }
        Self::from_events(events, n_topics, initial, seed)
    }

    /// Build the bundle from in-memory events.
    pub fn from_events(events: Vec<RawEvent>, n_topics: usize, initial: InitialTopics, seed: u64) -> Result<Self> {
        if n_topics == 0 {
            return Err(Error::InvalidHyperParams {
                field: "n_topics".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        let n = events.len();
        if n == 0 {
            return Err(Error::Data("trace contains no events".to_string()));
        }
        let w = events[0].dts.len();
        let b = events[0].sites.len();
        if let Some((i, _)) = events
            .iter()
            .enumerate()
            .find(|(_, e)| e.dts.len() != w || e.sites.len() != b)
        {
            return Err(Error::Data(format!(
                "event {} has a different shape than event 0 ({} gaps, {} sites)",
                i, w, b
            )));
        }

        let initial_topics = match initial {
            InitialTopics::Random => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n).map(|_| rng.random_range(0..n_topics)).collect::<Vec<_>>()
            }
            InitialTopics::Given(topics) => {
                if topics.len() != n {
                    return Err(Error::Data(format!(
                        "initial assignment has {} entries for {} events",
                        topics.len(),
                        n
                    )));
                }
                if let Some(z) = topics.iter().find(|&&z| z >= n_topics) {
                    return Err(Error::Data(format!(
                        "initial assignment uses topic {} but only {} topics exist",
                        z, n_topics
                    )));
                }
                topics
            }
        };

        let mut hyper_lookup: HashMap<String, usize> = HashMap::new();
        let mut site_lookup: HashMap<String, usize> = HashMap::new();
        let mut hyper_ids = Vec::with_capacity(n);
        let mut site_ids = Vec::with_capacity(n);
        for e in &events {
            let next = hyper_lookup.len();
            hyper_ids.push(*hyper_lookup.entry(e.hyper.clone()).or_insert(next));
            let path: Vec<usize> = e
                .sites
                .iter()
                .map(|s| {
                    let next = site_lookup.len();
                    *site_lookup.entry(s.clone()).or_insert(next)
                })
                .collect();
            site_ids.push(path);
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&x, &y| events[x].dts[w - 1].total_cmp(&events[y].dts[w - 1]));

        let dts = Array2::from_shape_fn((n, w), |(i, j)| events[order[i]].dts[j]);
        let sites = Array2::from_shape_fn((n, b), |(i, j)| site_ids[order[i]][j]);
        let sorted_hypers: Vec<usize> = order.iter().map(|&i| hyper_ids[i]).collect();
        let topics: Vec<usize> = order.iter().map(|&i| initial_topics[i]).collect();
        let trace = Trace::new(dts, sorted_hypers, sites)?;

        let n_hypers = hyper_lookup.len();
        let n_sites = site_lookup.len();
        let counts = CountTables::populate(&trace, &topics, n_topics, n_hypers, n_sites)?;
        counts.check_marginals()?;

        let mut stamps = StampLists::new(n_topics);
        for (i, &z) in topics.iter().enumerate() {
            stamps.push(z, trace.stamp(i));
        }

        Ok(Self {
            trace,
            topics,
            stamps,
            counts,
            hyper2id: hyper_lookup.into_iter().collect(),
            site2id: site_lookup.into_iter().collect(),
            n_topics,
        })
    }

    pub fn n_events(&self) -> usize {
        self.trace.len()
    }

    pub fn n_hypers(&self) -> usize {
        self.hyper2id.len()
    }

    pub fn n_sites(&self) -> usize {
        self.site2id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "0.5\tu1\ta\tb\n0.1\tu2\tb\tc\n\n0.3\tu1\ta\tc\n";

    #[test]
    fn parse_sorts_by_stamp_and_interns() {
        let data = InputData::parse(TRACE.as_bytes(), 2, InitialTopics::Given(vec![0, 1, 1]), 1).unwrap();
        assert_eq!(data.n_events(), 3);
        assert_eq!(data.trace.memory_size(), 1);
        assert_eq!(data.trace.path_len(), 2);
        let stamps: Vec<f64> = (0..3).map(|i| data.trace.stamp(i)).collect();
        assert_eq!(stamps, vec![0.1, 0.3, 0.5]);
        // Topics travel with their events through the sort.
        assert_eq!(data.topics, vec![1, 1, 0]);
        assert_eq!(data.hyper2id["u1"], 0);
        assert_eq!(data.hyper2id["u2"], 1);
        assert_eq!(data.site2id.len(), 3);
        assert_eq!(data.trace.hyper(0), 1);
    }

    #[test]
    fn counts_and_stamps_cover_whole_trace() {
        let data = InputData::parse(TRACE.as_bytes(), 2, InitialTopics::Random, 9).unwrap();
        data.counts.check_marginals().unwrap();
        assert_eq!(data.counts.count_h.sum(), 3);
        assert_eq!(data.counts.count_z.sum(), 6);
        assert_eq!(data.stamps.total(), 3);
    }

    #[test]
    fn random_initialisation_is_seeded() {
        let a = InputData::parse(TRACE.as_bytes(), 3, InitialTopics::Random, 5).unwrap();
        let b = InputData::parse(TRACE.as_bytes(), 3, InitialTopics::Random, 5).unwrap();
        assert_eq!(a.topics, b.topics);
    }

    #[test]
    fn inconsistent_memory_size_reports_line() {
        let bad = "0.5\tu1\ta\tb\n0.1\t0.2\tu2\tb\tc\td\n";
        match InputData::parse(bad.as_bytes(), 2, InitialTopics::Random, 1) {
            Err(Error::InvalidTrace { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_rows_rejected() {
        for bad in ["0.5\tu1\ta\n", "x\tu1\ta\tb\n", "-1\tu1\ta\tb\n", "0.5\tu1\ta\tb\tc\n"] {
            assert!(
                InputData::parse(bad.as_bytes(), 2, InitialTopics::Random, 1).is_err(),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn given_assignment_validated() {
        let events = vec![RawEvent::new(vec![1.0], "u", &["a"])];
        assert!(InputData::from_events(events.clone(), 2, InitialTopics::Given(vec![2]), 0).is_err());
        assert!(InputData::from_events(events, 2, InitialTopics::Given(vec![0, 1]), 0).is_err());
    }
}
