// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
Counting top-1 predictions across a run.
*/

use crate::session::{ResultSet, RunOptions};
use std::{collections::BTreeMap, fmt, io::Write};

/// How often one class was the top prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub count: usize,

    /// The label reported the first time this class was seen.
    pub label: String,
}

/// Top-1 occurrence counts per class index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionTally {
    entries: BTreeMap<usize, TallyEntry>,
}

impl PredictionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one top-1 occurrence of `index`. The first label seen for an index is kept.
    pub fn record(&mut self, index: usize, label: &str) {
        self.entries
            .entry(index)
            .or_insert_with(|| TallyEntry {
                count: 0,
                label: label.to_owned(),
            })
            .count += 1;
    }

    pub fn get(&self, index: usize) -> Option<&TallyEntry> {
        self.entries.get(&index)
    }

    /// Observed classes in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TallyEntry)> {
        self.entries.iter().map(|(index, entry)| (*index, entry))
    }

    /// Total number of counted predictions.
    pub fn total(&self) -> usize {
        self.entries.values().map(|entry| entry.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PredictionTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prediction totals:")?;
        for (index, entry) in self.iter() {
            writeln!(f, "\tcnt={}\t({}) {}", entry.count, index, entry.label)?;
        }

        Ok(())
    }
}

/// Folds result sets into a [`PredictionTally`], optionally printing
/// every slot's ranking as it goes.
#[derive(Debug)]
pub struct Aggregator {
    options: RunOptions,
    show_all: bool,
    processed: usize,
    tally: PredictionTally,
}

impl Aggregator {
    /// Single-image requests for several classes always show the full
    /// ranking, regardless of `verbose`.
    pub fn new(options: RunOptions, verbose: bool) -> Self {
        let show_all = verbose || (options.batch_size == 1 && options.top_k > 1);

        Self {
            options,
            show_all,
            processed: 0,
            tally: PredictionTally::new(),
        }
    }

    /// Whether per-slot rankings are printed.
    pub fn show_all(&self) -> bool {
        self.show_all
    }

    /// Tally the top-1 class of every slot in `result`.
    ///
    /// `names` labels the slots when rankings are printed; slots past
    /// its end reuse the last name.
    pub fn aggregate<W: Write>(
        &mut self,
        result: &ResultSet,
        names: &[&str],
        out: &mut W,
    ) -> std::io::Result<()> {
        if self.show_all {
            if self.processed == 0 {
                write!(out, "Output probabilities:")?;
            }
            writeln!(out, "\nBatch {}: ", self.processed)?;
        }

        for slot in 0..self.options.batch_size {
            let classes = result.classes(slot);
            let classes = &classes[..classes.len().min(self.options.top_k)];

            if let Some(top) = classes.first() {
                self.tally.record(top.index, &top.label);
            }

            if !self.show_all {
                continue;
            }

            let name = names.get(slot).or(names.last()).copied().unwrap_or_default();
            write!(out, "Image '{}': ", name)?;
            if classes.len() > 1 {
                writeln!(out)?;
            }

            for class in classes {
                if classes.len() > 1 {
                    write!(out, "    ")?;
                }
                writeln!(out, "{} (\"{}\") = {}", class.index, class.label, class.score)?;
            }
        }

        self.processed += 1;
        Ok(())
    }

    /// The tally so far.
    pub fn tally(&self) -> &PredictionTally {
        &self.tally
    }

    pub fn finish(self) -> PredictionTally {
        self.tally
    }
}
