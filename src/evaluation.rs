/// Confusion-matrix evaluation of a router over a labeled dataset
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::dataset::SequenceStore;
use crate::error::{GestureError, Result};
use crate::router::BucketedClassifierRouter;
use crate::vocabulary::Vocabulary;

/// Square matrix of counts, rows are true labels and columns predicted labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(labels: Vec<String>) -> Self {
        let size = labels.len();
        Self {
            labels,
            counts: vec![vec![0; size]; size],
        }
    }

    pub fn record(&mut self, true_label: usize, predicted: usize) -> Result<()> {
        let size = self.size();
        if true_label >= size || predicted >= size {
            return Err(GestureError::Classification(format!(
                "label pair ({}, {}) outside a {}-word vocabulary",
                true_label, predicted, size
            )));
        }
        self.counts[true_label][predicted] += 1;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn count(&self, true_label: usize, predicted: usize) -> usize {
        self.counts[true_label][predicted]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Samples per true label
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Samples per predicted label
    pub fn column_sums(&self) -> Vec<usize> {
        (0..self.size())
            .map(|col| self.counts.iter().map(|row| row[col]).sum())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.row_sums().iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.size()).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .chain(std::iter::once(6))
            .max()
            .unwrap_or(6);

        write!(f, "{:>width$}", "true\\pred", width = width.max(9))?;
        for label in &self.labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;

        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{:>width$}", label, width = width.max(9))?;
            for count in row {
                write!(f, " {:>width$}", count, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Route every stored sequence and tabulate true against predicted labels
pub fn evaluate(
    store: &SequenceStore,
    vocabulary: &Vocabulary,
    router: &BucketedClassifierRouter,
) -> Result<ConfusionMatrix> {
    if router.num_classes() != vocabulary.len() {
        return Err(GestureError::Configuration(format!(
            "router scores {} classes but vocabulary has {} words",
            router.num_classes(),
            vocabulary.len()
        )));
    }

    let sequences = store.labeled_sequences(vocabulary)?;
    let mut matrix = ConfusionMatrix::new(vocabulary.words().to_vec());

    for (frames, true_label) in &sequences {
        let prediction = router.route(frames)?;
        matrix.record(*true_label, prediction.label)?;
    }

    info!(
        "📊 Evaluated {} sequences, accuracy {:.1}%",
        matrix.total(),
        matrix.accuracy() * 100.0
    );
    Ok(matrix)
}
