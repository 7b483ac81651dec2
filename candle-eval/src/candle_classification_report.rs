use anyhow::bail;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

///
/// Per-class precision, recall and F1 with accuracy, macro and
/// support-weighted averages. Classes are the sorted union of the
/// true and predicted labels; a ratio with a zero denominator is 0.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.
    } else {
        num as f64 / denom as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0. {
        2. * precision * recall / (precision + recall)
    } else {
        0.
    }
}

#[derive(Default)]
struct Counts {
    true_positive: usize,
    predicted: usize,
    actual: usize,
}

impl ClassificationReport {
    pub fn from_labels(y_true: &[usize], y_pred: &[usize]) -> anyhow::Result<Self> {
        if y_true.len() != y_pred.len() {
            bail!("{} true labels vs. {} predictions", y_true.len(), y_pred.len());
        }
        if y_true.is_empty() {
            bail!("no labels to report on");
        }

        let mut counts: BTreeMap<usize, Counts> = BTreeMap::new();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            counts.entry(t).or_default().actual += 1;
            counts.entry(p).or_default().predicted += 1;
            if t == p {
                counts.entry(t).or_default().true_positive += 1;
            }
        }

        let classes = counts
            .iter()
            .map(|(&label, c)| {
                let precision = ratio(c.true_positive, c.predicted);
                let recall = ratio(c.true_positive, c.actual);
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1_score: f1(precision, recall),
                    support: c.actual,
                }
            })
            .collect::<Vec<_>>();

        let ntot = y_true.len();
        let ncorrect = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();

        let nclass = classes.len() as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / nclass,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / nclass,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / nclass,
            support: ntot,
        };

        let weight = |c: &ClassMetrics| c.support as f64 / ntot as f64;
        let weighted_avg = AverageMetrics {
            precision: classes.iter().map(|c| weight(c) * c.precision).sum(),
            recall: classes.iter().map(|c| weight(c) * c.recall).sum(),
            f1_score: classes.iter().map(|c| weight(c) * c.f1_score).sum(),
            support: ntot,
        };

        Ok(Self {
            classes,
            accuracy: ratio(ncorrect, ntot),
            macro_avg,
            weighted_avg,
        })
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
