use crate::columns::Classification;
use crate::config::ScoringMode;
use crate::table::{CellValue, RawTable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreState {
    /// Blank, or a non-numeric entry the exporter left in a score column.
    Missing,
    Recorded(f64),
}

impl From<&CellValue> for ScoreState {
    fn from(cell: &CellValue) -> Self {
        cell.as_number()
            .map(ScoreState::Recorded)
            .unwrap_or(ScoreState::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScore {
    /// `None` only for a category with no member columns. All-missing scores 0.
    pub score: Option<f64>,
    pub recorded_count: usize,
    pub missing_count: usize,
}

/// Score one category for one student. Each item is a member column's state and
/// its header max points.
pub fn category_score<I>(entries: I, mode: ScoringMode) -> CategoryScore
where
    I: IntoIterator<Item = (ScoreState, Option<f64>)>,
{
    let mut recorded_count: usize = 0;
    let mut missing_count: usize = 0;
    let mut sum: f64 = 0.0;
    let mut earned: f64 = 0.0;
    let mut possible: f64 = 0.0;

    for (state, max_points) in entries {
        match state {
            ScoreState::Missing => missing_count += 1,
            ScoreState::Recorded(v) => {
                recorded_count += 1;
                sum += v;
                if let Some(max) = max_points {
                    earned += v;
                    possible += max;
                }
            }
        }
    }

    let members = recorded_count + missing_count;
    let score = if members == 0 {
        None
    } else {
        match mode {
            // Missing entries stay in the denominator as zeros.
            ScoringMode::MeanOfScores => Some(sum / members as f64),
            ScoringMode::PointsRatio => {
                if possible > 0.0 {
                    Some(100.0 * earned / possible)
                } else {
                    Some(0.0)
                }
            }
        }
    };

    CategoryScore {
        score,
        recorded_count,
        missing_count,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentAggregate {
    pub row: usize,
    /// Parallel to `Classification::categories`.
    pub categories: Vec<CategoryScore>,
    pub recorded_count: usize,
    pub missing_count: usize,
    pub text_count: usize,
}

pub fn aggregate_students(
    table: &RawTable,
    classification: &Classification,
    mode: ScoringMode,
) -> Vec<StudentAggregate> {
    let mut out = Vec::with_capacity(table.rows().len());
    for row in 0..table.rows().len() {
        let mut text_count = 0_usize;
        let mut categories = Vec::with_capacity(classification.categories.len());
        for group in &classification.categories {
            let entries = group.members.iter().map(|&col| {
                let cell = table.cell(row, col);
                if matches!(cell, CellValue::Text(_)) {
                    text_count += 1;
                }
                (ScoreState::from(cell), classification.columns[col].max_points)
            });
            categories.push(category_score(entries, mode));
        }
        let recorded_count = categories.iter().map(|c| c.recorded_count).sum();
        let missing_count = categories.iter().map(|c| c.missing_count).sum();
        out.push(StudentAggregate {
            row,
            categories,
            recorded_count,
            missing_count,
            text_count,
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassCategoryAverage {
    pub class_avg: Option<f64>,
    pub student_count: usize,
}

/// Class-wide mean of one category's scores over students that have one.
pub fn class_category_average(students: &[StudentAggregate], category: usize) -> ClassCategoryAverage {
    let mut sum = 0.0_f64;
    let mut student_count = 0_usize;
    for s in students {
        if let Some(v) = s.categories.get(category).and_then(|c| c.score) {
            sum += v;
            student_count += 1;
        }
    }
    ClassCategoryAverage {
        class_avg: if student_count > 0 {
            Some(sum / student_count as f64)
        } else {
            None
        },
        student_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_counts_missing_as_zero() {
        let s = category_score(
            [
                (ScoreState::Recorded(80.0), None),
                (ScoreState::Missing, None),
                (ScoreState::Recorded(60.0), None),
            ],
            ScoringMode::MeanOfScores,
        );
        assert!(near(s.score.expect("score"), 140.0 / 3.0));
        assert_eq!(s.recorded_count, 2);
        assert_eq!(s.missing_count, 1);
    }

    #[test]
    fn points_ratio_excuses_missing_work() {
        let s = category_score(
            [
                (ScoreState::Recorded(8.0), Some(10.0)),
                (ScoreState::Missing, Some(20.0)),
            ],
            ScoringMode::PointsRatio,
        );
        assert!(near(s.score.expect("score"), 80.0));
    }

    #[test]
    fn points_ratio_skips_columns_without_max_points() {
        let s = category_score(
            [
                (ScoreState::Recorded(3.0), Some(4.0)),
                (ScoreState::Recorded(99.0), None),
            ],
            ScoringMode::PointsRatio,
        );
        assert!(near(s.score.expect("score"), 75.0));

        let none_known = category_score(
            [(ScoreState::Recorded(5.0), None)],
            ScoringMode::PointsRatio,
        );
        assert_eq!(none_known.score, Some(0.0));
    }

    #[test]
    fn all_missing_category_scores_zero_in_both_modes() {
        let zero = category_score([(ScoreState::Recorded(0.0), None)], ScoringMode::MeanOfScores);
        assert_eq!(zero.score, Some(0.0));

        for mode in [ScoringMode::MeanOfScores, ScoringMode::PointsRatio] {
            let blank = category_score(
                [(ScoreState::Missing, Some(10.0)), (ScoreState::Missing, None)],
                mode,
            );
            assert_eq!(blank.score, Some(0.0));
            assert_eq!(blank.recorded_count, 0);
            assert_eq!(blank.missing_count, 2);
        }

        let no_members = category_score(std::iter::empty(), ScoringMode::MeanOfScores);
        assert_eq!(no_members.score, None);
    }

    #[test]
    fn text_cells_count_as_missing() {
        assert_eq!(
            ScoreState::from(&CellValue::Text("EX".to_string())),
            ScoreState::Missing
        );
        assert_eq!(ScoreState::from(&CellValue::Number(7.0)), ScoreState::Recorded(7.0));
    }
}
