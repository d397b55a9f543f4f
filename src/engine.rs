use crate::aggregate::{aggregate_students, class_category_average, StudentAggregate};
use crate::columns::{classify_headers, header_fingerprint, Classification, OrderedColumn};
use crate::config::{ConfigError, EngineConfig, RoundingPolicy, ScoringMode};
use crate::diagnostics::Diagnostic;
use crate::grade::{combine_weighted, round_to_places, weights_sum_mismatch};
use crate::header::{ColumnDescriptor, HeaderIssue, HeaderMatcher};
use crate::table::{CellValue, RawTable, RowWidthMismatch};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Input problems that make a report meaningless. Callers should refuse to render.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("none of the {header_count} headers is an identifier column")]
    NoIdentifierColumns { header_count: usize },
    #[error("none of the {header_count} headers is a gradable column")]
    NoGradableColumns { header_count: usize },
    #[error("row {row} has {found} cells but the header row has {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl StructuralError {
    pub fn code(&self) -> &'static str {
        match self {
            StructuralError::NoIdentifierColumns { .. } => "no_identifier_columns",
            StructuralError::NoGradableColumns { .. } => "no_gradable_columns",
            StructuralError::RowWidthMismatch { .. } => "row_width_mismatch",
        }
    }
}

impl From<RowWidthMismatch> for StructuralError {
    fn from(e: RowWidthMismatch) -> Self {
        StructuralError::RowWidthMismatch {
            row: e.row,
            expected: e.expected,
            found: e.found,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    pub scoring_mode: ScoringMode,
    pub rounding: RoundingPolicy,
    pub weight_total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub weight: Option<f64>,
    pub column_count: usize,
    pub student_count: usize,
    pub class_avg: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierValue {
    pub header: String,
    pub value: CellValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentValue {
    pub column: usize,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category: String,
    pub score: Option<f64>,
    pub weighted: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentScoreRow {
    pub row: usize,
    pub identifiers: Vec<IdentifierValue>,
    pub assignments: Vec<AssignmentValue>,
    pub categories: Vec<CategoryResult>,
    pub final_grade: Option<f64>,
    pub recorded_count: usize,
    pub missing_count: usize,
    pub text_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputColumnKind {
    Identifier,
    Assignment,
    CategoryScore,
    WeightedContribution,
    FinalGrade,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputColumn {
    pub key: String,
    pub label: String,
    pub kind: OutputColumnKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputCell {
    /// Rendered as a blank cell. Never conflated with a zero.
    Empty,
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTable {
    pub columns: Vec<OutputColumn>,
    pub rows: Vec<Vec<OutputCell>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookReport {
    pub settings: ReportSettings,
    pub header_fingerprint: String,
    pub columns: Vec<ColumnDescriptor>,
    pub categories: Vec<CategorySummary>,
    pub students: Vec<StudentScoreRow>,
    pub table: OutputTable,
    pub diagnostics: Vec<Diagnostic>,
}

pub const FINAL_GRADE_LABEL: &str = "Final Grade";

/// One configured grading run. Holds no data between calls to `run`.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    matcher: HeaderMatcher,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let matcher = HeaderMatcher::new(&config.headers)?;
        Ok(Self { config, matcher })
    }

    pub fn classify(&self, headers: &[String]) -> Classification {
        classify_headers(headers, &self.matcher)
    }

    pub fn parse_header(&self, header: &str) -> (ColumnDescriptor, Option<HeaderIssue>) {
        self.matcher.parse(header, 0)
    }

    pub fn run(&self, table: &RawTable) -> Result<GradebookReport, StructuralError> {
        let header_count = table.headers().len();
        let classification = self.classify(table.headers());
        if classification.identifiers.is_empty() {
            return Err(StructuralError::NoIdentifierColumns { header_count });
        }
        if classification.gradable_count() == 0 {
            return Err(StructuralError::NoGradableColumns { header_count });
        }

        let mut diagnostics = header_diagnostics(&classification);
        let weights: Vec<Option<f64>> = classification
            .categories
            .iter()
            .map(|c| self.config.weights.get(&c.name))
            .collect();
        diagnostics.extend(self.weight_diagnostics(&classification, &weights));
        let absent_weighted: Vec<&str> = self
            .config
            .weights
            .entries()
            .iter()
            .filter(|e| classification.category_index(&e.category).is_none())
            .map(|e| e.category.as_str())
            .collect();

        let aggregates = aggregate_students(table, &classification, self.config.scoring_mode);
        let mut students = Vec::with_capacity(aggregates.len());
        for agg in &aggregates {
            let (row, student_diags) =
                self.score_row(table, &classification, &weights, &absent_weighted, agg);
            diagnostics.extend(student_diags);
            students.push(row);
        }

        let categories: Vec<CategorySummary> = classification
            .categories
            .iter()
            .enumerate()
            .map(|(ci, group)| {
                let avg = class_category_average(&aggregates, ci);
                CategorySummary {
                    name: group.name.clone(),
                    weight: weights[ci],
                    column_count: group.members.len(),
                    student_count: avg.student_count,
                    class_avg: avg.class_avg.map(|v| round_to_places(v, 1)),
                }
            })
            .collect();

        let output = build_output_table(&classification, &weights, &students);
        info!(
            students = students.len(),
            categories = categories.len(),
            gradable_columns = classification.gradable_count(),
            diagnostics = diagnostics.len(),
            student_diagnostics = diagnostics.iter().filter(|d| d.is_student_level()).count(),
            "gradebook run complete"
        );

        Ok(GradebookReport {
            settings: ReportSettings {
                scoring_mode: self.config.scoring_mode,
                rounding: self.config.rounding,
                weight_total: self.config.weights.total(),
            },
            header_fingerprint: header_fingerprint(table.headers()),
            columns: classification.columns,
            categories,
            students,
            table: output,
            diagnostics,
        })
    }

    fn weight_diagnostics(
        &self,
        classification: &Classification,
        weights: &[Option<f64>],
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let weight_cfg = &self.config.weights;
        if weights_sum_mismatch(weight_cfg.total(), self.config.weight_tolerance) {
            debug!(total = weight_cfg.total(), "category weights do not sum to 1");
            out.push(Diagnostic::WeightSumMismatch {
                total: weight_cfg.total(),
                tolerance: self.config.weight_tolerance,
            });
        }
        for entry in weight_cfg.entries() {
            if classification.category_index(&entry.category).is_none() {
                out.push(Diagnostic::WeightedCategoryAbsent {
                    category: entry.category.clone(),
                });
            }
        }
        for (group, weight) in classification.categories.iter().zip(weights) {
            if weight.is_none() {
                debug!(category = %group.name, "category has no configured weight");
                out.push(Diagnostic::UnweightedCategory {
                    category: group.name.clone(),
                });
            }
        }
        out
    }

    fn score_row(
        &self,
        table: &RawTable,
        classification: &Classification,
        weights: &[Option<f64>],
        absent_weighted: &[&str],
        agg: &StudentAggregate,
    ) -> (StudentScoreRow, Vec<Diagnostic>) {
        let identifiers: Vec<IdentifierValue> = classification
            .identifiers
            .iter()
            .map(|&col| IdentifierValue {
                header: classification.columns[col].display_name.clone(),
                value: table.cell(agg.row, col).clone(),
            })
            .collect();
        let student = identifiers
            .iter()
            .map(|i| i.value.display())
            .find(|v| !v.is_empty());

        let assignments = classification
            .categories
            .iter()
            .flat_map(|g| g.members.iter())
            .map(|&col| AssignmentValue {
                column: col,
                value: table.cell(agg.row, col).as_number(),
            })
            .collect();

        let scores: Vec<Option<f64>> = agg.categories.iter().map(|c| c.score).collect();
        let outcome = combine_weighted(&scores, weights, self.config.rounding);

        let mut diags = Vec::new();
        if outcome.final_grade.is_none() {
            diags.push(Diagnostic::NoContributingCategory {
                row: agg.row,
                student: student.clone(),
            });
        } else {
            let names = outcome
                .not_contributing
                .iter()
                .map(|&ci| classification.categories[ci].name.as_str())
                .chain(absent_weighted.iter().copied());
            for category in names {
                diags.push(Diagnostic::CategoryNotContributing {
                    row: agg.row,
                    student: student.clone(),
                    category: category.to_string(),
                });
            }
        }

        let categories = classification
            .categories
            .iter()
            .enumerate()
            .map(|(ci, g)| CategoryResult {
                category: g.name.clone(),
                score: scores[ci],
                weighted: outcome.contributions[ci].map(|v| round_to_places(v, 2)),
            })
            .collect();

        (
            StudentScoreRow {
                row: agg.row,
                identifiers,
                assignments,
                categories,
                final_grade: outcome.final_grade,
                recorded_count: agg.recorded_count,
                missing_count: agg.missing_count,
                text_count: agg.text_count,
            },
            diags,
        )
    }
}

pub fn header_diagnostics(classification: &Classification) -> Vec<Diagnostic> {
    classification
        .findings
        .iter()
        .map(|f| match f.issue {
            HeaderIssue::Unstructured => Diagnostic::MalformedHeader {
                sequence_index: f.sequence_index,
                header: f.header.clone(),
            },
            HeaderIssue::MissingCategoryValue => Diagnostic::CategoryFallback {
                sequence_index: f.sequence_index,
                header: f.header.clone(),
            },
        })
        .collect()
}

/// Column order: classifier ordering, then one weighted-contribution column per
/// weighted category, then the final grade.
fn build_output_table(
    classification: &Classification,
    weights: &[Option<f64>],
    students: &[StudentScoreRow],
) -> OutputTable {
    let weighted: Vec<(usize, f64)> = weights
        .iter()
        .enumerate()
        .filter_map(|(ci, w)| w.map(|w| (ci, w)))
        .collect();

    let mut columns: Vec<OutputColumn> = classification
        .ordering
        .iter()
        .map(|o| match *o {
            OrderedColumn::Source { column } => {
                let desc = &classification.columns[column];
                OutputColumn {
                    key: format!("col:{}", column),
                    label: desc.display_name.clone(),
                    kind: if desc.is_identifier() {
                        OutputColumnKind::Identifier
                    } else {
                        OutputColumnKind::Assignment
                    },
                }
            }
            OrderedColumn::CategoryScore { category } => OutputColumn {
                key: format!("cat:{}", category),
                label: format!("{} Average", classification.categories[category].name),
                kind: OutputColumnKind::CategoryScore,
            },
        })
        .collect();
    columns.extend(weighted.iter().map(|&(ci, w)| OutputColumn {
        key: format!("wt:{}", ci),
        label: format!(
            "{} Weighted ({}%)",
            classification.categories[ci].name,
            round_to_places(w * 100.0, 2)
        ),
        kind: OutputColumnKind::WeightedContribution,
    }));
    columns.push(OutputColumn {
        key: "final".to_string(),
        label: FINAL_GRADE_LABEL.to_string(),
        kind: OutputColumnKind::FinalGrade,
    });

    let rows = students
        .iter()
        .map(|s| {
            let mut cells: Vec<OutputCell> = classification
                .ordering
                .iter()
                .map(|o| match *o {
                    OrderedColumn::Source { column } => {
                        if let Some(id) = classification
                            .identifiers
                            .iter()
                            .position(|&c| c == column)
                        {
                            match &s.identifiers[id].value {
                                CellValue::Missing => OutputCell::Empty,
                                CellValue::Number(v) => OutputCell::Number(*v),
                                CellValue::Text(t) => OutputCell::Text(t.clone()),
                            }
                        } else {
                            s.assignments
                                .iter()
                                .find(|a| a.column == column)
                                .and_then(|a| a.value)
                                .map(OutputCell::Number)
                                .unwrap_or(OutputCell::Empty)
                        }
                    }
                    OrderedColumn::CategoryScore { category } => s.categories[category]
                        .score
                        .map(|v| OutputCell::Number(round_to_places(v, 2)))
                        .unwrap_or(OutputCell::Empty),
                })
                .collect();
            cells.extend(weighted.iter().map(|&(ci, _)| {
                s.categories[ci]
                    .weighted
                    .map(OutputCell::Number)
                    .unwrap_or(OutputCell::Empty)
            }));
            cells.push(
                s.final_grade
                    .map(OutputCell::Number)
                    .unwrap_or(OutputCell::Empty),
            );
            cells
        })
        .collect();

    OutputTable { columns, rows }
}
