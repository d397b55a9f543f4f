use serde::Serialize;

/// Non-fatal findings returned next to the output table. Rendering them for
/// people is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// Header had no identifier name, exclusion marker or category tag. Column dropped.
    MalformedHeader {
        sequence_index: usize,
        header: String,
    },
    /// Category tag with no value. Column filed under "Unknown".
    CategoryFallback {
        sequence_index: usize,
        header: String,
    },
    /// Category scored but has no weight, so it adds nothing to final grades.
    UnweightedCategory { category: String },
    /// A weight is configured for a category with no columns in this file.
    WeightedCategoryAbsent { category: String },
    WeightSumMismatch { total: f64, tolerance: f64 },
    CategoryNotContributing {
        row: usize,
        student: Option<String>,
        category: String,
    },
    NoContributingCategory { row: usize, student: Option<String> },
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::MalformedHeader { .. } => "malformed_header",
            Diagnostic::CategoryFallback { .. } => "category_fallback",
            Diagnostic::UnweightedCategory { .. } => "unweighted_category",
            Diagnostic::WeightedCategoryAbsent { .. } => "weighted_category_absent",
            Diagnostic::WeightSumMismatch { .. } => "weight_sum_mismatch",
            Diagnostic::CategoryNotContributing { .. } => "category_not_contributing",
            Diagnostic::NoContributingCategory { .. } => "no_contributing_category",
        }
    }

    /// Per-student findings, as opposed to column or weight level ones.
    pub fn is_student_level(&self) -> bool {
        matches!(
            self,
            Diagnostic::CategoryNotContributing { .. } | Diagnostic::NoContributingCategory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_code_and_camel_case_fields() {
        let d = Diagnostic::MalformedHeader {
            sequence_index: 4,
            header: "Notes".to_string(),
        };
        let v = serde_json::to_value(&d).expect("serialize");
        assert_eq!(v["code"], "malformed_header");
        assert_eq!(v["sequenceIndex"], 4);
        assert_eq!(v["code"], d.code());

        let s = Diagnostic::NoContributingCategory {
            row: 2,
            student: None,
        };
        assert!(s.is_student_level());
        assert_eq!(serde_json::to_value(&s).expect("serialize")["code"], s.code());
    }
}
