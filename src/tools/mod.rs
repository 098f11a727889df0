pub mod batch_predict;
pub mod finetune;
pub mod prepare;

use std::path::PathBuf;

pub use batch_predict::{BatchPredictOptions, batch_predict};
pub use finetune::{FinetuneOptions, finetune};
pub use prepare::{PrepareOptions, PrepareSummary, prepare_dataset};

/// Interpret a path argument, treating an empty value or the literal `None`
/// (any case) as unset. The hosting platform passes unset parameters as
/// `None`.
pub fn optional_path(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_literal_is_unset() {
        assert_eq!(optional_path(Some("None")), None);
        assert_eq!(optional_path(Some("NONE")), None);
        assert_eq!(optional_path(Some("")), None);
        assert_eq!(optional_path(None), None);
        assert_eq!(optional_path(Some("/data/images")), Some(PathBuf::from("/data/images")));
    }
}
