pub mod classes;
pub mod layout;
pub mod listing;
pub mod split;

pub use classes::read_classes;
pub use layout::{DatasetLayout, DatasetSpec, SourceDirs};
pub use listing::{DatasetListing, list_dataset};
pub use split::{SPLIT_SEED, SplitResult, permutation, train_valid_split};

/// Image formats the detection framework can train on.
pub const IMAGE_FORMATS: [&str; 9] = ["bmp", "jpg", "jpeg", "png", "tif", "tiff", "dng", "webp", "mpo"];
