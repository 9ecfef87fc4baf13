pub mod keywords;
pub mod reference_extractor;
pub mod temporal;

pub use keywords::{issue_target_similarity, jaccard, keyword_set};
pub use reference_extractor::{extract_references, ExtractedReference};
pub use temporal::{
    semantic_confidence_boost, temporal_base_confidence, temporal_signal_boost,
    SEMANTIC_FLOOR_SECS,
};
