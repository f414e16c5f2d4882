pub mod loaders;
pub mod request;
pub mod result;
pub mod rubric;
pub mod rubric_config;

pub use loaders::{load_all_toml_files, load_rubric_config, load_toml_to_request, RequestFile};
pub use request::{ContextBlob, GradingRequest, RequestLimits};
pub use result::{
    Annotation, AnnotationCategory, DimensionResult, GradingMetadata, GradingResult,
};
pub use rubric::{DiagramQuality, DimensionDetail, RubricDimension};
pub use rubric_config::{GradeBand, RubricConfig, RubricEntry};
