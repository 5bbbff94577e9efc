pub mod answer;
pub mod challenge;
pub mod context;
pub mod intent;
pub mod record;
pub mod resource;
pub mod table;

pub use answer::AnswerValue;
pub use challenge::{ChallengePage, ResourceKind, ResourceRef};
pub use context::{ResolutionContext, TextFragment};
pub use intent::QuestionIntent;
pub use record::{
    AbortReason, ChainOutcome, ChainStatus, ComputationMethod, IterationOutcome, IterationRecord,
};
pub use resource::{
    DecodedImage, DecodedResource, DocumentTable, DocumentText, ImagePayload, ResourceFormat,
};
pub use table::{ColumnType, NumericSummary, Table};
