pub mod challenge_ctx;
pub mod challenge_flow;

pub use challenge_ctx::ChallengeCtx;
pub use challenge_flow::{ChallengeFlow, ChallengeResult};
