//! 基础设施层
//!
//! 持有稀缺资源（浏览器），并定义外部协作者的接口

pub mod ports;
pub mod render_session;

pub use ports::{
    AnswerSubmitter, FetchedResource, Identity, InferenceClient, PageRenderer, RenderedPage,
    ResourceFetcher, SubmissionPayload,
};
pub use render_session::RenderSession;
