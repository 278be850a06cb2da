pub mod captcha_flow;
pub mod retrieval_ctx;

pub use captcha_flow::{CaptchaFlow, FlowSettings, Retrieved};
pub use retrieval_ctx::RetrievalCtx;
