pub mod captcha_client;

pub use captcha_client::{CaptchaSolver, SolveCounter, TwoCaptchaClient};
