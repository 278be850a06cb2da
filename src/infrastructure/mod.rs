pub mod chrome_session;
pub mod screenshot;
pub mod session;

pub use chrome_session::{ChromeSession, ChromeSessionFactory};
pub use screenshot::ScreenshotFile;
pub use session::{BrowserSession, SessionFactory};
