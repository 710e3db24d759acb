mod driver;
mod error;
mod session;
mod stealth;

pub use driver::{ButtonState, PageDriver};
pub use error::{SessionError, SessionResult};
pub use session::{BrowserSession, LaunchOverrides, SessionConfig};
