pub mod clock;
pub mod manager;
pub mod oauth;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{AuthState, Credential, SessionManager};
pub use oauth::{BrowserNavigator, Navigator, OAuthConfig, ProviderSettings};
