pub mod browser;
pub mod query;
pub mod token;
pub mod traits;
pub mod types;
pub mod zealty;

pub use browser::{BrowserSessionProvider, SessionHandle};
pub use token::{Md5TokenDeriver, TokenProbe};
pub use traits::{CellFetcher, SessionProvider, TokenDeriver};
pub use zealty::FetchExecutor;
