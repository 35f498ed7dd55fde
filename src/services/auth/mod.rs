pub mod dispatcher;
pub mod params;
pub mod response;

pub use dispatcher::AuthenticationDispatcher;
pub use params::{AuthenticationParameter, SessionOverrides};
pub use response::{AuthResponse, ResponseAssembler, ResponseFlags};
