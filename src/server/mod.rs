pub mod credential;
pub mod server;
pub mod state;

pub use credential::MaybeCredential;
pub use server::{make_app, run_server, SESSION_HEADER};
pub use state::GatewayState;
