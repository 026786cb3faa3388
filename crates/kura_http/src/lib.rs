mod context;
mod fs;
mod origin;
mod server;

pub use context::HttpContext;
pub use origin::{Origin, StaticOrigin};
pub use server::Server;
