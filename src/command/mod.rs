mod chat;
mod dev;
mod plan;

pub use chat::run_chat;
pub use dev::run_dev;
pub use plan::run_plan;
