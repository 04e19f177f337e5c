pub mod dedup;
pub mod dispatcher;
pub mod invitation;
pub mod store;
pub mod sweeper;
pub mod template;
