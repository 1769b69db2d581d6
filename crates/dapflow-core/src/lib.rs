pub mod path;
pub mod poll;

pub use path::{LocationKey, expand_tilde, normalize_path, paths_equal};
pub use poll::{PollPolicy, poll_until};
