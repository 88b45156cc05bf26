pub mod local;
pub mod remote;
pub mod traits;
pub mod types;

pub use local::LocalStore;
pub use remote::RemoteStore;
pub use traits::ConversationStore;
