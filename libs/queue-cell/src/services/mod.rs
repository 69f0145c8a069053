pub mod clock;
pub mod eta;
pub mod positions;
pub mod transitions;
pub mod store;
pub mod supabase_store;
pub mod notifier;
pub mod queue;

pub use clock::*;
pub use positions::*;
pub use transitions::*;
pub use store::*;
pub use supabase_store::*;
pub use notifier::*;
pub use queue::*;
