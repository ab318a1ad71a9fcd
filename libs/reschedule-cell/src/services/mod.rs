pub mod slot;
pub mod capacity;
pub mod overbooking;
pub mod engine;
pub mod drag;
pub mod confirmation;
pub mod coordinator;
pub mod optimistic;

pub use slot::*;
pub use capacity::*;
pub use overbooking::*;
pub use engine::*;
pub use confirmation::*;
pub use coordinator::*;
pub use optimistic::*;
