pub mod action;
pub mod change;
pub mod signal;
pub mod state;

pub use action::LifecycleAction;
pub use change::ChangeType;
pub use signal::{RestartSignal, SignalAction};
pub use state::WorkerState;
