pub mod reconciler;
pub mod refund;
pub mod scanner;
pub mod scheduler;
pub mod transitions;

pub use reconciler::{GatewayCallback, PaymentReconciler, ReconcileOutcome};
pub use refund::{RefundCommand, RefundInitiator, RefundOutcome};
pub use scanner::DeadlineScanner;
pub use scheduler::SweepScheduler;
pub use transitions::{SweepSummary, TransitionExecutor};
